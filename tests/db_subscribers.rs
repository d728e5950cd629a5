mod common;

use tablebook::db::RepositoryError;
use tablebook::models::subscriber::NewSubscriber;

#[test]
fn profile_contact_prefers_email_then_phone() {
    let (_pool, state, _notifier) = common::setup_state();

    let both = state
        .subscriber_ops
        .create_subscriber(NewSubscriber {
            name: "Noa".to_string(),
            email: Some("noa@example.com".to_string()),
            phone: Some("+15550101".to_string()),
        })
        .expect("create");
    let phone_only = state
        .subscriber_ops
        .create_subscriber(NewSubscriber {
            name: "Eli".to_string(),
            email: Some("  ".to_string()),
            phone: Some("+15550102".to_string()),
        })
        .expect("create");
    let unreachable = state
        .subscriber_ops
        .create_subscriber(NewSubscriber {
            name: "Tal".to_string(),
            email: None,
            phone: None,
        })
        .expect("create");

    assert_eq!(
        state.subscriber_ops.contact_for(both.user_id).expect("contact"),
        Some("noa@example.com".to_string())
    );
    assert_eq!(
        state.subscriber_ops.contact_for(phone_only.user_id).expect("contact"),
        Some("+15550102".to_string())
    );
    assert_eq!(
        state.subscriber_ops.contact_for(unreachable.user_id).expect("contact"),
        None
    );
    assert_eq!(state.subscriber_ops.contact_for(999).expect("contact"), None);
}

#[test]
fn identity_needs_exactly_one_of_user_and_contact() {
    use tablebook::models::reservation::Identity;

    assert_eq!(
        Identity::from_parts(Some(3), None).expect("subscriber"),
        Identity::Subscriber(3)
    );
    assert_eq!(
        Identity::from_parts(None, Some(" ana@example.com ".to_string())).expect("guest"),
        Identity::Guest("ana@example.com".to_string())
    );
    assert!(matches!(
        Identity::from_parts(Some(3), Some("ana@example.com".to_string())),
        Err(RepositoryError::InvalidIdentity(_))
    ));
    assert!(matches!(
        Identity::from_parts(None, Some("   ".to_string())),
        Err(RepositoryError::InvalidIdentity(_))
    ));
}
