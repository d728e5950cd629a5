use crate::db::{DbConnection, RepositoryError};
use crate::models::reservation::{Identity, Reservation};
use crate::models::subscriber::{NewSubscriber, Subscriber};
use crate::services::notifier::Notifier;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error;
use log::{error, warn};

#[derive(Clone)]
pub struct SubscriberOperations {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl SubscriberOperations {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }

    pub fn create_subscriber(&self, subscriber: NewSubscriber) -> Result<Subscriber, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("create_subscriber: failed to acquire DB connection: {}", e);
            e
        })?;

        use crate::db::schema::subscribers::dsl::*;
        diesel::insert_into(subscribers)
            .values(&subscriber)
            .returning(Subscriber::as_returning())
            .get_result(conn.connection())
            .map_err(|e| {
                error!(
                    "create_subscriber: error inserting subscriber '{}': {}",
                    subscriber.name, e
                );
                RepositoryError::DatabaseError(e)
            })
    }

    /// Contact channel of a subscriber profile (email preferred over phone).
    pub fn contact_for(&self, search_user_id: i32) -> Result<Option<String>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("contact_for: failed to acquire DB connection: {}", e);
            e
        })?;
        resolve_contact(conn.connection(), &Identity::Subscriber(search_user_id))
    }
}

pub(crate) fn find_subscriber(
    conn: &mut PgConnection,
    search_user_id: i32,
) -> Result<Subscriber, RepositoryError> {
    use crate::db::schema::subscribers::dsl::*;
    subscribers
        .find(search_user_id)
        .select(Subscriber::as_select())
        .first(conn)
        .map_err(|e| match e {
            Error::NotFound => RepositoryError::NotFound(format!("subscriber {}", search_user_id)),
            other => RepositoryError::DatabaseError(other),
        })
}

/// Guest contacts are used as given; subscribers resolve through their profile.
pub(crate) fn resolve_contact(
    conn: &mut PgConnection,
    identity: &Identity,
) -> Result<Option<String>, RepositoryError> {
    match identity {
        Identity::Guest(contact) => Ok(Some(contact.clone())),
        Identity::Subscriber(uid) => match find_subscriber(conn, *uid) {
            Ok(subscriber) => Ok(subscriber.preferred_contact().map(str::to_string)),
            Err(RepositoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        },
    }
}

/// A subscriber identity must point at an existing profile.
pub(crate) fn validate_identity(
    conn: &mut PgConnection,
    identity: &Identity,
) -> Result<(), RepositoryError> {
    if let Identity::Subscriber(uid) = identity {
        find_subscriber(conn, *uid).map_err(|e| match e {
            RepositoryError::NotFound(_) => {
                RepositoryError::InvalidIdentity(format!("unknown subscriber {}", uid))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Best-effort message to the party behind a reservation. Returns whether it was delivered.
pub(crate) fn notify_party(
    conn: &mut PgConnection,
    notifier: &dyn Notifier,
    reservation: &Reservation,
    message: &str,
) -> bool {
    let contact = reservation
        .identity()
        .and_then(|identity| resolve_contact(conn, &identity));
    match contact {
        Ok(Some(contact)) => notifier.send_to_contact(&contact, message),
        Ok(None) => {
            warn!(
                "notify_party: no contact on file for reservation {}",
                reservation.confirmation_code
            );
            false
        }
        Err(e) => {
            error!(
                "notify_party: failed to resolve contact for reservation {}: {}",
                reservation.confirmation_code, e
            );
            false
        }
    }
}
