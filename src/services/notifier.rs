use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactChannel {
    Email,
    Sms,
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactChannel::Email => write!(f, "email"),
            ContactChannel::Sms => write!(f, "sms"),
        }
    }
}

/// Anything containing `@` is treated as an email address, everything else as a phone number.
pub fn channel_for(contact: &str) -> ContactChannel {
    if contact.contains('@') {
        ContactChannel::Email
    } else {
        ContactChannel::Sms
    }
}

/// Outbound messages to a party. Delivery failures are reported, never retried here.
pub trait Notifier: Send + Sync {
    fn send_to_contact(&self, contact: &str, message: &str) -> bool;
}

/// Writes every notification to the log. Used when no gateway is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_to_contact(&self, contact: &str, message: &str) -> bool {
        let contact = contact.trim();
        if contact.is_empty() {
            warn!("notifier: refusing to send to an empty contact");
            return false;
        }
        info!(
            "notifier: {} to {}: {}",
            channel_for(contact),
            contact,
            message
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_channel_from_contact_shape() {
        assert_eq!(channel_for("ana@example.com"), ContactChannel::Email);
        assert_eq!(channel_for("+972501234567"), ContactChannel::Sms);
    }

    #[test]
    fn log_notifier_rejects_blank_contact() {
        assert!(LogNotifier.send_to_contact("guest@example.com", "hello"));
        assert!(!LogNotifier.send_to_contact("   ", "hello"));
    }
}
