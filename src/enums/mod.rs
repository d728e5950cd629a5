pub mod admin;
pub mod reservations;
pub mod seating;

/// Declares a response envelope: `status` is `"ok"` or `"error"`, `message` is always
/// human readable, and `data` is only present on success.
macro_rules! response_envelope {
    ($(#[$meta:meta])* $name:ident, $data:ty) => {
        $(#[$meta])*
        #[derive(serde::Serialize, utoipa::ToSchema)]
        pub struct $name {
            pub status: String,
            pub message: String,
            pub data: Option<$data>,
            pub error: Option<String>,
        }

        impl $name {
            pub fn ok(message: impl Into<String>, data: $data) -> Self {
                Self {
                    status: "ok".to_string(),
                    message: message.into(),
                    data: Some(data),
                    error: None,
                }
            }

            pub fn error(message: impl Into<String>, error: impl ToString) -> Self {
                Self {
                    status: "error".to_string(),
                    message: message.into(),
                    data: None,
                    error: Some(error.to_string()),
                }
            }
        }
    };
}

pub(crate) use response_envelope;
