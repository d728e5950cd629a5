use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Slot {0} is no longer available")]
    SlotNoLongerAvailable(String),
    #[error("Slot {0} is not available")]
    SlotNotAvailable(String),
    #[error("No table can seat a party of {0}")]
    PartyTooLarge(i32),
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("Arrived too early: check-in opens at {opens_at} on {date}")]
    ArrivedTooEarly { date: NaiveDate, opens_at: NaiveTime },
    #[error("Arrived too late: check-in closed at {closed_at} on {date}")]
    ArrivedTooLate { date: NaiveDate, closed_at: NaiveTime },
    #[error("Table {0} is not occupied")]
    TableNotOccupied(i32),
    #[error("Table not found: {0}")]
    TableNotFound(i32),
    #[error("Could not generate a unique confirmation code after {0} attempts")]
    CodeGenerationExhausted(u32),
    #[error("Reservation {0} does not allow this operation in its current status")]
    ReservationNotActive(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Connection pool error: {0}")]
    ConnectionPoolError(#[from] diesel::r2d2::PoolError),
}

impl RepositoryError {
    /// Transaction, commit or pool failures. Everything else is a domain outcome.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            RepositoryError::DatabaseError(_) | RepositoryError::ConnectionPoolError(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepositoryError::NotFound(_) | RepositoryError::TableNotFound(_)
        )
    }
}
