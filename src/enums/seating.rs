use crate::db::{CheckInOutcome, CheckoutOutcome};
use crate::enums::response_envelope;
use crate::models::floor::WaitingListEntry;
use crate::models::reservation::Reservation;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct WalkInRequest {
    pub party_size: i32,
    pub user_id: Option<i32>,
    pub guest_contact: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CallRequest {
    pub table_id: i32,
}

/// `outcome` is `SEATED` (table fields set) or `WAITING` (`wait_id` set).
#[derive(Serialize, ToSchema)]
pub struct CheckInData {
    pub outcome: String,
    pub table_id: Option<i32>,
    pub table_number: Option<i32>,
    pub capacity: Option<i32>,
    pub wait_id: Option<i32>,
    pub reservation: Reservation,
}

impl CheckInData {
    pub fn message(&self) -> String {
        match (self.outcome.as_str(), self.table_number) {
            ("SEATED", Some(number)) => format!("Seated at table {}", number),
            _ => "Added to waiting list".to_string(),
        }
    }
}

impl From<CheckInOutcome> for CheckInData {
    fn from(value: CheckInOutcome) -> Self {
        match value {
            CheckInOutcome::Seated {
                table_id,
                table_number,
                capacity,
                reservation,
            } => Self {
                outcome: "SEATED".to_string(),
                table_id: Some(table_id),
                table_number: Some(table_number),
                capacity: Some(capacity),
                wait_id: None,
                reservation,
            },
            CheckInOutcome::AddedToWaitingList {
                wait_id,
                reservation,
            } => Self {
                outcome: "WAITING".to_string(),
                table_id: None,
                table_number: None,
                capacity: None,
                wait_id: Some(wait_id),
                reservation,
            },
        }
    }
}

response_envelope!(CheckInResponse, CheckInData);

/// `outcome` is `NOBODY_WAITING` or `NEXT_SEATED`.
#[derive(Serialize, ToSchema)]
pub struct CheckoutData {
    pub outcome: String,
    pub table_id: i32,
    pub table_number: i32,
    pub next_wait_id: Option<i32>,
    pub next_reservation: Option<Reservation>,
}

impl CheckoutData {
    pub fn message(&self) -> String {
        match &self.next_reservation {
            Some(_) => format!(
                "Checked out, next customer seated at table {}",
                self.table_number
            ),
            None => "Checked out, nobody waiting".to_string(),
        }
    }
}

impl From<CheckoutOutcome> for CheckoutData {
    fn from(value: CheckoutOutcome) -> Self {
        match value {
            CheckoutOutcome::NobodyWaiting {
                table_id,
                table_number,
            } => Self {
                outcome: "NOBODY_WAITING".to_string(),
                table_id,
                table_number,
                next_wait_id: None,
                next_reservation: None,
            },
            CheckoutOutcome::NextSeated {
                table_id,
                table_number,
                wait_id,
                reservation,
            } => Self {
                outcome: "NEXT_SEATED".to_string(),
                table_id,
                table_number,
                next_wait_id: Some(wait_id),
                next_reservation: Some(reservation),
            },
        }
    }
}

response_envelope!(CheckoutResponse, CheckoutData);
response_envelope!(WaitingEntryResponse, WaitingListEntry);
