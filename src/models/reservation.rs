use crate::db::RepositoryError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::{AsChangeset, Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

varchar_enum! {
    /// Lifecycle of a reservation. A confirmed slot is inserted directly as `Confirmed`.
    pub enum ReservationStatus {
        Confirmed => "CONFIRMED",
        Waiting => "WAITING",
        Called => "CALLED",
        Seated => "SEATED",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
        NoShow => "NO_SHOW",
    }
}

impl ReservationStatus {
    /// Statuses that hold capacity in their 2-hour window.
    pub const BOOKED: [ReservationStatus; 4] = [
        ReservationStatus::Confirmed,
        ReservationStatus::Waiting,
        ReservationStatus::Called,
        ReservationStatus::Seated,
    ];
}

/// Who the reservation belongs to: a registered subscriber or a guest reachable by contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identity {
    Subscriber(i32),
    Guest(String),
}

impl Identity {
    /// Builds an identity from the two optional request fields; exactly one must be set.
    pub fn from_parts(
        user_id: Option<i32>,
        guest_contact: Option<String>,
    ) -> Result<Self, RepositoryError> {
        let guest_contact = guest_contact
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        match (user_id, guest_contact) {
            (Some(uid), None) => Ok(Identity::Subscriber(uid)),
            (None, Some(contact)) => Ok(Identity::Guest(contact)),
            (Some(_), Some(_)) => Err(RepositoryError::InvalidIdentity(
                "both user_id and guest_contact supplied".to_string(),
            )),
            (None, None) => Err(RepositoryError::InvalidIdentity(
                "one of user_id or guest_contact is required".to_string(),
            )),
        }
    }

    pub fn user_id(&self) -> Option<i32> {
        match self {
            Identity::Subscriber(uid) => Some(*uid),
            Identity::Guest(_) => None,
        }
    }

    pub fn guest_contact(&self) -> Option<&str> {
        match self {
            Identity::Subscriber(_) => None,
            Identity::Guest(contact) => Some(contact),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::db::schema::reservations)]
#[diesel(primary_key(reservation_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Reservation {
    pub reservation_id: i32,
    pub confirmation_code: String,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub party_size: i32,
    pub allocated_capacity: i32,
    pub status: ReservationStatus,
    pub user_id: Option<i32>,
    pub guest_contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn identity(&self) -> Result<Identity, RepositoryError> {
        Identity::from_parts(self.user_id, self.guest_contact.clone())
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::db::schema::reservations)]
pub struct NewReservation {
    pub confirmation_code: String,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub party_size: i32,
    pub allocated_capacity: i32,
    pub status: ReservationStatus,
    pub user_id: Option<i32>,
    pub guest_contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Full in-place rewrite of an edited reservation. `None` identity fields are written as NULL.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::db::schema::reservations)]
#[diesel(treat_none_as_null = true)]
pub struct ReservationEdit {
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub party_size: i32,
    pub allocated_capacity: i32,
    pub user_id: Option<i32>,
    pub guest_contact: Option<String>,
}
