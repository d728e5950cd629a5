use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::{Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

varchar_enum! {
    pub enum WaitingStatus {
        Waiting => "WAITING",
        Called => "CALLED",
        Assigned => "ASSIGNED",
        Cancelled => "CANCELLED",
    }
}

varchar_enum! {
    /// Day-type tag attached to an opening-hours entry.
    pub enum Occasion {
        Regular => "REGULAR",
        Holiday => "HOLIDAY",
        War => "WAR",
        Strike => "STRIKE",
    }
}

/// Priority of a waiting entry created from a held reservation.
pub const PRIORITY_RESERVATION: i16 = 1;
/// Priority of a walk-in waiting entry.
pub const PRIORITY_WALK_IN: i16 = 0;

/// Billing flag on a seating, persisted as a small integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BillState {
    NotSent,
    Sent,
    Claimed,
}

impl BillState {
    pub fn as_i16(self) -> i16 {
        match self {
            BillState::NotSent => 0,
            BillState::Sent => 1,
            BillState::Claimed => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(BillState::NotSent),
            1 => Some(BillState::Sent),
            2 => Some(BillState::Claimed),
            _ => None,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::db::schema::dining_tables)]
#[diesel(primary_key(table_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DiningTable {
    pub table_id: i32,
    pub table_number: i32,
    pub capacity: i32,
    pub is_active: bool,
}

#[derive(Insertable, Debug, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::db::schema::dining_tables)]
pub struct NewDiningTable {
    pub table_number: i32,
    pub capacity: i32,
}

/// Number of active tables sharing one seating capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CapacityTier {
    pub capacity: i32,
    pub tables: i64,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::db::schema::seatings)]
#[diesel(primary_key(seating_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Seating {
    pub seating_id: i32,
    pub table_id: i32,
    pub reservation_id: i32,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub bill_sent: i16,
}

impl Seating {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::db::schema::seatings)]
pub struct NewSeating {
    pub table_id: i32,
    pub reservation_id: i32,
    pub check_in_time: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::db::schema::waiting_list)]
#[diesel(primary_key(wait_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WaitingListEntry {
    pub wait_id: i32,
    pub reservation_id: i32,
    pub status: WaitingStatus,
    pub priority: i16,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::db::schema::waiting_list)]
pub struct NewWaitingListEntry {
    pub reservation_id: i32,
    pub status: WaitingStatus,
    pub priority: i16,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::db::schema::opening_hours)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OpeningHours {
    pub hours_date: NaiveDate,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub occasion: Occasion,
}

impl OpeningHours {
    /// A day whose close time is not after its open time takes no reservations.
    pub fn is_closed(&self) -> bool {
        self.close_time <= self.open_time
    }
}
