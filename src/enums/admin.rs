use crate::enums::response_envelope;
use crate::models::floor::{DiningTable, Occasion};
use crate::models::reservation::Reservation;
use chrono::NaiveTime;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CapacityRequest {
    pub capacity: i32,
}

/// Hours for one date. A close time not after the open time closes the day.
#[derive(Deserialize, ToSchema)]
pub struct HoursRequest {
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub occasion: Occasion,
}

response_envelope!(TableResponse, DiningTable);
response_envelope!(TableListResponse, Vec<DiningTable>);
response_envelope!(
    /// `data` lists the reservations cancelled because of the change.
    InvalidationResponse,
    Vec<Reservation>
);
