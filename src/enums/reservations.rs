use crate::enums::response_envelope;
use crate::models::reservation::Reservation;
use crate::services::availability::Availability;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub party_size: i32,
}

#[derive(Serialize, ToSchema)]
pub struct SuggestedDay {
    pub date: NaiveDate,
    pub times: Vec<NaiveTime>,
}

/// `outcome` is one of `SHOW_AVAILABILITY`, `SHOW_SUGGESTIONS`, `NO_AVAILABILITY_OR_SUGGESTIONS`.
#[derive(Serialize, ToSchema)]
pub struct AvailabilityData {
    pub outcome: String,
    pub allocated_capacity: i32,
    pub date: Option<NaiveDate>,
    pub times: Vec<NaiveTime>,
    pub suggestions: Vec<SuggestedDay>,
}

impl From<Availability> for AvailabilityData {
    fn from(value: Availability) -> Self {
        match value {
            Availability::ShowAvailability {
                date,
                allocated_capacity,
                times,
            } => Self {
                outcome: "SHOW_AVAILABILITY".to_string(),
                allocated_capacity,
                date: Some(date),
                times,
                suggestions: Vec::new(),
            },
            Availability::ShowSuggestions {
                allocated_capacity,
                suggestions,
            } => Self {
                outcome: "SHOW_SUGGESTIONS".to_string(),
                allocated_capacity,
                date: None,
                times: Vec::new(),
                suggestions: suggestions
                    .into_iter()
                    .map(|(date, times)| SuggestedDay { date, times })
                    .collect(),
            },
            Availability::NoAvailabilityOrSuggestions { allocated_capacity } => Self {
                outcome: "NO_AVAILABILITY_OR_SUGGESTIONS".to_string(),
                allocated_capacity,
                date: None,
                times: Vec::new(),
                suggestions: Vec::new(),
            },
        }
    }
}

response_envelope!(AvailabilityResponse, AvailabilityData);

/// Body of a confirm or edit. Exactly one of `user_id` and `guest_contact` must be set.
#[derive(Deserialize, ToSchema)]
pub struct ReservationRequest {
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub party_size: i32,
    pub user_id: Option<i32>,
    pub guest_contact: Option<String>,
}

response_envelope!(ReservationResponse, Reservation);
