use crate::db::RepositoryError;
use crate::models::floor::{CapacityTier, OpeningHours};
use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use std::collections::BTreeMap;

/// Result of an availability search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Free start times on the requested date.
    ShowAvailability {
        date: NaiveDate,
        allocated_capacity: i32,
        times: Vec<NaiveTime>,
    },
    /// Nothing on the requested date; earliest free times on the following days, keyed by date.
    ShowSuggestions {
        allocated_capacity: i32,
        suggestions: BTreeMap<NaiveDate, Vec<NaiveTime>>,
    },
    NoAvailabilityOrSuggestions { allocated_capacity: i32 },
}

impl Availability {
    pub fn allocated_capacity(&self) -> i32 {
        match self {
            Availability::ShowAvailability {
                allocated_capacity, ..
            }
            | Availability::ShowSuggestions {
                allocated_capacity, ..
            }
            | Availability::NoAvailabilityOrSuggestions { allocated_capacity } => {
                *allocated_capacity
            }
        }
    }
}

/// Smallest tier with at least one table that seats `party_size`. Never rounds down.
pub fn allocated_capacity(tiers: &[CapacityTier], party_size: i32) -> Result<i32, RepositoryError> {
    if party_size <= 0 {
        return Err(RepositoryError::ValidationError(format!(
            "Party size must be positive, got {}",
            party_size
        )));
    }
    tiers
        .iter()
        .filter(|tier| tier.tables > 0 && tier.capacity >= party_size)
        .map(|tier| tier.capacity)
        .min()
        .ok_or(RepositoryError::PartyTooLarge(party_size))
}

fn seconds_of(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight())
}

/// Half-open overlap of `[a, a+dining)` and `[b, b+dining)`; touching windows do not overlap.
pub fn windows_overlap(a: NaiveTime, b: NaiveTime, dining: Duration) -> bool {
    let (a, b, d) = (seconds_of(a), seconds_of(b), dining.num_seconds());
    a < b + d && b < a + d
}

pub fn booked_in_window(start: NaiveTime, booked: &[NaiveTime], dining: Duration) -> usize {
    booked
        .iter()
        .filter(|other| windows_overlap(start, **other, dining))
        .count()
}

/// Whether a full sitting starting at `start` lies inside the day's hours.
pub fn slot_fits_hours(hours: &OpeningHours, start: NaiveTime, dining: Duration) -> bool {
    !hours.is_closed()
        && start >= hours.open_time
        && seconds_of(start) + dining.num_seconds() <= seconds_of(hours.close_time)
}

/// Start times from opening until `close - dining`, on the given grid.
pub fn candidate_starts(
    hours: &OpeningHours,
    granularity: Duration,
    dining: Duration,
) -> Vec<NaiveTime> {
    let step = granularity.num_seconds();
    if hours.is_closed() || step <= 0 {
        return Vec::new();
    }
    let first = seconds_of(hours.open_time);
    let last = seconds_of(hours.close_time) - dining.num_seconds();
    (first..=last)
        .step_by(step as usize)
        .filter_map(|secs| u32::try_from(secs).ok())
        .filter_map(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
        .collect()
}

/// Candidates whose window holds fewer bookings than the tier has tables.
pub fn free_slots(
    candidates: &[NaiveTime],
    booked: &[NaiveTime],
    tables: i64,
    dining: Duration,
) -> Vec<NaiveTime> {
    candidates
        .iter()
        .copied()
        .filter(|start| (booked_in_window(*start, booked, dining) as i64) < tables)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::floor::Occasion;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn hours(open: NaiveTime, close: NaiveTime) -> OpeningHours {
        OpeningHours {
            hours_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            open_time: open,
            close_time: close,
            occasion: Occasion::Regular,
        }
    }

    #[test]
    fn allocates_smallest_fitting_tier() {
        let tiers = [
            CapacityTier { capacity: 2, tables: 3 },
            CapacityTier { capacity: 4, tables: 1 },
            CapacityTier { capacity: 8, tables: 0 },
        ];
        assert_eq!(allocated_capacity(&tiers, 1).unwrap(), 2);
        assert_eq!(allocated_capacity(&tiers, 3).unwrap(), 4);
        assert!(matches!(
            allocated_capacity(&tiers, 5),
            Err(RepositoryError::PartyTooLarge(5))
        ));
        assert!(matches!(
            allocated_capacity(&tiers, 0),
            Err(RepositoryError::ValidationError(_))
        ));
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        let dining = Duration::minutes(120);
        assert!(windows_overlap(t(10, 0), t(11, 30), dining));
        assert!(!windows_overlap(t(10, 0), t(12, 0), dining));
        assert!(!windows_overlap(t(12, 0), t(10, 0), dining));
    }

    #[test]
    fn candidates_end_one_sitting_before_close() {
        let starts = candidate_starts(
            &hours(t(10, 0), t(14, 0)),
            Duration::minutes(30),
            Duration::minutes(120),
        );
        assert_eq!(starts, vec![t(10, 0), t(10, 30), t(11, 0), t(11, 30), t(12, 0)]);
    }

    #[test]
    fn closed_day_has_no_candidates_and_fits_nothing() {
        let closed = hours(t(10, 0), t(10, 0));
        assert!(candidate_starts(&closed, Duration::minutes(30), Duration::minutes(120)).is_empty());
        assert!(!slot_fits_hours(&closed, t(10, 0), Duration::minutes(120)));

        let short = hours(t(10, 0), t(11, 0));
        assert!(candidate_starts(&short, Duration::minutes(30), Duration::minutes(120)).is_empty());
    }

    #[test]
    fn free_slots_respect_table_count() {
        let dining = Duration::minutes(120);
        let candidates = [t(10, 0), t(11, 0), t(12, 0)];
        let booked = [t(10, 0)];

        assert_eq!(free_slots(&candidates, &booked, 1, dining), vec![t(12, 0)]);
        assert_eq!(free_slots(&candidates, &booked, 2, dining), candidates.to_vec());
    }
}
