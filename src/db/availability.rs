use crate::config::EngineConfig;
use crate::db::calendar::hours_for;
use crate::db::tables::{capacity_tiers, tables_in_tier};
use crate::db::{DbConnection, RepositoryError};
use crate::models::reservation::ReservationStatus;
use crate::services::availability::{
    allocated_capacity, booked_in_window, candidate_starts, free_slots, slot_fits_hours,
    Availability,
};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_types::Integer;
use log::{debug, error};
use std::collections::BTreeMap;

#[derive(Clone)]
pub struct AvailabilityOperations {
    pool: Pool<ConnectionManager<PgConnection>>,
    config: EngineConfig,
}

impl AvailabilityOperations {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>, config: EngineConfig) -> Self {
        Self { pool, config }
    }

    pub fn find_availability(
        &self,
        date: NaiveDate,
        party_size: i32,
    ) -> Result<Availability, RepositoryError> {
        self.find_availability_at(date, party_size, Utc::now())
    }

    /// Free start times on `date`, or the earliest free times of the following days when
    /// the date is full. Read-only; a later confirm re-validates the chosen slot.
    pub fn find_availability_at(
        &self,
        date: NaiveDate,
        party_size: i32,
        now: DateTime<Utc>,
    ) -> Result<Availability, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("find_availability: failed to acquire DB connection: {}", e);
            e
        })?;
        let conn = conn.connection();

        let tiers = capacity_tiers(conn)?;
        let capacity = allocated_capacity(&tiers, party_size)?;
        let tables = tiers
            .iter()
            .find(|tier| tier.capacity == capacity)
            .map(|tier| tier.tables)
            .unwrap_or(0);

        let times = self.free_starts_on(conn, date, capacity, tables, now)?;
        if !times.is_empty() {
            return Ok(Availability::ShowAvailability {
                date,
                allocated_capacity: capacity,
                times,
            });
        }

        let mut suggestions = BTreeMap::new();
        for offset in 1..=u64::from(self.config.suggestion_horizon_days) {
            let Some(day) = date.checked_add_days(Days::new(offset)) else {
                break;
            };
            let mut day_times = self.free_starts_on(conn, day, capacity, tables, now)?;
            day_times.truncate(self.config.suggestions_per_day);
            if !day_times.is_empty() {
                suggestions.insert(day, day_times);
            }
        }
        debug!(
            "find_availability: {} full for capacity {}, {} suggestion days",
            date,
            capacity,
            suggestions.len()
        );

        if suggestions.is_empty() {
            Ok(Availability::NoAvailabilityOrSuggestions {
                allocated_capacity: capacity,
            })
        } else {
            Ok(Availability::ShowSuggestions {
                allocated_capacity: capacity,
                suggestions,
            })
        }
    }

    fn free_starts_on(
        &self,
        conn: &mut PgConnection,
        date: NaiveDate,
        capacity: i32,
        tables: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<NaiveTime>, RepositoryError> {
        let local_now = self.config.clock().local(now);
        if date < local_now.date() {
            return Ok(Vec::new());
        }
        let Some(hours) = hours_for(conn, date)? else {
            return Ok(Vec::new());
        };
        let mut candidates = candidate_starts(
            &hours,
            self.config.slot_granularity(),
            self.config.dining(),
        );
        if date == local_now.date() {
            candidates.retain(|start| *start >= local_now.time());
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let booked = booked_starts(conn, date, capacity, None)?;
        Ok(free_slots(&candidates, &booked, tables, self.config.dining()))
    }
}

/// Start times of reservations holding capacity in a tier on a date.
pub(crate) fn booked_starts(
    conn: &mut PgConnection,
    date: NaiveDate,
    capacity: i32,
    exclude_reservation: Option<i32>,
) -> Result<Vec<NaiveTime>, RepositoryError> {
    use crate::db::schema::reservations::dsl::*;
    let mut query = reservations
        .filter(reservation_date.eq(date))
        .filter(allocated_capacity.eq(capacity))
        .filter(status.eq_any(ReservationStatus::BOOKED))
        .select(start_time)
        .into_boxed();
    if let Some(excluded_id) = exclude_reservation {
        query = query.filter(reservation_id.ne(excluded_id));
    }
    query.load::<NaiveTime>(conn).map_err(|e| {
        error!(
            "booked_starts: error loading bookings for {} capacity {}: {}",
            date, capacity, e
        );
        RepositoryError::DatabaseError(e)
    })
}

/// Serializes slot decisions for one (date, tier) pair until the transaction ends.
fn lock_slot_tier(
    conn: &mut PgConnection,
    date: NaiveDate,
    capacity: i32,
) -> Result<(), RepositoryError> {
    diesel::sql_query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind::<Integer, _>(date.num_days_from_ce())
        .bind::<Integer, _>(capacity)
        .execute(conn)
        .map_err(|e| {
            error!(
                "lock_slot_tier: error locking {} capacity {}: {}",
                date, capacity, e
            );
            RepositoryError::DatabaseError(e)
        })?;
    Ok(())
}

/// Re-checks a slot inside a writing transaction: the day must be open for the whole sitting
/// and the window must hold fewer bookings than the tier has tables. `unavailable` builds the
/// error reported when it does not.
pub(crate) fn ensure_slot_free(
    conn: &mut PgConnection,
    config: &EngineConfig,
    date: NaiveDate,
    start: NaiveTime,
    capacity: i32,
    exclude_reservation: Option<i32>,
    unavailable: fn(String) -> RepositoryError,
) -> Result<(), RepositoryError> {
    lock_slot_tier(conn, date, capacity)?;
    let slot = format!("{} {}", date, start.format("%H:%M"));

    let fits = hours_for(conn, date)?
        .map(|hours| slot_fits_hours(&hours, start, config.dining()))
        .unwrap_or(false);
    if !fits {
        return Err(unavailable(slot));
    }

    let tables = tables_in_tier(conn, capacity)?;
    let booked = booked_starts(conn, date, capacity, exclude_reservation)?;
    if booked_in_window(start, &booked, config.dining()) as i64 >= tables {
        debug!(
            "ensure_slot_free: {} full for capacity {} ({} tables)",
            slot, capacity, tables
        );
        return Err(unavailable(slot));
    }
    Ok(())
}
