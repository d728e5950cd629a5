use crate::config::EngineConfig;
use crate::db::subscribers::notify_party;
use crate::db::{DbConnection, RepositoryError};
use crate::models::floor::OpeningHours;
use crate::models::reservation::{Reservation, ReservationStatus};
use crate::services::availability::slot_fits_hours;
use crate::services::notifier::Notifier;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::upsert::excluded;
use log::{error, info};
use std::sync::Arc;

#[derive(Clone)]
pub struct CalendarOperations {
    pool: Pool<ConnectionManager<PgConnection>>,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
}

impl CalendarOperations {
    pub fn new(
        pool: Pool<ConnectionManager<PgConnection>>,
        config: EngineConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pool,
            config,
            notifier,
        }
    }

    pub fn get_opening_hours(&self, date: NaiveDate) -> Result<Option<OpeningHours>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("get_opening_hours: failed to acquire DB connection: {}", e);
            e
        })?;
        hours_for(conn.connection(), date)
    }

    /// Creates or replaces the hours of one date. Confirmed reservations on that date whose
    /// sitting no longer fits are cancelled and their parties notified; they are returned.
    pub fn set_opening_hours(&self, hours: OpeningHours) -> Result<Vec<Reservation>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("set_opening_hours: failed to acquire DB connection: {}", e);
            e
        })?;

        let cancelled = conn.connection().transaction(|conn| {
            {
                use crate::db::schema::opening_hours::dsl::*;
                diesel::insert_into(opening_hours)
                    .values(&hours)
                    .on_conflict(hours_date)
                    .do_update()
                    .set((
                        open_time.eq(excluded(open_time)),
                        close_time.eq(excluded(close_time)),
                        occasion.eq(excluded(occasion)),
                    ))
                    .execute(conn)
                    .map_err(|e| {
                        error!(
                            "set_opening_hours: error saving hours for {}: {}",
                            hours.hours_date, e
                        );
                        RepositoryError::DatabaseError(e)
                    })?;
            }

            use crate::db::schema::reservations::dsl::*;
            let confirmed: Vec<Reservation> = reservations
                .filter(reservation_date.eq(hours.hours_date))
                .filter(status.eq(ReservationStatus::Confirmed))
                .order((start_time.asc(), created_at.asc()))
                .select(Reservation::as_select())
                .for_update()
                .load(conn)
                .map_err(RepositoryError::DatabaseError)?;

            let dropped: Vec<Reservation> = confirmed
                .into_iter()
                .filter(|r| !slot_fits_hours(&hours, r.start_time, self.config.dining()))
                .map(|mut r| {
                    r.status = ReservationStatus::Cancelled;
                    r
                })
                .collect();

            if !dropped.is_empty() {
                let ids: Vec<i32> = dropped.iter().map(|r| r.reservation_id).collect();
                diesel::update(reservations.filter(reservation_id.eq_any(&ids)))
                    .set(status.eq(ReservationStatus::Cancelled))
                    .execute(conn)
                    .map_err(RepositoryError::DatabaseError)?;
            }
            Ok::<_, RepositoryError>(dropped)
        })?;

        for reservation in &cancelled {
            let message = format!(
                "Your reservation {} on {} at {} has been cancelled because the restaurant's hours changed ({}).",
                reservation.confirmation_code,
                reservation.reservation_date,
                reservation.start_time.format("%H:%M"),
                hours.occasion
            );
            notify_party(conn.connection(), self.notifier.as_ref(), reservation, &message);
        }
        info!(
            "set_opening_hours: {} {}-{} ({}), cancelled {} reservations",
            hours.hours_date,
            hours.open_time,
            hours.close_time,
            hours.occasion,
            cancelled.len()
        );
        Ok(cancelled)
    }
}

pub(crate) fn hours_for(
    conn: &mut PgConnection,
    date: NaiveDate,
) -> Result<Option<OpeningHours>, RepositoryError> {
    use crate::db::schema::opening_hours::dsl::*;
    opening_hours
        .find(date)
        .select(OpeningHours::as_select())
        .first(conn)
        .optional()
        .map_err(|e| {
            error!("hours_for: error fetching hours for {}: {}", date, e);
            RepositoryError::DatabaseError(e)
        })
}
