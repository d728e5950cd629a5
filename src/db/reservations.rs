use crate::config::EngineConfig;
use crate::db::availability::ensure_slot_free;
use crate::db::seating::announce_next_seated;
use crate::db::subscribers::{notify_party, validate_identity};
use crate::db::tables::capacity_tiers;
use crate::db::waiting_list::cancel_active_entry_for;
use crate::db::{DbConnection, RepositoryError};
use crate::models::reservation::{
    Identity, NewReservation, Reservation, ReservationEdit, ReservationStatus,
};
use crate::services::availability::allocated_capacity;
use crate::services::notifier::Notifier;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error;
use log::{debug, error, info, warn};
use rand::Rng;
use std::sync::Arc;

/// Random six-digit confirmation code.
pub fn random_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[derive(Clone)]
pub struct ReservationOperations {
    pool: Pool<ConnectionManager<PgConnection>>,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
    code_generator: fn() -> String,
}

impl ReservationOperations {
    pub fn new(
        pool: Pool<ConnectionManager<PgConnection>>,
        config: EngineConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pool,
            config,
            notifier,
            code_generator: random_code,
        }
    }

    pub fn with_code_generator(mut self, code_generator: fn() -> String) -> Self {
        self.code_generator = code_generator;
        self
    }

    pub fn confirm_slot(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        party_size: i32,
        identity: Identity,
    ) -> Result<Reservation, RepositoryError> {
        self.confirm_slot_at(date, start, party_size, identity, Utc::now())
    }

    /// Books a slot picked from an availability search. The slot is re-validated under the
    /// tier lock, so two parties racing for the last table cannot both succeed.
    pub fn confirm_slot_at(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        party_size: i32,
        identity: Identity,
        now: DateTime<Utc>,
    ) -> Result<Reservation, RepositoryError> {
        if party_size <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "Party size must be positive, got {}",
                party_size
            )));
        }
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("confirm_slot: failed to acquire DB connection: {}", e);
            e
        })?;
        let local_now = self.config.clock().local(now);

        let reservation = conn.connection().transaction(|conn| {
            validate_identity(conn, &identity)?;
            let tiers = capacity_tiers(conn)?;
            let capacity = allocated_capacity(&tiers, party_size)?;

            if date.and_time(start) < local_now {
                return Err(RepositoryError::SlotNoLongerAvailable(format!(
                    "{} {}",
                    date,
                    start.format("%H:%M")
                )));
            }
            ensure_slot_free(
                conn,
                &self.config,
                date,
                start,
                capacity,
                None,
                RepositoryError::SlotNoLongerAvailable,
            )?;

            let code = unique_code(
                conn,
                self.code_generator,
                self.config.confirmation_code_attempts,
            )?;
            let new_reservation = NewReservation {
                confirmation_code: code,
                reservation_date: date,
                start_time: start,
                party_size,
                allocated_capacity: capacity,
                status: ReservationStatus::Confirmed,
                user_id: identity.user_id(),
                guest_contact: identity.guest_contact().map(str::to_string),
                created_at: now,
            };

            use crate::db::schema::reservations::dsl::reservations;
            diesel::insert_into(reservations)
                .values(&new_reservation)
                .returning(Reservation::as_returning())
                .get_result(conn)
                .map_err(|e| {
                    error!(
                        "confirm_slot: error inserting reservation for {} {}: {}",
                        date, start, e
                    );
                    RepositoryError::DatabaseError(e)
                })
        })?;

        info!(
            "confirm_slot: reservation {} for {} on {} at {} (tier {})",
            reservation.confirmation_code,
            reservation.party_size,
            reservation.reservation_date,
            reservation.start_time,
            reservation.allocated_capacity
        );
        let message = format!(
            "Your table for {} on {} at {} is confirmed. Confirmation code: {}.",
            reservation.party_size,
            reservation.reservation_date,
            reservation.start_time.format("%H:%M"),
            reservation.confirmation_code
        );
        notify_party(conn.connection(), self.notifier.as_ref(), &reservation, &message);
        Ok(reservation)
    }

    pub fn show_reservation(&self, code: &str) -> Result<Reservation, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("show_reservation: failed to acquire DB connection: {}", e);
            e
        })?;
        find_by_code(conn.connection(), code)
    }

    pub fn edit_reservation(
        &self,
        code: &str,
        date: NaiveDate,
        start: NaiveTime,
        party_size: i32,
        identity: Identity,
    ) -> Result<Reservation, RepositoryError> {
        self.edit_reservation_at(code, date, start, party_size, identity, Utc::now())
    }

    /// Moves a confirmed reservation to another slot, party size or identity. The reservation
    /// does not count against itself when the new slot is checked.
    pub fn edit_reservation_at(
        &self,
        code: &str,
        date: NaiveDate,
        start: NaiveTime,
        new_party_size: i32,
        identity: Identity,
        now: DateTime<Utc>,
    ) -> Result<Reservation, RepositoryError> {
        if new_party_size <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "Party size must be positive, got {}",
                new_party_size
            )));
        }
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("edit_reservation: failed to acquire DB connection: {}", e);
            e
        })?;
        let local_now = self.config.clock().local(now);

        let updated = conn.connection().transaction(|conn| {
            let current = lock_by_code(conn, code)?;
            if current.status != ReservationStatus::Confirmed {
                return Err(RepositoryError::ReservationNotActive(code.to_string()));
            }
            validate_identity(conn, &identity)?;
            let tiers = capacity_tiers(conn)?;
            let capacity = allocated_capacity(&tiers, new_party_size)?;

            if date.and_time(start) < local_now {
                return Err(RepositoryError::SlotNotAvailable(format!(
                    "{} {}",
                    date,
                    start.format("%H:%M")
                )));
            }
            ensure_slot_free(
                conn,
                &self.config,
                date,
                start,
                capacity,
                Some(current.reservation_id),
                RepositoryError::SlotNotAvailable,
            )?;

            let edit = ReservationEdit {
                reservation_date: date,
                start_time: start,
                party_size: new_party_size,
                allocated_capacity: capacity,
                user_id: identity.user_id(),
                guest_contact: identity.guest_contact().map(str::to_string),
            };
            use crate::db::schema::reservations::dsl::reservations;
            diesel::update(reservations.find(current.reservation_id))
                .set(&edit)
                .returning(Reservation::as_returning())
                .get_result(conn)
                .map_err(RepositoryError::DatabaseError)
        })?;

        debug!(
            "edit_reservation: {} now {} at {} for {}",
            updated.confirmation_code, updated.reservation_date, updated.start_time, updated.party_size
        );
        let message = format!(
            "Your reservation {} has been updated: table for {} on {} at {}.",
            updated.confirmation_code,
            updated.party_size,
            updated.reservation_date,
            updated.start_time.format("%H:%M")
        );
        notify_party(conn.connection(), self.notifier.as_ref(), &updated, &message);
        Ok(updated)
    }

    pub fn cancel_reservation(&self, code: &str) -> Result<Reservation, RepositoryError> {
        self.cancel_reservation_at(code, Utc::now())
    }

    /// Cancelling twice is a no-op. A waiting or called party also leaves the waiting list,
    /// and a table held for it is released to the next party.
    pub fn cancel_reservation_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Reservation, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("cancel_reservation: failed to acquire DB connection: {}", e);
            e
        })?;

        let (cancelled, changed, cascade) = conn.connection().transaction(|conn| {
            let mut current = lock_by_code(conn, code)?;
            let mut cascade = None;
            match current.status {
                ReservationStatus::Cancelled => return Ok((current, false, None)),
                ReservationStatus::Confirmed => {}
                ReservationStatus::Waiting | ReservationStatus::Called => {
                    cascade = cancel_active_entry_for(conn, current.reservation_id, now)?;
                }
                ReservationStatus::Seated
                | ReservationStatus::Completed
                | ReservationStatus::NoShow => {
                    return Err(RepositoryError::ReservationNotActive(code.to_string()));
                }
            }
            set_status(conn, current.reservation_id, ReservationStatus::Cancelled)?;
            current.status = ReservationStatus::Cancelled;
            Ok::<_, RepositoryError>((current, true, cascade))
        })?;

        if changed {
            info!("cancel_reservation: {} cancelled", cancelled.confirmation_code);
            let message = format!(
                "Your reservation {} on {} at {} has been cancelled.",
                cancelled.confirmation_code,
                cancelled.reservation_date,
                cancelled.start_time.format("%H:%M")
            );
            notify_party(conn.connection(), self.notifier.as_ref(), &cancelled, &message);
        }
        if let Some(outcome) = cascade {
            announce_next_seated(conn.connection(), self.notifier.as_ref(), &outcome);
        }
        Ok(cancelled)
    }

    pub fn mark_no_show(&self, code: &str) -> Result<Reservation, RepositoryError> {
        self.mark_no_show_at(code, Utc::now())
    }

    /// Only a confirmed reservation whose arrival window has passed can become a no-show.
    pub fn mark_no_show_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Reservation, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("mark_no_show: failed to acquire DB connection: {}", e);
            e
        })?;
        let local_now = self.config.clock().local(now);
        let window = self.config.arrival_window();

        conn.connection().transaction(|conn| {
            let mut current = lock_by_code(conn, code)?;
            match current.status {
                ReservationStatus::NoShow => return Ok(current),
                ReservationStatus::Confirmed => {}
                _ => return Err(RepositoryError::ReservationNotActive(code.to_string())),
            }
            let closes = current.reservation_date.and_time(current.start_time) + window;
            if local_now <= closes {
                return Err(RepositoryError::ValidationError(format!(
                    "Arrival window for {} is open until {}",
                    code,
                    closes.format("%Y-%m-%d %H:%M")
                )));
            }
            set_status(conn, current.reservation_id, ReservationStatus::NoShow)?;
            current.status = ReservationStatus::NoShow;
            Ok(current)
        })
    }

    pub fn mark_overdue_no_shows(&self) -> Result<usize, RepositoryError> {
        self.mark_overdue_no_shows_at(Utc::now())
    }

    /// Flags every confirmed reservation whose arrival window closed before `now`.
    pub fn mark_overdue_no_shows_at(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("mark_overdue_no_shows: failed to acquire DB connection: {}", e);
            e
        })?;
        let cutoff = self.config.clock().local(now) - self.config.arrival_window();

        use crate::db::schema::reservations::dsl::*;
        let flagged = diesel::update(
            reservations
                .filter(status.eq(ReservationStatus::Confirmed))
                .filter(
                    reservation_date.lt(cutoff.date()).or(reservation_date
                        .eq(cutoff.date())
                        .and(start_time.lt(cutoff.time()))),
                ),
        )
        .set(status.eq(ReservationStatus::NoShow))
        .execute(conn.connection())
        .map_err(|e| {
            error!("mark_overdue_no_shows: error flagging reservations: {}", e);
            RepositoryError::DatabaseError(e)
        })?;
        if flagged > 0 {
            info!("mark_overdue_no_shows: {} reservations marked NO_SHOW", flagged);
        }
        Ok(flagged)
    }
}

/// Draws codes until one is unused. Runs inside the inserting transaction; the unique
/// index still rejects a code committed concurrently.
pub(crate) fn unique_code(
    conn: &mut PgConnection,
    generator: fn() -> String,
    attempts: u32,
) -> Result<String, RepositoryError> {
    let attempts = attempts.max(1);
    for _ in 0..attempts {
        let candidate = generator();
        if !code_exists(conn, &candidate)? {
            return Ok(candidate);
        }
        warn!("unique_code: confirmation code collision, drawing again");
    }
    error!("unique_code: no free confirmation code after {} attempts", attempts);
    Err(RepositoryError::CodeGenerationExhausted(attempts))
}

fn code_exists(conn: &mut PgConnection, code: &str) -> Result<bool, RepositoryError> {
    use crate::db::schema::reservations::dsl::*;
    diesel::select(diesel::dsl::exists(
        reservations.filter(confirmation_code.eq(code)),
    ))
    .get_result(conn)
    .map_err(RepositoryError::DatabaseError)
}

pub(crate) fn find_by_code(conn: &mut PgConnection, code: &str) -> Result<Reservation, RepositoryError> {
    use crate::db::schema::reservations::dsl::*;
    reservations
        .filter(confirmation_code.eq(code))
        .select(Reservation::as_select())
        .first(conn)
        .map_err(|e| match e {
            Error::NotFound => RepositoryError::NotFound(format!("reservation {}", code)),
            other => RepositoryError::DatabaseError(other),
        })
}

pub(crate) fn lock_by_code(conn: &mut PgConnection, code: &str) -> Result<Reservation, RepositoryError> {
    use crate::db::schema::reservations::dsl::*;
    reservations
        .filter(confirmation_code.eq(code))
        .select(Reservation::as_select())
        .for_update()
        .first(conn)
        .map_err(|e| match e {
            Error::NotFound => RepositoryError::NotFound(format!("reservation {}", code)),
            other => RepositoryError::DatabaseError(other),
        })
}

pub(crate) fn lock_by_id(conn: &mut PgConnection, id: i32) -> Result<Reservation, RepositoryError> {
    use crate::db::schema::reservations::dsl::*;
    reservations
        .find(id)
        .select(Reservation::as_select())
        .for_update()
        .first(conn)
        .map_err(|e| match e {
            Error::NotFound => RepositoryError::NotFound(format!("reservation id {}", id)),
            other => RepositoryError::DatabaseError(other),
        })
}

pub(crate) fn set_status(
    conn: &mut PgConnection,
    id: i32,
    new_status: ReservationStatus,
) -> Result<(), RepositoryError> {
    use crate::db::schema::reservations::dsl::*;
    diesel::update(reservations.find(id))
        .set(status.eq(new_status))
        .execute(conn)
        .map_err(|e| {
            error!(
                "set_status: error moving reservation {} to {}: {}",
                id, new_status, e
            );
            RepositoryError::DatabaseError(e)
        })?;
    Ok(())
}
