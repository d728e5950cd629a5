use crate::config::EngineConfig;
use crate::db::reservations::{lock_by_code, random_code, set_status, unique_code};
use crate::db::subscribers::{notify_party, validate_identity};
use crate::db::tables::{capacity_tiers, find_free_table, lock_table};
use crate::db::waiting_list::{enqueue, next_waiting_that_fits};
use crate::db::{DbConnection, RepositoryError};
use crate::models::floor::{
    DiningTable, NewSeating, Seating, WaitingStatus, PRIORITY_RESERVATION, PRIORITY_WALK_IN,
};
use crate::models::reservation::{Identity, NewReservation, Reservation, ReservationStatus};
use crate::services::availability::allocated_capacity;
use crate::services::notifier::Notifier;
use chrono::{DateTime, Timelike, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Attempts at seating when a concurrent allocation wins the chosen table first.
const SEAT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub enum CheckInOutcome {
    Seated {
        table_id: i32,
        table_number: i32,
        capacity: i32,
        reservation: Reservation,
    },
    AddedToWaitingList {
        wait_id: i32,
        reservation: Reservation,
    },
}

impl CheckInOutcome {
    pub fn reservation(&self) -> &Reservation {
        match self {
            CheckInOutcome::Seated { reservation, .. }
            | CheckInOutcome::AddedToWaitingList { reservation, .. } => reservation,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    NobodyWaiting {
        table_id: i32,
        table_number: i32,
    },
    NextSeated {
        table_id: i32,
        table_number: i32,
        wait_id: i32,
        reservation: Reservation,
    },
}

#[derive(Clone)]
pub struct SeatingOperations {
    pool: Pool<ConnectionManager<PgConnection>>,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
}

impl SeatingOperations {
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

    pub fn check_in(&self, code: &str) -> Result<CheckInOutcome, RepositoryError> {
        self.check_in_at(code, Utc::now())
    }

    /// Seats an arriving party inside its arrival window, or queues it with reservation
    /// priority when no fitting table is free. A called party takes the table held for it.
    pub fn check_in_at(&self, code: &str, now: DateTime<Utc>) -> Result<CheckInOutcome, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("check_in: failed to acquire DB connection: {}", e);
            e
        })?;
        let local_now = self.config.clock().local(now);
        let window = self.config.arrival_window();

        let outcome = conn.connection().transaction(|conn| {
            let reservation = lock_by_code(conn, code)?;
            match reservation.status {
                ReservationStatus::Called => return claim_called_table(conn, reservation, now),
                ReservationStatus::Confirmed => {}
                _ => return Err(RepositoryError::ReservationNotActive(code.to_string())),
            }

            let start = reservation.reservation_date.and_time(reservation.start_time);
            let opens = start - window;
            let closes = start + window;
            if local_now < opens {
                return Err(RepositoryError::ArrivedTooEarly {
                    date: reservation.reservation_date,
                    opens_at: opens.time(),
                });
            }
            if local_now > closes {
                return Err(RepositoryError::ArrivedTooLate {
                    date: reservation.reservation_date,
                    closed_at: closes.time(),
                });
            }

            seat_or_enqueue(conn, reservation, PRIORITY_RESERVATION, now)
        })?;

        match &outcome {
            CheckInOutcome::Seated {
                table_number,
                reservation,
                ..
            } => info!(
                "check_in: {} seated at table {}",
                reservation.confirmation_code, table_number
            ),
            CheckInOutcome::AddedToWaitingList {
                wait_id,
                reservation,
            } => info!(
                "check_in: {} added to waiting list (wait_id {})",
                reservation.confirmation_code, wait_id
            ),
        }
        Ok(outcome)
    }

    pub fn enqueue_walk_in(
        &self,
        party_size: i32,
        identity: Identity,
    ) -> Result<CheckInOutcome, RepositoryError> {
        self.enqueue_walk_in_at(party_size, identity, Utc::now())
    }

    /// A party without a reservation: booked for the current time, then seated or queued
    /// behind reservation holders.
    pub fn enqueue_walk_in_at(
        &self,
        party_size: i32,
        identity: Identity,
        now: DateTime<Utc>,
    ) -> Result<CheckInOutcome, RepositoryError> {
        if party_size <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "Party size must be positive, got {}",
                party_size
            )));
        }
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("enqueue_walk_in: failed to acquire DB connection: {}", e);
            e
        })?;
        let local_now = self.config.clock().local(now);
        let arrived = local_now
            .time()
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(local_now.time());
        let code_attempts = self.config.confirmation_code_attempts;

        let outcome = conn.connection().transaction(|conn| {
            validate_identity(conn, &identity)?;
            let tiers = capacity_tiers(conn)?;
            let capacity = allocated_capacity(&tiers, party_size)?;

            let code = unique_code(conn, random_code, code_attempts)?;

            let walk_in = NewReservation {
                confirmation_code: code,
                reservation_date: local_now.date(),
                start_time: arrived,
                party_size,
                allocated_capacity: capacity,
                status: ReservationStatus::Confirmed,
                user_id: identity.user_id(),
                guest_contact: identity.guest_contact().map(str::to_string),
                created_at: now,
            };
            let reservation = {
                use crate::db::schema::reservations::dsl::*;
                diesel::insert_into(reservations)
                    .values(&walk_in)
                    .returning(Reservation::as_returning())
                    .get_result(conn)
                    .map_err(RepositoryError::DatabaseError)?
            };
            seat_or_enqueue(conn, reservation, PRIORITY_WALK_IN, now)
        })?;

        debug!(
            "enqueue_walk_in: party of {} -> {:?}",
            party_size,
            outcome.reservation().status
        );
        let message = match &outcome {
            CheckInOutcome::Seated {
                table_number,
                reservation,
                ..
            } => format!(
                "Welcome! Please proceed to table {}. Your code is {}.",
                table_number, reservation.confirmation_code
            ),
            CheckInOutcome::AddedToWaitingList { reservation, .. } => format!(
                "You are on the waiting list. We will contact you when a table is ready. Your code is {}.",
                reservation.confirmation_code
            ),
        };
        notify_party(
            conn.connection(),
            self.notifier.as_ref(),
            outcome.reservation(),
            &message,
        );
        Ok(outcome)
    }

    pub fn check_out_and_assign_next(&self, table_id: i32) -> Result<CheckoutOutcome, RepositoryError> {
        self.check_out_and_assign_next_at(table_id, Utc::now())
    }

    /// Closes the table's open seating and hands the table to the best waiting party that fits.
    pub fn check_out_and_assign_next_at(
        &self,
        search_table_id: i32,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("check_out_and_assign_next: failed to acquire DB connection: {}", e);
            e
        })?;

        let outcome = conn.connection().transaction(|conn| {
            let table = lock_table(conn, search_table_id)?;
            release_table(conn, &table, now)
        })?;

        announce_next_seated(conn.connection(), self.notifier.as_ref(), &outcome);
        Ok(outcome)
    }

    /// Open seating at a table, if any.
    pub fn open_seating(&self, search_table_id: i32) -> Result<Option<Seating>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("open_seating: failed to acquire DB connection: {}", e);
            e
        })?;

        use crate::db::schema::seatings::dsl::*;
        seatings
            .filter(table_id.eq(search_table_id))
            .filter(check_out_time.is_null())
            .select(Seating::as_select())
            .first(conn.connection())
            .optional()
            .map_err(RepositoryError::DatabaseError)
    }
}

pub(crate) fn announce_next_seated(
    conn: &mut PgConnection,
    notifier: &dyn Notifier,
    outcome: &CheckoutOutcome,
) {
    match outcome {
        CheckoutOutcome::NobodyWaiting { table_number, .. } => {
            debug!("table {} released, nobody waiting", table_number);
        }
        CheckoutOutcome::NextSeated {
            table_number,
            reservation,
            ..
        } => {
            info!(
                "table {} handed to {}",
                table_number, reservation.confirmation_code
            );
            let message = format!(
                "Your table is ready: please proceed to table {}.",
                table_number
            );
            notify_party(conn, notifier, reservation, &message);
        }
    }
}

/// Seats the reservation at the smallest free table that fits, or queues it.
pub(crate) fn seat_or_enqueue(
    conn: &mut PgConnection,
    mut reservation: Reservation,
    priority: i16,
    now: DateTime<Utc>,
) -> Result<CheckInOutcome, RepositoryError> {
    for _ in 0..SEAT_ATTEMPTS {
        let Some(table) = find_free_table(conn, reservation.allocated_capacity)? else {
            break;
        };
        match open_seating_at(conn, &table, reservation.reservation_id, now) {
            Ok(()) => {
                set_status(conn, reservation.reservation_id, ReservationStatus::Seated)?;
                reservation.status = ReservationStatus::Seated;
                return Ok(CheckInOutcome::Seated {
                    table_id: table.table_id,
                    table_number: table.table_number,
                    capacity: table.capacity,
                    reservation,
                });
            }
            Err(RepositoryError::DatabaseError(Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            ))) => {
                warn!(
                    "seat_or_enqueue: table {} was taken concurrently, retrying",
                    table.table_number
                );
            }
            Err(e) => return Err(e),
        }
    }

    let entry = enqueue(conn, reservation.reservation_id, priority, now)?;
    set_status(conn, reservation.reservation_id, ReservationStatus::Waiting)?;
    reservation.status = ReservationStatus::Waiting;
    Ok(CheckInOutcome::AddedToWaitingList {
        wait_id: entry.wait_id,
        reservation,
    })
}

/// Inserts a seating in a savepoint so a lost race leaves the outer transaction usable.
fn open_seating_at(
    conn: &mut PgConnection,
    table: &DiningTable,
    for_reservation: i32,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let seating = NewSeating {
        table_id: table.table_id,
        reservation_id: for_reservation,
        check_in_time: now,
    };
    conn.transaction(|conn| {
        use crate::db::schema::seatings::dsl::*;
        diesel::insert_into(seatings)
            .values(&seating)
            .execute(conn)
            .map_err(RepositoryError::DatabaseError)
    })?;
    Ok(())
}

/// Closes the open seating at a locked table and cascades it to the next waiting party.
pub(crate) fn release_table(
    conn: &mut PgConnection,
    table: &DiningTable,
    now: DateTime<Utc>,
) -> Result<CheckoutOutcome, RepositoryError> {
    let open: Seating = {
        use crate::db::schema::seatings::dsl::*;
        seatings
            .filter(table_id.eq(table.table_id))
            .filter(check_out_time.is_null())
            .select(Seating::as_select())
            .for_update()
            .first(conn)
            .optional()
            .map_err(RepositoryError::DatabaseError)?
            .ok_or(RepositoryError::TableNotOccupied(table.table_id))?
    };

    // A table held for a called party has nobody to check out. The hold ends when the
    // party checks in, or when its waiting entry is cancelled or expires.
    let held_for_call = {
        use crate::db::schema::waiting_list::dsl::*;
        diesel::select(diesel::dsl::exists(
            waiting_list
                .filter(reservation_id.eq(open.reservation_id))
                .filter(status.eq(WaitingStatus::Called)),
        ))
        .get_result::<bool>(conn)
        .map_err(RepositoryError::DatabaseError)?
    };
    if held_for_call {
        debug!(
            "release_table: table {} is held for a called party, not checking out",
            table.table_number
        );
        return Err(RepositoryError::TableNotOccupied(table.table_id));
    }

    {
        use crate::db::schema::seatings::dsl::*;
        diesel::update(seatings.find(open.seating_id))
            .set(check_out_time.eq(Some(now)))
            .execute(conn)
            .map_err(RepositoryError::DatabaseError)?;
    }
    {
        use crate::db::schema::reservations::dsl::*;
        diesel::update(
            reservations
                .find(open.reservation_id)
                .filter(status.eq(ReservationStatus::Seated)),
        )
        .set(status.eq(ReservationStatus::Completed))
        .execute(conn)
        .map_err(RepositoryError::DatabaseError)?;
    }

    if !table.is_active {
        return Ok(CheckoutOutcome::NobodyWaiting {
            table_id: table.table_id,
            table_number: table.table_number,
        });
    }

    let Some((entry, mut next)) = next_waiting_that_fits(conn, table.capacity)? else {
        return Ok(CheckoutOutcome::NobodyWaiting {
            table_id: table.table_id,
            table_number: table.table_number,
        });
    };

    open_seating_at(conn, table, next.reservation_id, now)?;
    {
        use crate::db::schema::waiting_list::dsl::*;
        diesel::update(waiting_list.find(entry.wait_id))
            .set((status.eq(WaitingStatus::Assigned), assigned_at.eq(Some(now))))
            .execute(conn)
            .map_err(RepositoryError::DatabaseError)?;
    }
    set_status(conn, next.reservation_id, ReservationStatus::Seated)?;
    next.status = ReservationStatus::Seated;

    Ok(CheckoutOutcome::NextSeated {
        table_id: table.table_id,
        table_number: table.table_number,
        wait_id: entry.wait_id,
        reservation: next,
    })
}

/// A called party arriving: its held seating becomes a real one.
fn claim_called_table(
    conn: &mut PgConnection,
    mut reservation: Reservation,
    now: DateTime<Utc>,
) -> Result<CheckInOutcome, RepositoryError> {
    let held: Seating = {
        use crate::db::schema::seatings::dsl::*;
        seatings
            .filter(reservation_id.eq(reservation.reservation_id))
            .filter(check_out_time.is_null())
            .select(Seating::as_select())
            .for_update()
            .first(conn)
            .optional()
            .map_err(RepositoryError::DatabaseError)?
            .ok_or_else(|| RepositoryError::ReservationNotActive(reservation.confirmation_code.clone()))?
    };
    let table = lock_table(conn, held.table_id)?;

    {
        use crate::db::schema::seatings::dsl::*;
        diesel::update(seatings.find(held.seating_id))
            .set(check_in_time.eq(now))
            .execute(conn)
            .map_err(RepositoryError::DatabaseError)?;
    }
    {
        use crate::db::schema::waiting_list::dsl::*;
        diesel::update(
            waiting_list
                .filter(reservation_id.eq(reservation.reservation_id))
                .filter(status.eq(WaitingStatus::Called)),
        )
        .set(status.eq(WaitingStatus::Assigned))
        .execute(conn)
        .map_err(RepositoryError::DatabaseError)?;
    }
    set_status(conn, reservation.reservation_id, ReservationStatus::Seated)?;
    reservation.status = ReservationStatus::Seated;

    Ok(CheckInOutcome::Seated {
        table_id: table.table_id,
        table_number: table.table_number,
        capacity: table.capacity,
        reservation,
    })
}
