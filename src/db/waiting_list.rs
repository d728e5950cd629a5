use crate::config::EngineConfig;
use crate::db::reservations::{lock_by_id, set_status};
use crate::db::seating::{announce_next_seated, release_table, CheckoutOutcome};
use crate::db::subscribers::notify_party;
use crate::db::tables::lock_table;
use crate::db::{DbConnection, RepositoryError};
use crate::models::floor::{
    DiningTable, NewSeating, NewWaitingListEntry, Seating, WaitingListEntry, WaitingStatus,
};
use crate::models::reservation::{Reservation, ReservationStatus};
use crate::services::notifier::Notifier;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error;
use log::{debug, error, info, warn};
use std::sync::Arc;

#[derive(Clone)]
pub struct WaitingListOperations {
    pool: Pool<ConnectionManager<PgConnection>>,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
}

impl WaitingListOperations {
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

    /// Entries still waiting, in the order they would be served.
    pub fn list_waiting(&self) -> Result<Vec<WaitingListEntry>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("list_waiting: failed to acquire DB connection: {}", e);
            e
        })?;

        use crate::db::schema::waiting_list::dsl::*;
        waiting_list
            .filter(status.eq(WaitingStatus::Waiting))
            .order((priority.desc(), created_at.asc(), wait_id.asc()))
            .select(WaitingListEntry::as_select())
            .load(conn.connection())
            .map_err(RepositoryError::DatabaseError)
    }

    /// Best waiting entry whose party fits a table of `capacity`: reservation holders before
    /// walk-ins, then first come first served.
    pub fn get_next_waiting_that_fits(
        &self,
        capacity: i32,
    ) -> Result<Option<(WaitingListEntry, Reservation)>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("get_next_waiting_that_fits: failed to acquire DB connection: {}", e);
            e
        })?;
        conn.connection()
            .transaction(|conn| next_waiting_that_fits(conn, capacity))
    }

    pub fn call_waiting_entry(
        &self,
        search_wait_id: i32,
        search_table_id: i32,
    ) -> Result<WaitingListEntry, RepositoryError> {
        self.call_waiting_entry_at(search_wait_id, search_table_id, Utc::now())
    }

    /// Holds a free table for a waiting party and tells them to come in. The hold lapses
    /// after the called timeout unless the party checks in.
    pub fn call_waiting_entry_at(
        &self,
        search_wait_id: i32,
        search_table_id: i32,
        now: DateTime<Utc>,
    ) -> Result<WaitingListEntry, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("call_waiting_entry: failed to acquire DB connection: {}", e);
            e
        })?;

        let (entry, table, reservation) = conn.connection().transaction(|conn| {
            let (entry, reservation) = lock_entry_and_reservation(conn, search_wait_id)?;
            if entry.status != WaitingStatus::Waiting {
                return Err(RepositoryError::ReservationNotActive(
                    reservation.confirmation_code,
                ));
            }
            let table = lock_table(conn, search_table_id)?;
            if !table.is_active || table.capacity < reservation.allocated_capacity {
                return Err(RepositoryError::ValidationError(format!(
                    "Table {} cannot seat reservation {}",
                    table.table_number, reservation.confirmation_code
                )));
            }
            if table_has_open_seating(conn, &table)? {
                return Err(RepositoryError::ValidationError(format!(
                    "Table {} is occupied",
                    table.table_number
                )));
            }

            {
                use crate::db::schema::seatings::dsl::*;
                diesel::insert_into(seatings)
                    .values(&NewSeating {
                        table_id: table.table_id,
                        reservation_id: reservation.reservation_id,
                        check_in_time: now,
                    })
                    .execute(conn)
                    .map_err(RepositoryError::DatabaseError)?;
            }
            let called = {
                use crate::db::schema::waiting_list::dsl::*;
                diesel::update(waiting_list.find(entry.wait_id))
                    .set((status.eq(WaitingStatus::Called), assigned_at.eq(Some(now))))
                    .returning(WaitingListEntry::as_returning())
                    .get_result(conn)
                    .map_err(RepositoryError::DatabaseError)?
            };
            set_status(conn, reservation.reservation_id, ReservationStatus::Called)?;
            Ok::<_, RepositoryError>((called, table, reservation))
        })?;

        info!(
            "call_waiting_entry: {} called to table {}",
            reservation.confirmation_code, table.table_number
        );
        let message = format!(
            "Your table is ready: please check in within {} minutes to take table {}.",
            self.config.called_timeout_minutes, table.table_number
        );
        notify_party(conn.connection(), self.notifier.as_ref(), &reservation, &message);
        Ok(entry)
    }

    pub fn cancel_waiting_list_entry(&self, search_wait_id: i32) -> Result<WaitingListEntry, RepositoryError> {
        self.cancel_waiting_list_entry_at(search_wait_id, Utc::now())
    }

    /// Removes a party from the waiting list and cancels its reservation. Cancelling a
    /// cancelled entry is a no-op; an assigned entry can no longer be cancelled.
    pub fn cancel_waiting_list_entry_at(
        &self,
        search_wait_id: i32,
        now: DateTime<Utc>,
    ) -> Result<WaitingListEntry, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("cancel_waiting_list_entry: failed to acquire DB connection: {}", e);
            e
        })?;

        let (entry, cascade) = conn.connection().transaction(|conn| {
            let (mut entry, reservation) = lock_entry_and_reservation(conn, search_wait_id)?;
            match entry.status {
                WaitingStatus::Cancelled => return Ok((entry, None)),
                WaitingStatus::Assigned => {
                    return Err(RepositoryError::ReservationNotActive(
                        reservation.confirmation_code,
                    ));
                }
                WaitingStatus::Waiting | WaitingStatus::Called => {}
            }
            let cascade = cancel_entry(conn, &entry, now)?;
            set_status(conn, entry.reservation_id, ReservationStatus::Cancelled)?;
            entry.status = WaitingStatus::Cancelled;
            Ok::<_, RepositoryError>((entry, cascade))
        })?;

        if let Some(outcome) = cascade {
            announce_next_seated(conn.connection(), self.notifier.as_ref(), &outcome);
        }
        Ok(entry)
    }

    pub fn expire_stale_called_entries(&self) -> Result<usize, RepositoryError> {
        self.expire_stale_called_entries_at(Utc::now())
    }

    /// Cancels called parties that did not check in before the timeout and frees their
    /// tables. Each entry is handled in its own transaction; a failing one is logged and skipped.
    pub fn expire_stale_called_entries_at(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("expire_stale_called_entries: failed to acquire DB connection: {}", e);
            e
        })?;
        let cutoff = now - self.config.called_timeout();

        let stale: Vec<i32> = {
            use crate::db::schema::waiting_list::dsl::*;
            waiting_list
                .filter(status.eq(WaitingStatus::Called))
                .filter(assigned_at.lt(cutoff))
                .order(assigned_at.asc())
                .select(wait_id)
                .load(conn.connection())
                .map_err(|e| {
                    error!("expire_stale_called_entries: error loading called entries: {}", e);
                    RepositoryError::DatabaseError(e)
                })?
        };

        let mut expired = 0;
        for stale_id in stale {
            let result = conn.connection().transaction(|conn| {
                let (entry, reservation) = lock_entry_and_reservation(conn, stale_id)?;
                let still_stale = entry.status == WaitingStatus::Called
                    && entry.assigned_at.map(|at| at < cutoff).unwrap_or(false);
                if !still_stale {
                    return Ok(None);
                }
                let cascade = cancel_entry(conn, &entry, now)?;
                set_status(conn, reservation.reservation_id, ReservationStatus::Cancelled)?;
                Ok::<_, RepositoryError>(Some((reservation, cascade)))
            });

            match result {
                Ok(Some((reservation, cascade))) => {
                    expired += 1;
                    debug!(
                        "expire_stale_called_entries: {} did not arrive in time",
                        reservation.confirmation_code
                    );
                    let message = format!(
                        "We held a table for reservation {} but you did not check in in time; it has been released.",
                        reservation.confirmation_code
                    );
                    notify_party(conn.connection(), self.notifier.as_ref(), &reservation, &message);
                    if let Some(outcome) = cascade {
                        announce_next_seated(conn.connection(), self.notifier.as_ref(), &outcome);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(
                        "expire_stale_called_entries: failed to expire wait_id {}: {}",
                        stale_id, e
                    );
                }
            }
        }
        if expired > 0 {
            info!("expire_stale_called_entries: expired {} called entries", expired);
        }
        Ok(expired)
    }

    pub fn expire_leftover_waiting_entries(&self) -> Result<usize, RepositoryError> {
        self.expire_leftover_waiting_entries_at(Utc::now())
    }

    /// Parties still waiting when their reservation day has ended leave the queue, so they
    /// never head it on a later day.
    pub fn expire_leftover_waiting_entries_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("expire_leftover_waiting_entries: failed to acquire DB connection: {}", e);
            e
        })?;
        let today = self.config.clock().today(now);

        let leftover = conn.connection().transaction(|conn| {
            let leftover: Vec<i32> = {
                use crate::db::schema::reservations::dsl::*;
                reservations
                    .filter(status.eq(ReservationStatus::Waiting))
                    .filter(reservation_date.lt(today))
                    .select(reservation_id)
                    .for_update()
                    .load(conn)
                    .map_err(|e| {
                        error!(
                            "expire_leftover_waiting_entries: error loading waiting reservations: {}",
                            e
                        );
                        RepositoryError::DatabaseError(e)
                    })?
            };
            if leftover.is_empty() {
                return Ok(0);
            }
            {
                use crate::db::schema::waiting_list::dsl::*;
                diesel::update(
                    waiting_list
                        .filter(reservation_id.eq_any(&leftover))
                        .filter(status.eq(WaitingStatus::Waiting)),
                )
                .set(status.eq(WaitingStatus::Cancelled))
                .execute(conn)
                .map_err(RepositoryError::DatabaseError)?;
            }
            {
                use crate::db::schema::reservations::dsl::*;
                diesel::update(reservations.filter(reservation_id.eq_any(&leftover)))
                    .set(status.eq(ReservationStatus::Cancelled))
                    .execute(conn)
                    .map_err(RepositoryError::DatabaseError)?;
            }
            Ok::<_, RepositoryError>(leftover.len())
        })?;

        if leftover > 0 {
            info!(
                "expire_leftover_waiting_entries: {} parties left the queue before {}",
                leftover, today
            );
        }
        Ok(leftover)
    }
}

/// Locks the reservation before its entry, the same order cancellation by code uses.
fn lock_entry_and_reservation(
    conn: &mut PgConnection,
    search_wait_id: i32,
) -> Result<(WaitingListEntry, Reservation), RepositoryError> {
    use crate::db::schema::waiting_list::dsl::*;
    let owner: i32 = waiting_list
        .find(search_wait_id)
        .select(reservation_id)
        .first(conn)
        .map_err(|e| match e {
            Error::NotFound => RepositoryError::NotFound(format!("waiting entry {}", search_wait_id)),
            other => RepositoryError::DatabaseError(other),
        })?;
    let reservation = lock_by_id(conn, owner)?;
    let entry = waiting_list
        .find(search_wait_id)
        .select(WaitingListEntry::as_select())
        .for_update()
        .first(conn)
        .map_err(RepositoryError::DatabaseError)?;
    Ok((entry, reservation))
}

fn table_has_open_seating(conn: &mut PgConnection, table: &DiningTable) -> Result<bool, RepositoryError> {
    use crate::db::schema::seatings::dsl::*;
    diesel::select(diesel::dsl::exists(
        seatings
            .filter(table_id.eq(table.table_id))
            .filter(check_out_time.is_null()),
    ))
    .get_result(conn)
    .map_err(RepositoryError::DatabaseError)
}

pub(crate) fn enqueue(
    conn: &mut PgConnection,
    for_reservation: i32,
    entry_priority: i16,
    now: DateTime<Utc>,
) -> Result<WaitingListEntry, RepositoryError> {
    use crate::db::schema::waiting_list::dsl::*;
    diesel::insert_into(waiting_list)
        .values(&NewWaitingListEntry {
            reservation_id: for_reservation,
            status: WaitingStatus::Waiting,
            priority: entry_priority,
            created_at: now,
        })
        .returning(WaitingListEntry::as_returning())
        .get_result(conn)
        .map_err(|e| {
            error!(
                "enqueue: error adding reservation id {} to the waiting list: {}",
                for_reservation, e
            );
            RepositoryError::DatabaseError(e)
        })
}

/// Highest priority, oldest waiting entry whose allocated capacity fits. Entries locked by
/// another allocation are skipped.
pub(crate) fn next_waiting_that_fits(
    conn: &mut PgConnection,
    capacity: i32,
) -> Result<Option<(WaitingListEntry, Reservation)>, RepositoryError> {
    use crate::db::schema::{reservations, waiting_list};
    waiting_list::table
        .inner_join(reservations::table)
        .filter(waiting_list::status.eq(WaitingStatus::Waiting))
        .filter(reservations::allocated_capacity.le(capacity))
        .order((
            waiting_list::priority.desc(),
            waiting_list::created_at.asc(),
            waiting_list::wait_id.asc(),
        ))
        .select((WaitingListEntry::as_select(), Reservation::as_select()))
        .for_update()
        .skip_locked()
        .first(conn)
        .optional()
        .map_err(|e| {
            error!(
                "next_waiting_that_fits: error looking up waiting parties for capacity {}: {}",
                capacity, e
            );
            RepositoryError::DatabaseError(e)
        })
}

/// Marks the entry cancelled. A called entry also gives up its held table, which cascades
/// to the next waiting party.
fn cancel_entry(
    conn: &mut PgConnection,
    entry: &WaitingListEntry,
    now: DateTime<Utc>,
) -> Result<Option<CheckoutOutcome>, RepositoryError> {
    {
        use crate::db::schema::waiting_list::dsl::*;
        diesel::update(waiting_list.find(entry.wait_id))
            .set(status.eq(WaitingStatus::Cancelled))
            .execute(conn)
            .map_err(RepositoryError::DatabaseError)?;
    }
    if entry.status != WaitingStatus::Called {
        return Ok(None);
    }

    let held: Option<Seating> = {
        use crate::db::schema::seatings::dsl::*;
        seatings
            .filter(reservation_id.eq(entry.reservation_id))
            .filter(check_out_time.is_null())
            .select(Seating::as_select())
            .first(conn)
            .optional()
            .map_err(RepositoryError::DatabaseError)?
    };
    match held {
        Some(seating) => {
            let table = lock_table(conn, seating.table_id)?;
            release_table(conn, &table, now).map(Some)
        }
        None => {
            warn!(
                "cancel_entry: called entry {} had no held table",
                entry.wait_id
            );
            Ok(None)
        }
    }
}

/// Cancels the reservation's active waiting entry, if it has one.
pub(crate) fn cancel_active_entry_for(
    conn: &mut PgConnection,
    for_reservation: i32,
    now: DateTime<Utc>,
) -> Result<Option<CheckoutOutcome>, RepositoryError> {
    let active: Option<WaitingListEntry> = {
        use crate::db::schema::waiting_list::dsl::*;
        waiting_list
            .filter(reservation_id.eq(for_reservation))
            .filter(status.eq_any([WaitingStatus::Waiting, WaitingStatus::Called]))
            .select(WaitingListEntry::as_select())
            .for_update()
            .first(conn)
            .optional()
            .map_err(RepositoryError::DatabaseError)?
    };
    match active {
        Some(entry) => cancel_entry(conn, &entry, now),
        None => Ok(None),
    }
}
