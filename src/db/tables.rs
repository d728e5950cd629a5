use crate::config::EngineConfig;
use crate::db::subscribers::notify_party;
use crate::db::{DbConnection, RepositoryError};
use crate::models::floor::{CapacityTier, DiningTable, NewDiningTable};
use crate::models::reservation::{Reservation, ReservationStatus};
use crate::services::availability::booked_in_window;
use crate::services::notifier::Notifier;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error;
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct TableOperations {
    pool: Pool<ConnectionManager<PgConnection>>,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
}

impl TableOperations {
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

    pub fn add_table(&self, table: NewDiningTable) -> Result<DiningTable, RepositoryError> {
        if table.capacity <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "Table capacity must be positive, got {}",
                table.capacity
            )));
        }
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("add_table: failed to acquire DB connection: {}", e);
            e
        })?;

        use crate::db::schema::dining_tables::dsl::*;
        diesel::insert_into(dining_tables)
            .values(&table)
            .returning(DiningTable::as_returning())
            .get_result(conn.connection())
            .map_err(|e| {
                error!(
                    "add_table: error inserting table number {}: {}",
                    table.table_number, e
                );
                RepositoryError::DatabaseError(e)
            })
    }

    pub fn list_tables(&self) -> Result<Vec<DiningTable>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("list_tables: failed to acquire DB connection: {}", e);
            e
        })?;

        use crate::db::schema::dining_tables::dsl::*;
        dining_tables
            .order_by(table_number.asc())
            .select(DiningTable::as_select())
            .load(conn.connection())
            .map_err(|e| {
                error!("list_tables: error fetching tables: {}", e);
                RepositoryError::DatabaseError(e)
            })
    }

    /// Active tables per capacity, smallest capacity first.
    pub fn capacity_tiers(&self) -> Result<Vec<CapacityTier>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("capacity_tiers: failed to acquire DB connection: {}", e);
            e
        })?;
        capacity_tiers(conn.connection())
    }

    /// Changes a table's capacity and cancels reservations its old tier can no longer hold.
    /// Returns the cancelled reservations.
    pub fn update_table_capacity(
        &self,
        search_table_id: i32,
        new_capacity: i32,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        self.update_table_capacity_at(search_table_id, new_capacity, Utc::now())
    }

    pub fn update_table_capacity_at(
        &self,
        search_table_id: i32,
        new_capacity: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        if new_capacity <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "Table capacity must be positive, got {}",
                new_capacity
            )));
        }
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("update_table_capacity: failed to acquire DB connection: {}", e);
            e
        })?;
        let today = self.config.clock().today(now);

        let cancelled = conn.connection().transaction(|conn| {
            let table = lock_table(conn, search_table_id)?;
            {
                use crate::db::schema::dining_tables::dsl::*;
                diesel::update(dining_tables.find(search_table_id))
                    .set(capacity.eq(new_capacity))
                    .execute(conn)
                    .map_err(RepositoryError::DatabaseError)?;
            }
            debug!(
                "update_table_capacity: table {} capacity {} -> {}",
                table.table_number, table.capacity, new_capacity
            );
            // The table leaves its old tier whichever way it moves.
            if new_capacity != table.capacity && table.is_active {
                rebalance_tier(conn, table.capacity, today, &self.config)
            } else {
                Ok(Vec::new())
            }
        })?;

        self.announce_cancellations(&mut conn, &cancelled, "a table was resized");
        Ok(cancelled)
    }

    /// Takes a table out of service and cancels reservations its tier can no longer hold.
    pub fn disable_table(&self, search_table_id: i32) -> Result<Vec<Reservation>, RepositoryError> {
        self.disable_table_at(search_table_id, Utc::now())
    }

    pub fn disable_table_at(
        &self,
        search_table_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("disable_table: failed to acquire DB connection: {}", e);
            e
        })?;
        let today = self.config.clock().today(now);

        let cancelled = conn.connection().transaction(|conn| {
            let table = lock_table(conn, search_table_id)?;
            if !table.is_active {
                return Ok(Vec::new());
            }
            {
                use crate::db::schema::dining_tables::dsl::*;
                diesel::update(dining_tables.find(search_table_id))
                    .set(is_active.eq(false))
                    .execute(conn)
                    .map_err(RepositoryError::DatabaseError)?;
            }
            rebalance_tier(conn, table.capacity, today, &self.config)
        })?;

        self.announce_cancellations(&mut conn, &cancelled, "a table was taken out of service");
        Ok(cancelled)
    }

    fn announce_cancellations(
        &self,
        conn: &mut DbConnection,
        cancelled: &[Reservation],
        reason: &str,
    ) {
        for reservation in cancelled {
            let message = format!(
                "Your reservation {} on {} at {} has been cancelled because {}.",
                reservation.confirmation_code,
                reservation.reservation_date,
                reservation.start_time.format("%H:%M"),
                reason
            );
            notify_party(conn.connection(), self.notifier.as_ref(), reservation, &message);
        }
        if !cancelled.is_empty() {
            info!(
                "table change: cancelled {} reservations ({})",
                cancelled.len(),
                reason
            );
        }
    }
}

pub(crate) fn capacity_tiers(conn: &mut PgConnection) -> Result<Vec<CapacityTier>, RepositoryError> {
    use crate::db::schema::dining_tables::dsl::*;
    let rows = dining_tables
        .filter(is_active.eq(true))
        .group_by(capacity)
        .select((capacity, diesel::dsl::count_star()))
        .order_by(capacity.asc())
        .load::<(i32, i64)>(conn)
        .map_err(|e| {
            error!("capacity_tiers: error grouping tables by capacity: {}", e);
            RepositoryError::DatabaseError(e)
        })?;
    Ok(rows
        .into_iter()
        .map(|(cap, tables)| CapacityTier {
            capacity: cap,
            tables,
        })
        .collect())
}

pub(crate) fn tables_in_tier(conn: &mut PgConnection, tier: i32) -> Result<i64, RepositoryError> {
    use crate::db::schema::dining_tables::dsl::*;
    dining_tables
        .filter(is_active.eq(true))
        .filter(capacity.eq(tier))
        .count()
        .get_result(conn)
        .map_err(RepositoryError::DatabaseError)
}

/// Locks the table row for the rest of the transaction.
pub(crate) fn lock_table(
    conn: &mut PgConnection,
    search_table_id: i32,
) -> Result<DiningTable, RepositoryError> {
    use crate::db::schema::dining_tables::dsl::*;
    dining_tables
        .find(search_table_id)
        .select(DiningTable::as_select())
        .for_update()
        .first(conn)
        .map_err(|e| match e {
            Error::NotFound => RepositoryError::TableNotFound(search_table_id),
            other => RepositoryError::DatabaseError(other),
        })
}

/// Free = active and without an open seating. Rows locked by a concurrent allocation are skipped.
pub(crate) fn find_free_table(
    conn: &mut PgConnection,
    min_capacity: i32,
) -> Result<Option<DiningTable>, RepositoryError> {
    use crate::db::schema::{dining_tables, seatings};
    let occupied = seatings::table
        .filter(seatings::check_out_time.is_null())
        .select(seatings::table_id);
    dining_tables::table
        .filter(dining_tables::is_active.eq(true))
        .filter(dining_tables::capacity.ge(min_capacity))
        .filter(diesel::dsl::not(dining_tables::table_id.eq_any(occupied)))
        .order((
            dining_tables::capacity.asc(),
            dining_tables::table_number.asc(),
        ))
        .select(DiningTable::as_select())
        .for_update()
        .skip_locked()
        .first(conn)
        .optional()
        .map_err(|e| {
            error!(
                "find_free_table: error looking up a table for capacity {}: {}",
                min_capacity, e
            );
            RepositoryError::DatabaseError(e)
        })
}

/// Replays the tier's confirmed reservations from `from_date` on in creation order and
/// cancels each one whose window already holds as many kept bookings as the tier has tables.
/// Reservations that are already waiting, called or seated are kept unconditionally.
pub(crate) fn rebalance_tier(
    conn: &mut PgConnection,
    tier: i32,
    from_date: NaiveDate,
    config: &EngineConfig,
) -> Result<Vec<Reservation>, RepositoryError> {
    let tables = tables_in_tier(conn, tier)?;

    use crate::db::schema::reservations::dsl::*;
    let booked: Vec<Reservation> = reservations
        .filter(allocated_capacity.eq(tier))
        .filter(reservation_date.ge(from_date))
        .filter(status.eq_any(ReservationStatus::BOOKED))
        .order((created_at.asc(), reservation_id.asc()))
        .select(Reservation::as_select())
        .for_update()
        .load(conn)
        .map_err(|e| {
            error!("rebalance_tier: error loading tier {} bookings: {}", tier, e);
            RepositoryError::DatabaseError(e)
        })?;

    let (anchored, movable): (Vec<Reservation>, Vec<Reservation>) = booked
        .into_iter()
        .partition(|r| r.status != ReservationStatus::Confirmed);

    let mut kept: HashMap<NaiveDate, Vec<NaiveTime>> = HashMap::new();
    for r in &anchored {
        kept.entry(r.reservation_date).or_default().push(r.start_time);
    }

    let mut cancelled = Vec::new();
    for mut r in movable {
        let day = kept.entry(r.reservation_date).or_default();
        if booked_in_window(r.start_time, day, config.dining()) as i64 >= tables {
            r.status = ReservationStatus::Cancelled;
            cancelled.push(r);
        } else {
            day.push(r.start_time);
        }
    }

    if !cancelled.is_empty() {
        let ids: Vec<i32> = cancelled.iter().map(|r| r.reservation_id).collect();
        diesel::update(reservations.filter(reservation_id.eq_any(&ids)))
            .set(status.eq(ReservationStatus::Cancelled))
            .execute(conn)
            .map_err(RepositoryError::DatabaseError)?;
        debug!(
            "rebalance_tier: tier {} now has {} tables, cancelled reservations {:?}",
            tier, tables, ids
        );
    }
    Ok(cancelled)
}
