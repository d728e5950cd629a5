use crate::config::EngineConfig;
use crate::db::subscribers::resolve_contact;
use crate::db::{DbConnection, RepositoryError};
use crate::models::floor::{BillState, DiningTable, Seating};
use crate::models::reservation::Reservation;
use crate::services::notifier::Notifier;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use log::{debug, error, info, warn};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingOutcome {
    /// Bill delivered; the seating will not be billed again.
    Sent,
    /// Delivery failed; the claim was released so a later tick retries.
    Released,
    /// Another biller got there first, or the seating is no longer due.
    Skipped,
}

#[derive(Clone)]
pub struct BillingOperations {
    pool: Pool<ConnectionManager<PgConnection>>,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
}

impl BillingOperations {
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

    pub fn due_seatings(&self) -> Result<Vec<i32>, RepositoryError> {
        self.due_seatings_at(Utc::now())
    }

    /// Open seatings past the billing delay whose bill has not gone out.
    pub fn due_seatings_at(&self, now: DateTime<Utc>) -> Result<Vec<i32>, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("due_seatings: failed to acquire DB connection: {}", e);
            e
        })?;
        let cutoff = now - self.config.billing_delay();

        use crate::db::schema::seatings::dsl::*;
        seatings
            .filter(check_out_time.is_null())
            .filter(bill_sent.eq(BillState::NotSent.as_i16()))
            .filter(check_in_time.le(cutoff))
            .order((check_in_time.asc(), seating_id.asc()))
            .select(seating_id)
            .load(conn.connection())
            .map_err(|e| {
                error!("due_seatings: error loading seatings due for billing: {}", e);
                RepositoryError::DatabaseError(e)
            })
    }

    pub fn bill_seating(&self, search_seating_id: i32) -> Result<BillingOutcome, RepositoryError> {
        self.bill_seating_at(search_seating_id, Utc::now())
    }

    /// Claims, bills and settles one seating in a single transaction. The claim is a
    /// conditional update, so of two concurrent billers only one sees its row change.
    /// The row stays locked while the notifier runs; a crash after a delivered bill but
    /// before commit rolls the claim back, and the next tick bills the party again.
    pub fn bill_seating_at(
        &self,
        search_seating_id: i32,
        now: DateTime<Utc>,
    ) -> Result<BillingOutcome, RepositoryError> {
        let mut conn = DbConnection::new(&self.pool).map_err(|e| {
            error!("bill_seating: failed to acquire DB connection: {}", e);
            e
        })?;
        let cutoff = now - self.config.billing_delay();

        conn.connection().transaction(|conn| {
            let claimed = {
                use crate::db::schema::seatings::dsl::*;
                diesel::update(
                    seatings
                        .find(search_seating_id)
                        .filter(bill_sent.eq(BillState::NotSent.as_i16()))
                        .filter(check_out_time.is_null())
                        .filter(check_in_time.le(cutoff)),
                )
                .set(bill_sent.eq(BillState::Claimed.as_i16()))
                .execute(conn)
                .map_err(RepositoryError::DatabaseError)?
            };
            if claimed == 0 {
                debug!("bill_seating: seating {} not claimable", search_seating_id);
                return Ok(BillingOutcome::Skipped);
            }

            let (seating, table, reservation): (Seating, DiningTable, Reservation) = {
                use crate::db::schema::{dining_tables, reservations, seatings};
                seatings::table
                    .inner_join(dining_tables::table)
                    .inner_join(reservations::table)
                    .filter(seatings::seating_id.eq(search_seating_id))
                    .select((
                        Seating::as_select(),
                        DiningTable::as_select(),
                        Reservation::as_select(),
                    ))
                    .first(conn)
                    .map_err(RepositoryError::DatabaseError)?
            };

            let contact = reservation
                .identity()
                .and_then(|identity| resolve_contact(conn, &identity))?;
            let message = format!(
                "Your bill for table {} (reservation {}) is ready. Thank you for dining with us.",
                table.table_number, reservation.confirmation_code
            );
            let delivered = match contact {
                Some(contact) => self.notifier.send_to_contact(&contact, &message),
                None => {
                    warn!(
                        "bill_seating: no contact for reservation {}",
                        reservation.confirmation_code
                    );
                    false
                }
            };

            let settled = if delivered {
                BillState::Sent
            } else {
                BillState::NotSent
            };
            {
                use crate::db::schema::seatings::dsl::*;
                diesel::update(
                    seatings
                        .find(seating.seating_id)
                        .filter(bill_sent.eq(BillState::Claimed.as_i16())),
                )
                .set(bill_sent.eq(settled.as_i16()))
                .execute(conn)
                .map_err(RepositoryError::DatabaseError)?;
            }

            if delivered {
                info!(
                    "bill_seating: bill sent for table {} (reservation {})",
                    table.table_number, reservation.confirmation_code
                );
                Ok(BillingOutcome::Sent)
            } else {
                warn!(
                    "bill_seating: delivery failed for reservation {}, will retry",
                    reservation.confirmation_code
                );
                Ok(BillingOutcome::Released)
            }
        })
    }

    pub fn run_billing_tick(&self) -> Result<usize, RepositoryError> {
        self.run_billing_tick_at(Utc::now())
    }

    /// One pass over every due seating. A failing seating is logged and skipped.
    /// Returns the number of bills sent.
    pub fn run_billing_tick_at(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let due = self.due_seatings_at(now)?;
        let mut sent = 0;
        for seating in due {
            match self.bill_seating_at(seating, now) {
                Ok(BillingOutcome::Sent) => sent += 1,
                Ok(_) => {}
                Err(e) => error!("run_billing_tick: seating {} failed: {}", seating, e),
            }
        }
        Ok(sent)
    }
}
