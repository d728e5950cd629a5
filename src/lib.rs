#[macro_use]
extern crate log;

pub mod api;
pub mod config;
pub mod db;
pub mod enums;
pub mod models;
pub mod services;
pub mod test_utils;

use crate::config::EngineConfig;
use crate::db::{
    establish_connection_pool, run_db_migrations, AvailabilityOperations, BillingOperations,
    CalendarOperations, ReservationOperations, SeatingOperations, SubscriberOperations,
    TableOperations, WaitingListOperations,
};
use crate::services::notifier::Notifier;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub availability_ops: AvailabilityOperations,
    pub reservation_ops: ReservationOperations,
    pub seating_ops: SeatingOperations,
    pub waiting_ops: WaitingListOperations,
    pub billing_ops: BillingOperations,
    pub table_ops: TableOperations,
    pub calendar_ops: CalendarOperations,
    pub subscriber_ops: SubscriberOperations,
    pub config: EngineConfig,
}

impl AppState {
    pub fn new(url: &str, config: EngineConfig, notifier: Arc<dyn Notifier>) -> Self {
        let db = establish_connection_pool(url).expect("Unable to build connection pool");
        run_db_migrations(db.clone()).expect("Unable to run migrations");
        Self::from_pool(db, config, notifier)
    }

    /// Wires every operations handle to an existing pool. Migrations are the caller's concern.
    pub fn from_pool(
        db: Pool<ConnectionManager<PgConnection>>,
        config: EngineConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        AppState {
            availability_ops: AvailabilityOperations::new(db.clone(), config.clone()),
            reservation_ops: ReservationOperations::new(
                db.clone(),
                config.clone(),
                notifier.clone(),
            ),
            seating_ops: SeatingOperations::new(db.clone(), config.clone(), notifier.clone()),
            waiting_ops: WaitingListOperations::new(db.clone(), config.clone(), notifier.clone()),
            billing_ops: BillingOperations::new(db.clone(), config.clone(), notifier.clone()),
            table_ops: TableOperations::new(db.clone(), config.clone(), notifier.clone()),
            calendar_ops: CalendarOperations::new(db.clone(), config.clone(), notifier),
            subscriber_ops: SubscriberOperations::new(db),
            config,
        }
    }
}
