use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{r2d2, PgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

mod availability;
mod billing;
mod calendar;
mod errors;
mod reservations;
pub mod schema;
mod seating;
mod subscribers;
mod tables;
mod waiting_list;

pub use availability::AvailabilityOperations;
pub use billing::{BillingOperations, BillingOutcome};
pub use calendar::CalendarOperations;
pub use errors::RepositoryError;
pub use reservations::ReservationOperations;
pub use seating::{CheckInOutcome, CheckoutOutcome, SeatingOperations};
pub use subscribers::SubscriberOperations;
pub use tables::TableOperations;
pub use waiting_list::WaitingListOperations;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn establish_connection_pool(
    database_url: &str,
) -> Result<Pool<ConnectionManager<PgConnection>>, RepositoryError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    Pool::builder()
        .max_size(20)
        .build(manager)
        .map_err(RepositoryError::ConnectionPoolError)
}

pub fn run_db_migrations(
    pool: Pool<ConnectionManager<PgConnection>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    if !applied.is_empty() {
        info!("run_db_migrations: applied {} migrations", applied.len());
    }
    Ok(())
}

// Connection Guard - Manages pool
pub struct DbConnection<'a> {
    conn: r2d2::PooledConnection<ConnectionManager<PgConnection>>,
    _lifetime: std::marker::PhantomData<&'a ()>,
}

impl DbConnection<'_> {
    pub fn new(pool: &Pool<ConnectionManager<PgConnection>>) -> Result<Self, RepositoryError> {
        Ok(Self {
            conn: pool.get().map_err(RepositoryError::ConnectionPoolError)?,
            _lifetime: std::marker::PhantomData,
        })
    }

    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}
