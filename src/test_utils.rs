use crate::db::{establish_connection_pool, run_db_migrations, DbConnection, RepositoryError};
use crate::models::floor::{
    BillState, DiningTable, NewDiningTable, NewSeating, Occasion, OpeningHours, Seating,
};
use crate::models::reservation::{Identity, NewReservation, Reservation, ReservationStatus};
use crate::models::subscriber::NewSubscriber;
use crate::services::notifier::Notifier;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use std::sync::{Mutex, Once};

// Fixture strategy:
// - Every test starts from an empty schema via `reset_db`.
// - Clocks are injected through the `*_at` operations; the engine config keeps UTC as
//   restaurant time so fixture instants read the same as the wall clock.
static TEST_THREADS_GUARD: Once = Once::new();

fn ensure_single_threaded_tests() {
    TEST_THREADS_GUARD.call_once(|| {
        let threads = test_threads_from_args().or_else(|| std::env::var("RUST_TEST_THREADS").ok());
        if threads.as_deref() != Some("1") {
            panic!(
                "Tests must run with --test-threads=1 or RUST_TEST_THREADS=1 because reset_db truncates the shared database."
            );
        }
    });
}

fn test_threads_from_args() -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == "--test-threads" {
            return args.next();
        }
        if let Some(value) = arg.strip_prefix("--test-threads=") {
            return Some(value.to_string());
        }
    }
    None
}

pub fn init_test_env() {
    ensure_single_threaded_tests();
    let _ = pretty_env_logger::try_init();
}

pub fn build_test_pool(database_url: &str) -> Pool<ConnectionManager<PgConnection>> {
    let pool = establish_connection_pool(database_url).expect("Unable to build connection pool");
    run_db_migrations(pool.clone()).expect("Unable to run migrations");
    pool
}

pub fn reset_db(pool: &Pool<ConnectionManager<PgConnection>>) -> Result<(), RepositoryError> {
    let mut conn = DbConnection::new(pool)?;
    diesel::sql_query(
        "TRUNCATE TABLE waiting_list, seatings, reservations, subscribers, opening_hours, \
         dining_tables RESTART IDENTITY CASCADE",
    )
    .execute(conn.connection())
    .map_err(RepositoryError::DatabaseError)?;
    Ok(())
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid fixture time")
}

/// The instant at `h:m` on `day`, in UTC.
pub fn utc_at(day: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(time(h, m)))
}

pub fn insert_table(
    conn: &mut PgConnection,
    number: i32,
    capacity: i32,
) -> Result<DiningTable, RepositoryError> {
    use crate::db::schema::dining_tables;

    diesel::insert_into(dining_tables::table)
        .values(&NewDiningTable {
            table_number: number,
            capacity,
        })
        .returning(DiningTable::as_returning())
        .get_result(conn)
        .map_err(RepositoryError::DatabaseError)
}

pub fn set_hours(
    conn: &mut PgConnection,
    day: NaiveDate,
    open: NaiveTime,
    close: NaiveTime,
) -> Result<(), RepositoryError> {
    use crate::db::schema::opening_hours::dsl::*;

    let hours = OpeningHours {
        hours_date: day,
        open_time: open,
        close_time: close,
        occasion: Occasion::Regular,
    };
    diesel::insert_into(opening_hours)
        .values(&hours)
        .on_conflict(hours_date)
        .do_update()
        .set((open_time.eq(open), close_time.eq(close)))
        .execute(conn)
        .map_err(RepositoryError::DatabaseError)?;
    Ok(())
}

pub fn insert_subscriber(
    conn: &mut PgConnection,
    name_val: &str,
    email_val: Option<&str>,
    phone_val: Option<&str>,
) -> Result<i32, RepositoryError> {
    use crate::db::schema::subscribers::dsl::*;

    diesel::insert_into(subscribers)
        .values(&NewSubscriber {
            name: name_val.to_string(),
            email: email_val.map(str::to_string),
            phone: phone_val.map(str::to_string),
        })
        .returning(user_id)
        .get_result(conn)
        .map_err(RepositoryError::DatabaseError)
}

/// Writes a reservation row directly, bypassing slot validation.
#[allow(clippy::too_many_arguments)]
pub fn insert_reservation(
    conn: &mut PgConnection,
    code: &str,
    day: NaiveDate,
    start: NaiveTime,
    party_size: i32,
    allocated_capacity: i32,
    status: ReservationStatus,
    identity: Identity,
    created_at: DateTime<Utc>,
) -> Result<Reservation, RepositoryError> {
    use crate::db::schema::reservations;

    let new_reservation = NewReservation {
        confirmation_code: code.to_string(),
        reservation_date: day,
        start_time: start,
        party_size,
        allocated_capacity,
        status,
        user_id: identity.user_id(),
        guest_contact: identity.guest_contact().map(str::to_string),
        created_at,
    };
    diesel::insert_into(reservations::table)
        .values(&new_reservation)
        .returning(Reservation::as_returning())
        .get_result(conn)
        .map_err(RepositoryError::DatabaseError)
}

/// Puts a party at a table without going through check-in.
pub fn insert_open_seating(
    conn: &mut PgConnection,
    table_id: i32,
    reservation_id: i32,
    check_in_time: DateTime<Utc>,
) -> Result<Seating, RepositoryError> {
    use crate::db::schema::seatings;

    diesel::insert_into(seatings::table)
        .values(&NewSeating {
            table_id,
            reservation_id,
            check_in_time,
        })
        .returning(Seating::as_returning())
        .get_result(conn)
        .map_err(RepositoryError::DatabaseError)
}

pub fn reservation_status(
    conn: &mut PgConnection,
    code: &str,
) -> Result<ReservationStatus, RepositoryError> {
    use crate::db::schema::reservations::dsl::*;

    reservations
        .filter(confirmation_code.eq(code))
        .select(status)
        .first(conn)
        .map_err(RepositoryError::DatabaseError)
}

pub fn seating_bill_state(
    conn: &mut PgConnection,
    search_seating_id: i32,
) -> Result<Option<BillState>, RepositoryError> {
    use crate::db::schema::seatings::dsl::*;

    seatings
        .find(search_seating_id)
        .select(bill_sent)
        .first::<i16>(conn)
        .map(BillState::from_i16)
        .map_err(RepositoryError::DatabaseError)
}

/// Keeps every message instead of delivering it. Can be switched to fail every send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, contact: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| to == contact)
            .map(|(_, message)| message)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send_to_contact(&self, contact: &str, message: &str) -> bool {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((contact.to_string(), message.to_string()));
        }
        !self.failing
    }
}
