mod common;

use tablebook::db::{DbConnection, RepositoryError};
use tablebook::models::floor::{Occasion, OpeningHours};
use tablebook::models::reservation::{Identity, Reservation, ReservationStatus};
use tablebook::test_utils::{
    date, insert_reservation, insert_table, reservation_status, set_hours, time, utc_at,
};

fn book(
    conn: &mut diesel::PgConnection,
    code: &str,
    start_hour: u32,
    status: ReservationStatus,
    created_minute: u32,
) -> Reservation {
    insert_reservation(
        conn,
        code,
        date(2025, 6, 2),
        time(start_hour, 0),
        2,
        4,
        status,
        Identity::Guest(format!("{}@example.com", code)),
        utc_at(date(2025, 6, 1), 9, created_minute),
    )
    .expect("reservation")
}

fn codes(reservations: &[Reservation]) -> Vec<&str> {
    reservations
        .iter()
        .map(|r| r.confirmation_code.as_str())
        .collect()
}

#[test]
fn shortened_hours_cancel_sittings_that_no_longer_fit() {
    let (pool, state, notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let day = date(2025, 6, 2);
    insert_table(conn, 1, 4).expect("table");
    insert_table(conn, 2, 4).expect("table");
    set_hours(conn, day, time(10, 0), time(16, 0)).expect("hours");
    book(conn, "100010", 10, ReservationStatus::Confirmed, 0);
    book(conn, "100013", 13, ReservationStatus::Confirmed, 1);
    book(conn, "100014", 14, ReservationStatus::Confirmed, 2);

    let cancelled = state
        .calendar_ops
        .set_opening_hours(OpeningHours {
            hours_date: day,
            open_time: time(10, 0),
            close_time: time(15, 0),
            occasion: Occasion::Holiday,
        })
        .expect("set hours");

    assert_eq!(codes(&cancelled), vec!["100014"]);
    assert_eq!(cancelled[0].status, ReservationStatus::Cancelled);
    assert_eq!(reservation_status(conn, "100013").expect("status"), ReservationStatus::Confirmed);
    assert_eq!(reservation_status(conn, "100014").expect("status"), ReservationStatus::Cancelled);
    assert_eq!(notifier.sent_to("100014@example.com").len(), 1);

    let saved = state
        .calendar_ops
        .get_opening_hours(day)
        .expect("get hours")
        .expect("hours saved");
    assert_eq!(saved.close_time, time(15, 0));
    assert_eq!(saved.occasion, Occasion::Holiday);
}

#[test]
fn closing_a_day_cancels_every_confirmed_reservation() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let day = date(2025, 6, 2);
    insert_table(conn, 1, 4).expect("table");
    set_hours(conn, day, time(10, 0), time(16, 0)).expect("hours");
    book(conn, "100010", 10, ReservationStatus::Confirmed, 0);
    book(conn, "100013", 13, ReservationStatus::Confirmed, 1);
    book(conn, "200010", 10, ReservationStatus::Seated, 2);

    let cancelled = state
        .calendar_ops
        .set_opening_hours(OpeningHours {
            hours_date: day,
            open_time: time(0, 0),
            close_time: time(0, 0),
            occasion: Occasion::Strike,
        })
        .expect("close day");

    assert_eq!(codes(&cancelled), vec!["100010", "100013"]);
    assert_eq!(reservation_status(conn, "200010").expect("status"), ReservationStatus::Seated);
}

#[test]
fn disabling_a_table_cancels_latest_overlapping_bookings() {
    let (pool, state, notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    insert_table(conn, 1, 4).expect("table");
    let second = insert_table(conn, 2, 4).expect("table");
    book(conn, "100010", 10, ReservationStatus::Confirmed, 0);
    book(conn, "110010", 10, ReservationStatus::Confirmed, 5);
    book(conn, "100013", 13, ReservationStatus::Confirmed, 10);

    let cancelled = state
        .table_ops
        .disable_table_at(second.table_id, utc_at(date(2025, 6, 1), 12, 0))
        .expect("disable");

    assert_eq!(codes(&cancelled), vec!["110010"]);
    assert_eq!(reservation_status(conn, "100010").expect("status"), ReservationStatus::Confirmed);
    assert_eq!(reservation_status(conn, "100013").expect("status"), ReservationStatus::Confirmed);
    assert_eq!(notifier.sent_to("110010@example.com").len(), 1);

    let tiers = state.table_ops.capacity_tiers().expect("tiers");
    assert_eq!(tiers.len(), 1);
    assert_eq!(tiers[0].tables, 1);

    let again = state
        .table_ops
        .disable_table_at(second.table_id, utc_at(date(2025, 6, 1), 12, 5))
        .expect("disable again");
    assert!(again.is_empty());
}

#[test]
fn seated_parties_survive_a_table_being_disabled() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    insert_table(conn, 1, 4).expect("table");
    let second = insert_table(conn, 2, 4).expect("table");
    book(conn, "100010", 10, ReservationStatus::Confirmed, 0);
    book(conn, "200010", 10, ReservationStatus::Seated, 5);

    let cancelled = state
        .table_ops
        .disable_table_at(second.table_id, utc_at(date(2025, 6, 1), 12, 0))
        .expect("disable");

    assert_eq!(codes(&cancelled), vec!["100010"]);
    assert_eq!(reservation_status(conn, "200010").expect("status"), ReservationStatus::Seated);
}

#[test]
fn shrinking_the_last_table_of_a_tier_cancels_its_bookings() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let table = insert_table(conn, 1, 4).expect("table");
    book(conn, "100010", 10, ReservationStatus::Confirmed, 0);
    book(conn, "100013", 13, ReservationStatus::Confirmed, 1);

    let unchanged = state
        .table_ops
        .update_table_capacity_at(table.table_id, 4, utc_at(date(2025, 6, 1), 12, 0))
        .expect("same capacity");
    assert!(unchanged.is_empty());

    let cancelled = state
        .table_ops
        .update_table_capacity_at(table.table_id, 2, utc_at(date(2025, 6, 1), 12, 0))
        .expect("shrink to 2");
    assert_eq!(codes(&cancelled), vec!["100010", "100013"]);
}

#[test]
fn growing_a_table_takes_it_out_of_its_old_tier() {
    let (pool, state, notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let day = date(2025, 6, 2);
    set_hours(conn, day, time(10, 0), time(16, 0)).expect("hours");
    insert_table(conn, 1, 2).expect("table");
    let grown_table = insert_table(conn, 2, 2).expect("table");
    insert_table(conn, 3, 4).expect("table");
    for (code, party, alloc, minute) in [
        ("200010", 2, 2, 0),
        ("210010", 2, 2, 5),
        ("400010", 3, 4, 10),
    ] {
        insert_reservation(
            conn,
            code,
            day,
            time(10, 0),
            party,
            alloc,
            ReservationStatus::Confirmed,
            Identity::Guest(format!("{}@example.com", code)),
            utc_at(date(2025, 6, 1), 9, minute),
        )
        .expect("reservation");
    }
    let now = utc_at(date(2025, 6, 1), 12, 0);

    let cancelled = state
        .table_ops
        .update_table_capacity_at(grown_table.table_id, 4, now)
        .expect("grow");

    assert_eq!(codes(&cancelled), vec!["210010"]);
    assert_eq!(reservation_status(conn, "200010").expect("status"), ReservationStatus::Confirmed);
    assert_eq!(notifier.sent_to("210010@example.com").len(), 1);

    let tiers = state.table_ops.capacity_tiers().expect("tiers");
    assert_eq!(
        tiers.iter().map(|t| (t.capacity, t.tables)).collect::<Vec<_>>(),
        vec![(2, 1), (4, 2)]
    );

    // Three tables at 10:00 now hold exactly three parties.
    state
        .reservation_ops
        .confirm_slot_at(day, time(10, 0), 4, Identity::Guest("late@example.com".into()), now)
        .expect("grown table takes a tier-4 party");
    for (party, contact) in [(2, "pair@example.com"), (3, "trio@example.com")] {
        assert!(matches!(
            state.reservation_ops.confirm_slot_at(
                day,
                time(10, 0),
                party,
                Identity::Guest(contact.into()),
                now
            ),
            Err(RepositoryError::SlotNoLongerAvailable(_))
        ));
    }
}

#[test]
fn past_reservations_are_left_alone() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let table = insert_table(conn, 1, 4).expect("table");
    book(conn, "100010", 10, ReservationStatus::Confirmed, 0);

    let cancelled = state
        .table_ops
        .disable_table_at(table.table_id, utc_at(date(2025, 6, 3), 9, 0))
        .expect("disable");
    assert!(cancelled.is_empty());
    assert_eq!(reservation_status(conn, "100010").expect("status"), ReservationStatus::Confirmed);
}
