mod common;

use tablebook::db::{CheckInOutcome, CheckoutOutcome, DbConnection, RepositoryError};
use tablebook::models::reservation::{Identity, Reservation, ReservationStatus};
use tablebook::test_utils::{
    date, insert_open_seating, insert_reservation, insert_table, reservation_status, time, utc_at,
};

fn guest(contact: &str) -> Identity {
    Identity::Guest(contact.to_string())
}

fn confirmed_at_noon(conn: &mut diesel::PgConnection, code: &str, contact: &str) -> Reservation {
    insert_reservation(
        conn,
        code,
        date(2025, 6, 2),
        time(12, 0),
        3,
        4,
        ReservationStatus::Confirmed,
        guest(contact),
        utc_at(date(2025, 6, 1), 9, 0),
    )
    .expect("reservation")
}

#[test]
fn check_in_on_time_seats_party() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let table = insert_table(conn, 7, 4).expect("table");
    confirmed_at_noon(conn, "111111", "ana@example.com");

    let outcome = state
        .seating_ops
        .check_in_at("111111", utc_at(date(2025, 6, 2), 12, 0))
        .expect("check in");

    match outcome {
        CheckInOutcome::Seated {
            table_id,
            table_number,
            reservation,
            ..
        } => {
            assert_eq!(table_id, table.table_id);
            assert_eq!(table_number, 7);
            assert_eq!(reservation.status, ReservationStatus::Seated);
        }
        other => panic!("expected seated, got {:?}", other),
    }
    assert_eq!(reservation_status(conn, "111111").expect("status"), ReservationStatus::Seated);
    let open = state
        .seating_ops
        .open_seating(table.table_id)
        .expect("open seating")
        .expect("seating exists");
    assert!(open.is_open());
}

#[test]
fn check_in_prefers_smallest_fitting_table() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    insert_table(conn, 1, 8).expect("table");
    insert_table(conn, 2, 4).expect("table");
    confirmed_at_noon(conn, "111111", "ana@example.com");

    let outcome = state
        .seating_ops
        .check_in_at("111111", utc_at(date(2025, 6, 2), 11, 50))
        .expect("check in");
    assert!(matches!(outcome, CheckInOutcome::Seated { table_number: 2, .. }));
}

#[test]
fn check_in_outside_window_is_refused() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    insert_table(conn, 1, 4).expect("table");
    confirmed_at_noon(conn, "111111", "ana@example.com");
    let day = date(2025, 6, 2);

    let err = state
        .seating_ops
        .check_in_at("111111", utc_at(day, 11, 44))
        .expect_err("too early");
    match err {
        RepositoryError::ArrivedTooEarly { date: d, opens_at } => {
            assert_eq!(d, day);
            assert_eq!(opens_at, time(11, 45));
        }
        other => panic!("expected too early, got {:?}", other),
    }

    let err = state
        .seating_ops
        .check_in_at("111111", utc_at(day, 12, 16))
        .expect_err("too late");
    assert!(matches!(
        err,
        RepositoryError::ArrivedTooLate { closed_at, .. } if closed_at == time(12, 15)
    ));

    assert_eq!(
        reservation_status(conn, "111111").expect("status"),
        ReservationStatus::Confirmed
    );
    state
        .seating_ops
        .check_in_at("111111", utc_at(day, 12, 15))
        .expect("window edge is inclusive");
}

#[test]
fn check_in_when_full_joins_waiting_list() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let table = insert_table(conn, 1, 4).expect("table");
    let seated = confirmed_at_noon(conn, "100000", "first@example.com");
    insert_open_seating(conn, table.table_id, seated.reservation_id, utc_at(date(2025, 6, 2), 11, 0))
        .expect("seating");
    confirmed_at_noon(conn, "111111", "ana@example.com");

    let outcome = state
        .seating_ops
        .check_in_at("111111", utc_at(date(2025, 6, 2), 12, 0))
        .expect("check in");

    let CheckInOutcome::AddedToWaitingList { wait_id, reservation } = outcome else {
        panic!("expected waiting list");
    };
    assert_eq!(reservation.status, ReservationStatus::Waiting);
    let waiting = state.waiting_ops.list_waiting().expect("waiting list");
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].wait_id, wait_id);
    assert_eq!(waiting[0].priority, 1);
}

#[test]
fn cancelled_reservation_cannot_check_in() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    insert_table(conn, 1, 4).expect("table");
    insert_reservation(
        conn,
        "111111",
        date(2025, 6, 2),
        time(12, 0),
        2,
        4,
        ReservationStatus::Cancelled,
        guest("ana@example.com"),
        utc_at(date(2025, 6, 1), 9, 0),
    )
    .expect("reservation");

    let err = state
        .seating_ops
        .check_in_at("111111", utc_at(date(2025, 6, 2), 12, 0))
        .expect_err("cancelled");
    assert!(matches!(err, RepositoryError::ReservationNotActive(_)));
}

#[test]
fn checkout_hands_table_to_waiting_party() {
    let (pool, state, notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let day = date(2025, 6, 2);
    let table = insert_table(conn, 3, 4).expect("table");
    let seated = insert_reservation(
        conn,
        "100000",
        day,
        time(10, 0),
        4,
        4,
        ReservationStatus::Seated,
        guest("first@example.com"),
        utc_at(date(2025, 6, 1), 9, 0),
    )
    .expect("reservation");
    insert_open_seating(conn, table.table_id, seated.reservation_id, utc_at(day, 10, 0))
        .expect("seating");
    confirmed_at_noon(conn, "111111", "ana@example.com");
    let CheckInOutcome::AddedToWaitingList { wait_id, .. } = state
        .seating_ops
        .check_in_at("111111", utc_at(day, 12, 0))
        .expect("check in")
    else {
        panic!("expected waiting list");
    };

    let outcome = state
        .seating_ops
        .check_out_and_assign_next_at(table.table_id, utc_at(day, 12, 5))
        .expect("checkout");

    match outcome {
        CheckoutOutcome::NextSeated {
            table_id,
            wait_id: assigned,
            reservation,
            ..
        } => {
            assert_eq!(table_id, table.table_id);
            assert_eq!(assigned, wait_id);
            assert_eq!(reservation.confirmation_code, "111111");
            assert_eq!(reservation.status, ReservationStatus::Seated);
        }
        other => panic!("expected next seated, got {:?}", other),
    }
    assert_eq!(reservation_status(conn, "100000").expect("status"), ReservationStatus::Completed);
    assert_eq!(reservation_status(conn, "111111").expect("status"), ReservationStatus::Seated);
    assert!(state.waiting_ops.list_waiting().expect("waiting").is_empty());
    let open = state
        .seating_ops
        .open_seating(table.table_id)
        .expect("open seating")
        .expect("seating exists");
    assert_eq!(open.reservation_id, seated.reservation_id + 1);
    assert_eq!(notifier.sent_to("ana@example.com").len(), 1);
}

#[test]
fn reservation_holders_are_served_before_walk_ins() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let day = date(2025, 6, 2);
    let table = insert_table(conn, 1, 4).expect("table");
    let seated = insert_reservation(
        conn,
        "100000",
        day,
        time(10, 0),
        2,
        4,
        ReservationStatus::Seated,
        guest("first@example.com"),
        utc_at(date(2025, 6, 1), 9, 0),
    )
    .expect("reservation");
    insert_open_seating(conn, table.table_id, seated.reservation_id, utc_at(day, 10, 0))
        .expect("seating");
    confirmed_at_noon(conn, "AAAAAA", "a@example.com");
    confirmed_at_noon(conn, "CCCCCC", "c@example.com");

    state
        .seating_ops
        .check_in_at("AAAAAA", utc_at(day, 12, 0))
        .expect("a waits");
    let walk_in = state
        .seating_ops
        .enqueue_walk_in_at(2, guest("b@example.com"), utc_at(day, 12, 1))
        .expect("b waits");
    assert!(matches!(walk_in, CheckInOutcome::AddedToWaitingList { .. }));
    let walk_in_code = walk_in.reservation().confirmation_code.clone();
    state
        .seating_ops
        .check_in_at("CCCCCC", utc_at(day, 12, 2))
        .expect("c waits");

    let mut served = Vec::new();
    for minute in [10, 20, 30] {
        let outcome = state
            .seating_ops
            .check_out_and_assign_next_at(table.table_id, utc_at(day, 13, minute))
            .expect("checkout");
        let CheckoutOutcome::NextSeated { reservation, .. } = outcome else {
            panic!("expected someone waiting");
        };
        served.push(reservation.confirmation_code);
    }

    assert_eq!(served, vec!["AAAAAA".to_string(), "CCCCCC".to_string(), walk_in_code]);
}

#[test]
fn waiting_party_too_large_for_table_is_skipped() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let day = date(2025, 6, 2);
    let small = insert_table(conn, 1, 2).expect("table");
    let large = insert_table(conn, 2, 6).expect("table");
    for (code, table, party, tier) in [("100000", &small, 2, 2), ("100001", &large, 5, 6)] {
        let seated = insert_reservation(
            conn,
            code,
            day,
            time(10, 0),
            party,
            tier,
            ReservationStatus::Seated,
            guest("seated@example.com"),
            utc_at(date(2025, 6, 1), 9, 0),
        )
        .expect("reservation");
        insert_open_seating(conn, table.table_id, seated.reservation_id, utc_at(day, 10, 0))
            .expect("seating");
    }
    state
        .seating_ops
        .enqueue_walk_in_at(5, guest("big@example.com"), utc_at(day, 11, 0))
        .expect("big party waits");

    let outcome = state
        .seating_ops
        .check_out_and_assign_next_at(small.table_id, utc_at(day, 11, 30))
        .expect("checkout small");
    assert!(matches!(outcome, CheckoutOutcome::NobodyWaiting { .. }));
    assert_eq!(state.waiting_ops.list_waiting().expect("waiting").len(), 1);

    let outcome = state
        .seating_ops
        .check_out_and_assign_next_at(large.table_id, utc_at(day, 11, 35))
        .expect("checkout large");
    assert!(matches!(outcome, CheckoutOutcome::NextSeated { .. }));
}

#[test]
fn second_checkout_reports_table_not_occupied() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let day = date(2025, 6, 2);
    let table = insert_table(conn, 1, 4).expect("table");
    confirmed_at_noon(conn, "111111", "ana@example.com");
    state
        .seating_ops
        .check_in_at("111111", utc_at(day, 12, 0))
        .expect("check in");

    let first = state
        .seating_ops
        .check_out_and_assign_next_at(table.table_id, utc_at(day, 13, 30))
        .expect("checkout");
    assert!(matches!(first, CheckoutOutcome::NobodyWaiting { .. }));
    assert_eq!(reservation_status(conn, "111111").expect("status"), ReservationStatus::Completed);

    let err = state
        .seating_ops
        .check_out_and_assign_next_at(table.table_id, utc_at(day, 13, 31))
        .expect_err("already free");
    assert!(matches!(err, RepositoryError::TableNotOccupied(id) if id == table.table_id));

    let err = state
        .seating_ops
        .check_out_and_assign_next_at(table.table_id + 100, utc_at(day, 13, 31))
        .expect_err("no such table");
    assert!(matches!(err, RepositoryError::TableNotFound(_)));
}

#[test]
fn walk_in_is_seated_when_a_table_is_free() {
    let (pool, state, notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let day = date(2025, 6, 2);
    insert_table(conn, 1, 4).expect("table");

    let outcome = state
        .seating_ops
        .enqueue_walk_in_at(3, guest("walkin@example.com"), utc_at(day, 18, 42))
        .expect("walk in");

    let CheckInOutcome::Seated { reservation, .. } = outcome else {
        panic!("expected seated");
    };
    assert_eq!(reservation.reservation_date, day);
    assert_eq!(reservation.start_time, time(18, 42));
    assert_eq!(reservation.allocated_capacity, 4);
    assert_eq!(reservation.status, ReservationStatus::Seated);
    assert_eq!(notifier.sent_to("walkin@example.com").len(), 1);

    let err = state
        .seating_ops
        .enqueue_walk_in_at(5, guest("big@example.com"), utc_at(day, 18, 45))
        .expect_err("no table that large");
    assert!(matches!(err, RepositoryError::PartyTooLarge(5)));
}

#[test]
fn concurrent_check_ins_for_last_table_seat_one() {
    let (pool, state, _notifier) = common::setup_state();
    let mut db = DbConnection::new(&pool).expect("db connection");
    let conn = db.connection();
    let table = insert_table(conn, 1, 4).expect("table");
    let codes = ["300001", "300002", "300003", "300004"];
    for code in codes {
        confirmed_at_noon(conn, code, &format!("{}@example.com", code));
    }

    let handles: Vec<_> = codes
        .iter()
        .map(|code| {
            let ops = state.seating_ops.clone();
            let code = code.to_string();
            std::thread::spawn(move || ops.check_in_at(&code, utc_at(date(2025, 6, 2), 12, 0)))
        })
        .collect();
    let outcomes: Vec<CheckInOutcome> = handles
        .into_iter()
        .map(|h| h.join().expect("thread").expect("check in"))
        .collect();

    let seated: Vec<&CheckInOutcome> = outcomes
        .iter()
        .filter(|o| matches!(o, CheckInOutcome::Seated { .. }))
        .collect();
    assert_eq!(seated.len(), 1);
    assert!(matches!(
        seated[0],
        CheckInOutcome::Seated { table_id, .. } if *table_id == table.table_id
    ));
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, CheckInOutcome::AddedToWaitingList { .. }))
            .count(),
        3
    );
    assert_eq!(state.waiting_ops.list_waiting().expect("waiting").len(), 3);
    for code in codes {
        let status = reservation_status(conn, code).expect("status");
        assert!(matches!(
            status,
            ReservationStatus::Seated | ReservationStatus::Waiting
        ));
    }
}
