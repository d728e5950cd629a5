mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use chrono::{Days, NaiveDate, Utc};
use common::setup_api_app;
use serde_json::{json, Value};
use tablebook::db::DbConnection;
use tablebook::test_utils::{insert_table, set_hours, time};

fn future_day() -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(30))
        .expect("date in range")
}

#[actix_rt::test]
async fn root_endpoint_is_up() {
    let (app, _pool, _notifier) = setup_api_app!();

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body, "Server up!");
}

#[actix_rt::test]
async fn search_confirm_show_and_cancel() {
    let (app, pool, notifier) = setup_api_app!();
    let day = future_day();
    {
        let mut db = DbConnection::new(&pool).expect("db connection");
        insert_table(db.connection(), 1, 4).expect("table");
        set_hours(db.connection(), day, time(10, 0), time(14, 0)).expect("hours");
    }

    let req = test::TestRequest::get()
        .uri(&format!("/availability?date={}&party_size=3", day))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["outcome"], "SHOW_AVAILABILITY");
    assert_eq!(body["data"]["allocated_capacity"], 4);
    assert_eq!(body["data"]["times"][0], "10:00:00");

    let req = test::TestRequest::post()
        .uri("/reservations")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload(
            json!({
                "reservation_date": day,
                "start_time": "10:00:00",
                "party_size": 3,
                "guest_contact": "ana@example.com"
            })
            .to_string(),
        )
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "CONFIRMED");
    let code = body["data"]["confirmation_code"]
        .as_str()
        .expect("code")
        .to_string();
    assert_eq!(notifier.sent_to("ana@example.com").len(), 1);

    let req = test::TestRequest::get()
        .uri(&format!("/reservations/{}", code))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["guest_contact"], "ana@example.com");

    let req = test::TestRequest::delete()
        .uri(&format!("/reservations/{}", code))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "CANCELLED");
}

#[actix_rt::test]
async fn taken_slot_is_a_conflict() {
    let (app, pool, _notifier) = setup_api_app!();
    let day = future_day();
    {
        let mut db = DbConnection::new(&pool).expect("db connection");
        insert_table(db.connection(), 1, 4).expect("table");
        set_hours(db.connection(), day, time(10, 0), time(14, 0)).expect("hours");
    }

    let payload = json!({
        "reservation_date": day,
        "start_time": "10:00:00",
        "party_size": 2,
        "guest_contact": "ana@example.com"
    })
    .to_string();
    for expected in [StatusCode::OK, StatusCode::CONFLICT] {
        let req = test::TestRequest::post()
            .uri("/reservations")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload(payload.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected);
    }
}

#[actix_rt::test]
async fn bad_requests_are_rejected_with_envelope() {
    let (app, pool, _notifier) = setup_api_app!();
    let day = future_day();
    {
        let mut db = DbConnection::new(&pool).expect("db connection");
        insert_table(db.connection(), 1, 4).expect("table");
        set_hours(db.connection(), day, time(10, 0), time(14, 0)).expect("hours");
    }

    // both identities supplied
    let req = test::TestRequest::post()
        .uri("/reservations")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload(
            json!({
                "reservation_date": day,
                "start_time": "10:00:00",
                "party_size": 2,
                "user_id": 1,
                "guest_contact": "ana@example.com"
            })
            .to_string(),
        )
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");

    let req = test::TestRequest::post()
        .uri("/reservations")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"party_size\": \"many\"}")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Malformed request body");

    let req = test::TestRequest::get()
        .uri(&format!("/availability?date={}&party_size=9", day))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/reservations/000000")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn write_without_json_content_type_is_not_routed() {
    let (app, _pool, _notifier) = setup_api_app!();

    let req = test::TestRequest::post()
        .uri("/reservations")
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .set_payload("{}")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
