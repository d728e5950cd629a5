use crate::api::{status_for, ContentTypeHeader};
use crate::db::{SeatingOperations, WaitingListOperations};
use crate::enums::seating::{
    CallRequest, CheckInData, CheckInResponse, CheckoutData, CheckoutResponse,
    WaitingEntryResponse, WalkInRequest,
};
use crate::models::reservation::Identity;
use actix_web::middleware::NormalizePath;
use actix_web::{delete, post, web, HttpResponse, Responder};
use log::{debug, error};
use utoipa_actix_web::{scope, service_config::ServiceConfig};

pub(super) fn config(
    cfg: &mut ServiceConfig,
    seating_ops: &SeatingOperations,
    waiting_ops: &WaitingListOperations,
) {
    cfg.service(
        scope::scope("/seating")
            .wrap(NormalizePath::trim())
            .app_data(web::Data::new(seating_ops.clone()))
            .app_data(web::Data::new(waiting_ops.clone()))
            .service(
                scope::scope("")
                    .guard(ContentTypeHeader)
                    .service(walk_in)
                    .service(call_waiting_entry),
            )
            .service(check_in)
            .service(check_out)
            .service(cancel_waiting_entry),
    );
}

#[utoipa::path(
    tag = "Seating",
    params(("code", description = "Confirmation code")),
    responses(
        (status = 200, description = "Seated, or added to the waiting list", body = CheckInResponse),
        (status = 404, description = "Unknown confirmation code", body = CheckInResponse),
        (status = 409, description = "Outside the arrival window or not active", body = CheckInResponse)
    ),
    summary = "Check in an arriving party"
)]
#[post("/check-in/{code}")]
pub(super) async fn check_in(
    seating_ops: web::Data<SeatingOperations>,
    path: web::Path<(String,)>,
) -> actix_web::Result<impl Responder> {
    let code = path.into_inner().0;
    let lookup = code.clone();
    let result = web::block(move || seating_ops.check_in(&lookup)).await?;

    match result {
        Ok(outcome) => {
            let data = CheckInData::from(outcome);
            debug!("check_in: {} -> {}", code, data.outcome);
            Ok(HttpResponse::Ok().json(CheckInResponse::ok(data.message(), data)))
        }
        Err(e) => {
            error!("check_in: failed for {}: {}", code, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(CheckInResponse::error("Check-in failed", e)))
        }
    }
}

#[utoipa::path(
    tag = "Seating",
    request_body = WalkInRequest,
    responses(
        (status = 200, description = "Seated, or added to the waiting list", body = CheckInResponse),
        (status = 400, description = "Invalid identity or party size", body = CheckInResponse)
    ),
    summary = "Seat or queue a party without a reservation"
)]
#[post("/walk-in")]
pub(super) async fn walk_in(
    seating_ops: web::Data<SeatingOperations>,
    req_data: web::Json<WalkInRequest>,
) -> actix_web::Result<impl Responder> {
    let WalkInRequest {
        party_size,
        user_id,
        guest_contact,
    } = req_data.into_inner();

    let identity = match Identity::from_parts(user_id, guest_contact) {
        Ok(identity) => identity,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(CheckInResponse::error("Walk-in failed", e)))
        }
    };

    let result = web::block(move || seating_ops.enqueue_walk_in(party_size, identity)).await?;

    match result {
        Ok(outcome) => {
            let data = CheckInData::from(outcome);
            Ok(HttpResponse::Ok().json(CheckInResponse::ok(data.message(), data)))
        }
        Err(e) => {
            error!("walk_in: failed for party of {}: {}", party_size, e);
            Ok(HttpResponse::build(status_for(&e)).json(CheckInResponse::error("Walk-in failed", e)))
        }
    }
}

#[utoipa::path(
    tag = "Seating",
    params(("id", description = "Table ID")),
    responses(
        (status = 200, description = "Checked out; next party seated or nobody waiting", body = CheckoutResponse),
        (status = 404, description = "Unknown table", body = CheckoutResponse),
        (status = 409, description = "Table not occupied", body = CheckoutResponse)
    ),
    summary = "Check out a table and hand it to the next waiting party"
)]
#[post("/tables/{id}/check-out")]
pub(super) async fn check_out(
    seating_ops: web::Data<SeatingOperations>,
    path: web::Path<(i32,)>,
) -> actix_web::Result<impl Responder> {
    let table_id = path.into_inner().0;
    let result = web::block(move || seating_ops.check_out_and_assign_next(table_id)).await?;

    match result {
        Ok(outcome) => {
            let data = CheckoutData::from(outcome);
            Ok(HttpResponse::Ok().json(CheckoutResponse::ok(data.message(), data)))
        }
        Err(e) => {
            error!("check_out: failed for table {}: {}", table_id, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(CheckoutResponse::error("Checkout failed", e)))
        }
    }
}

#[utoipa::path(
    tag = "Seating",
    params(("id", description = "Waiting list entry ID")),
    request_body = CallRequest,
    responses(
        (status = 200, description = "Table held and party called", body = WaitingEntryResponse),
        (status = 400, description = "Table unsuitable or occupied", body = WaitingEntryResponse),
        (status = 404, description = "Unknown entry or table", body = WaitingEntryResponse)
    ),
    summary = "Hold a table for a waiting party and call them in"
)]
#[post("/waiting/{id}/call")]
pub(super) async fn call_waiting_entry(
    waiting_ops: web::Data<WaitingListOperations>,
    path: web::Path<(i32,)>,
    req_data: web::Json<CallRequest>,
) -> actix_web::Result<impl Responder> {
    let wait_id = path.into_inner().0;
    let table_id = req_data.into_inner().table_id;
    let result = web::block(move || waiting_ops.call_waiting_entry(wait_id, table_id)).await?;

    match result {
        Ok(entry) => Ok(HttpResponse::Ok().json(WaitingEntryResponse::ok(
            format!("Waiting entry {} called", wait_id),
            entry,
        ))),
        Err(e) => {
            error!(
                "call_waiting_entry: failed for entry {} table {}: {}",
                wait_id, table_id, e
            );
            Ok(HttpResponse::build(status_for(&e))
                .json(WaitingEntryResponse::error("Call failed", e)))
        }
    }
}

#[utoipa::path(
    tag = "Seating",
    params(("id", description = "Waiting list entry ID")),
    responses(
        (status = 200, description = "Entry and its reservation cancelled", body = WaitingEntryResponse),
        (status = 404, description = "Unknown entry", body = WaitingEntryResponse),
        (status = 409, description = "Entry already assigned a table", body = WaitingEntryResponse)
    ),
    summary = "Remove a party from the waiting list"
)]
#[delete("/waiting/{id}")]
pub(super) async fn cancel_waiting_entry(
    waiting_ops: web::Data<WaitingListOperations>,
    path: web::Path<(i32,)>,
) -> actix_web::Result<impl Responder> {
    let wait_id = path.into_inner().0;
    let result = web::block(move || waiting_ops.cancel_waiting_list_entry(wait_id)).await?;

    match result {
        Ok(entry) => Ok(HttpResponse::Ok().json(WaitingEntryResponse::ok(
            format!("Waiting entry {} cancelled", wait_id),
            entry,
        ))),
        Err(e) => {
            error!("cancel_waiting_entry: failed for entry {}: {}", wait_id, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(WaitingEntryResponse::error("Cancel failed", e)))
        }
    }
}
