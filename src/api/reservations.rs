use crate::api::{status_for, ContentTypeHeader};
use crate::db::{AvailabilityOperations, ReservationOperations};
use crate::enums::reservations::{
    AvailabilityData, AvailabilityQuery, AvailabilityResponse, ReservationRequest,
    ReservationResponse,
};
use crate::models::reservation::Identity;
use actix_web::middleware::NormalizePath;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use log::{debug, error};
use utoipa_actix_web::{scope, service_config::ServiceConfig};

pub(super) fn config(
    cfg: &mut ServiceConfig,
    availability_ops: &AvailabilityOperations,
    reservation_ops: &ReservationOperations,
) {
    cfg.service(
        scope::scope("/availability")
            .wrap(NormalizePath::trim())
            .app_data(web::Data::new(availability_ops.clone()))
            .service(find_availability),
    )
    .service(
        scope::scope("/reservations")
            .wrap(NormalizePath::trim())
            .app_data(web::Data::new(reservation_ops.clone()))
            .service(
                scope::scope("")
                    .guard(ContentTypeHeader)
                    .service(confirm_slot)
                    .service(edit_reservation),
            )
            .service(show_reservation)
            .service(cancel_reservation)
            .service(mark_no_show),
    );
}

#[utoipa::path(
    tag = "Reservations",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Free slots, suggestions, or nothing available", body = AvailabilityResponse),
        (status = 400, description = "Party size invalid or too large", body = AvailabilityResponse)
    ),
    summary = "Find free start times for a party on a date"
)]
#[get("")]
pub(super) async fn find_availability(
    availability_ops: web::Data<AvailabilityOperations>,
    query: web::Query<AvailabilityQuery>,
) -> actix_web::Result<impl Responder> {
    let AvailabilityQuery { date, party_size } = query.into_inner();
    let result = web::block(move || availability_ops.find_availability(date, party_size)).await?;

    match result {
        Ok(availability) => {
            let data = AvailabilityData::from(availability);
            let message = match data.outcome.as_str() {
                "SHOW_AVAILABILITY" => format!("{} free start times", data.times.len()),
                "SHOW_SUGGESTIONS" => format!(
                    "Fully booked on {}; {} alternative days suggested",
                    date,
                    data.suggestions.len()
                ),
                _ => "No availability in the coming days".to_string(),
            };
            Ok(HttpResponse::Ok().json(AvailabilityResponse::ok(message, data)))
        }
        Err(e) => {
            error!(
                "find_availability: failed for {} party of {}: {}",
                date, party_size, e
            );
            Ok(HttpResponse::build(status_for(&e))
                .json(AvailabilityResponse::error("Availability search failed", e)))
        }
    }
}

#[utoipa::path(
    tag = "Reservations",
    request_body = ReservationRequest,
    responses(
        (status = 200, description = "Reservation confirmed", body = ReservationResponse),
        (status = 400, description = "Invalid identity or party size", body = ReservationResponse),
        (status = 409, description = "Slot no longer available", body = ReservationResponse)
    ),
    summary = "Confirm a slot picked from an availability search"
)]
#[post("")]
pub(super) async fn confirm_slot(
    reservation_ops: web::Data<ReservationOperations>,
    req_data: web::Json<ReservationRequest>,
) -> actix_web::Result<impl Responder> {
    let ReservationRequest {
        reservation_date,
        start_time,
        party_size,
        user_id,
        guest_contact,
    } = req_data.into_inner();

    let identity = match Identity::from_parts(user_id, guest_contact) {
        Ok(identity) => identity,
        Err(e) => {
            return Ok(HttpResponse::BadRequest()
                .json(ReservationResponse::error("Reservation not confirmed", e)))
        }
    };

    let result = web::block(move || {
        reservation_ops.confirm_slot(reservation_date, start_time, party_size, identity)
    })
    .await?;

    match result {
        Ok(reservation) => {
            debug!(
                "confirm_slot: confirmed {} for {} at {}",
                reservation.confirmation_code, reservation_date, start_time
            );
            Ok(HttpResponse::Ok().json(ReservationResponse::ok(
                format!("Reservation confirmed, code {}", reservation.confirmation_code),
                reservation,
            )))
        }
        Err(e) => {
            error!(
                "confirm_slot: failed for {} at {}: {}",
                reservation_date, start_time, e
            );
            Ok(HttpResponse::build(status_for(&e))
                .json(ReservationResponse::error("Reservation not confirmed", e)))
        }
    }
}

#[utoipa::path(
    tag = "Reservations",
    params(("code", description = "Confirmation code")),
    responses(
        (status = 200, description = "Reservation found", body = ReservationResponse),
        (status = 404, description = "Unknown confirmation code", body = ReservationResponse)
    ),
    summary = "Look up a reservation by confirmation code"
)]
#[get("/{code}")]
pub(super) async fn show_reservation(
    reservation_ops: web::Data<ReservationOperations>,
    path: web::Path<(String,)>,
) -> actix_web::Result<impl Responder> {
    let code = path.into_inner().0;
    let lookup = code.clone();
    let result = web::block(move || reservation_ops.show_reservation(&lookup)).await?;

    match result {
        Ok(reservation) => Ok(HttpResponse::Ok().json(ReservationResponse::ok(
            format!("Reservation {}", code),
            reservation,
        ))),
        Err(e) => {
            debug!("show_reservation: {}: {}", code, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(ReservationResponse::error("Reservation not found", e)))
        }
    }
}

#[utoipa::path(
    tag = "Reservations",
    params(("code", description = "Confirmation code")),
    request_body = ReservationRequest,
    responses(
        (status = 200, description = "Reservation updated", body = ReservationResponse),
        (status = 404, description = "Unknown confirmation code", body = ReservationResponse),
        (status = 409, description = "New slot not available", body = ReservationResponse)
    ),
    summary = "Move a reservation to another slot, party size or contact"
)]
#[put("/{code}")]
pub(super) async fn edit_reservation(
    reservation_ops: web::Data<ReservationOperations>,
    path: web::Path<(String,)>,
    req_data: web::Json<ReservationRequest>,
) -> actix_web::Result<impl Responder> {
    let code = path.into_inner().0;
    let ReservationRequest {
        reservation_date,
        start_time,
        party_size,
        user_id,
        guest_contact,
    } = req_data.into_inner();

    let identity = match Identity::from_parts(user_id, guest_contact) {
        Ok(identity) => identity,
        Err(e) => {
            return Ok(HttpResponse::BadRequest()
                .json(ReservationResponse::error("Reservation not updated", e)))
        }
    };

    let lookup = code.clone();
    let result = web::block(move || {
        reservation_ops.edit_reservation(&lookup, reservation_date, start_time, party_size, identity)
    })
    .await?;

    match result {
        Ok(reservation) => Ok(HttpResponse::Ok().json(ReservationResponse::ok(
            format!("Reservation {} updated", code),
            reservation,
        ))),
        Err(e) => {
            error!("edit_reservation: failed for {}: {}", code, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(ReservationResponse::error("Reservation not updated", e)))
        }
    }
}

#[utoipa::path(
    tag = "Reservations",
    params(("code", description = "Confirmation code")),
    responses(
        (status = 200, description = "Reservation cancelled (or already cancelled)", body = ReservationResponse),
        (status = 404, description = "Unknown confirmation code", body = ReservationResponse),
        (status = 409, description = "Reservation already seated or finished", body = ReservationResponse)
    ),
    summary = "Cancel a reservation"
)]
#[delete("/{code}")]
pub(super) async fn cancel_reservation(
    reservation_ops: web::Data<ReservationOperations>,
    path: web::Path<(String,)>,
) -> actix_web::Result<impl Responder> {
    let code = path.into_inner().0;
    let lookup = code.clone();
    let result = web::block(move || reservation_ops.cancel_reservation(&lookup)).await?;

    match result {
        Ok(reservation) => Ok(HttpResponse::Ok().json(ReservationResponse::ok(
            format!("Reservation {} cancelled", code),
            reservation,
        ))),
        Err(e) => {
            error!("cancel_reservation: failed for {}: {}", code, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(ReservationResponse::error("Reservation not cancelled", e)))
        }
    }
}

#[utoipa::path(
    tag = "Reservations",
    params(("code", description = "Confirmation code")),
    responses(
        (status = 200, description = "Reservation marked as no-show", body = ReservationResponse),
        (status = 400, description = "Arrival window still open", body = ReservationResponse),
        (status = 409, description = "Reservation not confirmed", body = ReservationResponse)
    ),
    summary = "Mark a confirmed reservation whose arrival window passed as a no-show"
)]
#[post("/{code}/no-show")]
pub(super) async fn mark_no_show(
    reservation_ops: web::Data<ReservationOperations>,
    path: web::Path<(String,)>,
) -> actix_web::Result<impl Responder> {
    let code = path.into_inner().0;
    let lookup = code.clone();
    let result = web::block(move || reservation_ops.mark_no_show(&lookup)).await?;

    match result {
        Ok(reservation) => Ok(HttpResponse::Ok().json(ReservationResponse::ok(
            format!("Reservation {} marked as no-show", code),
            reservation,
        ))),
        Err(e) => {
            error!("mark_no_show: failed for {}: {}", code, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(ReservationResponse::error("Reservation not marked", e)))
        }
    }
}
