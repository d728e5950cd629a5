mod admin;
mod errors;
mod reservations;
mod seating;

pub use errors::default_error_handler;
pub(crate) use errors::status_for;

use crate::AppState;
use actix_web::guard::{Guard, GuardContext};
use actix_web::http::header;
use actix_web::{get, HttpResponse, Responder};
use utoipa_actix_web::service_config::ServiceConfig;

/// Matches requests whose `Content-Type` is `application/json`, with or without parameters.
pub struct ContentTypeHeader;

impl Guard for ContentTypeHeader {
    fn check(&self, ctx: &GuardContext<'_>) -> bool {
        ctx.head()
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
            .unwrap_or(false)
    }
}

#[utoipa::path(tag = "Health", responses((status = 200, description = "Server is up")))]
#[get("/")]
async fn root_endpoint() -> impl Responder {
    HttpResponse::Ok().body("Server up!")
}

pub fn configure(cfg: &mut ServiceConfig, state: &AppState) {
    cfg.service(root_endpoint);
    reservations::config(cfg, &state.availability_ops, &state.reservation_ops);
    seating::config(cfg, &state.seating_ops, &state.waiting_ops);
    admin::config(cfg, &state.table_ops, &state.calendar_ops);
}
