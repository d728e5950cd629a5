use crate::db::RepositoryError;
use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{Error, HttpRequest, HttpResponse};

pub fn default_error_handler(err: JsonPayloadError, req: &HttpRequest) -> Error {
    error!("Error in request: {} \n Error: {}", req.full_url(), err);
    let body = serde_json::json!({
        "status": "error",
        "message": "Malformed request body",
        "data": null,
        "error": err.to_string(),
    });
    actix_web::error::InternalError::from_response(err, HttpResponse::BadRequest().json(body))
        .into()
}

/// Validation problems are 400, unknown codes and tables 404, state conflicts 409.
pub(crate) fn status_for(err: &RepositoryError) -> StatusCode {
    if err.is_storage_failure() {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    if err.is_not_found() {
        return StatusCode::NOT_FOUND;
    }
    match err {
        RepositoryError::PartyTooLarge(_)
        | RepositoryError::InvalidIdentity(_)
        | RepositoryError::ValidationError(_) => StatusCode::BAD_REQUEST,
        RepositoryError::SlotNoLongerAvailable(_)
        | RepositoryError::SlotNotAvailable(_)
        | RepositoryError::ArrivedTooEarly { .. }
        | RepositoryError::ArrivedTooLate { .. }
        | RepositoryError::TableNotOccupied(_)
        | RepositoryError::ReservationNotActive(_) => StatusCode::CONFLICT,
        RepositoryError::CodeGenerationExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
