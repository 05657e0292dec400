use actix_web::{http::StatusCode, web, HttpResponse};
use soundalike_common::SoundalikeError;

use crate::types::ErrorResponse;

pub mod recommend;
pub mod system;

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(system::root)
        .service(system::stats)
        .service(system::reload)
        .service(recommend::recommend);
}

/// JSON error body with the status the error maps to
pub fn error_response(err: &SoundalikeError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(ErrorResponse::from(err))
}
