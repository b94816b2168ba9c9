//! linklocal/crates/ll-api/src/middleware.rs Middleware
//!
//! Request logging and CORS for the JSON API.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::Logger;

/// Access log line per request:
/// remote-ip "request-line" status-code response-size "referrer" "user-agent"
pub fn standard_middleware() -> Logger {
    Logger::default()
}

/// The UI collaborator may be served from another origin.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(3600)
}
