//! counsel-scheduler/crates/cs-api/src/middleware.rs Middleware
//!
//! Custom middleware for security, logging, and traffic control.

use actix_web::middleware::Logger;
use actix_cors::Cors;

// Returns a standard set of middleware for the scheduling API.
pub fn standard_middleware() -> Logger {
    // We use the 'default' logger which outputs:
    // remote-ip "request-line" status-code response-size "referrer" "user-agent"
    Logger::default()
}

// Configures CORS (Cross-Origin Resource Sharing)
// Important if the booking UI and API ever live on different subdomains.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
        .max_age(3600)
}
