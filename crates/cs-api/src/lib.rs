//! # cs-api
//!
//! The web routing and orchestration layer for counsel-scheduler.

pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures the routes for the scheduling engine.
///
/// # Developer Note
/// We use a scoped configuration to allow the main binary to mount
/// the API under different paths if needed (e.g., /api/v1/).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            // Availability store
            .route("/availability", web::post().to(handlers::set_availability))
            .route(
                "/counselors/{id}/availability",
                web::get().to(handlers::list_availability),
            )
            .route(
                "/counselors/{id}/availability/{date}",
                web::get().to(handlers::get_availability),
            )
            // Assignment matcher
            .route("/requests", web::post().to(handlers::create_request))
            .route(
                "/requests/{id}/decision",
                web::post().to(handlers::decide_request),
            )
            .route("/requests/{id}", web::delete().to(handlers::cancel_request))
            .route(
                "/counselors/{id}/requests",
                web::get().to(handlers::requests_by_counselor),
            )
            .route(
                "/students/{id}/requests",
                web::get().to(handlers::requests_by_student),
            )
            // Slot reservation engine
            .route("/appointments", web::post().to(handlers::book_appointment))
            .route(
                "/appointments/{id}/reschedule",
                web::post().to(handlers::reschedule_appointment),
            )
            .route(
                "/appointments/{id}/cancel",
                web::post().to(handlers::cancel_appointment),
            )
            .route(
                "/appointments/{id}/complete",
                web::post().to(handlers::complete_appointment),
            )
            .route(
                "/appointments/{id}/meeting-info",
                web::patch().to(handlers::set_meeting_info),
            )
            .route(
                "/counselors/{id}/booked/{date}",
                web::get().to(handlers::booked_times),
            )
            // Appointment directory
            .route(
                "/students/{id}/appointments",
                web::get().to(handlers::appointments_by_student),
            )
            .route(
                "/counselors/{id}/appointments",
                web::get().to(handlers::appointments_by_counselor),
            )
            // External directory passthrough
            .route(
                "/counselors/{id}/capacity",
                web::patch().to(handlers::update_capacity),
            ),
    );
}
