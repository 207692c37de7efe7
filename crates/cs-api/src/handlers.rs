//! # cs-api Handlers
//!
//! This module coordinates the flow between HTTP requests and core traits.
//! Handlers stay thin: resolve directory profiles where an operation needs
//! a live capacity, call the port, translate the typed error.

use actix_web::{web, HttpResponse, Responder};
use cs_core::error::AppError;
use cs_core::models::{
    BookingRequest, MeetingInfoPatch, MeetingType, RequestAction, UserRole,
};
use cs_core::traits::{AppointmentRepo, AvailabilityRepo, RequestRepo, UserDirectory};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// State shared across all actix-web workers. One storage adapter may serve
/// several ports, hence `Arc` rather than `Box`.
pub struct AppState {
    pub availability: Arc<dyn AvailabilityRepo>,
    pub requests: Arc<dyn RequestRepo>,
    pub appointments: Arc<dyn AppointmentRepo>,
    pub directory: Arc<dyn UserDirectory>,
}

/// Maps the error taxonomy onto status codes the way a booking client needs
/// to branch: re-prompt for a slot (409/422), show "counselor full" (409),
/// or treat the action as impossible (403/404).
fn error_response(err: &AppError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });
    match err {
        AppError::NotFound(_, _) => HttpResponse::NotFound().json(body),
        AppError::SlotUnavailable(_, _) => HttpResponse::UnprocessableEntity().json(body),
        AppError::SlotTaken(_, _) | AppError::CapacityExceeded(_, _) => {
            HttpResponse::Conflict().json(body)
        }
        AppError::InvalidInput(_) => HttpResponse::BadRequest().json(body),
        AppError::NotOwner(_) => HttpResponse::Forbidden().json(body),
        AppError::Internal(_) => {
            log::error!("internal failure: {err}");
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// Live capacity lookup for a counselor; never cached across calls.
async fn counselor_capacity(state: &AppState, counselor_id: Uuid) -> Result<u32, AppError> {
    let profile = state.directory.get_user(counselor_id).await?;
    if profile.role != UserRole::Counselor {
        return Err(AppError::InvalidInput(format!(
            "user {counselor_id} is not a counselor"
        )));
    }
    Ok(profile.effective_capacity())
}

// ---- availability --------------------------------------------------------

#[derive(Deserialize)]
pub struct SetAvailabilityBody {
    pub counselor_id: Uuid,
    pub date: String,
    pub times: Vec<String>,
}

pub async fn set_availability(
    data: web::Data<AppState>,
    body: web::Json<SetAvailabilityBody>,
) -> impl Responder {
    let body = body.into_inner();
    match data
        .availability
        .set_availability(body.counselor_id, &body.date, &body.times)
        .await
    {
        Ok(day) => HttpResponse::Ok().json(day),
        Err(e) => error_response(&e),
    }
}

pub async fn get_availability(
    data: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> impl Responder {
    let (counselor_id, date) = path.into_inner();
    match data.availability.get_availability(counselor_id, &date).await {
        Ok(times) => HttpResponse::Ok().json(times),
        Err(e) => error_response(&e),
    }
}

pub async fn list_availability(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match data.availability.list_availability(path.into_inner()).await {
        Ok(days) => HttpResponse::Ok().json(days),
        Err(e) => error_response(&e),
    }
}

// ---- assignment requests -------------------------------------------------

#[derive(Deserialize)]
pub struct CreateRequestBody {
    pub student_id: Uuid,
    pub counselor_id: Uuid,
}

pub async fn create_request(
    data: web::Data<AppState>,
    body: web::Json<CreateRequestBody>,
) -> impl Responder {
    let body = body.into_inner();
    let capacity = match counselor_capacity(&data, body.counselor_id).await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    match data
        .requests
        .create_request(body.student_id, body.counselor_id, capacity)
        .await
    {
        Ok(req) => HttpResponse::Created().json(req),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct DecideBody {
    pub counselor_id: Uuid,
    pub action: RequestAction,
}

pub async fn decide_request(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<DecideBody>,
) -> impl Responder {
    let body = body.into_inner();
    // Capacity is re-read here on purpose: it may have changed since the
    // request was created, and decide-time is the authoritative check.
    let capacity = match counselor_capacity(&data, body.counselor_id).await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    match data
        .requests
        .decide(path.into_inner(), body.counselor_id, body.action, capacity)
        .await
    {
        Ok(req) => HttpResponse::Ok().json(req),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct CancelRequestBody {
    pub student_id: Uuid,
}

pub async fn cancel_request(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CancelRequestBody>,
) -> impl Responder {
    match data
        .requests
        .cancel_request(path.into_inner(), body.student_id)
        .await
    {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&e),
    }
}

pub async fn requests_by_counselor(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match data.requests.requests_by_counselor(path.into_inner()).await {
        Ok(reqs) => HttpResponse::Ok().json(reqs),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct StudentRequestsQuery {
    #[serde(default)]
    pub latest_only: bool,
}

pub async fn requests_by_student(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<StudentRequestsQuery>,
) -> impl Responder {
    match data
        .requests
        .requests_by_student(path.into_inner(), query.latest_only)
        .await
    {
        Ok(reqs) => HttpResponse::Ok().json(reqs),
        Err(e) => error_response(&e),
    }
}

// ---- appointments --------------------------------------------------------

#[derive(Deserialize)]
pub struct BookBody {
    pub student_id: Uuid,
    pub counselor_id: Uuid,
    pub date: String,
    pub time: String,
    pub meeting_type: MeetingType,
    pub note: Option<String>,
}

pub async fn book_appointment(
    data: web::Data<AppState>,
    body: web::Json<BookBody>,
) -> impl Responder {
    let body = body.into_inner();
    // The counselor must exist; an accepted assignment is not required
    // before booking (matcher and engine are independent).
    if let Err(e) = counselor_capacity(&data, body.counselor_id).await {
        return error_response(&e);
    }
    let req = BookingRequest {
        student_id: body.student_id,
        counselor_id: body.counselor_id,
        date: body.date,
        time: body.time,
        meeting_type: body.meeting_type,
        note: body.note,
    };
    match data.appointments.book(req).await {
        Ok(appt) => HttpResponse::Created().json(appt),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct RescheduleBody {
    pub date: String,
    pub time: String,
}

pub async fn reschedule_appointment(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<RescheduleBody>,
) -> impl Responder {
    match data
        .appointments
        .reschedule(path.into_inner(), &body.date, &body.time)
        .await
    {
        Ok(appt) => HttpResponse::Ok().json(appt),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct CancelAppointmentBody {
    pub actor: Uuid,
}

pub async fn cancel_appointment(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CancelAppointmentBody>,
) -> impl Responder {
    match data
        .appointments
        .cancel_appointment(path.into_inner(), body.actor)
        .await
    {
        Ok(appt) => HttpResponse::Ok().json(appt),
        Err(e) => error_response(&e),
    }
}

pub async fn complete_appointment(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match data.appointments.complete_appointment(path.into_inner()).await {
        Ok(appt) => HttpResponse::Ok().json(appt),
        Err(e) => error_response(&e),
    }
}

pub async fn set_meeting_info(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<MeetingInfoPatch>,
) -> impl Responder {
    match data
        .appointments
        .set_meeting_info(path.into_inner(), body.into_inner())
        .await
    {
        Ok(appt) => HttpResponse::Ok().json(appt),
        Err(e) => error_response(&e),
    }
}

pub async fn booked_times(
    data: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> impl Responder {
    let (counselor_id, date) = path.into_inner();
    match data.appointments.booked_times(counselor_id, &date).await {
        Ok(times) => HttpResponse::Ok().json(times),
        Err(e) => error_response(&e),
    }
}

pub async fn appointments_by_student(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match data
        .appointments
        .appointments_by_student(path.into_inner())
        .await
    {
        Ok(appts) => HttpResponse::Ok().json(appts),
        Err(e) => error_response(&e),
    }
}

pub async fn appointments_by_counselor(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match data
        .appointments
        .appointments_by_counselor(path.into_inner())
        .await
    {
        Ok(appts) => HttpResponse::Ok().json(appts),
        Err(e) => error_response(&e),
    }
}

// ---- directory passthrough -----------------------------------------------

#[derive(Deserialize)]
pub struct CapacityBody {
    pub capacity: u32,
}

pub async fn update_capacity(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CapacityBody>,
) -> impl Responder {
    match data
        .directory
        .update_counselor_capacity(path.into_inner(), body.capacity)
        .await
    {
        Ok(profile) => HttpResponse::Ok().json(profile),
        Err(e) => error_response(&e),
    }
}
