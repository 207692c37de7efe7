//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! The scheduling ports return the typed [`crate::error::AppError`]
//! taxonomy directly, since callers branch on it.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Appointment, AssignmentRequest, AvailabilityDay, BookingRequest, MeetingInfoPatch,
    RequestAction, UserProfile,
};

/// Per-counselor declared availability, keyed by (counselor, date).
#[async_trait]
pub trait AvailabilityRepo: Send + Sync {
    /// Wholesale upsert: replaces any prior slot list for that date.
    /// Past dates are accepted; "no past slots" is calling-layer policy.
    async fn set_availability(
        &self,
        counselor_id: Uuid,
        date: &str,
        times: &[String],
    ) -> Result<AvailabilityDay>;

    /// Ordered tokens for one day; empty if none declared.
    async fn get_availability(&self, counselor_id: Uuid, date: &str) -> Result<Vec<String>>;

    /// All declared days for a counselor, ascending by date.
    async fn list_availability(&self, counselor_id: Uuid) -> Result<Vec<AvailabilityDay>>;
}

/// The request/accept/reject lifecycle binding a student to a counselor.
#[async_trait]
pub trait RequestRepo: Send + Sync {
    /// Creates a pending request; fails `CapacityExceeded` up front when the
    /// counselor's live accepted count already fills `capacity`. This check
    /// is advisory; `decide` is the authoritative enforcement point.
    async fn create_request(
        &self,
        student_id: Uuid,
        counselor_id: Uuid,
        capacity: u32,
    ) -> Result<AssignmentRequest>;

    /// pending -> accepted | rejected, terminal thereafter. The accept path
    /// re-checks capacity atomically: under concurrent accepts, only as many
    /// succeed as there are remaining seats.
    async fn decide(
        &self,
        request_id: Uuid,
        counselor_id: Uuid,
        action: RequestAction,
        capacity: u32,
    ) -> Result<AssignmentRequest>;

    /// Student-initiated deletion of a still-pending request.
    async fn cancel_request(&self, request_id: Uuid, student_id: Uuid) -> Result<()>;

    // Read queries; newest-first. "Current request" = most recently created,
    // regardless of status.
    async fn requests_by_counselor(&self, counselor_id: Uuid) -> Result<Vec<AssignmentRequest>>;
    async fn requests_by_student(
        &self,
        student_id: Uuid,
        latest_only: bool,
    ) -> Result<Vec<AssignmentRequest>>;
}

/// Slot reservation engine plus its read-side directory.
#[async_trait]
pub trait AppointmentRepo: Send + Sync {
    /// Reserves the slot iff it is declared available and not held by a live
    /// appointment. Under N concurrent books for the same coordinates,
    /// exactly one succeeds and the rest fail `SlotTaken`.
    async fn book(&self, req: BookingRequest) -> Result<Appointment>;

    /// Atomic move to a new (date, time) for the same counselor. All or
    /// nothing; the old slot frees implicitly because uniqueness keys off
    /// the live record's current coordinates.
    async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_date: &str,
        new_time: &str,
    ) -> Result<Appointment>;

    /// Sets status to canceled and frees the slot. Idempotent; `actor` must
    /// be the appointment's student or counselor.
    async fn cancel_appointment(&self, appointment_id: Uuid, actor: Uuid) -> Result<Appointment>;

    /// confirmed -> completed. A completed appointment still occupies its slot.
    async fn complete_appointment(&self, appointment_id: Uuid) -> Result<Appointment>;

    /// Metadata-only update; no slot implications.
    async fn set_meeting_info(
        &self,
        appointment_id: Uuid,
        patch: MeetingInfoPatch,
    ) -> Result<Appointment>;

    /// Time tokens held by non-canceled appointments on one day. Advisory
    /// read for booking UIs; `book` remains the authoritative check.
    async fn booked_times(&self, counselor_id: Uuid, date: &str) -> Result<Vec<String>>;

    // Directory projections: every appointment regardless of status,
    // ordered by (date, time). Status/upcoming filtering is presentation.
    async fn appointments_by_student(&self, student_id: Uuid) -> Result<Vec<Appointment>>;
    async fn appointments_by_counselor(&self, counselor_id: Uuid) -> Result<Vec<Appointment>>;
}

/// External identity/profile collaborator. Capacity is read live on every
/// check, never cached across a decide, because counselors may change it
/// between a request's creation and its decision.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<UserProfile>;

    /// Counselors only; `capacity` must be a positive integer.
    async fn update_counselor_capacity(&self, id: Uuid, capacity: u32) -> Result<UserProfile>;

    /// Seeding hook for the adapter. The scheduling core itself never
    /// creates or deletes users.
    async fn upsert_user(&self, profile: UserProfile) -> Result<()>;
}
