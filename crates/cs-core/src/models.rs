//! # Domain Models
//!
//! These structs represent the core entities of the scheduling engine.
//! We use UUID v7 for time-ordered, globally unique identification; the
//! scheduling coordinates themselves (date, time-of-day) stay naive
//! wall-clock tokens ("2025-01-15", "09:00"), never combined instants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seats a counselor carries when the directory profile declares none.
pub const DEFAULT_COUNSELOR_CAPACITY: u32 = 5;

/// One day of declared availability for one counselor.
///
/// The `times` list is the universe of bookable slots for that date:
/// unique, ascending HH:MM tokens. Booking a slot does not remove it
/// from this list; conflicts are resolved against live appointments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub counselor_id: Uuid,
    /// Naive local date token, `YYYY-MM-DD`
    pub date: String,
    /// Unique HH:MM tokens, ascending
    pub times: Vec<String>,
}

/// A student's request to be assigned to a counselor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    pub counselor_id: Uuid,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Status is monotonic: once accepted or rejected it is terminal.
/// A pending request may instead be deleted outright by its student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// The counselor's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    Accept,
    Reject,
}

/// A reservation of exactly one (counselor, date, time) slot.
///
/// The central invariant lives here: for a fixed (counselor_id, date, time)
/// at most one appointment with status != canceled may exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub counselor_id: Uuid,
    /// Naive local date token, `YYYY-MM-DD`
    pub date: String,
    /// Naive time-of-day token, `HH:MM`
    pub time: String,
    pub end_time: Option<String>,
    pub meeting_type: MeetingType,
    pub status: AppointmentStatus,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub details: Option<String>,
    /// Free-text note supplied by the student at booking time
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
    Canceled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Canceled => "canceled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "canceled" => Some(AppointmentStatus::Canceled),
            "completed" => Some(AppointmentStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeetingType {
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "in-person")]
    InPerson,
    #[serde(rename = "phone")]
    Phone,
    #[serde(rename = "flexible")]
    Flexible,
}

impl MeetingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingType::Video => "video",
            MeetingType::InPerson => "in-person",
            MeetingType::Phone => "phone",
            MeetingType::Flexible => "flexible",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(MeetingType::Video),
            "in-person" => Some(MeetingType::InPerson),
            "phone" => Some(MeetingType::Phone),
            "flexible" => Some(MeetingType::Flexible),
            _ => None,
        }
    }
}

/// Everything the engine needs to reserve a slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub student_id: Uuid,
    pub counselor_id: Uuid,
    pub date: String,
    pub time: String,
    pub meeting_type: MeetingType,
    pub note: Option<String>,
}

/// Partial update of appointment metadata; only supplied fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingInfoPatch {
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub details: Option<String>,
    pub end_time: Option<String>,
}

/// A user as seen through the external identity directory.
/// This core reads profiles (and writes counselor capacity) but never
/// creates or deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub role: UserRole,
    pub name: String,
    pub email: String,
    /// Counselors only; falls back to [`DEFAULT_COUNSELOR_CAPACITY`]
    pub capacity: Option<u32>,
    pub verified: bool,
}

impl UserProfile {
    /// Effective seat count for capacity checks.
    pub fn effective_capacity(&self) -> u32 {
        self.capacity.unwrap_or(DEFAULT_COUNSELOR_CAPACITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Counselor,
}
