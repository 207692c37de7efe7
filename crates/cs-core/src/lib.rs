//! counsel-scheduler/crates/cs-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the appointment
//! scheduling and counselor-assignment engine.

pub mod error;
pub mod models;
pub mod tokens;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use tokens::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use uuid::Uuid;

    #[test]
    fn test_appointment_creation_v7() {
        let id = Uuid::now_v7();
        let appt = Appointment {
            id,
            student_id: Uuid::now_v7(),
            counselor_id: Uuid::now_v7(),
            date: "2025-01-15".to_string(),
            time: "09:00".to_string(),
            end_time: None,
            meeting_type: MeetingType::Video,
            status: AppointmentStatus::Confirmed,
            meeting_link: None,
            location: None,
            details: None,
            note: Some("first session".to_string()),
            created_at: chrono::Utc::now(),
        };
        assert_eq!(appt.id, id);
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn test_enum_wire_names() {
        // Clients send these exact strings; the hyphenated one is the
        // reason MeetingType can't use a blanket rename_all.
        let mt: MeetingType = serde_json::from_str("\"in-person\"").unwrap();
        assert_eq!(mt, MeetingType::InPerson);
        assert_eq!(serde_json::to_string(&mt).unwrap(), "\"in-person\"");
        assert_eq!(
            serde_json::to_string(&RequestStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::Canceled).unwrap(),
            "\"canceled\""
        );
    }

    #[test]
    fn test_effective_capacity_fallback() {
        let mut profile = UserProfile {
            id: Uuid::now_v7(),
            role: UserRole::Counselor,
            name: "Dana".to_string(),
            email: "dana@example.edu".to_string(),
            capacity: None,
            verified: true,
        };
        assert_eq!(profile.effective_capacity(), DEFAULT_COUNSELOR_CAPACITY);
        profile.capacity = Some(2);
        assert_eq!(profile.effective_capacity(), 2);
    }
}
