//! # AppError
//!
//! Centralized error handling for the counsel-scheduler ecosystem.
//! Every variant except `Internal` is a recoverable, caller-facing outcome:
//! never swallowed, never retried by this core.

use thiserror::Error;

/// The primary error type for all cs-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced counselor/student/appointment/request absent
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// The requested (date, time) is not in the counselor's declared availability
    #[error("slot {1} on {0} is not in the counselor's availability")]
    SlotUnavailable(String, String),

    /// A live (non-canceled) appointment already occupies the slot
    #[error("slot {1} on {0} is already taken")]
    SlotTaken(String, String),

    /// The counselor has no free seats
    #[error("counselor {0} is at full capacity ({1})")]
    CapacityExceeded(String, u32),

    /// Malformed date/time tokens, bad enum values, empty slot lists
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Actor lacks rights over the resource (e.g. canceling another
    /// student's request)
    #[error("not owner: {0}")]
    NotOwner(String),

    /// Storage-layer I/O failure; the whole operation may be retried
    #[error("internal service error: {0}")]
    Internal(String),
}

/// A specialized Result type for counsel-scheduler logic.
pub type Result<T> = std::result::Result<T, AppError>;
