//! # cs-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational
//! model and the `cs-core` domain models, and is where every scheduling
//! invariant is actually enforced:
//!
//! - at most one non-canceled appointment per (counselor, date, time),
//! - live accepted-request count per counselor never above capacity.
//!
//! The pool is pinned to a single connection, so each transaction is a
//! global critical section (SQLite has a single writer anyway, and it keeps
//! `sqlite::memory:` databases shared across the pool). Two storage-layer
//! backstops hold even if the pool is ever widened: a partial unique index
//! on live appointment slots, and a count-guarded conditional UPDATE on the
//! accept path.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use cs_core::error::{AppError, Result};
use cs_core::models::{
    Appointment, AppointmentStatus, AssignmentRequest, AvailabilityDay, BookingRequest,
    MeetingInfoPatch, MeetingType, RequestAction, RequestStatus,
};
use cs_core::tokens;
use cs_core::traits::{AppointmentRepo, AvailabilityRepo, RequestRepo};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

pub struct SqliteScheduleRepo {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS availability_days (
        counselor_id BLOB NOT NULL,
        date TEXT NOT NULL,
        times TEXT NOT NULL,
        PRIMARY KEY (counselor_id, date)
    )",
    "CREATE TABLE IF NOT EXISTS assignment_requests (
        id BLOB PRIMARY KEY,
        student_id BLOB NOT NULL,
        counselor_id BLOB NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_requests_counselor
        ON assignment_requests (counselor_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_requests_student
        ON assignment_requests (student_id, created_at)",
    "CREATE TABLE IF NOT EXISTS appointments (
        id BLOB PRIMARY KEY,
        student_id BLOB NOT NULL,
        counselor_id BLOB NOT NULL,
        date TEXT NOT NULL,
        time TEXT NOT NULL,
        end_time TEXT,
        meeting_type TEXT NOT NULL,
        status TEXT NOT NULL,
        meeting_link TEXT,
        location TEXT,
        details TEXT,
        note TEXT,
        created_at TEXT NOT NULL
    )",
    // Canceled rows fall out of the index, which is what frees their slot.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_live_slot
        ON appointments (counselor_id, date, time) WHERE status != 'canceled'",
];

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

/// Storage failures are a generic transient class; callers may retry the
/// whole operation.
fn db_err(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(e.to_string())
}

fn row_to_request(row: &SqliteRow) -> Result<AssignmentRequest> {
    let raw: String = row.get("status");
    let status = RequestStatus::parse(&raw)
        .ok_or_else(|| AppError::Internal(format!("corrupt request status {raw:?}")))?;
    Ok(AssignmentRequest {
        id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
        student_id: blob_to_uuid(row.get::<Vec<u8>, _>("student_id").as_slice()),
        counselor_id: blob_to_uuid(row.get::<Vec<u8>, _>("counselor_id").as_slice()),
        status,
        created_at: row.get("created_at"),
    })
}

fn row_to_appointment(row: &SqliteRow) -> Result<Appointment> {
    let raw_status: String = row.get("status");
    let status = AppointmentStatus::parse(&raw_status)
        .ok_or_else(|| AppError::Internal(format!("corrupt appointment status {raw_status:?}")))?;
    let raw_type: String = row.get("meeting_type");
    let meeting_type = MeetingType::parse(&raw_type)
        .ok_or_else(|| AppError::Internal(format!("corrupt meeting type {raw_type:?}")))?;
    Ok(Appointment {
        id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
        student_id: blob_to_uuid(row.get::<Vec<u8>, _>("student_id").as_slice()),
        counselor_id: blob_to_uuid(row.get::<Vec<u8>, _>("counselor_id").as_slice()),
        date: row.get("date"),
        time: row.get("time"),
        end_time: row.get("end_time"),
        meeting_type,
        status,
        meeting_link: row.get("meeting_link"),
        location: row.get("location"),
        details: row.get("details"),
        note: row.get("note"),
        created_at: row.get("created_at"),
    })
}

impl SqliteScheduleRepo {
    pub async fn new(url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)
            .map_err(db_err)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(db_err)?;
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&pool).await.map_err(db_err)?;
        }
        log::debug!("sqlite schedule store ready at {url}");
        Ok(Self { pool })
    }

    /// Declared tokens for one day, within an open transaction.
    async fn declared_times(
        tx: &mut sqlx::SqliteConnection,
        counselor_id: Uuid,
        date: &str,
    ) -> Result<Vec<String>> {
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT times FROM availability_days WHERE counselor_id = ? AND date = ?",
        )
        .bind(uuid_to_blob(counselor_id))
        .bind(date)
        .fetch_optional(tx)
        .await
        .map_err(db_err)?;
        match raw {
            Some(raw) => serde_json::from_str(&raw).map_err(db_err),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_appointment(&self, id: Uuid) -> Result<Appointment> {
        let row = sqlx::query("SELECT * FROM appointments WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound("appointment".into(), id.to_string()))?;
        row_to_appointment(&row)
    }
}

#[async_trait]
impl AvailabilityRepo for SqliteScheduleRepo {
    /// Wholesale upsert: the new slot list replaces the old one, it never
    /// merges with it.
    async fn set_availability(
        &self,
        counselor_id: Uuid,
        date: &str,
        times: &[String],
    ) -> Result<AvailabilityDay> {
        tokens::validate_date(date)?;
        let times = tokens::normalize_slot_list(times)?;

        sqlx::query(
            "INSERT INTO availability_days (counselor_id, date, times) VALUES (?, ?, ?)
             ON CONFLICT(counselor_id, date) DO UPDATE SET times = excluded.times",
        )
        .bind(uuid_to_blob(counselor_id))
        .bind(date)
        .bind(serde_json::to_string(&times).map_err(db_err)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(AvailabilityDay {
            counselor_id,
            date: date.to_string(),
            times,
        })
    }

    async fn get_availability(&self, counselor_id: Uuid, date: &str) -> Result<Vec<String>> {
        tokens::validate_date(date)?;
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        Self::declared_times(&mut conn, counselor_id, date).await
    }

    async fn list_availability(&self, counselor_id: Uuid) -> Result<Vec<AvailabilityDay>> {
        let rows = sqlx::query(
            "SELECT date, times FROM availability_days WHERE counselor_id = ? ORDER BY date ASC",
        )
        .bind(uuid_to_blob(counselor_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let raw: String = row.get("times");
                Ok(AvailabilityDay {
                    counselor_id,
                    date: row.get("date"),
                    times: serde_json::from_str(&raw).map_err(db_err)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RequestRepo for SqliteScheduleRepo {
    /// Advisory capacity gate: a full counselor rejects new requests
    /// outright rather than queueing pendings that can never be accepted.
    async fn create_request(
        &self,
        student_id: Uuid,
        counselor_id: Uuid,
        capacity: u32,
    ) -> Result<AssignmentRequest> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let accepted: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM assignment_requests WHERE counselor_id = ? AND status = 'accepted'",
        )
        .bind(uuid_to_blob(counselor_id))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if accepted >= i64::from(capacity) {
            return Err(AppError::CapacityExceeded(counselor_id.to_string(), capacity));
        }

        let request = AssignmentRequest {
            id: Uuid::now_v7(),
            student_id,
            counselor_id,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO assignment_requests (id, student_id, counselor_id, status, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(request.id))
        .bind(uuid_to_blob(request.student_id))
        .bind(uuid_to_blob(request.counselor_id))
        .bind(request.status.as_str())
        .bind(request.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(request)
    }

    /// The authoritative capacity enforcement point. The accept UPDATE
    /// recounts live accepted rows in its own WHERE clause, so N racing
    /// accepts can only fill the remaining seats.
    async fn decide(
        &self,
        request_id: Uuid,
        counselor_id: Uuid,
        action: RequestAction,
        capacity: u32,
    ) -> Result<AssignmentRequest> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT * FROM assignment_requests WHERE id = ?")
            .bind(uuid_to_blob(request_id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound("assignment request".into(), request_id.to_string()))?;
        let request = row_to_request(&row)?;

        if request.counselor_id != counselor_id {
            return Err(AppError::NotOwner(format!(
                "request {request_id} does not target counselor {counselor_id}"
            )));
        }
        if request.status != RequestStatus::Pending {
            return Err(AppError::InvalidInput(format!(
                "request {request_id} is already {}",
                request.status.as_str()
            )));
        }

        let status = match action {
            RequestAction::Reject => {
                sqlx::query("UPDATE assignment_requests SET status = 'rejected' WHERE id = ?")
                    .bind(uuid_to_blob(request_id))
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                RequestStatus::Rejected
            }
            RequestAction::Accept => {
                let res = sqlx::query(
                    "UPDATE assignment_requests SET status = 'accepted'
                     WHERE id = ? AND status = 'pending'
                       AND (SELECT COUNT(*) FROM assignment_requests
                            WHERE counselor_id = ? AND status = 'accepted') < ?",
                )
                .bind(uuid_to_blob(request_id))
                .bind(uuid_to_blob(counselor_id))
                .bind(i64::from(capacity))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
                if res.rows_affected() == 0 {
                    return Err(AppError::CapacityExceeded(counselor_id.to_string(), capacity));
                }
                RequestStatus::Accepted
            }
        };

        tx.commit().await.map_err(db_err)?;
        Ok(AssignmentRequest { status, ..request })
    }

    async fn cancel_request(&self, request_id: Uuid, student_id: Uuid) -> Result<()> {
        let row = sqlx::query("SELECT * FROM assignment_requests WHERE id = ?")
            .bind(uuid_to_blob(request_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound("assignment request".into(), request_id.to_string()))?;
        let request = row_to_request(&row)?;

        if request.student_id != student_id {
            return Err(AppError::NotOwner(format!(
                "request {request_id} belongs to another student"
            )));
        }
        if request.status != RequestStatus::Pending {
            return Err(AppError::InvalidInput(format!(
                "request {request_id} is already {} and can no longer be canceled",
                request.status.as_str()
            )));
        }

        sqlx::query("DELETE FROM assignment_requests WHERE id = ?")
            .bind(uuid_to_blob(request_id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn requests_by_counselor(&self, counselor_id: Uuid) -> Result<Vec<AssignmentRequest>> {
        let rows = sqlx::query(
            "SELECT * FROM assignment_requests WHERE counselor_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(uuid_to_blob(counselor_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_request).collect()
    }

    async fn requests_by_student(
        &self,
        student_id: Uuid,
        latest_only: bool,
    ) -> Result<Vec<AssignmentRequest>> {
        let sql = if latest_only {
            "SELECT * FROM assignment_requests WHERE student_id = ?
             ORDER BY created_at DESC, id DESC LIMIT 1"
        } else {
            "SELECT * FROM assignment_requests WHERE student_id = ?
             ORDER BY created_at DESC, id DESC"
        };
        let rows = sqlx::query(sql)
            .bind(uuid_to_blob(student_id))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_request).collect()
    }
}

#[async_trait]
impl AppointmentRepo for SqliteScheduleRepo {
    /// Availability check, conflict check, and insert form one critical
    /// section: under concurrent books for the same coordinates exactly one
    /// caller gets the slot.
    ///
    /// Booking never consumes the availability token. Declared availability
    /// is the universe of bookable slots; reservations are points inside it.
    async fn book(&self, req: BookingRequest) -> Result<Appointment> {
        tokens::validate_date(&req.date)?;
        tokens::validate_time(&req.time)?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let declared = Self::declared_times(&mut tx, req.counselor_id, &req.date).await?;
        if !declared.iter().any(|t| t == &req.time) {
            return Err(AppError::SlotUnavailable(req.date, req.time));
        }

        let held: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments
             WHERE counselor_id = ? AND date = ? AND time = ? AND status != 'canceled'",
        )
        .bind(uuid_to_blob(req.counselor_id))
        .bind(&req.date)
        .bind(&req.time)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if held > 0 {
            return Err(AppError::SlotTaken(req.date, req.time));
        }

        let appt = Appointment {
            id: Uuid::now_v7(),
            student_id: req.student_id,
            counselor_id: req.counselor_id,
            date: req.date.clone(),
            time: req.time.clone(),
            end_time: None,
            meeting_type: req.meeting_type,
            status: AppointmentStatus::Confirmed,
            meeting_link: None,
            location: None,
            details: None,
            note: req.note,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO appointments
             (id, student_id, counselor_id, date, time, end_time, meeting_type, status,
              meeting_link, location, details, note, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(appt.id))
        .bind(uuid_to_blob(appt.student_id))
        .bind(uuid_to_blob(appt.counselor_id))
        .bind(&appt.date)
        .bind(&appt.time)
        .bind(&appt.end_time)
        .bind(appt.meeting_type.as_str())
        .bind(appt.status.as_str())
        .bind(&appt.meeting_link)
        .bind(&appt.location)
        .bind(&appt.details)
        .bind(&appt.note)
        .bind(appt.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            // The partial unique index is the backstop for a widened pool.
            sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed") => {
                AppError::SlotTaken(appt.date.clone(), appt.time.clone())
            }
            _ => db_err(e),
        })?;

        tx.commit().await.map_err(db_err)?;
        Ok(appt)
    }

    /// Moves the record or leaves it untouched; there is no intermediate
    /// state where it holds both slots or neither. No separate release step:
    /// the old slot frees because uniqueness keys off the row's live
    /// coordinates.
    async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_date: &str,
        new_time: &str,
    ) -> Result<Appointment> {
        tokens::validate_date(new_date)?;
        tokens::validate_time(new_time)?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT * FROM appointments WHERE id = ?")
            .bind(uuid_to_blob(appointment_id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound("appointment".into(), appointment_id.to_string()))?;
        let appt = row_to_appointment(&row)?;

        if appt.status != AppointmentStatus::Confirmed {
            return Err(AppError::InvalidInput(format!(
                "only a confirmed appointment can be rescheduled, this one is {}",
                appt.status.as_str()
            )));
        }

        let declared = Self::declared_times(&mut tx, appt.counselor_id, new_date).await?;
        if !declared.iter().any(|t| t == new_time) {
            return Err(AppError::SlotUnavailable(new_date.to_string(), new_time.to_string()));
        }

        let held: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments
             WHERE counselor_id = ? AND date = ? AND time = ?
               AND status != 'canceled' AND id != ?",
        )
        .bind(uuid_to_blob(appt.counselor_id))
        .bind(new_date)
        .bind(new_time)
        .bind(uuid_to_blob(appointment_id))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if held > 0 {
            return Err(AppError::SlotTaken(new_date.to_string(), new_time.to_string()));
        }

        sqlx::query("UPDATE appointments SET date = ?, time = ? WHERE id = ?")
            .bind(new_date)
            .bind(new_time)
            .bind(uuid_to_blob(appointment_id))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(Appointment {
            date: new_date.to_string(),
            time: new_time.to_string(),
            ..appt
        })
    }

    /// Idempotent: canceling an already-canceled appointment is a no-op
    /// success. Cancellation is what frees the slot for future books.
    async fn cancel_appointment(&self, appointment_id: Uuid, actor: Uuid) -> Result<Appointment> {
        let appt = self.fetch_appointment(appointment_id).await?;

        if actor != appt.student_id && actor != appt.counselor_id {
            return Err(AppError::NotOwner(format!(
                "user {actor} is not a party to appointment {appointment_id}"
            )));
        }
        if appt.status == AppointmentStatus::Canceled {
            return Ok(appt);
        }

        sqlx::query("UPDATE appointments SET status = 'canceled' WHERE id = ?")
            .bind(uuid_to_blob(appointment_id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(Appointment {
            status: AppointmentStatus::Canceled,
            ..appt
        })
    }

    async fn complete_appointment(&self, appointment_id: Uuid) -> Result<Appointment> {
        let appt = self.fetch_appointment(appointment_id).await?;
        match appt.status {
            AppointmentStatus::Completed => return Ok(appt),
            AppointmentStatus::Canceled => {
                return Err(AppError::InvalidInput(format!(
                    "appointment {appointment_id} is canceled and cannot be completed"
                )));
            }
            AppointmentStatus::Confirmed => {}
        }

        sqlx::query("UPDATE appointments SET status = 'completed' WHERE id = ?")
            .bind(uuid_to_blob(appointment_id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(Appointment {
            status: AppointmentStatus::Completed,
            ..appt
        })
    }

    /// Only supplied fields are overwritten; absent ones keep their value.
    async fn set_meeting_info(
        &self,
        appointment_id: Uuid,
        patch: MeetingInfoPatch,
    ) -> Result<Appointment> {
        if let Some(end_time) = &patch.end_time {
            tokens::validate_time(end_time)?;
        }

        let res = sqlx::query(
            "UPDATE appointments SET
                meeting_link = COALESCE(?, meeting_link),
                location     = COALESCE(?, location),
                details      = COALESCE(?, details),
                end_time     = COALESCE(?, end_time)
             WHERE id = ?",
        )
        .bind(&patch.meeting_link)
        .bind(&patch.location)
        .bind(&patch.details)
        .bind(&patch.end_time)
        .bind(uuid_to_blob(appointment_id))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound(
                "appointment".into(),
                appointment_id.to_string(),
            ));
        }

        self.fetch_appointment(appointment_id).await
    }

    async fn booked_times(&self, counselor_id: Uuid, date: &str) -> Result<Vec<String>> {
        tokens::validate_date(date)?;
        sqlx::query_scalar(
            "SELECT time FROM appointments
             WHERE counselor_id = ? AND date = ? AND status != 'canceled'
             ORDER BY time ASC",
        )
        .bind(uuid_to_blob(counselor_id))
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn appointments_by_student(&self, student_id: Uuid) -> Result<Vec<Appointment>> {
        let rows = sqlx::query(
            "SELECT * FROM appointments WHERE student_id = ? ORDER BY date ASC, time ASC",
        )
        .bind(uuid_to_blob(student_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_appointment).collect()
    }

    async fn appointments_by_counselor(&self, counselor_id: Uuid) -> Result<Vec<Appointment>> {
        let rows = sqlx::query(
            "SELECT * FROM appointments WHERE counselor_id = ? ORDER BY date ASC, time ASC",
        )
        .bind(uuid_to_blob(counselor_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_appointment).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn mem_repo() -> SqliteScheduleRepo {
        SqliteScheduleRepo::new("sqlite::memory:").await.unwrap()
    }

    fn booking(student: Uuid, counselor: Uuid, date: &str, time: &str) -> BookingRequest {
        BookingRequest {
            student_id: student,
            counselor_id: counselor,
            date: date.to_string(),
            time: time.to_string(),
            meeting_type: MeetingType::Video,
            note: None,
        }
    }

    #[tokio::test]
    async fn test_set_availability_replaces_not_merges() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();

        repo.set_availability(counselor, "2025-01-15", &["09:00".into()])
            .await
            .unwrap();
        repo.set_availability(counselor, "2025-01-15", &["10:00".into()])
            .await
            .unwrap();

        let times = repo.get_availability(counselor, "2025-01-15").await.unwrap();
        assert_eq!(times, vec!["10:00".to_string()]);
    }

    #[tokio::test]
    async fn test_set_availability_validates_tokens() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();

        let empty: Vec<String> = vec![];
        assert!(matches!(
            repo.set_availability(counselor, "2025-01-15", &empty).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.set_availability(counselor, "2025-01-15", &["9:00".into()]).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.set_availability(counselor, "jan 15", &["09:00".into()]).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_list_availability_ascending_by_date() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();

        repo.set_availability(counselor, "2025-02-01", &["09:00".into()])
            .await
            .unwrap();
        repo.set_availability(counselor, "2025-01-15", &["10:30".into(), "09:00".into()])
            .await
            .unwrap();

        let days = repo.list_availability(counselor).await.unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, "2025-01-15");
        assert_eq!(days[0].times, vec!["09:00".to_string(), "10:30".to_string()]);
        assert_eq!(days[1].date, "2025-02-01");
    }

    #[tokio::test]
    async fn test_book_requires_declared_availability() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let student = Uuid::now_v7();

        repo.set_availability(counselor, "2025-01-15", &["09:00".into()])
            .await
            .unwrap();

        let err = repo
            .book(booking(student, counselor, "2025-01-15", "10:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotUnavailable(_, _)));

        let appt = repo
            .book(booking(student, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_book_conflict_and_cancel_frees_slot() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        repo.set_availability(counselor, "2025-01-15", &["09:00".into()])
            .await
            .unwrap();

        let held = repo
            .book(booking(a, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();
        let err = repo
            .book(booking(b, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotTaken(_, _)));

        // Canceling excludes the record from the conflict check.
        repo.cancel_appointment(held.id, a).await.unwrap();
        repo.book(booking(b, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_completed_appointment_still_holds_slot() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        repo.set_availability(counselor, "2025-01-15", &["09:00".into()])
            .await
            .unwrap();
        let appt = repo
            .book(booking(a, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();
        repo.complete_appointment(appt.id).await.unwrap();

        let err = repo
            .book(booking(b, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotTaken(_, _)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_books_single_winner() {
        let repo = Arc::new(mem_repo().await);
        let counselor = Uuid::now_v7();

        repo.set_availability(counselor, "2025-01-15", &["09:00".into()])
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.book(booking(Uuid::now_v7(), counselor, "2025-01-15", "09:00"))
                    .await
            }));
        }

        let mut won = 0;
        let mut taken = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(AppError::SlotTaken(_, _)) => taken += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(taken, 7);
    }

    #[tokio::test]
    async fn test_reschedule_moves_or_leaves_unchanged() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let (a, c) = (Uuid::now_v7(), Uuid::now_v7());

        repo.set_availability(counselor, "2025-01-15", &["09:00".into(), "09:30".into()])
            .await
            .unwrap();
        let mine = repo
            .book(booking(a, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();
        repo.book(booking(c, counselor, "2025-01-15", "09:30"))
            .await
            .unwrap();

        // Target slot occupied: the appointment must stay exactly where it was.
        let err = repo
            .reschedule(mine.id, "2025-01-15", "09:30")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotTaken(_, _)));
        let unchanged = repo.fetch_appointment(mine.id).await.unwrap();
        assert_eq!((unchanged.date.as_str(), unchanged.time.as_str()), ("2025-01-15", "09:00"));

        // Target slot undeclared: same.
        let err = repo
            .reschedule(mine.id, "2025-01-15", "10:00")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotUnavailable(_, _)));

        // A free declared slot: the old one opens up, never both held.
        repo.set_availability(counselor, "2025-01-16", &["11:00".into()])
            .await
            .unwrap();
        let moved = repo.reschedule(mine.id, "2025-01-16", "11:00").await.unwrap();
        assert_eq!((moved.date.as_str(), moved.time.as_str()), ("2025-01-16", "11:00"));
        assert!(repo.booked_times(counselor, "2025-01-15").await.unwrap().len() == 1);
        repo.book(booking(Uuid::now_v7(), counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_idempotent_and_owner_checked() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let student = Uuid::now_v7();

        repo.set_availability(counselor, "2025-01-15", &["09:00".into()])
            .await
            .unwrap();
        let appt = repo
            .book(booking(student, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();

        let err = repo.cancel_appointment(appt.id, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::NotOwner(_)));

        let once = repo.cancel_appointment(appt.id, counselor).await.unwrap();
        assert_eq!(once.status, AppointmentStatus::Canceled);
        let twice = repo.cancel_appointment(appt.id, student).await.unwrap();
        assert_eq!(twice.status, AppointmentStatus::Canceled);
    }

    #[tokio::test]
    async fn test_meeting_info_partial_update() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let student = Uuid::now_v7();

        repo.set_availability(counselor, "2025-01-15", &["09:00".into()])
            .await
            .unwrap();
        let appt = repo
            .book(booking(student, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();

        repo.set_meeting_info(
            appt.id,
            MeetingInfoPatch {
                meeting_link: Some("https://meet.example.edu/abc".into()),
                location: Some("Room 14".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // A second patch touching one field leaves the others in place.
        let updated = repo
            .set_meeting_info(
                appt.id,
                MeetingInfoPatch {
                    end_time: Some("09:45".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.meeting_link.as_deref(), Some("https://meet.example.edu/abc"));
        assert_eq!(updated.location.as_deref(), Some("Room 14"));
        assert_eq!(updated.end_time.as_deref(), Some("09:45"));

        let err = repo
            .set_meeting_info(Uuid::now_v7(), MeetingInfoPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, _)));
    }

    #[tokio::test]
    async fn test_booked_times_excludes_canceled() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        repo.set_availability(
            counselor,
            "2025-01-15",
            &["09:00".into(), "09:30".into(), "10:00".into()],
        )
        .await
        .unwrap();
        let first = repo
            .book(booking(a, counselor, "2025-01-15", "09:30"))
            .await
            .unwrap();
        repo.book(booking(b, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();
        repo.cancel_appointment(first.id, a).await.unwrap();

        let held = repo.booked_times(counselor, "2025-01-15").await.unwrap();
        assert_eq!(held, vec!["09:00".to_string()]);
    }

    #[tokio::test]
    async fn test_create_request_blocks_at_capacity() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        let req = repo.create_request(a, counselor, 1).await.unwrap();
        assert_eq!(req.status, RequestStatus::Pending);
        repo.decide(req.id, counselor, RequestAction::Accept, 1)
            .await
            .unwrap();

        let err = repo.create_request(b, counselor, 1).await.unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_, 1)));

        // Pending requests don't consume seats; only accepted ones do.
        assert!(repo.create_request(b, counselor, 2).await.is_ok());
    }

    #[tokio::test]
    async fn test_decide_is_terminal_and_owner_checked() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let student = Uuid::now_v7();

        let req = repo.create_request(student, counselor, 3).await.unwrap();

        let err = repo
            .decide(req.id, Uuid::now_v7(), RequestAction::Accept, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotOwner(_)));

        let decided = repo
            .decide(req.id, counselor, RequestAction::Reject, 3)
            .await
            .unwrap();
        assert_eq!(decided.status, RequestStatus::Rejected);

        let err = repo
            .decide(req.id, counselor, RequestAction::Accept, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = repo
            .decide(Uuid::now_v7(), counselor, RequestAction::Accept, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, _)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_accepts_respect_capacity() {
        let repo = Arc::new(mem_repo().await);
        let counselor = Uuid::now_v7();
        let capacity = 2u32;

        let mut pending = Vec::new();
        for _ in 0..5 {
            pending.push(
                repo.create_request(Uuid::now_v7(), counselor, capacity)
                    .await
                    .unwrap(),
            );
        }

        let mut handles = Vec::new();
        for req in pending {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.decide(req.id, counselor, RequestAction::Accept, capacity)
                    .await
            }));
        }

        let mut accepted = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(req) => {
                    assert_eq!(req.status, RequestStatus::Accepted);
                    accepted += 1;
                }
                Err(AppError::CapacityExceeded(_, _)) => refused += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(accepted, 2);
        assert_eq!(refused, 3);

        let live = repo
            .requests_by_counselor(counselor)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.status == RequestStatus::Accepted)
            .count();
        assert_eq!(live, 2);
    }

    #[tokio::test]
    async fn test_cancel_request_ownership_and_state() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let student = Uuid::now_v7();

        let req = repo.create_request(student, counselor, 3).await.unwrap();

        let err = repo.cancel_request(req.id, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::NotOwner(_)));

        repo.cancel_request(req.id, student).await.unwrap();
        let err = repo.cancel_request(req.id, student).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, _)));

        // A decided request can no longer be withdrawn.
        let req = repo.create_request(student, counselor, 3).await.unwrap();
        repo.decide(req.id, counselor, RequestAction::Accept, 3)
            .await
            .unwrap();
        let err = repo.cancel_request(req.id, student).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_latest_request_wins_regardless_of_status() {
        let repo = mem_repo().await;
        let student = Uuid::now_v7();
        let (c1, c2) = (Uuid::now_v7(), Uuid::now_v7());

        let first = repo.create_request(student, c1, 3).await.unwrap();
        repo.decide(first.id, c1, RequestAction::Reject, 3)
            .await
            .unwrap();
        let second = repo.create_request(student, c2, 3).await.unwrap();

        let latest = repo.requests_by_student(student, true).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, second.id);

        let all = repo.requests_by_student(student, false).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].status, RequestStatus::Rejected);
    }

    #[tokio::test]
    async fn test_directory_ordered_by_date_then_time() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let student = Uuid::now_v7();

        repo.set_availability(counselor, "2025-01-20", &["08:00".into()])
            .await
            .unwrap();
        repo.set_availability(counselor, "2025-01-15", &["09:00".into(), "14:00".into()])
            .await
            .unwrap();

        repo.book(booking(student, counselor, "2025-01-20", "08:00"))
            .await
            .unwrap();
        repo.book(booking(student, counselor, "2025-01-15", "14:00"))
            .await
            .unwrap();
        let canceled = repo
            .book(booking(student, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();
        repo.cancel_appointment(canceled.id, student).await.unwrap();

        // All statuses included, (date, time) ascending.
        let mine = repo.appointments_by_student(student).await.unwrap();
        let coords: Vec<(&str, &str)> = mine
            .iter()
            .map(|a| (a.date.as_str(), a.time.as_str()))
            .collect();
        assert_eq!(
            coords,
            vec![
                ("2025-01-15", "09:00"),
                ("2025-01-15", "14:00"),
                ("2025-01-20", "08:00"),
            ]
        );
        assert_eq!(repo.appointments_by_counselor(counselor).await.unwrap().len(), 3);
    }

    /// The end-to-end walkthrough: capacity gate, booking conflicts, and
    /// reschedule failures, in one sitting.
    #[tokio::test]
    async fn test_full_scheduling_scenario() {
        let repo = mem_repo().await;
        let counselor = Uuid::now_v7();
        let (student_a, student_b, student_c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

        let req_a = repo.create_request(student_a, counselor, 1).await.unwrap();
        repo.decide(req_a.id, counselor, RequestAction::Accept, 1)
            .await
            .unwrap();
        let err = repo.create_request(student_b, counselor, 1).await.unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_, 1)));

        repo.set_availability(counselor, "2025-01-15", &["09:00".into(), "09:30".into()])
            .await
            .unwrap();

        let appt_a = repo
            .book(booking(student_a, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap();
        let err = repo
            .book(booking(student_c, counselor, "2025-01-15", "09:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotTaken(_, _)));
        repo.book(booking(student_c, counselor, "2025-01-15", "09:30"))
            .await
            .unwrap();

        let err = repo
            .reschedule(appt_a.id, "2025-01-15", "09:30")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotTaken(_, _)));
        let err = repo
            .reschedule(appt_a.id, "2025-01-15", "10:00")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotUnavailable(_, _)));
    }
}
