//! Strict validation for the naive wall-clock tokens the engine schedules
//! against. Dates are `YYYY-MM-DD`, times are 24h `HH:MM`, both kept as
//! strings end to end — zero-padded, so lexicographic order is
//! chronological order. chrono only validates; it never converts to an
//! instant, since there is no timezone model here.

use chrono::{NaiveDate, NaiveTime};

use crate::error::{AppError, Result};

/// Validates a `YYYY-MM-DD` date token, including calendar validity.
pub fn validate_date(date: &str) -> Result<()> {
    // chrono's %Y accepts unpadded years, so pin the shape first.
    let shape_ok = date.len() == 10 && date.as_bytes()[4] == b'-' && date.as_bytes()[7] == b'-';
    if !shape_ok || NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(AppError::InvalidInput(format!(
            "malformed date token {date:?}, expected YYYY-MM-DD"
        )));
    }
    Ok(())
}

/// Validates a 24h `HH:MM` time-of-day token.
pub fn validate_time(time: &str) -> Result<()> {
    let shape_ok = time.len() == 5 && time.as_bytes()[2] == b':';
    if !shape_ok || NaiveTime::parse_from_str(time, "%H:%M").is_err() {
        return Err(AppError::InvalidInput(format!(
            "malformed time token {time:?}, expected 24h HH:MM"
        )));
    }
    Ok(())
}

/// Validates a whole slot list and returns it deduplicated and ascending.
/// An empty input is rejected: a day with no tokens is expressed by having
/// no availability entry at all.
pub fn normalize_slot_list(times: &[String]) -> Result<Vec<String>> {
    if times.is_empty() {
        return Err(AppError::InvalidInput(
            "availability must declare at least one time token".into(),
        ));
    }
    let mut out: Vec<String> = Vec::with_capacity(times.len());
    for t in times {
        validate_time(t)?;
        if !out.contains(t) {
            out.push(t.clone());
        }
    }
    out.sort();
    Ok(out)
}
