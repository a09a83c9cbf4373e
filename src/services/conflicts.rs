use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;

/// Half-open interval intersection: [a_start, a_end) and [b_start, b_end)
/// overlap iff a_start < b_end and b_start < a_end. A booking ending exactly
/// when another starts does not conflict.
pub fn intervals_overlap<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && b_start < a_end
}

/// True when any active booking for the provider collides with the proposed
/// interval. `exclude_booking_id` lets a reschedule look past itself.
///
/// Read-only; callers decide what a collision means (usually a 409).
pub fn has_overlap(
    conn: &Connection,
    provider_id: &str,
    start_utc: NaiveDateTime,
    end_utc: NaiveDateTime,
    exclude_booking_id: Option<&str>,
) -> anyhow::Result<bool> {
    queries::booking_overlap_exists(conn, provider_id, start_utc, end_utc, exclude_booking_id)
}
