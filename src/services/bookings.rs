use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, TimeOfDay, User};
use crate::services::availability::{local_instant, resolve_timezone};
use crate::services::conflicts;

/// A reservation request. `date` and `start` are wall-clock values in the
/// provider's timezone; the service fixes the duration.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub provider_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub notes: Option<String>,
}

/// Creates a booking after running the conflict guard. The caller holds the
/// connection lock for the whole call, so no other request can slip a
/// booking in between the check and the insert.
pub fn reserve(
    conn: &Connection,
    now_utc: DateTime<Utc>,
    user_id: &str,
    req: &NewBooking,
) -> Result<Booking, AppError> {
    let provider = queries::get_provider(conn, &req.provider_id)?
        .ok_or_else(|| AppError::NotFound(format!("provider {} not found", req.provider_id)))?;
    let service = queries::get_service(conn, &req.service_id)?
        .filter(|s| s.provider_id == provider.id)
        .ok_or_else(|| AppError::NotFound(format!("service {} not found", req.service_id)))?;

    let (start_utc, end_utc) =
        resolve_interval(&provider.timezone, req.date, req.start, service.duration_minutes)?;

    if start_utc <= now_utc {
        return Err(AppError::InvalidArgument(
            "booking start must be in the future".to_string(),
        ));
    }

    if conflicts::has_overlap(
        conn,
        &provider.id,
        start_utc.naive_utc(),
        end_utc.naive_utc(),
        None,
    )? {
        return Err(AppError::SlotConflict);
    }

    let now = now_utc.naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        provider_id: provider.id,
        service_id: service.id,
        start_time: start_utc.naive_utc(),
        end_time: end_utc.naive_utc(),
        status: BookingStatus::Booked,
        cancelled_at: None,
        notes: req.notes.clone(),
        created_at: now,
        updated_at: now,
    };
    queries::create_booking(conn, &booking)?;

    Ok(booking)
}

/// Moves an active booking to a new provider-local (date, start). The
/// interval keeps the service's duration; the guard ignores the booking
/// itself so moving within the old interval works.
pub fn reschedule(
    conn: &Connection,
    now_utc: DateTime<Utc>,
    user: &User,
    booking_id: &str,
    date: NaiveDate,
    start: TimeOfDay,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;
    if booking.user_id != user.id {
        return Err(AppError::Unauthorized);
    }
    if !booking.blocks_calendar() {
        return Err(AppError::InvalidArgument(
            "cannot reschedule a cancelled booking".to_string(),
        ));
    }

    let provider = queries::get_provider(conn, &booking.provider_id)?.ok_or_else(|| {
        AppError::Database(anyhow::anyhow!(
            "provider {} missing for booking {booking_id}",
            booking.provider_id
        ))
    })?;
    let service = queries::get_service(conn, &booking.service_id)?.ok_or_else(|| {
        AppError::Database(anyhow::anyhow!(
            "service {} missing for booking {booking_id}",
            booking.service_id
        ))
    })?;

    let (start_utc, end_utc) =
        resolve_interval(&provider.timezone, date, start, service.duration_minutes)?;

    if start_utc <= now_utc {
        return Err(AppError::InvalidArgument(
            "booking start must be in the future".to_string(),
        ));
    }

    if conflicts::has_overlap(
        conn,
        &provider.id,
        start_utc.naive_utc(),
        end_utc.naive_utc(),
        Some(booking_id),
    )? {
        return Err(AppError::SlotConflict);
    }

    let now = now_utc.naive_utc();
    queries::update_booking_times(conn, booking_id, start_utc.naive_utc(), end_utc.naive_utc(), now)?;

    Ok(Booking {
        start_time: start_utc.naive_utc(),
        end_time: end_utc.naive_utc(),
        updated_at: now,
        ..booking
    })
}

/// Soft delete. Returns the row plus whether this call performed the
/// cancellation; cancelling an already-cancelled booking is a no-op.
pub fn cancel(
    conn: &Connection,
    now_utc: DateTime<Utc>,
    user: &User,
    booking_id: &str,
) -> Result<(Booking, bool), AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;
    if booking.user_id != user.id {
        return Err(AppError::Unauthorized);
    }
    if !booking.blocks_calendar() {
        return Ok((booking, false));
    }

    let now = now_utc.naive_utc();
    queries::cancel_booking(conn, booking_id, now)?;

    Ok((
        Booking {
            status: BookingStatus::Cancelled,
            cancelled_at: Some(now),
            updated_at: now,
            ..booking
        },
        true,
    ))
}

fn resolve_interval(
    timezone: &str,
    date: NaiveDate,
    start: TimeOfDay,
    duration_minutes: i64,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    if start >= TimeOfDay::END_OF_DAY {
        return Err(AppError::InvalidArgument(
            "start must be a time of day before 24:00".to_string(),
        ));
    }
    // bounds match the availability engine; huge values overflow
    // chrono::Duration
    if !(1..=TimeOfDay::END_OF_DAY.minutes()).contains(&duration_minutes) {
        return Err(AppError::InvalidArgument(
            "service duration must be between 1 and 1440 minutes".to_string(),
        ));
    }
    let tz = resolve_timezone(timezone)?;
    let start_utc = local_instant(tz, date, start.minutes()).ok_or_else(|| {
        AppError::InvalidArgument(format!(
            "{date} {start} does not exist in timezone {timezone}"
        ))
    })?;
    Ok((start_utc, start_utc + Duration::minutes(duration_minutes)))
}
