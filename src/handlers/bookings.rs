use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::authenticate;
use crate::models::{Booking, BookingStatus, TimeOfDay};
use crate::services::bookings;
use crate::services::notify::BookingEvent;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    user_id: String,
    provider_id: String,
    service_id: String,
    start_time: String,
    end_time: String,
    status: String,
    cancelled_at: Option<String>,
    notes: Option<String>,
    created_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        BookingResponse {
            id: b.id,
            user_id: b.user_id,
            provider_id: b.provider_id,
            service_id: b.service_id,
            start_time: queries::format_datetime(b.start_time),
            end_time: queries::format_datetime(b.end_time),
            status: b.status.as_str().to_string(),
            cancelled_at: b.cancelled_at.map(queries::format_datetime),
            notes: b.notes,
            created_at: queries::format_datetime(b.created_at),
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidArgument(format!("invalid date: {s}")))
}

fn parse_start(s: &str) -> Result<TimeOfDay, AppError> {
    s.parse().map_err(AppError::InvalidArgument)
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub provider_id: String,
    pub service_id: String,
    pub date: String,
    pub start: String,
    pub notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let now_utc = state.clock.now_utc();

    let booking = {
        let db = state.db.lock().unwrap();
        let user = authenticate(&db, now_utc.naive_utc(), &headers)?;

        let request = bookings::NewBooking {
            provider_id: req.provider_id,
            service_id: req.service_id,
            date: parse_date(&req.date)?,
            start: parse_start(&req.start)?,
            notes: req.notes,
        };
        // guard and insert run under one lock hold, so a racing request
        // cannot slip in between the check and the write
        bookings::reserve(&db, now_utc, &user.id, &request)?
    };

    tracing::info!(booking_id = %booking.id, provider_id = %booking.provider_id, "booking created");

    if let Err(e) = state
        .notifier
        .booking_event(BookingEvent::Created, &booking)
        .await
    {
        tracing::warn!(error = %e, "failed to deliver booking notification");
    }

    Ok((StatusCode::CREATED, Json(booking.into())))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    if let Some(ref status) = query.status {
        if BookingStatus::parse(status).is_none() {
            return Err(AppError::InvalidArgument(format!("unknown status: {status}")));
        }
    }
    let limit = query.limit.unwrap_or(50).clamp(1, 200);

    let now = state.clock.now_utc().naive_utc();
    let rows = {
        let db = state.db.lock().unwrap();
        let user = authenticate(&db, now, &headers)?;
        queries::list_bookings_for_user(&db, &user.id, query.status.as_deref(), limit)?
    };
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let now = state.clock.now_utc().naive_utc();
    let booking = {
        let db = state.db.lock().unwrap();
        let user = authenticate(&db, now, &headers)?;

        let booking = queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;
        if booking.user_id != user.id {
            return Err(AppError::Unauthorized);
        }
        booking
    };
    Ok(Json(booking.into()))
}

// PATCH /api/bookings/:id
#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub date: String,
    pub start: String,
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let now_utc = state.clock.now_utc();

    let booking = {
        let db = state.db.lock().unwrap();
        let user = authenticate(&db, now_utc.naive_utc(), &headers)?;
        bookings::reschedule(
            &db,
            now_utc,
            &user,
            &id,
            parse_date(&req.date)?,
            parse_start(&req.start)?,
        )?
    };

    tracing::info!(booking_id = %booking.id, "booking rescheduled");

    if let Err(e) = state
        .notifier
        .booking_event(BookingEvent::Rescheduled, &booking)
        .await
    {
        tracing::warn!(error = %e, "failed to deliver booking notification");
    }

    Ok(Json(booking.into()))
}

// DELETE /api/bookings/:id
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let now_utc = state.clock.now_utc();

    let (booking, newly_cancelled) = {
        let db = state.db.lock().unwrap();
        let user = authenticate(&db, now_utc.naive_utc(), &headers)?;
        bookings::cancel(&db, now_utc, &user, &id)?
    };

    // a retried DELETE answers the same way but does not notify again
    if newly_cancelled {
        tracing::info!(booking_id = %booking.id, "booking cancelled");

        if let Err(e) = state
            .notifier
            .booking_event(BookingEvent::Cancelled, &booking)
            .await
        {
            tracing::warn!(error = %e, "failed to deliver booking notification");
        }
    }

    Ok(Json(booking.into()))
}
