use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::authenticate;
use crate::models::{DayOfWeek, Provider, Service, Slot, TimeOfDay, WorkingHourWindow};
use crate::services::availability;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProviderResponse {
    id: String,
    name: String,
    description: Option<String>,
    timezone: String,
    created_by: String,
    created_at: String,
}

impl From<Provider> for ProviderResponse {
    fn from(p: Provider) -> Self {
        ProviderResponse {
            id: p.id,
            name: p.name,
            description: p.description,
            timezone: p.timezone,
            created_by: p.created_by,
            created_at: queries::format_datetime(p.created_at),
        }
    }
}

// POST /api/providers
#[derive(Deserialize)]
pub struct CreateProviderRequest {
    pub name: String,
    pub description: Option<String>,
    pub timezone: Option<String>,
}

pub async fn create_provider(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateProviderRequest>,
) -> Result<(StatusCode, Json<ProviderResponse>), AppError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::InvalidArgument("name must not be empty".to_string()));
    }

    let timezone = match req.timezone.as_deref().map(str::trim) {
        None | Some("") => "UTC".to_string(),
        Some(zone) => {
            if zone.parse::<chrono_tz::Tz>().is_err() {
                return Err(AppError::InvalidArgument(format!("unknown timezone: {zone}")));
            }
            zone.to_string()
        }
    };

    let now = state.clock.now_utc().naive_utc();
    let provider = {
        let db = state.db.lock().unwrap();
        let user = authenticate(&db, now, &headers)?;

        let provider = Provider {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description: req.description,
            timezone,
            created_by: user.id,
            created_at: now,
        };
        queries::create_provider(&db, &provider)?;
        provider
    };

    tracing::info!(provider_id = %provider.id, "provider created");

    Ok((StatusCode::CREATED, Json(provider.into())))
}

// GET /api/providers
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProviderResponse>>, AppError> {
    let providers = {
        let db = state.db.lock().unwrap();
        queries::list_providers(&db)?
    };
    Ok(Json(providers.into_iter().map(Into::into).collect()))
}

// GET /api/providers/:id
pub async fn get_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProviderResponse>, AppError> {
    let provider = {
        let db = state.db.lock().unwrap();
        queries::get_provider(&db, &id)?
    };
    provider
        .map(|p| Json(p.into()))
        .ok_or_else(|| AppError::NotFound(format!("provider {id} not found")))
}

#[derive(Serialize)]
pub struct ServiceResponse {
    id: String,
    provider_id: String,
    name: String,
    duration_minutes: i64,
    price_cents: Option<i64>,
}

impl From<Service> for ServiceResponse {
    fn from(s: Service) -> Self {
        ServiceResponse {
            id: s.id,
            provider_id: s.provider_id,
            name: s.name,
            duration_minutes: s.duration_minutes,
            price_cents: s.price_cents,
        }
    }
}

// POST /api/providers/:id/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: Option<i64>,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(provider_id): Path<String>,
    Json(req): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ServiceResponse>), AppError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::InvalidArgument("name must not be empty".to_string()));
    }
    if req.duration_minutes <= 0 || req.duration_minutes > 1440 {
        return Err(AppError::InvalidArgument(
            "duration_minutes must be between 1 and 1440".to_string(),
        ));
    }

    let now = state.clock.now_utc().naive_utc();
    let service = {
        let db = state.db.lock().unwrap();
        let user = authenticate(&db, now, &headers)?;

        let provider = queries::get_provider(&db, &provider_id)?
            .ok_or_else(|| AppError::NotFound(format!("provider {provider_id} not found")))?;
        if provider.created_by != user.id {
            return Err(AppError::Forbidden);
        }

        let service = Service {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: provider.id,
            name,
            duration_minutes: req.duration_minutes,
            price_cents: req.price_cents,
            created_at: now,
        };
        queries::create_service(&db, &service)?;
        service
    };

    Ok((StatusCode::CREATED, Json(service.into())))
}

// GET /api/providers/:id/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> Result<Json<Vec<ServiceResponse>>, AppError> {
    let services = {
        let db = state.db.lock().unwrap();
        queries::get_provider(&db, &provider_id)?
            .ok_or_else(|| AppError::NotFound(format!("provider {provider_id} not found")))?;
        queries::list_services_for_provider(&db, &provider_id)?
    };
    Ok(Json(services.into_iter().map(Into::into).collect()))
}

// PUT /api/providers/:id/working-hours
#[derive(Deserialize)]
pub struct WorkingHoursRequest {
    pub windows: Vec<WindowSpec>,
}

#[derive(Deserialize)]
pub struct WindowSpec {
    pub day_of_week: i64,
    pub start: String,
    pub end: String,
}

pub async fn put_working_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(provider_id): Path<String>,
    Json(req): Json<WorkingHoursRequest>,
) -> Result<Json<Vec<WorkingHourWindow>>, AppError> {
    let mut windows: Vec<WorkingHourWindow> = Vec::with_capacity(req.windows.len());
    for (i, spec) in req.windows.iter().enumerate() {
        let day_of_week = DayOfWeek::from_index(spec.day_of_week).ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "window {i}: day_of_week must be 0 (Sunday) through 6 (Saturday)"
            ))
        })?;
        let start: TimeOfDay = spec
            .start
            .parse()
            .map_err(|e| AppError::InvalidArgument(format!("window {i}: {e}")))?;
        let end: TimeOfDay = spec
            .end
            .parse()
            .map_err(|e| AppError::InvalidArgument(format!("window {i}: {e}")))?;
        if start >= end {
            return Err(AppError::InvalidArgument(format!(
                "window {i}: start must be before end"
            )));
        }

        windows.push(WorkingHourWindow {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: provider_id.clone(),
            day_of_week,
            start,
            end,
        });
    }

    // same-day windows must not overlap each other
    for i in 0..windows.len() {
        for j in (i + 1)..windows.len() {
            if windows[i].overlaps(&windows[j]) {
                return Err(AppError::Conflict(format!(
                    "windows {i} and {j} overlap on the same day"
                )));
            }
        }
    }

    let now = state.clock.now_utc().naive_utc();
    let saved = {
        let db = state.db.lock().unwrap();
        let user = authenticate(&db, now, &headers)?;

        let provider = queries::get_provider(&db, &provider_id)?
            .ok_or_else(|| AppError::NotFound(format!("provider {provider_id} not found")))?;
        if provider.created_by != user.id {
            return Err(AppError::Forbidden);
        }

        queries::replace_working_hours(&db, &provider_id, &windows)?;
        queries::list_working_hours(&db, &provider_id)?
    };

    tracing::info!(provider_id = %provider_id, windows = saved.len(), "working hours replaced");

    Ok(Json(saved))
}

// GET /api/providers/:id/working-hours
pub async fn get_working_hours(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> Result<Json<Vec<WorkingHourWindow>>, AppError> {
    let windows = {
        let db = state.db.lock().unwrap();
        queries::get_provider(&db, &provider_id)?
            .ok_or_else(|| AppError::NotFound(format!("provider {provider_id} not found")))?;
        queries::list_working_hours(&db, &provider_id)?
    };
    Ok(Json(windows))
}

// GET /api/providers/:id/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub days_ahead: Option<i64>,
    pub slot_minutes: Option<i64>,
    pub service_id: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    data: Vec<Slot>,
    page: i64,
    per_page: i64,
    total: i64,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let days_ahead = query.days_ahead.unwrap_or(state.config.default_days_ahead);
    let slot_minutes = query.slot_minutes.unwrap_or(state.config.default_slot_minutes);
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 500);
    let service_id = query.service_id.as_deref().filter(|s| !s.is_empty());

    let slots = {
        let db = state.db.lock().unwrap();
        let provider = queries::get_provider(&db, &provider_id)?
            .ok_or_else(|| AppError::NotFound(format!("provider {provider_id} not found")))?;
        availability::generate_available_slots(
            &db,
            state.clock.now_utc(),
            &provider,
            days_ahead,
            state.config.max_days_ahead,
            slot_minutes,
            service_id,
        )?
    };

    let total = slots.len() as i64;
    // absurd page numbers land on an empty page, not an overflow
    let data: Vec<Slot> = slots
        .into_iter()
        .skip(page.saturating_sub(1).saturating_mul(per_page) as usize)
        .take(per_page as usize)
        .collect();

    Ok(Json(AvailabilityResponse {
        data,
        page,
        per_page,
        total,
    }))
}
