use chrono::NaiveDateTime;
use serde::Serialize;

/// An offering with a fixed duration. When a slot query names a service,
/// its duration overrides the requested slot length.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: String,
    pub provider_id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: Option<i64>,
    pub created_at: NaiveDateTime,
}
