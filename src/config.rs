use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Lifetime of issued bearer tokens, in days.
    pub token_ttl_days: i64,
    /// Horizon scanned by an availability query when the caller omits `days_ahead`.
    pub default_days_ahead: i64,
    /// Slot length used when the caller names neither `slot_minutes` nor a service.
    pub default_slot_minutes: i64,
    /// Upper bound accepted for `days_ahead`.
    pub max_days_ahead: i64,
    /// Booking-event webhook endpoint; empty disables outbound notifications.
    pub webhook_url: String,
    pub webhook_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "slotbook.db".to_string()),
            token_ttl_days: env::var("TOKEN_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            default_days_ahead: env::var("DEFAULT_DAYS_AHEAD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            default_slot_minutes: env::var("DEFAULT_SLOT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            max_days_ahead: env::var("MAX_DAYS_AHEAD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(365),
            webhook_url: env::var("WEBHOOK_URL").unwrap_or_default(),
            webhook_secret: env::var("WEBHOOK_SECRET").unwrap_or_default(),
        }
    }
}
