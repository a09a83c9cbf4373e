use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::handlers;
use slotbook::services::clock::SystemClock;
use slotbook::services::notify::{NoopNotifier, Notifier, WebhookNotifier};
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn Notifier> = if config.webhook_url.is_empty() {
        tracing::info!("no webhook URL configured, booking notifications disabled");
        Box::new(NoopNotifier)
    } else {
        tracing::info!("delivering booking notifications to {}", config.webhook_url);
        Box::new(WebhookNotifier::new(
            config.webhook_url.clone(),
            config.webhook_secret.clone(),
        ))
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        clock: Box::new(SystemClock),
        notifier,
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/providers", get(handlers::providers::list_providers))
        .route("/api/providers", post(handlers::providers::create_provider))
        .route("/api/providers/:id", get(handlers::providers::get_provider))
        .route(
            "/api/providers/:id/services",
            get(handlers::providers::list_services),
        )
        .route(
            "/api/providers/:id/services",
            post(handlers::providers::create_service),
        )
        .route(
            "/api/providers/:id/working-hours",
            get(handlers::providers::get_working_hours),
        )
        .route(
            "/api/providers/:id/working-hours",
            put(handlers::providers::put_working_hours),
        )
        .route(
            "/api/providers/:id/availability",
            get(handlers::providers::get_availability),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id",
            patch(handlers::bookings::reschedule_booking),
        )
        .route(
            "/api/bookings/:id",
            delete(handlers::bookings::cancel_booking),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
