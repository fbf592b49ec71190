use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use studyspace::config::AppConfig;
use studyspace::db;
use studyspace::handlers;
use studyspace::services::seed;
use studyspace::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.auto_seed {
        match seed::seed_database(&conn) {
            Ok(true) => tracing::info!("database seeded"),
            Ok(false) => tracing::debug!("seed skipped, database not empty"),
            Err(e) => tracing::error!(error = %e, "seeding failed"),
        }
    }

    let (events_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        events_tx,
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .client_origin
                .parse::<HeaderValue>()
                .context("invalid CLIENT_ORIGIN")?,
        )
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/rooms", get(handlers::rooms::list_rooms))
        .route("/api/rooms", post(handlers::rooms::create_room))
        .route("/api/rooms/:id", patch(handlers::rooms::update_room))
        .route("/api/rooms/:id", delete(handlers::rooms::delete_room))
        .route("/api/equipment", get(handlers::equipment::list_equipment))
        .route("/api/equipment", post(handlers::equipment::create_equipment))
        .route(
            "/api/equipment/:id",
            patch(handlers::equipment::update_equipment),
        )
        .route(
            "/api/equipment/:id",
            delete(handlers::equipment::delete_equipment),
        )
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/my", get(handlers::bookings::list_my_bookings))
        .route(
            "/api/bookings/:id",
            patch(handlers::bookings::update_booking),
        )
        .route(
            "/api/bookings/:id",
            delete(handlers::bookings::cancel_booking),
        )
        .route("/api/events", get(handlers::events::events_stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
