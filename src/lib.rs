pub mod api;
pub mod app_state;
pub mod config;
pub mod gate;
pub mod kiosk;
pub mod storage;

use axum::Router;
use axum::extract::Extension;
use axum::routing::{get, post};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

//
// Re-export
//
pub use api::{
    append_record, issue_credential, ledger_stats, log_request_errors, verify_credential,
};
pub use app_state::AppState;
pub use config::Config;
pub use gate::{
    AdmissionGate, AdmissionOutcome, AdmissionRequest, AdmissionWindow, ConsumptionLedger,
    EventInstanceKey, EventSchedule, LedgerError, Rejection, authenticate, compute_token,
};
pub use kiosk::KioskSchedule;
pub use storage::{StorageBackend, StorageConfig};

/// Build application state from a validated configuration
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let storage_config = config.to_storage_config()?;
    match &storage_config.backend {
        StorageBackend::Local => {
            info!(workspace = %config.workspace, "Using local filesystem ledger")
        }
        StorageBackend::S3 { bucket, .. } => info!(bucket, "Using S3 ledger"),
        StorageBackend::Memory => info!("Using in-memory ledger"),
    }

    AppState::new(
        &storage_config,
        config.admission_window(),
        config.timezone()?,
        config.secret(),
        config.kiosk_config.as_ref().map(PathBuf::from),
    )
}

/// External routes: the verification link guests open
pub fn external_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/q/{serial}", get(verify_credential))
        .layer(axum::middleware::from_fn(api::log_request_errors))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

/// Internal routes: credential issuance and ledger management for the kiosk
pub fn internal_router(state: AppState) -> Router {
    Router::new()
        .route("/credentials", post(issue_credential))
        .route("/records", post(append_record))
        .route("/ledger", get(ledger_stats))
        .layer(axum::middleware::from_fn(api::log_request_errors))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config)?;

    let external_app = external_router(state.clone());
    let internal_app = internal_router(state);

    // Start external API server
    let external_addr = format!("0.0.0.0:{}", config.listen_on_port);
    info!("External API listening on {external_addr}");
    let external_listener = TcpListener::bind(&external_addr).await?;

    // Start internal API server
    let internal_addr = format!("0.0.0.0:{}", config.internal_port);
    info!("Internal API listening on {internal_addr}");
    let internal_listener = TcpListener::bind(&internal_addr).await?;

    // Run both servers concurrently
    tokio::select! {
        result = axum::serve(external_listener, external_app) => result?,
        result = axum::serve(internal_listener, internal_app) => result?,
    }

    Ok(())
}
