use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, Method},
    response::Json,
    routing::get,
    serve, Router,
};
use bomwright_database::{initialize_catalog, CatalogStore, SqlitePool};
use bomwright_utils::{init_logging, AppConfig, PricingEngine};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod error;
mod handlers;
mod imports;
mod metrics;
mod middleware;
mod routes;
mod service;

use imports::{detect_master_file, spawn_session_sweeper, ImportRegistry};
use metrics::Metrics;
use middleware::*;
use service::BomAssemblyService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        AppConfig::default()
    });

    init_logging(&config.logging)?;
    info!("Starting Bomwright catalog service");

    let (pool, store) = initialize_catalog(&config.database, &config.backup).await?;
    info!(parts = store.count_parts().await?, "Catalog opened");

    let state = AppState::new(pool, store, config.clone())?;

    let working_dir = std::env::current_dir()?;
    match detect_master_file(&state.imports, &state.store, &working_dir).await {
        Ok(Some(session_id)) => info!(%session_id, "Master file awaiting review"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Master file could not be staged"),
    }

    spawn_session_sweeper(state.imports.clone(), Duration::from_secs(60));

    let app = create_app(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Catalog service listening on {}", addr);

    serve(listener, app).await?;

    Ok(())
}

fn create_app(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", routes::create_api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
                        .allow_headers([header::CONTENT_TYPE]),
                )
                .layer(DefaultBodyLimit::max(config.server.max_request_size))
                .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(
                    config.server.timeout_seconds,
                )))
                .layer(axum::middleware::from_fn(request_id_middleware)),
        )
        .with_state(state)
}

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub store: CatalogStore,
    pub imports: ImportRegistry,
    pub assembly: BomAssemblyService,
    pub metrics: Metrics,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(pool: SqlitePool, store: CatalogStore, config: AppConfig) -> Result<Self> {
        let engine = PricingEngine::from(&config.pricing);
        Ok(Self {
            pool,
            imports: ImportRegistry::new(config.import.clone()),
            assembly: BomAssemblyService::new(store.clone(), engine),
            metrics: Metrics::new(&config.monitoring.prometheus_namespace)?,
            store,
            config,
        })
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "bomwright-catalog-service",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.encode()
}
