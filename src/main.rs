//! Staff Records Service
//!
//! Caches the employee roster and attendance log in SQLite, refreshes them from
//! remote CSV files and serves filtered tables to the browser pages.

mod api;
mod config;
mod db;
mod errors;
mod models;
mod sync;
mod tabular;
mod views;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::{QuerySurface, RecordStore};
use sync::{NetworkStatus, SourceLocators, SyncEngine};
use views::Presenter;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub queries: QuerySurface,
    pub sync: Arc<SyncEngine>,
    pub presenter: Arc<Presenter>,
    pub network: Arc<NetworkStatus>,
}

impl AppState {
    /// Wire the store, sync engine and presenter together.
    pub fn new(store: Arc<RecordStore>, config: &Config) -> Self {
        let network = Arc::new(NetworkStatus::new(!config.offline));
        let sources = SourceLocators {
            roster: config.roster_url.clone(),
            attendance: config.attendance_url.clone(),
        };
        let queries = QuerySurface::new(store.clone());

        Self {
            sync: Arc::new(SyncEngine::new(store.clone(), network.clone(), sources)),
            presenter: Arc::new(Presenter::new(queries.clone())),
            queries,
            store,
            network,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Staff Records Service");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Roster source: {}", config.roster_url);
    tracing::info!("Attendance source: {}", config.attendance_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize record store
    let store = Arc::new(RecordStore::open(&config.db_path).await?);

    let state = AppState::new(store, &config);

    if config.sync_on_start {
        spawn_startup_sync(state.clone());
    }

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Refresh both collections in the background; cached data is served meanwhile.
fn spawn_startup_sync(state: AppState) {
    tokio::spawn(async move {
        let report = state.sync.sync_all().await;
        let updated = api::updated_collections(&report);
        for collection in &updated {
            state.presenter.refresh(*collection).await;
        }
        if report.offline {
            tracing::info!("Startup sync skipped: offline");
        } else {
            tracing::info!("Startup sync updated {:?}", updated);
        }
    });
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Collections
        .route("/collections/{name}/records", get(api::list_records))
        .route("/collections/{name}/last-updated", get(api::last_updated))
        .route("/collections/{name}/upload", post(api::upload_collection))
        .route("/collections/{name}/sync", post(api::sync_collection))
        // Sync
        .route("/sync", post(api::sync_all))
        .route("/network", get(api::get_network).put(api::set_network))
        // Views
        .route("/roster", get(api::roster_view))
        .route("/roster/export", get(api::roster_export))
        .route("/attendance", get(api::attendance_view));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
