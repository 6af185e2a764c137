use axum::{
    middleware::from_fn,
    routing::{get, patch},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::{SecurityConfig, ServerConfig};
use crate::database::Database;
use crate::orchestrator::ScraperOrchestrator;
use crate::repository::{ConfigStore, ListingRepository};

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use handlers::{
    health_check, last_scrape, list_brokers, list_filters, list_listings, list_notifications,
    replace_brokers, replace_filters, replace_notifications, set_dismissed, set_favorite,
    trigger_scrape,
};
pub use middleware::{request_logging, BasicCredentials, RequireAuth};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub listings: ListingRepository,
    pub config_store: ConfigStore,
    pub orchestrator: Arc<ScraperOrchestrator>,
    /// Credentials for guarded endpoints. `None` locks them entirely.
    pub auth: Option<BasicCredentials>,
}

impl AppState {
    pub fn new(
        database: Database,
        orchestrator: Arc<ScraperOrchestrator>,
        security: &SecurityConfig,
    ) -> Self {
        let auth = security
            .credentials()
            .map(|(user, pass)| BasicCredentials::new(user, pass));
        if auth.is_none() {
            tracing::warn!("No API credentials configured; configuration changes and manual scrapes are disabled");
        }

        Self {
            listings: database.listings(),
            config_store: database.config_store(),
            database,
            orchestrator,
            auth,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(from_fn(request_logging)),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/listings", get(list_listings))
        .route("/favorite", patch(set_favorite))
        .route("/dismiss", patch(set_dismissed))
        .route("/brokers", get(list_brokers).patch(replace_brokers))
        .route("/filters", get(list_filters).patch(replace_filters))
        .route("/notifications", get(list_notifications).patch(replace_notifications))
        .route("/scrape", get(last_scrape).post(trigger_scrape))
}

/// Binds and serves until `shutdown` resolves.
pub async fn serve<F>(config: &ServerConfig, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;

    tracing::info!(
        address = %listener.local_addr()?,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
