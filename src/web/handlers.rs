use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;

use super::{
    ApiError, ApiResult, AppState, HealthCheck, HealthResponse, ReplaceResponse, RequireAuth,
    StatusMessage,
};
use crate::models::{
    validate_set, Broker, ConfigEntry, ConfigKind, DismissIntent, FavoriteIntent, Filter, Listing,
    Notification,
};
use crate::orchestrator::{RunRecord, ScrapeOutcome};
use crate::repository::ConfigItem;
use crate::scheduler::Trigger;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = Instant::now();
    let database = match state.database.ping().await {
        Ok(()) => HealthCheck::healthy("database", start.elapsed().as_millis() as u64),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            HealthCheck::unhealthy("database", e.to_string())
        }
    };

    let health = HealthResponse::from_checks(vec![database]);
    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

// Listings

pub async fn list_listings(State(state): State<AppState>) -> ApiResult<Json<BTreeMap<String, Listing>>> {
    let listings = state.listings.get_all_by_address().await?;
    tracing::debug!(count = listings.len(), "Listings retrieved");
    Ok(Json(listings))
}

pub async fn set_favorite(
    State(state): State<AppState>,
    payload: Result<Json<FavoriteIntent>, JsonRejection>,
) -> ApiResult<Json<StatusMessage>> {
    let Json(intent) = payload?;
    require_address(&intent.address)?;

    state
        .listings
        .set_favorite(&intent.address, intent.is_favorite)
        .await?;

    tracing::info!(address = %intent.address, is_favorite = intent.is_favorite, "Favorite updated");
    Ok(Json(StatusMessage::ok()))
}

pub async fn set_dismissed(
    State(state): State<AppState>,
    payload: Result<Json<DismissIntent>, JsonRejection>,
) -> ApiResult<Json<StatusMessage>> {
    let Json(intent) = payload?;
    require_address(&intent.address)?;

    state
        .listings
        .set_dismissed(&intent.address, intent.is_dismissed)
        .await?;

    tracing::info!(address = %intent.address, is_dismissed = intent.is_dismissed, "Dismissal updated");
    Ok(Json(StatusMessage::ok()))
}

fn require_address(address: &str) -> ApiResult<()> {
    if address.trim().is_empty() {
        return Err(ApiError::bad_request("address is required"));
    }
    Ok(())
}

// Configuration sets

pub async fn list_brokers(State(state): State<AppState>) -> ApiResult<Json<Vec<Broker>>> {
    list_set(&state).await
}

pub async fn replace_brokers(
    State(state): State<AppState>,
    auth: RequireAuth,
    payload: Result<Json<Vec<Broker>>, JsonRejection>,
) -> ApiResult<Json<ReplaceResponse>> {
    replace_set(&state, auth, ConfigKind::Brokers, payload).await
}

pub async fn list_filters(State(state): State<AppState>) -> ApiResult<Json<Vec<Filter>>> {
    list_set(&state).await
}

pub async fn replace_filters(
    State(state): State<AppState>,
    auth: RequireAuth,
    payload: Result<Json<Vec<Filter>>, JsonRejection>,
) -> ApiResult<Json<ReplaceResponse>> {
    replace_set(&state, auth, ConfigKind::Filters, payload).await
}

pub async fn list_notifications(State(state): State<AppState>) -> ApiResult<Json<Vec<Notification>>> {
    list_set(&state).await
}

pub async fn replace_notifications(
    State(state): State<AppState>,
    auth: RequireAuth,
    payload: Result<Json<Vec<Notification>>, JsonRejection>,
) -> ApiResult<Json<ReplaceResponse>> {
    replace_set(&state, auth, ConfigKind::Notifications, payload).await
}

async fn list_set<T: ConfigItem>(state: &AppState) -> ApiResult<Json<Vec<T>>> {
    Ok(Json(state.config_store.list::<T>().await?))
}

async fn replace_set<T: ConfigItem + ConfigEntry>(
    state: &AppState,
    auth: RequireAuth,
    kind: ConfigKind,
    payload: Result<Json<Vec<T>>, JsonRejection>,
) -> ApiResult<Json<ReplaceResponse>> {
    let Json(items) = payload?;
    validate_set(kind, &items)?;

    let count = state.config_store.replace(&items).await?;
    tracing::info!(%kind, count, user = %auth.username, "Configuration set replaced via API");
    Ok(Json(ReplaceResponse::new(count)))
}

// Scraper

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub notify: bool,
}

/// Runs the scraper and waits for it. The body is optional; an empty body
/// means a quiet run.
pub async fn trigger_scrape(
    State(state): State<AppState>,
    _auth: RequireAuth,
    body: Bytes,
) -> ApiResult<Json<ScrapeOutcome>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ScrapeRequest::default()
    } else {
        serde_json::from_slice::<ScrapeRequest>(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid scrape request: {}", e)))?
    };

    if state.orchestrator.is_running() {
        tracing::info!("Manual scrape queued behind a run in progress");
    }

    let outcome = state.orchestrator.run(request.notify).await?;
    tracing::info!(trigger = %Trigger::Manual, run_id = %outcome.run_id, "Scrape completed");
    Ok(Json(outcome))
}

pub async fn last_scrape(State(state): State<AppState>) -> Json<Option<RunRecord>> {
    Json(state.orchestrator.last_run().await)
}
