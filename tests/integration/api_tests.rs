use super::*;
use axum::http::{Method, StatusCode};
use listing_watcher::models::{Broker, Filter, FilterType, Listing, Notification};
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let mut app = listing_watcher::web::create_router(ctx.state);

    let response = make_request(&mut app, Method::GET, "/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = read_json(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"][0]["name"], "database");
    Ok(())
}

#[tokio::test]
async fn test_listings_start_empty() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let mut app = listing_watcher::web::create_router(ctx.state);

    let response = make_request(&mut app, Method::GET, "/v1/listings", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let listings: BTreeMap<String, Listing> = read_json(response).await?;
    assert!(listings.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_listing_json_shape() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    ctx.state
        .listings
        .ingest(&[scraped("12 Beacon St #3", 3300, 1_725_000_000_000_000_000)])
        .await?;
    let mut app = listing_watcher::web::create_router(ctx.state);

    let response = make_request(&mut app, Method::GET, "/v1/listings", None).await?;
    let body: Value = read_json(response).await?;

    let listing = &body["12 Beacon St #3"];
    assert_eq!(listing["price"], 3300);
    assert_eq!(listing["isFavorite"], false);
    assert_eq!(listing["isDismissed"], false);
    assert_eq!(listing["refs"], json!(["https://ygl.is/rental/3300"]));
    assert!(listing.get("address").is_none());
    Ok(())
}

#[tokio::test]
async fn test_favorite_unknown_address_is_404() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let mut app = listing_watcher::web::create_router(ctx.state);

    let body = json!({"address": "1 Nowhere Ln", "isFavorite": true});
    let response = make_request(&mut app, Method::PATCH, "/v1/favorite", Some(body.to_string())).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = read_json(response).await?;
    assert!(body["error"].as_str().unwrap().contains("1 Nowhere Ln"));
    Ok(())
}

#[tokio::test]
async fn test_favorite_and_dismiss_toggle() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let listings = ctx.state.listings.clone();
    listings.ingest(&[scraped("5 Pine St", 2800, 1)]).await?;
    let mut app = listing_watcher::web::create_router(ctx.state);

    let favorite = json!({"address": "5 Pine St", "isFavorite": true});
    let response = make_request(&mut app, Method::PATCH, "/v1/favorite", Some(favorite.to_string())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Same intent twice leaves the same state.
    let response = make_request(&mut app, Method::PATCH, "/v1/favorite", Some(favorite.to_string())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let dismiss = json!({"address": "5 Pine St", "isDismissed": true});
    let response = make_request(&mut app, Method::PATCH, "/v1/dismiss", Some(dismiss.to_string())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let listing = listings.get("5 Pine St").await?.unwrap();
    assert!(listing.is_favorite);
    assert!(listing.is_dismissed);
    Ok(())
}

#[tokio::test]
async fn test_malformed_favorite_is_400() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let mut app = listing_watcher::web::create_router(ctx.state);

    let response = make_request(&mut app, Method::PATCH, "/v1/favorite", Some("{not json".to_string())).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let missing_flag = json!({"address": "5 Pine St"});
    let response = make_request(&mut app, Method::PATCH, "/v1/favorite", Some(missing_flag.to_string())).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = read_json(response).await?;
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_config_patch_requires_auth() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let mut app = listing_watcher::web::create_router(ctx.state);
    let body = json!([{"url": "https://ygl.is/99333", "name": "North"}]).to_string();

    for uri in ["/v1/brokers", "/v1/filters", "/v1/notifications"] {
        let response = make_request(&mut app, Method::PATCH, uri, Some(body.clone())).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);

        let error: Value = read_json(response).await?;
        assert_eq!(error, json!({"error": "Unauthorized"}));
    }

    let wrong = BasicCredentials::new(TEST_USER, "wrong");
    let response = make_authed_request(&mut app, Method::PATCH, "/v1/brokers", Some(body), &wrong).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_guarded_endpoints_locked_without_configured_credentials() -> anyhow::Result<()> {
    let (database, _dir) = create_test_db().await?;
    let orchestrator = Arc::new(ScraperOrchestrator::new(Arc::new(NoopRunner), Duration::from_secs(5)));
    let security = SecurityConfig {
        auth_user: None,
        auth_pass: None,
    };
    let state = AppState::new(database, orchestrator, &security);
    let mut app = listing_watcher::web::create_router(state);

    let response = make_authed_request(
        &mut app,
        Method::PATCH,
        "/v1/notifications",
        Some("[]".to_string()),
        &test_credentials(),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_brokers_replace_and_read_back() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let mut app = listing_watcher::web::create_router(ctx.state);
    let creds = test_credentials();

    let first = json!([
        {"url": "https://ygl.is/99333", "name": "North"},
        {"url": "https://ygl.is/99334", "name": "South"}
    ]);
    let response = make_authed_request(&mut app, Method::PATCH, "/v1/brokers", Some(first.to_string()), &creds).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await?;
    assert_eq!(body["count"], 2);

    let second = json!([{"url": "https://ygl.is/11111", "name": "Only"}]);
    make_authed_request(&mut app, Method::PATCH, "/v1/brokers", Some(second.to_string()), &creds).await?;

    // GET is open.
    let response = make_request(&mut app, Method::GET, "/v1/brokers", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let brokers: Vec<Broker> = read_json(response).await?;
    assert_eq!(brokers, vec![Broker::new("https://ygl.is/11111", "Only")]);
    Ok(())
}

#[tokio::test]
async fn test_filters_replace_and_read_back() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let mut app = listing_watcher::web::create_router(ctx.state);

    let filters = json!([
        {"name": "bedsMin", "value": "2", "type": "integer"},
        {"name": "priceMax", "value": "3500", "type": "integer", "category": "price"},
        {"name": "neighborhood", "value": "Back Bay"}
    ]);
    let response = make_authed_request(
        &mut app,
        Method::PATCH,
        "/v1/filters",
        Some(filters.to_string()),
        &test_credentials(),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = make_request(&mut app, Method::GET, "/v1/filters", None).await?;
    let stored: Vec<Filter> = read_json(response).await?;
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[1].category.as_deref(), Some("price"));
    assert_eq!(stored[2].value_type, FilterType::String);
    Ok(())
}

#[tokio::test]
async fn test_notifications_replace_with_empty_set() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    ctx.state
        .config_store
        .replace(&[Notification::new("https://hooks.example.com/a")])
        .await?;
    let mut app = listing_watcher::web::create_router(ctx.state);

    let response = make_authed_request(
        &mut app,
        Method::PATCH,
        "/v1/notifications",
        Some("[]".to_string()),
        &test_credentials(),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = make_request(&mut app, Method::GET, "/v1/notifications", None).await?;
    let stored: Vec<Notification> = read_json(response).await?;
    assert!(stored.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_payload_leaves_set_unchanged() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let original = vec![Broker::new("https://ygl.is/99333", "North")];
    ctx.state.config_store.replace(&original).await?;
    let store = ctx.state.config_store.clone();
    let mut app = listing_watcher::web::create_router(ctx.state);
    let creds = test_credentials();

    let cases = [
        // Not a list.
        json!({"url": "https://ygl.is/1", "name": "A"}).to_string(),
        // Missing name.
        json!([{"url": "https://ygl.is/1"}]).to_string(),
        // Not a URL.
        json!([{"url": "ygl north", "name": "A"}]).to_string(),
        // Duplicate key.
        json!([
            {"url": "https://ygl.is/1", "name": "A"},
            {"url": "https://ygl.is/1", "name": "B"}
        ])
        .to_string(),
    ];

    for body in cases {
        let response = make_authed_request(&mut app, Method::PATCH, "/v1/brokers", Some(body.clone()), &creds).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
    }

    let bad_filter = json!([{"name": "bedsMin", "value": "two", "type": "integer"}]);
    let response = make_authed_request(&mut app, Method::PATCH, "/v1/filters", Some(bad_filter.to_string()), &creds).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(store.list::<Broker>().await?, original);
    Ok(())
}

#[tokio::test]
async fn test_scrape_trigger_requires_auth() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let mut app = listing_watcher::web::create_router(ctx.state);

    let response = make_request(&mut app, Method::POST, "/v1/scrape", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = make_request(&mut app, Method::GET, "/v1/scrape", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let last: Value = read_json(response).await?;
    assert!(last.is_null());
    Ok(())
}

#[tokio::test]
async fn test_manual_scrape_reports_outcome() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let mut app = listing_watcher::web::create_router(ctx.state);
    let creds = test_credentials();

    let response = make_authed_request(
        &mut app,
        Method::POST,
        "/v1/scrape",
        Some(json!({"notify": true}).to_string()),
        &creds,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome: Value = read_json(response).await?;
    assert_eq!(outcome["notify"], true);

    // Empty body is a quiet run.
    let response = make_authed_request(&mut app, Method::POST, "/v1/scrape", None, &creds).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome: Value = read_json(response).await?;
    assert_eq!(outcome["notify"], false);

    let response = make_request(&mut app, Method::GET, "/v1/scrape", None).await?;
    let last: Value = read_json(response).await?;
    assert_eq!(last["succeeded"], true);
    assert_eq!(last["notify"], false);

    let response = make_authed_request(
        &mut app,
        Method::POST,
        "/v1/scrape",
        Some("{\"notify\": \"yes\"}".to_string()),
        &creds,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
