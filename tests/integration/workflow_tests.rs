use super::*;
use axum::http::{Method, StatusCode};
use listing_watcher::{
    bootstrap,
    config::SchedulerConfig,
    models::{Broker, Filter, Listing, Notification},
    ScrapeScheduler,
};
use serde_json::json;
use std::collections::BTreeMap;

const A: &str = "12 Beacon St #3";
const B: &str = "40 Marlborough St #1";
const C: &str = "7 Pinckney St";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_startup_scrape_then_favorite() -> anyhow::Result<()> {
    let (database, _dir) = create_test_db().await?;
    let runner = IngestingRunner {
        listings: database.listings(),
        batch: vec![scraped(A, 3300, 100), scraped(B, 2900, 100), scraped(C, 4100, 100)],
    };
    let state = create_app_state(database, Arc::new(runner));
    let scheduler = ScrapeScheduler::new(
        Arc::clone(&state.orchestrator),
        SchedulerConfig {
            interval_secs: 3600,
            run_on_startup: true,
        },
    )
    .await?;
    let mut app = listing_watcher::web::create_router(state);

    let startup = scheduler.spawn_startup_run().await?;
    let outcome = startup.expect("startup run should succeed");
    assert!(!outcome.notify);

    let response = make_request(&mut app, Method::GET, "/v1/listings", None).await?;
    let listings: BTreeMap<String, Listing> = read_json(response).await?;
    assert_eq!(listings.len(), 3);
    assert!(listings.values().all(|l| !l.is_favorite));

    let favorite = json!({"address": A, "isFavorite": true});
    let response = make_request(&mut app, Method::PATCH, "/v1/favorite", Some(favorite.to_string())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = make_request(&mut app, Method::GET, "/v1/listings", None).await?;
    let listings: BTreeMap<String, Listing> = read_json(response).await?;
    assert!(listings[A].is_favorite);
    assert!(!listings[B].is_favorite);
    assert!(!listings[C].is_favorite);
    Ok(())
}

#[tokio::test]
async fn test_rescrape_keeps_user_flags() -> anyhow::Result<()> {
    let (database, _dir) = create_test_db().await?;
    let listings = database.listings();
    listings.ingest(&[scraped(A, 3300, 100), scraped(B, 2900, 100)]).await?;
    listings.set_favorite(A, true).await?;
    listings.set_dismissed(B, true).await?;

    // The next pass sees A at a new price and B no longer listed.
    let runner = IngestingRunner {
        listings: listings.clone(),
        batch: vec![scraped(A, 3150, 200)],
    };
    let state = create_app_state(database, Arc::new(runner));
    state.orchestrator.run(true).await?;

    let a = listings.get(A).await?.unwrap();
    assert_eq!(a.price, 3150);
    assert_eq!(a.timestamp, 200);
    assert!(a.is_favorite);
    assert_eq!(a.refs, vec!["https://ygl.is/rental/3300", "https://ygl.is/rental/3150"]);

    let b = listings.get(B).await?.unwrap();
    assert!(b.is_dismissed);
    assert_eq!(b.price, 2900);
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_then_api_replace() -> anyhow::Result<()> {
    let ctx = create_test_app_state().await?;
    let path = ctx.dir.path().join("bootstrap.toml");
    tokio::fs::write(
        &path,
        r#"
[[brokers]]
url = "https://ygl.is/99333"
name = "North"

[[notifications]]
url = "tgram://bot/4242"
"#,
    )
    .await?;

    let report = bootstrap::run(&ctx.state.config_store, &path).await?.unwrap();
    assert_eq!(report.brokers, Some(1));
    assert_eq!(report.filters, None);

    let store = ctx.state.config_store.clone();
    let mut app = listing_watcher::web::create_router(ctx.state);
    let filters = json!([{"name": "bathsMin", "value": "1", "type": "integer"}]);
    let response = make_authed_request(
        &mut app,
        Method::PATCH,
        "/v1/filters",
        Some(filters.to_string()),
        &test_credentials(),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(store.list::<Broker>().await?, vec![Broker::new("https://ygl.is/99333", "North")]);
    assert_eq!(store.list::<Filter>().await?.len(), 1);
    assert_eq!(store.list::<Notification>().await?, vec![Notification::new("tgram://bot/4242")]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_config_edits_during_scrape() -> anyhow::Result<()> {
    struct SlowRunner;

    #[async_trait]
    impl ScrapeRunner for SlowRunner {
        async fn run(&self, _notify: bool) -> listing_watcher::Result<ScraperOutput> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(ScraperOutput::success("slow"))
        }
    }

    let (database, _dir) = create_test_db().await?;
    let state = create_app_state(database, Arc::new(SlowRunner));
    let orchestrator = Arc::clone(&state.orchestrator);
    let run = tokio::spawn(async move { orchestrator.run(false).await });

    let running = {
        let orchestrator = Arc::clone(&state.orchestrator);
        wait_for_condition(move || {
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.is_running() }
        }, 5)
        .await
    };
    assert!(running);

    // Config and listing reads are not blocked by an in-flight run.
    let mut app = listing_watcher::web::create_router(state.clone());
    let brokers = json!([{"url": "https://ygl.is/5", "name": "Five"}]);
    let response = make_authed_request(
        &mut app,
        Method::PATCH,
        "/v1/brokers",
        Some(brokers.to_string()),
        &test_credentials(),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.orchestrator.is_running());

    run.await??;
    assert!(!state.orchestrator.is_running());
    Ok(())
}
