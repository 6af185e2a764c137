use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use listing_watcher::{
    bootstrap,
    config::LoggingConfig,
    web::{self, AppState},
    AppConfig, Database, ProcessRunner, ScrapeScheduler, ScraperOrchestrator,
};

#[derive(Debug, Parser)]
#[command(name = "listing-watcher", version, about = "Watches rental listings and serves them over HTTP")]
struct Cli {
    /// Extra configuration file layered over config/ and under the environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TOML file seeding brokers, filters and notifications at startup
    #[arg(short, long)]
    bootstrap: Option<PathBuf>,

    /// Skip the catch-up scrape normally run at startup
    #[arg(long)]
    no_startup_run: bool,
}

fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("listing_watcher=debug".parse()?);

    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _guard = init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting listing watcher");

    let database = Database::connect(&config.database)
        .await
        .context("Failed to open database")?;

    let bootstrap_path = cli
        .bootstrap
        .clone()
        .or_else(|| config.bootstrap.path.as_ref().map(PathBuf::from));
    if let Some(path) = bootstrap_path {
        bootstrap::run(&database.config_store(), &path)
            .await
            .with_context(|| format!("Failed to apply bootstrap file {}", path.display()))?;
    }

    let runner = ProcessRunner::new(&config.scraper, &config.notifications, database.path());
    let orchestrator = Arc::new(ScraperOrchestrator::new(
        Arc::new(runner),
        config.scraper.timeout(),
    ));

    let mut scheduler = ScrapeScheduler::new(Arc::clone(&orchestrator), config.scheduler.clone()).await?;
    scheduler.start().await?;

    if config.scheduler.run_on_startup && !cli.no_startup_run {
        // Detached; it queues on the orchestrator lock like any other trigger.
        let _startup = scheduler.spawn_startup_run();
    } else {
        info!("Startup scrape skipped");
    }

    let state = AppState::new(database.clone(), Arc::clone(&orchestrator), &config.security);
    web::serve(&config.server, state, shutdown_signal()).await?;

    scheduler.shutdown().await?;
    database.close().await;
    info!("Listing watcher stopped");

    Ok(())
}
