use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::orchestrator::{ScrapeOutcome, ScraperOrchestrator};
use crate::Result;

/// Why a run was requested; only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Scheduled,
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Trigger::Startup => "startup",
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
        })
    }
}

/// Runs the orchestrator and logs a failure instead of returning it. The
/// next tick is the retry.
pub async fn run_and_report(
    orchestrator: &ScraperOrchestrator,
    notify: bool,
    trigger: Trigger,
) -> Option<ScrapeOutcome> {
    match orchestrator.run(notify).await {
        Ok(outcome) => {
            tracing::info!(%trigger, run_id = %outcome.run_id, "Scrape completed");
            Some(outcome)
        }
        Err(e) => {
            tracing::warn!(%trigger, error = %e, retryable = e.is_retryable(), "Scrape did not complete");
            None
        }
    }
}

/// Drives periodic scraper runs with notifications enabled, plus one quiet
/// catch-up run at startup.
pub struct ScrapeScheduler {
    scheduler: JobScheduler,
    orchestrator: Arc<ScraperOrchestrator>,
    config: SchedulerConfig,
    job_id: Option<Uuid>,
}

impl ScrapeScheduler {
    pub async fn new(orchestrator: Arc<ScraperOrchestrator>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            orchestrator,
            config,
            job_id: None,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let job = Job::new_repeated_async(self.config.interval(), move |_uuid, _l| {
            let orchestrator = Arc::clone(&orchestrator);
            Box::pin(async move {
                run_and_report(&orchestrator, true, Trigger::Scheduled).await;
            })
        })?;

        let job_id = self.scheduler.add(job).await?;
        self.job_id = Some(job_id);
        self.scheduler.start().await?;

        tracing::info!(
            %job_id,
            interval_secs = self.config.interval_secs,
            "Scrape scheduler started"
        );
        Ok(())
    }

    /// Kicks off the startup run without waiting for it. It queues on the
    /// orchestrator lock like any other trigger.
    pub fn spawn_startup_run(&self) -> JoinHandle<Option<ScrapeOutcome>> {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move { run_and_report(&orchestrator, false, Trigger::Startup).await })
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.job_id
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("Scrape scheduler shutdown");
        Ok(())
    }
}
