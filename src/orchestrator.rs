use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{NotificationsConfig, ScraperConfig};
use crate::{AppError, Result};

/// Environment variables the scraper reads its notification credentials from.
pub const ENV_API_KEY: &str = "TG_KEY";
pub const ENV_CHAT_ID: &str = "CHAT_ID";

/// What a scraper process produced, regardless of whether it succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScraperOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    /// stdout followed by stderr. The streams are captured separately, so
    /// their relative ordering within a run is not preserved.
    pub output: String,
}

impl ScraperOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            success: false,
            output: output.into(),
        }
    }
}

/// Launches one scraper pass. Implementations do not need to guard against
/// concurrent calls; [`ScraperOrchestrator`] serializes them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScrapeRunner: Send + Sync {
    async fn run(&self, notify: bool) -> Result<ScraperOutput>;
}

/// Runs the scraper as `<program> [args..] --db <path> [--notify]`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    db_path: PathBuf,
    api_key: Option<String>,
    chat_id: Option<String>,
}

impl ProcessRunner {
    pub fn new(
        scraper: &ScraperConfig,
        notifications: &NotificationsConfig,
        db_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: scraper.program.clone(),
            args: scraper.args.clone(),
            working_dir: scraper.working_dir.as_ref().map(PathBuf::from),
            db_path: db_path.into(),
            api_key: notifications.api_key.clone(),
            chat_id: notifications.chat_id.clone(),
        }
    }

    fn command(&self, notify: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg("--db").arg(&self.db_path);
        if notify {
            cmd.arg("--notify");
        }
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(key) = &self.api_key {
            cmd.env(ENV_API_KEY, key);
        }
        if let Some(chat_id) = &self.chat_id {
            cmd.env(ENV_CHAT_ID, chat_id);
        }
        // A timed-out run drops the child future; make sure the process goes with it.
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ScrapeRunner for ProcessRunner {
    async fn run(&self, notify: bool) -> Result<ScraperOutput> {
        tracing::debug!(program = %self.program, db = %self.db_path.display(), notify, "Spawning scraper");

        let output = self.command(notify).output().await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ScraperOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            output: combined,
        })
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub run_id: Uuid,
    pub notify: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    pub output: String,
}

/// Summary of the most recent run, kept whether it succeeded or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub notify: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// Ensures at most one scraper process runs at a time. Callers queue on the
/// lock in arrival order and each gets its own full run.
///
/// A run executes on its own task once the lock is taken, so dropping the
/// caller's future does not kill the process or lose the run record. The
/// timeout is the only thing that stops a run early.
pub struct ScraperOrchestrator {
    runner: Arc<dyn ScrapeRunner>,
    timeout: Duration,
    lock: Arc<Mutex<()>>,
    last_run: Arc<RwLock<Option<RunRecord>>>,
}

impl ScraperOrchestrator {
    pub fn new(runner: Arc<dyn ScrapeRunner>, timeout: Duration) -> Self {
        Self {
            runner,
            timeout,
            lock: Arc::new(Mutex::new(())),
            last_run: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn run(&self, notify: bool) -> Result<ScrapeOutcome> {
        let queued_at = Instant::now();
        let guard = Arc::clone(&self.lock).lock_owned().await;
        let waited_ms = queued_at.elapsed().as_millis() as u64;

        let runner = Arc::clone(&self.runner);
        let last_run = Arc::clone(&self.last_run);
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            let _guard = guard;
            execute(runner.as_ref(), timeout, notify, waited_ms, &last_run).await
        });

        handle
            .await
            .map_err(|e| AppError::Internal(format!("Scraper run task failed: {}", e)))?
    }

    pub async fn last_run(&self) -> Option<RunRecord> {
        self.last_run.read().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

async fn execute(
    runner: &dyn ScrapeRunner,
    timeout: Duration,
    notify: bool,
    waited_ms: u64,
    last_run: &RwLock<Option<RunRecord>>,
) -> Result<ScrapeOutcome> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let start = Instant::now();
    tracing::info!(%run_id, notify, waited_ms, "Scraper run started");

    let result = match tokio::time::timeout(timeout, runner.run(notify)).await {
        Ok(Ok(output)) if output.success => Ok(output),
        Ok(Ok(output)) => Err(AppError::ScraperExit {
            code: output.exit_code,
            output: output.output,
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(AppError::ScraperTimeout {
            timeout_secs: timeout.as_secs(),
        }),
    };

    let elapsed = start.elapsed();
    let finished_at = Utc::now();
    let duration_ms = elapsed.as_millis() as u64;

    metrics::histogram!("scraper_run_duration_seconds").record(elapsed.as_secs_f64());
    metrics::counter!(
        "scraper_runs_total",
        "result" => if result.is_ok() { "success" } else { "failure" }
    )
    .increment(1);

    match &result {
        Ok(output) => {
            tracing::info!(%run_id, duration_ms, "Scraper run finished");
            tracing::debug!(%run_id, output = %output.output, "Scraper output");
        }
        Err(AppError::ScraperExit { code, output }) => {
            tracing::error!(%run_id, ?code, duration_ms, output = %output, "Scraper run failed");
        }
        Err(e) => {
            tracing::error!(%run_id, duration_ms, error = %e, "Scraper run failed");
        }
    }

    *last_run.write().await = Some(RunRecord {
        run_id,
        notify,
        started_at,
        finished_at,
        duration_ms,
        succeeded: result.is_ok(),
        error: result.as_ref().err().map(|e| e.to_string()),
    });

    result.map(|output| ScrapeOutcome {
        run_id,
        notify,
        started_at,
        finished_at,
        duration_ms,
        exit_code: output.exit_code,
        output: output.output,
    })
}
