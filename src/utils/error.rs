use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Bootstrap file error: {0}")]
    Bootstrap(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Scraper exited with {}", exit_label(.code))]
    ScraperExit { code: Option<i32>, output: String },

    #[error("Scraper timed out after {timeout_secs}s")]
    ScraperTimeout { timeout_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Scraper failures leave the orchestrator lock released, so the caller
    /// may simply run again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ScraperExit { .. } | AppError::ScraperTimeout { .. }
        )
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

// Implement conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
