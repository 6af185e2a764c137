use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite file shared with the scraper subprocess.
    pub path: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
    pub busy_timeout: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub auth_user: Option<String>,
    pub auth_pass: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub program: String,
    /// Arguments placed before `--db`, e.g. the script path when `program` is an interpreter.
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub run_on_startup: bool,
}

/// Credentials forwarded to the scraper through its environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub api_key: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout)
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl SecurityConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.auth_user, &self.auth_pass) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

impl AppConfig {
    /// Layers built-in defaults, the `config/` directory, an optional extra
    /// file and `WATCHER__*` environment variables, in that order.
    pub fn load(extra_file: Option<&Path>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let (host, port) = server_defaults(|key| env::var(key).ok());

        let mut builder = Config::builder()
            .set_default("server.host", host)?
            .set_default("server.port", port)?
            .set_default("database.path", "ygl.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.busy_timeout", 10)?
            .set_default("scraper.program", "python3")?
            .set_default("scraper.args", vec!["scraper/main.py"])?
            .set_default("scraper.timeout_secs", 1800)?
            .set_default("scheduler.interval_secs", 3600)?
            .set_default("scheduler.run_on_startup", true)?
            .set_default("logging.file_prefix", "listing-watcher.log")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path));
        }

        let s = builder
            .add_source(
                Environment::with_prefix("WATCHER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scraper.args")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_legacy_env();
        config.validate()?;
        Ok(config)
    }

    /// Picks up the plain variable names used by existing deployments and by
    /// the scraper itself when the structured keys are unset.
    fn apply_legacy_env(&mut self) {
        if self.security.auth_user.is_none() {
            self.security.auth_user = env::var("AUTH_USER").ok();
        }
        if self.security.auth_pass.is_none() {
            self.security.auth_pass = env::var("AUTH_PASS").ok();
        }
        if self.notifications.api_key.is_none() {
            self.notifications.api_key = env::var("TG_KEY").ok();
        }
        if self.notifications.chat_id.is_none() {
            self.notifications.chat_id = env::var("CHAT_ID").ok();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Message("Database path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.security.auth_user.is_some() != self.security.auth_pass.is_some() {
            return Err(ConfigError::Message(
                "auth_user and auth_pass must be set together".into(),
            ));
        }

        if self.scraper.program.trim().is_empty() {
            return Err(ConfigError::Message("Scraper program must not be empty".into()));
        }

        if self.scraper.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Scraper timeout_secs must be greater than 0".into(),
            ));
        }

        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message(
                "Scheduler interval_secs must be greater than 0".into(),
            ));
        }

        // Otherwise ticks pile up on the orchestrator lock behind a hung run.
        if self.scheduler.interval_secs < self.scraper.timeout_secs {
            return Err(ConfigError::Message(format!(
                "Scheduler interval_secs ({}) must not be shorter than scraper timeout_secs ({})",
                self.scheduler.interval_secs, self.scraper.timeout_secs
            )));
        }

        Ok(())
    }
}

/// Bind address defaults. The legacy `DOMAIN` and `PORT` variables replace
/// the built-in values, so config files and `WATCHER__SERVER__*` still win.
fn server_defaults(lookup: impl Fn(&str) -> Option<String>) -> (String, i64) {
    let host = lookup("DOMAIN")
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let port = lookup("PORT")
        .and_then(|p| p.trim().parse::<u16>().ok())
        .map_or(8083, i64::from);
    (host, port)
}
