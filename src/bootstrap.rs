use serde::Deserialize;
use std::path::Path;

use crate::models::{validate_set, Broker, ConfigKind, Filter, Notification};
use crate::repository::ConfigStore;
use crate::Result;

/// Seed configuration read at startup. Each table is optional; only the sets
/// present in the file are replaced.
///
/// ```toml
/// [[brokers]]
/// url = "https://ygl.is/99333"
/// name = "North"
///
/// [[filters]]
/// name = "bedsMin"
/// value = "2"
/// type = "integer"
///
/// [[notifications]]
/// url = "tgram://token/chat"
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BootstrapFile {
    pub brokers: Option<Vec<Broker>>,
    pub filters: Option<Vec<Filter>>,
    pub notifications: Option<Vec<Notification>>,
}

/// Per-set counts of what a bootstrap installed. `None` means the set was
/// absent from the file and left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub brokers: Option<usize>,
    pub filters: Option<usize>,
    pub notifications: Option<usize>,
}

impl BootstrapFile {
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates every present set before any of them is written.
    pub fn validate(&self) -> Result<()> {
        if let Some(brokers) = &self.brokers {
            validate_set(ConfigKind::Brokers, brokers)?;
        }
        if let Some(filters) = &self.filters {
            validate_set(ConfigKind::Filters, filters)?;
        }
        if let Some(notifications) = &self.notifications {
            validate_set(ConfigKind::Notifications, notifications)?;
        }
        Ok(())
    }
}

/// Reads the bootstrap file. A missing file is not an error.
pub async fn load(path: &Path) -> Result<Option<BootstrapFile>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Bootstrap file not found, skipping");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let file = BootstrapFile::parse(&contents)?;
    tracing::debug!(path = %path.display(), "Bootstrap file loaded");
    Ok(Some(file))
}

/// Replaces each set present in `file`. Sets are replaced one transaction at
/// a time; validation of all of them happens up front.
pub async fn apply(store: &ConfigStore, file: &BootstrapFile) -> Result<BootstrapReport> {
    file.validate()?;

    let mut report = BootstrapReport::default();
    if let Some(brokers) = &file.brokers {
        report.brokers = Some(store.replace(brokers).await?);
    }
    if let Some(filters) = &file.filters {
        report.filters = Some(store.replace(filters).await?);
    }
    if let Some(notifications) = &file.notifications {
        report.notifications = Some(store.replace(notifications).await?);
    }

    tracing::info!(
        brokers = ?report.brokers,
        filters = ?report.filters,
        notifications = ?report.notifications,
        "Bootstrap configuration applied"
    );
    Ok(report)
}

/// `load` followed by `apply`, for use from `main`.
pub async fn run(store: &ConfigStore, path: &Path) -> Result<Option<BootstrapReport>> {
    match load(path).await? {
        Some(file) => apply(store, &file).await.map(Some),
        None => Ok(None),
    }
}
