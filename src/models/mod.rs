use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

use crate::AppError;

pub mod broker;
pub mod filter;
pub mod listing;
pub mod notification;

// Re-exports for convenience
pub use broker::*;
pub use filter::*;
pub use listing::*;
pub use notification::*;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FilterType {
    Integer,
    Boolean,
    #[default]
    String,
    Date,
}

/// The three independently replaceable configuration sets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    Brokers,
    Filters,
    Notifications,
}

impl ConfigKind {
    pub fn table(&self) -> &'static str {
        match self {
            ConfigKind::Brokers => "Brokers",
            ConfigKind::Filters => "Filters",
            ConfigKind::Notifications => "Notifications",
        }
    }
}

impl std::fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConfigKind::Brokers => "brokers",
            ConfigKind::Filters => "filters",
            ConfigKind::Notifications => "notifications",
        })
    }
}

/// Checks applied by callers before a configuration set is handed to the
/// store for replacement.
pub trait ConfigEntry: Validate {
    /// Primary-key value within its set.
    fn key(&self) -> &str;

    fn check_value(&self) -> Result<(), String> {
        Ok(())
    }
}

impl ConfigEntry for Broker {
    fn key(&self) -> &str {
        &self.url
    }
}

impl ConfigEntry for Filter {
    fn key(&self) -> &str {
        &self.name
    }

    fn check_value(&self) -> Result<(), String> {
        self.typed_value().map(|_| ())
    }
}

impl ConfigEntry for Notification {
    fn key(&self) -> &str {
        &self.url
    }
}

/// Rejects a set containing an invalid entry or a repeated key.
pub fn validate_set<T: ConfigEntry>(kind: ConfigKind, items: &[T]) -> crate::Result<()> {
    let mut seen = HashSet::new();
    for item in items {
        item.validate()?;
        item.check_value().map_err(AppError::Validation)?;
        if !seen.insert(item.key()) {
            return Err(AppError::Validation(format!(
                "duplicate entry '{}' in {}",
                item.key(),
                kind
            )));
        }
    }
    Ok(())
}
