use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// An outbound target handed to the scraper, e.g. `tgram://token/chat` or a
/// webhook URL.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq, Eq)]
pub struct Notification {
    #[validate(url)]
    pub url: String,
}

impl Notification {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
