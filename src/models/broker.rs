use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq, Eq)]
pub struct Broker {
    #[validate(url)]
    pub url: String,
    #[validate(length(min = 1, message = "broker name must not be empty"))]
    pub name: String,
}

impl Broker {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}
