use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::FilterType;

/// Accepted layouts for `date` filter values.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// A named scraper parameter such as `bedsMin` or `priceMax`. The value is
/// stored as text and interpreted according to `value_type`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq, Eq)]
pub struct Filter {
    #[validate(length(min = 1, message = "filter name must not be empty"))]
    pub name: String,
    pub value: String,
    #[serde(rename = "type", default)]
    #[sqlx(rename = "type")]
    pub value_type: FilterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A filter value decoded according to its type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Boolean(bool),
    String(String),
    Date(NaiveDate),
}

impl Filter {
    pub fn new(name: impl Into<String>, value: impl Into<String>, value_type: FilterType) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            value_type,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Decodes `value` per the type tag; `Err` carries a message suitable for a 400 response.
    pub fn typed_value(&self) -> Result<FilterValue, String> {
        let raw = self.value.trim();
        match self.value_type {
            FilterType::Integer => raw
                .parse::<i64>()
                .map(FilterValue::Integer)
                .map_err(|_| format!("filter {}: '{}' is not an integer", self.name, self.value)),
            FilterType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(FilterValue::Boolean(true)),
                "false" | "0" => Ok(FilterValue::Boolean(false)),
                _ => Err(format!("filter {}: '{}' is not a boolean", self.name, self.value)),
            },
            FilterType::String => Ok(FilterValue::String(self.value.clone())),
            FilterType::Date => DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(FilterValue::Date)
                .ok_or_else(|| format!("filter {}: '{}' is not a date", self.name, self.value)),
        }
    }
}
