use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Separator used for the `refs` column; the scraper reads and writes the
/// same comma-joined form.
pub const REFS_SEPARATOR: char = ',';

/// A listing as exposed over the API. The address is the identity and is
/// serialized as the map key, not as a field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(skip)]
    pub address: String,
    pub refs: Vec<String>,
    pub price: i64,
    pub beds: f64,
    pub baths: f64,
    pub date: String,
    pub notes: String,
    pub is_favorite: bool,
    pub is_dismissed: bool,
    pub timestamp: i64,
}

/// Raw row of the `Listings` table.
#[derive(Debug, Clone, FromRow)]
pub struct ListingRecord {
    pub addr: String,
    pub refs: Option<String>,
    pub price: Option<i64>,
    pub beds: Option<f64>,
    pub baths: Option<f64>,
    pub date: Option<String>,
    pub notes: Option<String>,
    pub favorite: Option<bool>,
    pub dismissed: Option<bool>,
    pub timestamp: Option<i64>,
}

impl From<ListingRecord> for Listing {
    fn from(record: ListingRecord) -> Self {
        Self {
            address: record.addr,
            refs: split_refs(record.refs.as_deref().unwrap_or_default()),
            price: record.price.unwrap_or_default(),
            beds: record.beds.unwrap_or_default(),
            baths: record.baths.unwrap_or_default(),
            date: record.date.unwrap_or_default(),
            notes: record.notes.unwrap_or_default(),
            is_favorite: record.favorite.unwrap_or_default(),
            is_dismissed: record.dismissed.unwrap_or_default(),
            timestamp: record.timestamp.unwrap_or_default(),
        }
    }
}

/// One listing as observed by a scrape pass. Carries no user-owned fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedListing {
    pub address: String,
    pub refs: Vec<String>,
    pub price: i64,
    pub beds: f64,
    pub baths: f64,
    pub date: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteIntent {
    pub address: String,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DismissIntent {
    pub address: String,
    pub is_dismissed: bool,
}

pub fn split_refs(raw: &str) -> Vec<String> {
    raw.split(REFS_SEPARATOR)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_refs(refs: &[String]) -> String {
    refs.join(&REFS_SEPARATOR.to_string())
}

/// Appends every ref from `incoming` not already present, keeping first-seen order.
pub fn merge_refs(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for r in incoming {
        if !merged.contains(r) {
            merged.push(r.clone());
        }
    }
    merged
}
