use std::collections::BTreeMap;

use sqlx::SqlitePool;

use crate::models::{join_refs, merge_refs, IngestSummary, Listing, ListingRecord, ScrapedListing};
use crate::{AppError, Result};

const SELECT_LISTINGS: &str = "SELECT addr, refs, price, beds, baths, date, notes, favorite, dismissed, timestamp FROM Listings";

#[derive(Debug, Clone, Copy)]
enum UserFlag {
    Favorite,
    Dismissed,
}

impl UserFlag {
    fn update_sql(self) -> &'static str {
        match self {
            UserFlag::Favorite => "UPDATE Listings SET favorite = ? WHERE addr = ?",
            UserFlag::Dismissed => "UPDATE Listings SET dismissed = ? WHERE addr = ?",
        }
    }
}

/// Read path plus the user-owned write path of the `Listings` table.
#[derive(Debug, Clone)]
pub struct ListingRepository {
    pool: SqlitePool,
}

impl ListingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<Listing>> {
        let records = sqlx::query_as::<_, ListingRecord>(SELECT_LISTINGS)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Listing::from).collect())
    }

    /// All listings keyed by address, the shape served by `GET /v1/listings`.
    pub async fn get_all_by_address(&self) -> Result<BTreeMap<String, Listing>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .map(|listing| (listing.address.clone(), listing))
            .collect())
    }

    pub async fn get(&self, address: &str) -> Result<Option<Listing>> {
        let record = sqlx::query_as::<_, ListingRecord>(&format!("{} WHERE addr = ?", SELECT_LISTINGS))
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Listing::from))
    }

    pub async fn set_favorite(&self, address: &str, value: bool) -> Result<()> {
        self.set_flag(UserFlag::Favorite, address, value).await
    }

    pub async fn set_dismissed(&self, address: &str, value: bool) -> Result<()> {
        self.set_flag(UserFlag::Dismissed, address, value).await
    }

    async fn set_flag(&self, flag: UserFlag, address: &str, value: bool) -> Result<()> {
        let result = sqlx::query(flag.update_sql())
            .bind(value)
            .bind(address)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("listing {}", address)));
        }

        tracing::debug!(address, ?flag, value, "Updated listing flag");
        Ok(())
    }

    /// Applies one scrape pass in a single transaction. Unseen addresses are
    /// inserted with cleared user flags; known addresses get fresh scrape
    /// data and any new refs, while `favorite`, `dismissed` and `notes` are
    /// left untouched.
    pub async fn ingest(&self, batch: &[ScrapedListing]) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        let mut tx = self.pool.begin().await?;

        for item in batch {
            let existing = sqlx::query_scalar::<_, Option<String>>(
                "SELECT refs FROM Listings WHERE addr = ?",
            )
            .bind(&item.address)
            .fetch_optional(&mut *tx)
            .await?;

            match existing {
                None => {
                    sqlx::query(
                        "INSERT INTO Listings (addr, refs, price, beds, baths, date, notes, favorite, dismissed, timestamp)
                         VALUES (?, ?, ?, ?, ?, ?, '', 0, 0, ?)",
                    )
                    .bind(&item.address)
                    .bind(join_refs(&merge_refs(&[], &item.refs)))
                    .bind(item.price)
                    .bind(item.beds)
                    .bind(item.baths)
                    .bind(&item.date)
                    .bind(item.timestamp)
                    .execute(&mut *tx)
                    .await?;
                    summary.inserted += 1;
                }
                Some(refs) => {
                    let current = crate::models::split_refs(refs.as_deref().unwrap_or_default());
                    sqlx::query(
                        "UPDATE Listings SET refs = ?, price = ?, beds = ?, baths = ?, date = ?, timestamp = ?
                         WHERE addr = ?",
                    )
                    .bind(join_refs(&merge_refs(&current, &item.refs)))
                    .bind(item.price)
                    .bind(item.beds)
                    .bind(item.baths)
                    .bind(&item.date)
                    .bind(item.timestamp)
                    .bind(&item.address)
                    .execute(&mut *tx)
                    .await?;
                    summary.updated += 1;
                }
            }
        }

        tx.commit().await?;
        tracing::info!(inserted = summary.inserted, updated = summary.updated, "Ingested scraped listings");
        Ok(summary)
    }
}
