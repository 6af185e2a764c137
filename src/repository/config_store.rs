use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite, SqlitePool};

use crate::models::{Broker, ConfigKind, Filter, Notification};
use crate::Result;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// A row type belonging to one of the replaceable configuration sets.
pub trait ConfigItem: for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin {
    const KIND: ConfigKind;
    const SELECT_SQL: &'static str;
    const INSERT_SQL: &'static str;

    fn bind_insert<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;
}

impl ConfigItem for Broker {
    const KIND: ConfigKind = ConfigKind::Brokers;
    const SELECT_SQL: &'static str = "SELECT url, name FROM Brokers ORDER BY rowid";
    const INSERT_SQL: &'static str = "INSERT INTO Brokers (url, name) VALUES (?, ?)";

    fn bind_insert<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query.bind(&self.url).bind(&self.name)
    }
}

impl ConfigItem for Filter {
    const KIND: ConfigKind = ConfigKind::Filters;
    const SELECT_SQL: &'static str =
        "SELECT name, value, type, category FROM Filters ORDER BY rowid";
    const INSERT_SQL: &'static str =
        "INSERT INTO Filters (name, value, type, category) VALUES (?, ?, ?, ?)";

    fn bind_insert<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.name)
            .bind(&self.value)
            .bind(self.value_type)
            .bind(&self.category)
    }
}

impl ConfigItem for Notification {
    const KIND: ConfigKind = ConfigKind::Notifications;
    const SELECT_SQL: &'static str = "SELECT url FROM Notifications ORDER BY rowid";
    const INSERT_SQL: &'static str = "INSERT INTO Notifications (url) VALUES (?)";

    fn bind_insert<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query.bind(&self.url)
    }
}

/// Brokers, filters and notifications, each replaced as a whole set.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list<T: ConfigItem>(&self) -> Result<Vec<T>> {
        let items = sqlx::query_as::<_, T>(T::SELECT_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Discards the current set and installs `items` in order. Runs in one
    /// transaction: on any failure the previous set is left as it was.
    pub async fn replace<T: ConfigItem>(&self, items: &[T]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(&format!("DELETE FROM {}", T::KIND.table()))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for item in items {
            item.bind_insert(sqlx::query(T::INSERT_SQL))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let kind = T::KIND;
        tracing::info!(
            kind = %kind,
            removed,
            installed = items.len(),
            "Replaced configuration set"
        );
        Ok(items.len())
    }
}
