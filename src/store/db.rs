//! Postgres cache backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, Row};
use tracing::{debug, warn};

use super::{CacheBackend, CacheEntry};
use crate::model::ProductId;

const COLUMN_MIGRATIONS: &[&str] = &[
    "ALTER TABLE product_cache ADD COLUMN IF NOT EXISTS category TEXT;",
    "ALTER TABLE product_cache ADD COLUMN IF NOT EXISTS score SMALLINT;",
];

pub async fn init_db(pool: &PgPool) -> Result<()> {
    // 1. Base schema
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_cache (
            product_id VARCHAR PRIMARY KEY,
            computed_at TIMESTAMPTZ NOT NULL,
            payload TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // 2. Columns added after the first release; each on its own so a partial
    // migration can resume. The payload carries the same data, so a failure
    // here is logged and startup continues.
    for statement in COLUMN_MIGRATIONS {
        if let Err(e) = sqlx::query(statement).execute(pool).await {
            warn!(%statement, error = %e, "Cache table migration failed");
        }
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS product_cache_computed_at ON product_cache (computed_at);",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Stores each [`CacheEntry`] as a JSON text payload, with the category and
/// score copied into columns for ad-hoc queries.
pub struct PgCacheBackend {
    pool: PgPool,
}

impl PgCacheBackend {
    /// Wrap `pool`, creating the schema if needed.
    pub async fn new(pool: PgPool) -> Result<Self> {
        init_db(&pool).await.context("initializing product_cache")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CacheBackend for PgCacheBackend {
    async fn load_all(&self) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query("SELECT product_id, payload FROM product_cache")
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("product_id")?;
            let payload: String = row.try_get("payload")?;
            match serde_json::from_str::<CacheEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                // A row written by an incompatible version is skipped, not fatal.
                Err(e) => warn!(product_id = %id, error = %e, "Skipping unreadable cache row"),
            }
        }
        debug!(rows = entries.len(), "Loaded product_cache");
        Ok(entries)
    }

    async fn save(&self, entry: &CacheEntry) -> Result<()> {
        let payload = serde_json::to_string(entry)?;
        sqlx::query(
            r#"INSERT INTO product_cache (product_id, computed_at, payload, category, score)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (product_id) DO UPDATE
               SET computed_at = EXCLUDED.computed_at,
                   payload = EXCLUDED.payload,
                   category = EXCLUDED.category,
                   score = EXCLUDED.score"#,
        )
        .bind(entry.product.id.as_str())
        .bind(entry.computed_at)
        .bind(&payload)
        .bind(&entry.product.category)
        .bind(i16::from(entry.analysis.score))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, id: &ProductId) -> Result<()> {
        sqlx::query("DELETE FROM product_cache WHERE product_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM product_cache WHERE computed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_migrations_are_rerunnable() {
        for statement in COLUMN_MIGRATIONS {
            assert!(statement.starts_with("ALTER TABLE product_cache ADD COLUMN IF NOT EXISTS"));
        }
    }
}
