//! Work selection and classification storage
//!
//! Two traits describe what the indexer needs from storage, and
//! [`PgStore`] implements both against the shared `transactions` table.
//!
//! The table follows the Blockscout schema: `hash bytea`, `block_number`,
//! `status`, `error` and `revert_reason`. Rows are inserted by the block
//! ingester with `status = 0` and `error IS NULL`. A row is eligible until this indexer writes its `error`
//! column; after that it is never selected again.

use crate::classification::Classification;
use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// `transactions.status` value set by the ingester for new rows.
pub const STATUS_PENDING: i32 = 0;

const SELECT_PENDING: &str = "SELECT hash::varchar FROM transactions \
     WHERE status = $2 AND error IS NULL \
     LIMIT $1";

const SELECT_PENDING_IN_RANGE: &str = "SELECT hash::varchar FROM transactions \
     WHERE status = $2 AND error IS NULL AND block_number BETWEEN $3 AND $4 \
     LIMIT $1";

const UPDATE_CLASSIFICATION: &str = "UPDATE transactions \
     SET error = $2, revert_reason = COALESCE($3, revert_reason) \
     WHERE hash = $1::bytea AND error IS NULL";

/// Inclusive block range restricting the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Build a range from optional bounds, where 0 means "unbounded".
    ///
    /// The range only applies when both bounds are set.
    pub fn from_bounds(from: u64, to: u64) -> Result<Option<Self>> {
        if from == 0 || to == 0 {
            return Ok(None);
        }
        if from > to {
            anyhow::bail!("fromBlock {} is after toBlock {}", from, to);
        }
        Ok(Some(Self { from, to }))
    }

    pub fn contains(&self, block: u64) -> bool {
        (self.from..=self.to).contains(&block)
    }
}

/// Source of transactions that still need classifying.
pub trait WorkSource {
    /// Select up to `limit` eligible transaction hashes.
    ///
    /// An empty batch is not an error.
    fn select_batch(
        &self,
        limit: usize,
        range: Option<BlockRange>,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Sink for classifications.
pub trait ClassificationWriter {
    /// Record `classification` for the row keyed by `tx_hash`.
    ///
    /// Writing an already classified row leaves it unchanged.
    fn apply(
        &self,
        tx_hash: &str,
        classification: &Classification,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Connection settings for [`PgStore`].
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    pub url: String,
    pub connections: u32,
    pub acquire_timeout: Duration,
}

/// Postgres backed work source and writer.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a connection pool.
    pub async fn connect(config: &PgStoreConfig) -> Result<Self> {
        info!(connections = config.connections, "connecting to postgres");

        let options = config
            .url
            .parse::<PgConnectOptions>()
            .context("Invalid database url")?;

        let pool = PgPoolOptions::new()
            .max_connections(config.connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .context("Unable to connect to database")?;

        Ok(Self { pool })
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl WorkSource for PgStore {
    async fn select_batch(&self, limit: usize, range: Option<BlockRange>) -> Result<Vec<String>> {
        let limit = i64::try_from(limit).context("Batch size too large")?;
        let query = match range {
            None => sqlx::query_scalar::<_, String>(SELECT_PENDING)
                .bind(limit)
                .bind(STATUS_PENDING),
            Some(range) => sqlx::query_scalar::<_, String>(SELECT_PENDING_IN_RANGE)
                .bind(limit)
                .bind(STATUS_PENDING)
                .bind(i64::try_from(range.from).context("fromBlock too large")?)
                .bind(i64::try_from(range.to).context("toBlock too large")?),
        };
        query
            .fetch_all(&self.pool)
            .await
            .context("Failed to select pending transactions")
    }
}

impl ClassificationWriter for PgStore {
    async fn apply(&self, tx_hash: &str, classification: &Classification) -> Result<()> {
        let classification = classification.sanitized();
        let result = sqlx::query(UPDATE_CLASSIFICATION)
            .bind(tx_hash)
            .bind(classification.error())
            .bind(classification.revert_reason())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to update transaction {}", tx_hash))?;

        if result.rows_affected() == 0 {
            debug!(%tx_hash, "transaction already classified or missing");
        }
        Ok(())
    }
}
