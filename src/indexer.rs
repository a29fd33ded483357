//! Main classification loop
//!
//! Repeatedly selects a batch of pending transactions, traces each one and
//! records the classification:
//!
//! ```text
//! Fetching ──storage error──▶ RetrySleep ──▶ Fetching
//!     │
//!     ├──empty──▶ PollSleep ──▶ Fetching
//!     │
//!     └──batch──▶ ProcessingBatch ──▶ Fetching
//!                        │
//!                        └──nothing classified──▶ RetrySleep ──▶ Fetching
//! ```
//!
//! Items never share state, so a batch can be processed by several workers
//! at once and the loop can be stopped at any point. Anything not written
//! before a stop is simply selected again on the next start.

use crate::classification::classify;
use crate::store::{BlockRange, ClassificationWriter, WorkSource};
use crate::trace::{normalize_hash, TraceClient};
use futures::StreamExt;
use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default number of transactions selected per cycle.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default sleep when no transaction is pending.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default sleep after the work source failed.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Loop tuning.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub retry_interval: Duration,
    /// Maximum trace calls in flight within a batch.
    pub workers: usize,
    pub block_range: Option<BlockRange>,
    /// Repair `\x…` hashes before sending them to the node.
    pub normalize_hash: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            workers: 1,
            block_range: None,
            normalize_hash: true,
        }
    }
}

/// Source of delays, replaceable in tests.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What happened to a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemResult {
    Classified,
    /// Trace failed in transit; left pending.
    Deferred,
    /// Classification could not be stored; left pending.
    WriteFailed,
}

/// Counters for one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub selected: usize,
    pub classified: usize,
    pub deferred: usize,
    pub write_failures: usize,
}

/// Result of one fetch/process cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing pending.
    Empty,
    /// Selecting work failed.
    StorageError,
    /// A batch was processed.
    Processed(BatchSummary),
}

/// Classifies pending transactions until cancelled.
pub struct Indexer<S, T, Z = TokioSleeper> {
    store: S,
    client: T,
    sleeper: Z,
    config: IndexerConfig,
}

impl<S, T> Indexer<S, T, TokioSleeper>
where
    S: WorkSource + ClassificationWriter,
    T: TraceClient,
{
    /// Create a new indexer sleeping on the tokio timer.
    pub fn new(store: S, client: T, config: IndexerConfig) -> Self {
        Self::with_sleeper(store, client, TokioSleeper, config)
    }
}

impl<S, T, Z> Indexer<S, T, Z>
where
    S: WorkSource + ClassificationWriter,
    T: TraceClient,
    Z: Sleeper,
{
    pub fn with_sleeper(store: S, client: T, sleeper: Z, config: IndexerConfig) -> Self {
        Self { store, client, sleeper, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the loop until `cancellation` fires.
    ///
    /// Cancellation abandons whatever is in flight: a pending selection, a
    /// trace call or a sleep.
    pub async fn run(&self, cancellation: CancellationToken) {
        info!(
            batch_size = self.config.batch_size,
            workers = self.config.workers,
            range = ?self.config.block_range,
            "starting classification loop"
        );

        loop {
            let step = tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                step = self.step() => step,
            };

            let delay = match step {
                Step::Processed(summary) => {
                    info!(
                        selected = summary.selected,
                        classified = summary.classified,
                        deferred = summary.deferred,
                        write_failures = summary.write_failures,
                        "processed batch"
                    );
                    if summary.classified > 0 {
                        continue;
                    }
                    // Node or storage is failing every item; don't hammer it.
                    self.config.retry_interval
                }
                Step::Empty => {
                    debug!("waiting for new transactions");
                    self.config.poll_interval
                }
                Step::StorageError => self.config.retry_interval,
            };

            tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                _ = self.sleeper.sleep(delay) => {}
            }
        }

        info!("classification loop stopped");
    }

    /// Select one batch and process it.
    pub async fn step(&self) -> Step {
        let batch = match self
            .store
            .select_batch(self.config.batch_size, self.config.block_range)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                error!(reason = ?e, "failed to select pending transactions");
                return Step::StorageError;
            }
        };

        if batch.is_empty() {
            return Step::Empty;
        }
        Step::Processed(self.process_batch(batch).await)
    }

    /// Process every hash of a batch, with at most `workers` in flight.
    pub async fn process_batch(&self, batch: Vec<String>) -> BatchSummary {
        let mut summary = BatchSummary { selected: batch.len(), ..Default::default() };

        let results: Vec<ItemResult> = futures::stream::iter(batch)
            .map(|tx_hash| async move { self.process_one(&tx_hash).await })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                ItemResult::Classified => summary.classified += 1,
                ItemResult::Deferred => summary.deferred += 1,
                ItemResult::WriteFailed => summary.write_failures += 1,
            }
        }
        summary
    }

    async fn process_one(&self, tx_hash: &str) -> ItemResult {
        let target = if self.config.normalize_hash {
            normalize_hash(tx_hash)
        } else {
            Cow::Borrowed(tx_hash)
        };

        let outcome = self.client.trace(&target).await;
        let Some(classification) = classify(tx_hash, outcome) else {
            return ItemResult::Deferred;
        };

        match self.store.apply(tx_hash, &classification).await {
            Ok(()) => {
                debug!(%tx_hash, error = classification.error(), "classified transaction");
                ItemResult::Classified
            }
            Err(e) => {
                error!(%tx_hash, reason = ?e, "failed to store classification");
                ItemResult::WriteFailed
            }
        }
    }
}
