//! Revert indexer - transaction revert classification
//!
//! This library scans stored transactions that have not been classified
//! yet, traces them with `debug_traceTransaction`, decodes the revert
//! reason of reverted ones and writes the result back.

pub mod classification;
pub mod config;
pub mod indexer;
pub mod revert;
pub mod rpc;
pub mod store;
pub mod trace;
pub mod types;

// Re-export the main types for convenience
pub use classification::Classification;
pub use indexer::{Indexer, IndexerConfig};
pub use rpc::RpcClient;
pub use store::{BlockRange, ClassificationWriter, PgStore, WorkSource};
pub use trace::{TraceClient, TraceOutcome};
