//! Ethereum JSON-RPC types
//!
//! Shape of the `debug_traceTransaction` result consumed by the indexer.

use serde::{Deserialize, Deserializer};

/// Result of `debug_traceTransaction` with the node's default tracer.
///
/// Only the two top-level fields matter here:
/// - `error`:  empty for successful execution, `"Revert..."` for reverts,
///   anything else for other execution failures
/// - `output`: `0x` prefixed return or revert data
///
/// Both fields are optional on the wire; missing and `null` read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TraceResult {
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub error: String,

    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub output: String,
}

impl TraceResult {
    /// Check if the node reported the execution as reverted.
    pub fn is_revert(&self) -> bool {
        self.error.starts_with("Revert")
    }

    /// Check if the node reported no execution error at all.
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

fn deserialize_string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
