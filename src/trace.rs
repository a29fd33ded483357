//! Transaction trace outcomes
//!
//! Turns a `debug_traceTransaction` response into a [`TraceOutcome`]:
//!
//! | response                                   | outcome              |
//! |--------------------------------------------|----------------------|
//! | transport error, RPC error, null result    | `TransportFailure`   |
//! | result not shaped like `{error, output}`   | `Unreadable`         |
//! | `error` empty                              | `Success`            |
//! | `error` starts with `Revert`, `0x` output  | `Revert`             |
//! | `error` starts with `Revert`, other output | `OtherError`         |
//! | any other `error`                          | `OtherError`         |

use crate::rpc::RpcClient;
use crate::types::TraceResult;
use std::borrow::Cow;
use std::future::Future;

/// Structured result of tracing one transaction.
#[derive(Debug)]
pub enum TraceOutcome {
    /// Executed without error.
    Success,
    /// Reverted. `output` is the revert data as hex, without the `0x` prefix.
    Revert { output: String },
    /// Any other execution error reported by the node, verbatim.
    OtherError(String),
    /// The node answered, but not with a trace we can read.
    Unreadable(String),
    /// The call itself failed. Nothing must be recorded for this outcome.
    TransportFailure(anyhow::Error),
}

/// Something that can trace a transaction by hash.
pub trait TraceClient {
    fn trace(&self, tx_hash: &str) -> impl Future<Output = TraceOutcome> + Send;
}

impl TraceClient for RpcClient {
    async fn trace(&self, tx_hash: &str) -> TraceOutcome {
        let value = match self.trace_transaction(tx_hash).await {
            Ok(value) => value,
            Err(e) => return TraceOutcome::TransportFailure(e),
        };
        match serde_json::from_value::<TraceResult>(value) {
            Ok(result) => classify_trace(&result),
            Err(e) => TraceOutcome::Unreadable(e.to_string()),
        }
    }
}

/// Map a decoded trace result onto an outcome.
pub fn classify_trace(result: &TraceResult) -> TraceOutcome {
    if result.is_success() {
        return TraceOutcome::Success;
    }
    if !result.is_revert() {
        return TraceOutcome::OtherError(result.error.clone());
    }
    match result.output.strip_prefix("0x") {
        Some(body) => TraceOutcome::Revert { output: body.to_string() },
        // Never hand the decoder a payload we had to invent.
        None => TraceOutcome::OtherError(result.error.clone()),
    }
}

/// Repair hashes read back from Postgres in `bytea` escape form.
///
/// `hash::varchar` renders as `\x5c1f…`; replacing the single backslash
/// yields the `0x5c1f…` form the node expects. Only the first backslash is
/// touched.
pub fn normalize_hash(tx_hash: &str) -> Cow<'_, str> {
    if tx_hash.contains('\\') {
        Cow::Owned(tx_hash.replacen('\\', "0", 1))
    } else {
        Cow::Borrowed(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::tests::serve_once;
    use std::time::Duration;

    fn result(error: &str, output: &str) -> TraceResult {
        TraceResult { error: error.to_string(), output: output.to_string() }
    }

    #[test]
    fn test_success() {
        assert!(matches!(classify_trace(&result("", "0x")), TraceOutcome::Success));
        // Output of a successful call is never inspected.
        assert!(matches!(classify_trace(&result("", "not hex")), TraceOutcome::Success));
    }

    #[test]
    fn test_revert_strips_prefix() {
        match classify_trace(&result("Reverted", "0x08c379a0")) {
            TraceOutcome::Revert { output } => assert_eq!(output, "08c379a0"),
            other => panic!("unexpected outcome {:?}", other),
        }
        match classify_trace(&result("Revert", "0x")) {
            TraceOutcome::Revert { output } => assert!(output.is_empty()),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_revert_without_prefixed_output_is_other_error() {
        for output in ["", "08c379a0", "0X08"] {
            match classify_trace(&result("Revert", output)) {
                TraceOutcome::OtherError(text) => assert_eq!(text, "Revert"),
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[test]
    fn test_other_error_verbatim() {
        match classify_trace(&result("execution timeout", "0x")) {
            TraceOutcome::OtherError(text) => assert_eq!(text, "execution timeout"),
            other => panic!("unexpected outcome {:?}", other),
        }
        // Case sensitive prefix match, like the node emits it.
        assert!(matches!(
            classify_trace(&result("reverted", "0x")),
            TraceOutcome::OtherError(_)
        ));
    }

    #[test]
    fn test_normalize_hash() {
        assert_eq!(normalize_hash("\\xabcdef"), "0xabcdef");
        assert_eq!(normalize_hash("0xabcdef"), "0xabcdef");
        assert!(matches!(normalize_hash("0xabcdef"), Cow::Borrowed(_)));
        // Only the first backslash is replaced.
        assert_eq!(normalize_hash("\\x\\ab"), "0x\\ab");
    }

    #[tokio::test]
    async fn test_rpc_client_unreadable_trace() {
        let url = serve_once(r#"{"jsonrpc":"2.0","id":1,"result":"0xdeadbeef"}"#).await;
        let client = RpcClient::new(url, Duration::from_secs(5)).unwrap();
        assert!(matches!(client.trace("0xabc").await, TraceOutcome::Unreadable(_)));
    }

    #[tokio::test]
    async fn test_rpc_client_transport_failure() {
        // Nothing listens on the discard port.
        let client = RpcClient::new("http://127.0.0.1:9".to_string(), Duration::from_secs(2)).unwrap();
        assert!(matches!(client.trace("0xabc").await, TraceOutcome::TransportFailure(_)));
    }

    #[tokio::test]
    async fn test_rpc_client_revert() {
        let url = serve_once(r#"{"jsonrpc":"2.0","id":1,"result":{"failed":true,"error":"Revert","output":"0x08c379a0"}}"#).await;
        let client = RpcClient::new(url, Duration::from_secs(5)).unwrap();
        match client.trace("0xabc").await {
            TraceOutcome::Revert { output } => assert_eq!(output, "08c379a0"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
