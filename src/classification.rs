//! Classification records
//!
//! The fixed set of values this indexer writes into `transactions.error`
//! and `transactions.revert_reason`, and the policy mapping a trace outcome
//! onto one of them.

use crate::revert::decode_revert_hex;
use crate::trace::TraceOutcome;
use tracing::{debug, warn};
use unicode_general_category::{get_general_category, GeneralCategory};

/// Tag written when nothing better can be recorded.
pub const UNKNOWN: &str = "Unknown";

/// Tag written for reverted transactions.
pub const REVERTED: &str = "Reverted";

/// Terminal classification of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Executed without error. Recorded as an empty `error`.
    Succeeded,
    /// Reverted; `reason` is the decoded revert string or [`UNKNOWN`].
    Reverted { reason: String },
    /// Non-revert execution error, verbatim from the node.
    Failed(String),
    /// The trace could not be interpreted.
    Unknown,
}

impl Classification {
    /// Value for the `error` column.
    pub fn error(&self) -> &str {
        match self {
            Classification::Succeeded => "",
            Classification::Reverted { .. } => REVERTED,
            Classification::Failed(text) => text.as_str(),
            Classification::Unknown => UNKNOWN,
        }
    }

    /// Value for the `revert_reason` column, if this record sets it.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Classification::Reverted { reason } => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Copy with untrusted text stripped of non-printable characters.
    pub fn sanitized(&self) -> Classification {
        match self {
            Classification::Reverted { reason } => Classification::Reverted { reason: sanitize_text(reason) },
            Classification::Failed(text) => Classification::Failed(sanitize_text(text)),
            other => other.clone(),
        }
    }
}

/// Decide what to record for `tx_hash` given its trace outcome.
///
/// Returns `None` for transport failures: the row must stay eligible.
pub fn classify(tx_hash: &str, outcome: TraceOutcome) -> Option<Classification> {
    match outcome {
        TraceOutcome::TransportFailure(e) => {
            warn!(%tx_hash, reason = ?e, "trace call failed, leaving transaction pending");
            None
        }
        TraceOutcome::Unreadable(e) => {
            debug!(%tx_hash, reason = %e, "unreadable trace");
            Some(Classification::Unknown)
        }
        TraceOutcome::Success => Some(Classification::Succeeded),
        TraceOutcome::OtherError(text) => {
            debug!(%tx_hash, error = %text, "not a revert");
            Some(Classification::Failed(text))
        }
        TraceOutcome::Revert { output } => {
            let reason = match decode_revert_hex(&output) {
                Ok(reason) => reason,
                Err(e) => {
                    debug!(%tx_hash, %output, reason = %e, "unable to unpack revert output");
                    UNKNOWN.to_string()
                }
            };
            Some(Classification::Reverted { reason })
        }
    }
}

/// Strip every character that is not printable.
///
/// Keeps letters, marks, numbers, punctuation, symbols and the ASCII space.
/// Drops controls, format characters (including tag characters), private
/// use, unassigned code points and every separator other than U+0020.
pub fn sanitize_text(text: &str) -> String {
    text.chars().filter(|&c| is_printable(c)).collect()
}

fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !matches!(
        get_general_category(c),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::PrivateUse
            | GeneralCategory::Surrogate
            | GeneralCategory::Unassigned
            | GeneralCategory::LineSeparator
            | GeneralCategory::ParagraphSeparator
            | GeneralCategory::SpaceSeparator
    )
}
