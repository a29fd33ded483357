//! Revert reason decoding
//!
//! Unpacks the standard Solidity `Error(string)` revert payload:
//!
//! ```text
//! 0x08c379a0                       selector
//! [32 bytes] offset of the string  (relative to the end of the selector)
//! [32 bytes] string length
//! [n bytes]  string bytes, right padded to a 32 byte boundary
//! ```
//!
//! Decoding never panics. Any payload that does not follow this layout is
//! reported as a [`DecodeError`]; the caller decides what to record instead.

use alloy_primitives::{fixed_bytes, FixedBytes, U256};
use thiserror::Error;

/// Selector of `Error(string)`, i.e. `keccak256("Error(string)")[..4]`.
pub const ERROR_SELECTOR: FixedBytes<4> = fixed_bytes!("08c379a0");

const WORD: usize = 32;

/// Why a revert payload could not be turned into a reason string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("output is not valid hex: {0}")]
    InvalidHex(String),

    #[error("payload too short: {0} bytes")]
    TooShort(usize),

    #[error("selector {0} is not Error(string)")]
    SelectorMismatch(FixedBytes<4>),

    #[error("string offset out of bounds")]
    BadOffset,

    #[error("string length out of bounds")]
    BadLength,
}

/// Decode a hex encoded revert payload (without the `0x` prefix).
pub fn decode_revert_hex(body: &str) -> Result<String, DecodeError> {
    let bytes = hex::decode(body).map_err(|e| DecodeError::InvalidHex(e.to_string()))?;
    unpack_revert(&bytes)
}

/// Unpack an ABI encoded `Error(string)` payload into its reason.
pub fn unpack_revert(payload: &[u8]) -> Result<String, DecodeError> {
    if payload.len() < 4 {
        return Err(DecodeError::TooShort(payload.len()));
    }

    let selector = FixedBytes::<4>::from_slice(&payload[..4]);
    if selector != ERROR_SELECTOR {
        return Err(DecodeError::SelectorMismatch(selector));
    }

    let data = &payload[4..];
    if data.len() < WORD {
        return Err(DecodeError::TooShort(payload.len()));
    }

    let offset = read_word(data, 0).ok_or(DecodeError::BadOffset)?;
    let length_end = offset.checked_add(WORD).ok_or(DecodeError::BadOffset)?;
    if length_end > data.len() {
        return Err(DecodeError::BadOffset);
    }

    let length = read_word(data, offset).ok_or(DecodeError::BadLength)?;
    let end = length_end.checked_add(length).ok_or(DecodeError::BadLength)?;
    if end > data.len() {
        return Err(DecodeError::BadLength);
    }

    // Reasons assembled with abi.encodePacked often carry raw bytes.
    Ok(String::from_utf8_lossy(&data[length_end..end]).into_owned())
}

/// Read the 32 byte word at `at` as a length/offset.
///
/// Returns `None` if the word is missing or too large to index anything
/// a node could plausibly return.
fn read_word(data: &[u8], at: usize) -> Option<usize> {
    let word = data.get(at..at.checked_add(WORD)?)?;
    let value = U256::from_be_slice(word);
    if value > U256::from(u32::MAX) {
        return None;
    }
    Some(value.as_limbs()[0] as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an `Error(string)` payload the way solc does.
    fn encode_error(reason: &str) -> Vec<u8> {
        let mut out = ERROR_SELECTOR.to_vec();
        out.extend_from_slice(&U256::from(32u64).to_be_bytes::<32>());
        out.extend_from_slice(&U256::from(reason.len()).to_be_bytes::<32>());
        out.extend_from_slice(reason.as_bytes());
        let padding = (WORD - reason.len() % WORD) % WORD;
        out.extend(std::iter::repeat(0u8).take(padding));
        out
    }

    #[test]
    fn test_unpack_insufficient_balance() {
        let payload = encode_error("insufficient balance");
        assert_eq!(unpack_revert(&payload).unwrap(), "insufficient balance");
    }

    #[test]
    fn test_decode_hex_from_node_output() {
        // Output captured from a node for `require(false, "Custom error message")`.
        let body = "08c379a0\
            0000000000000000000000000000000000000000000000000000000000000020\
            0000000000000000000000000000000000000000000000000000000000000014\
            437573746f6d206572726f72206d657373616765000000000000000000000000";
        assert_eq!(decode_revert_hex(body).unwrap(), "Custom error message");
    }

    #[test]
    fn test_empty_reason() {
        let payload = encode_error("");
        assert_eq!(unpack_revert(&payload).unwrap(), "");
    }

    #[test]
    fn test_long_reason_spans_multiple_words() {
        let reason = "a".repeat(100);
        assert_eq!(unpack_revert(&encode_error(&reason)).unwrap(), reason);
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(decode_revert_hex("zz"), Err(DecodeError::InvalidHex(_))));
        assert!(matches!(decode_revert_hex("08c"), Err(DecodeError::InvalidHex(_))));
    }

    #[test]
    fn test_empty_and_truncated_payloads() {
        assert_eq!(unpack_revert(&[]), Err(DecodeError::TooShort(0)));
        assert_eq!(unpack_revert(&[0x08, 0xc3]), Err(DecodeError::TooShort(2)));

        // Selector only
        assert_eq!(unpack_revert(ERROR_SELECTOR.as_slice()), Err(DecodeError::TooShort(4)));

        // Length word claims more bytes than present
        let mut payload = encode_error("insufficient balance");
        payload.truncate(4 + 64 + 5);
        assert_eq!(unpack_revert(&payload), Err(DecodeError::BadLength));

        // Offset word present, length word missing
        let payload = encode_error("x");
        assert_eq!(unpack_revert(&payload[..4 + 32]), Err(DecodeError::BadOffset));
    }

    #[test]
    fn test_custom_error_selector_rejected() {
        // Custom errors (e.g. `InsufficientBalance()`) use their own selector.
        let payload = hex::decode("cf479181").unwrap();
        assert!(matches!(unpack_revert(&payload), Err(DecodeError::SelectorMismatch(_))));

        // `Panic(uint256)`
        let mut payload = hex::decode("4e487b71").unwrap();
        payload.extend_from_slice(&U256::from(0x11u64).to_be_bytes::<32>());
        assert!(matches!(unpack_revert(&payload), Err(DecodeError::SelectorMismatch(_))));
    }

    #[test]
    fn test_huge_offset_and_length() {
        let mut payload = ERROR_SELECTOR.to_vec();
        payload.extend_from_slice(&U256::MAX.to_be_bytes::<32>());
        payload.extend_from_slice(&[0u8; 32]);
        assert_eq!(unpack_revert(&payload), Err(DecodeError::BadOffset));

        let mut payload = ERROR_SELECTOR.to_vec();
        payload.extend_from_slice(&U256::from(32u64).to_be_bytes::<32>());
        payload.extend_from_slice(&U256::from(u32::MAX).to_be_bytes::<32>());
        assert_eq!(unpack_revert(&payload), Err(DecodeError::BadLength));
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut payload = ERROR_SELECTOR.to_vec();
        payload.extend_from_slice(&U256::from(32u64).to_be_bytes::<32>());
        payload.extend_from_slice(&U256::from(3u64).to_be_bytes::<32>());
        payload.extend_from_slice(&[0x41, 0xff, 0x42]);
        assert_eq!(unpack_revert(&payload).unwrap(), "A\u{FFFD}B");
    }

    #[test]
    fn test_arbitrary_bytes_never_panic() {
        // Cheap deterministic fuzz: xorshift generated payloads of every length up to 200,
        // half of them starting with the real selector.
        let mut state: u64 = 0x9e3779b97f4a7c15;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for len in 0..200usize {
            for round in 0..8 {
                let mut payload: Vec<u8> = (0..len).map(|_| next() as u8).collect();
                if round % 2 == 0 && len >= 4 {
                    payload[..4].copy_from_slice(ERROR_SELECTOR.as_slice());
                }
                let _ = unpack_revert(&payload);
                let _ = decode_revert_hex(&hex::encode(&payload));
            }
        }
    }
}
