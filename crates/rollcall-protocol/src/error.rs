//! Error types for the protocol layer.
//!
//! Decode failures are strictly about the shape of the scanned text.
//! Validity failures (expiry, replay) belong to the validator and are
//! deliberately not representable here.

/// Errors produced while decoding scanned token text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The text could not be parsed into the expected field types —
    /// not valid base64, not UTF-8, a non-numeric timestamp, an empty
    /// field, or extra separators.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The payload decoded cleanly but required fields are missing.
    #[error("truncated token: expected {expected} fields, found {found}")]
    Truncated {
        /// Fields the wire format requires.
        expected: usize,
        /// Fields actually present.
        found: usize,
    },
}
