//! Validator outcomes and the pure timestamp check.

use rollcall_protocol::{AttendanceRecord, DecodeError, TokenClaims};

use crate::ValidatorConfig;

/// Why a submission was rejected.
///
/// These are caller-recoverable outcomes, not process errors: the
/// student re-scans or corrects a field and submits again, producing a
/// fresh validator invocation. Store failures are deliberately NOT a
/// variant — they surface as [`StoreError`](crate::StoreError) so the
/// caller can retry with backoff instead of telling the student "no".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The scanned text does not decode into token claims.
    #[error("malformed token: {0}")]
    MalformedToken(#[from] DecodeError),

    /// The nonce resolves to no registered token — tampered or
    /// fabricated payloads land here.
    #[error("unknown token")]
    UnknownToken,

    /// The token aged past the rotation window. Scanning again gets the
    /// current token.
    #[error("token expired: codes are valid for {window_ms} ms, scan again")]
    Expired {
        /// The window the token missed.
        window_ms: u64,
    },

    /// The token's issue time is in the future or absurdly far in the
    /// past — clock skew or a corrupted payload, not a true expiry.
    #[error("invalid token timestamp")]
    InvalidTimestamp,

    /// An accepted record already exists for this identity in this
    /// session. Keyed by identity, not nonce: a newer token does not
    /// earn a second record.
    #[error("attendance already recorded for this session")]
    AlreadySubmitted,

    /// The submitted details failed a field predicate.
    #[error("invalid fields: {0}")]
    InvalidFields(String),
}

/// The validator's verdict on one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Submission accepted; the record has been persisted.
    Accepted(AttendanceRecord),
    /// Submission rejected for exactly one reason. Terminal for this
    /// attempt only — the caller may rescan and resubmit.
    Rejected(RejectReason),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Pure freshness and sanity check over a token's issue time.
///
/// Deterministic in `(claims, now_ms, config)` — no clock reads, no
/// store. Order of precedence:
///
/// - issued in the future → [`RejectReason::InvalidTimestamp`]
/// - older than `max_token_age_windows` windows →
///   [`RejectReason::InvalidTimestamp`] (corruption/skew defense)
/// - at or past one window → [`RejectReason::Expired`]
/// - inside `[issued_at, issued_at + window)` → fresh
pub fn check_timestamp(
    claims: &TokenClaims,
    now_ms: u64,
    config: &ValidatorConfig,
) -> Result<(), RejectReason> {
    if claims.issued_at_ms > now_ms {
        return Err(RejectReason::InvalidTimestamp);
    }
    let age_ms = now_ms - claims.issued_at_ms;
    let max_age_ms = config.max_token_age_windows * config.rotation_window_ms;
    if age_ms > max_age_ms {
        return Err(RejectReason::InvalidTimestamp);
    }
    if age_ms >= config.rotation_window_ms {
        return Err(RejectReason::Expired {
            window_ms: config.rotation_window_ms,
        });
    }
    Ok(())
}
