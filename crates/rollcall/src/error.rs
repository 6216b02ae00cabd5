//! Unified error type for the Rollcall facade.

use rollcall_protocol::{DecodeError, SessionKey};
use rollcall_registry::RegistryError;
use rollcall_validator::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// Callers of the [`AttendanceService`](crate::AttendanceService) deal
/// with this single type; the `#[from]` attributes let `?` convert
/// sub-crate errors automatically. Every variant is recoverable by the
/// caller — nothing here is fatal.
#[derive(Debug, thiserror::Error)]
pub enum RollcallError {
    /// A token decode error surfaced outside the submission path.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A session/token registry error (already active, not found,
    /// not owner).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The record store could not answer; retry with backoff.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Reports are only available once the session has Ended.
    #[error("session {0} is still active; close it before requesting a report")]
    SessionStillActive(SessionKey),

    /// The course code does not match the institution's format.
    #[error("invalid course code {0:?} (expected e.g. CS101)")]
    InvalidCourseCode(String),
}
