//! Error types for the registry layer.

use rollcall_protocol::SessionKey;

/// Errors that can occur managing sessions and their tokens.
///
/// All of these are caller-recoverable: retry after correcting the
/// request, or accept that the session moved on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An Active session already exists for this `(course, date)`.
    #[error("session {0} is already active")]
    AlreadyActive(SessionKey),

    /// No session exists for this `(course, date)`.
    #[error("session {0} not found")]
    NotFound(SessionKey),

    /// The caller is not the instructor who opened the session.
    #[error("caller does not own session {0}")]
    NotOwner(SessionKey),

    /// The session exists but has Ended. Token registration against an
    /// ended session is refused so a racing emission is discarded.
    #[error("session {0} is not active")]
    NotActive(SessionKey),
}
