//! Session types: one instructor-initiated attendance window.

use rollcall_protocol::SessionKey;

/// Lifecycle state of a session.
///
/// ```text
///   Active ──(close_session)──→ Ended
/// ```
///
/// There is no way back: an Ended session stays Ended, and its record
/// set becomes the input to the anomaly pass. A new session for the
/// same `(course, date)` replaces it in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Accepting token registrations and submissions.
    Active,
    /// Closed by its owner. Tokens can no longer be registered.
    Ended,
}

impl SessionStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// One attendance session for a course and date.
#[derive(Debug, Clone)]
pub struct Session {
    /// The `(course, date)` pair identifying this session.
    pub key: SessionKey,
    /// Identity of the instructor who opened it. Only this identity
    /// may close the session.
    pub owner_id: String,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// When the session was opened, epoch milliseconds.
    pub opened_at_ms: u64,
}
