//! Core data model shared across the Rollcall workspace.
//!
//! Everything here is a plain value type: immutable once constructed,
//! cheap to clone, serde-derived so it can cross a wire or land in a
//! document store unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How long an issued token stays valid, in milliseconds.
///
/// The issuer emits a fresh token every window; the validator rejects
/// any token older than one window. 15 seconds is short enough that a
/// photographed QR code is useless to anyone outside the room by the
/// time it is shared.
pub const ROTATION_WINDOW_MS: u64 = 15_000;

/// Number of colon-separated fields in the token wire text:
/// `course:date:issuedAtMillis:nonce:owner`.
pub const TOKEN_FIELD_COUNT: usize = 5;

// ---------------------------------------------------------------------------
// SessionKey
// ---------------------------------------------------------------------------

/// Identifies one attendance session: a course on a given date.
///
/// Used as the lookup key everywhere a session is referenced — the
/// registry, the record store, and inside every token's claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// Course identifier, e.g. `CS101`.
    pub course_code: String,
    /// Calendar date of the session, e.g. `2024-01-10`.
    pub date: String,
}

impl SessionKey {
    pub fn new(course_code: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            course_code: course_code.into(),
            date: date.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.course_code, self.date)
    }
}

// ---------------------------------------------------------------------------
// TokenClaims
// ---------------------------------------------------------------------------

/// The decoded contents of one rotating token.
///
/// Claims are immutable once issued. A token is valid only during
/// `[issued_at_ms, issued_at_ms + ROTATION_WINDOW_MS)`; enforcing that
/// is the validator's job, not this type's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The session this token admits submissions for.
    pub session: SessionKey,
    /// Identity of the instructor who owns the session.
    pub owner_id: String,
    /// Wall-clock issue time, milliseconds since the Unix epoch.
    pub issued_at_ms: u64,
    /// Random single-issuance marker. 128 bits of entropy, hex-formatted,
    /// so two tokens issued inside the same window never collide.
    pub nonce: String,
}

impl TokenClaims {
    /// The instant this token stops being fresh.
    pub fn expires_at_ms(&self) -> u64 {
        self.issued_at_ms + ROTATION_WINDOW_MS
    }
}

// ---------------------------------------------------------------------------
// SubmissionDetails
// ---------------------------------------------------------------------------

/// The identity details a student submits alongside a scanned token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionDetails {
    /// Display name of the student.
    pub name: String,
    /// Roll number, e.g. `21CS001`.
    pub external_id: String,
    /// Branch the student belongs to, e.g. `CSE`.
    pub group: String,
}

// ---------------------------------------------------------------------------
// AttendanceRecord
// ---------------------------------------------------------------------------

/// One accepted attendance submission.
///
/// Created only by a successful validator decision, never mutated and
/// never deleted — the record set is the audit trail the anomaly pass
/// runs over. Uniqueness key is `(session, submitter_id)`: one identity
/// holds at most one record per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Session this record belongs to.
    pub session: SessionKey,
    /// Opaque authenticated identity of the submitter.
    pub submitter_id: String,
    /// Submitted display name.
    pub name: String,
    /// Submitted roll number.
    pub external_id: String,
    /// Submitted branch.
    pub group: String,
    /// When the validator accepted this submission, epoch milliseconds.
    pub accepted_at_ms: u64,
    /// Nonce of the token that was presented. Kept for audit, not used
    /// as the replay key — replay protection is per identity, not per
    /// token.
    pub token_nonce: String,
}

impl AttendanceRecord {
    /// Stable identifier for this record, derived from its uniqueness key.
    pub fn record_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.session.course_code, self.session.date, self.submitter_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_display_joins_course_and_date() {
        let key = SessionKey::new("CS101", "2024-01-10");
        assert_eq!(key.to_string(), "CS101@2024-01-10");
    }

    #[test]
    fn test_expires_at_adds_one_window() {
        let claims = TokenClaims {
            session: SessionKey::new("CS101", "2024-01-10"),
            owner_id: "teacherA".into(),
            issued_at_ms: 1_000,
            nonce: "abc".into(),
        };
        assert_eq!(claims.expires_at_ms(), 1_000 + ROTATION_WINDOW_MS);
    }

    #[test]
    fn test_record_id_derives_from_uniqueness_key() {
        let record = AttendanceRecord {
            session: SessionKey::new("CS101", "2024-01-10"),
            submitter_id: "studentX".into(),
            name: "Ada Lovelace".into(),
            external_id: "21CS001".into(),
            group: "CSE".into(),
            accepted_at_ms: 5_000,
            token_nonce: "abc".into(),
        };
        assert_eq!(record.record_id(), "CS101_2024-01-10_studentX");
    }
}
