//! The session registry: sessions plus every token issued for them.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself — it uses plain
//! `HashMap`s. Callers wrap it in `Arc<Mutex<_>>` (the service facade
//! does exactly that). Keeping the locking at one level above means a
//! `register_token` and the `lookup_token` that follows it are ordered
//! by the same lock: once registration returns, every subsequent lookup
//! sees the token.

use std::collections::HashMap;

use rollcall_protocol::{SessionKey, TokenClaims};

use crate::{RegistryError, Session, SessionStatus};

/// A token the issuer has registered: its claims plus the exact wire
/// text that was displayed.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Decoded claims of the token.
    pub claims: TokenClaims,
    /// Encoded text as rendered into the QR image.
    pub text: String,
}

/// Tracks every session and the tokens issued for each.
///
/// ## Lifecycle
///
/// ```text
/// open_session() ──→ register_token()* ──→ close_session()
///                         │
///                         ▼
///                  lookup_token() / latest_token()
/// ```
///
/// Tokens are append-only: registering a new one supersedes the
/// previous "latest" but never removes it, so a scan of a
/// slightly-older-but-unexpired token still resolves.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// All known sessions, keyed by `(course, date)`.
    sessions: HashMap<SessionKey, Session>,
    /// Every registered token, keyed by nonce. Append-only.
    tokens: HashMap<String, IssuedToken>,
    /// Nonce of the most recently registered token per session.
    latest: HashMap<SessionKey, String>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new Active session for `(course, date)`.
    ///
    /// An Ended session for the same key is replaced; its tokens age
    /// out of validity on their own.
    ///
    /// # Errors
    /// [`RegistryError::AlreadyActive`] if an Active session already
    /// exists for this key — regardless of who owns it, since at most
    /// one QR stream per course-date may run at a time.
    pub fn open_session(
        &mut self,
        key: SessionKey,
        owner_id: impl Into<String>,
        now_ms: u64,
    ) -> Result<&Session, RegistryError> {
        if let Some(existing) = self.sessions.get(&key) {
            if existing.status.is_active() {
                return Err(RegistryError::AlreadyActive(key));
            }
            self.latest.remove(&key);
        }

        let owner_id = owner_id.into();
        tracing::info!(session = %key, owner = %owner_id, "session opened");

        let session = Session {
            key: key.clone(),
            owner_id,
            status: SessionStatus::Active,
            opened_at_ms: now_ms,
        };
        self.sessions.insert(key.clone(), session);
        Ok(self.sessions.get(&key).expect("just inserted"))
    }

    /// Closes the session, transitioning it to Ended.
    ///
    /// Idempotent for the owner: closing an already-Ended session
    /// succeeds without effect.
    ///
    /// # Errors
    /// - [`RegistryError::NotFound`] — no session for this key
    /// - [`RegistryError::NotOwner`] — caller did not open it
    pub fn close_session(
        &mut self,
        key: &SessionKey,
        caller_id: &str,
    ) -> Result<&Session, RegistryError> {
        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;

        if session.owner_id != caller_id {
            return Err(RegistryError::NotOwner(key.clone()));
        }

        if session.status.is_active() {
            session.status = SessionStatus::Ended;
            tracing::info!(session = %key, "session closed");
        }
        Ok(self.sessions.get(key).expect("just looked up"))
    }

    /// Records a freshly issued token as the latest for its session.
    ///
    /// # Errors
    /// - [`RegistryError::NotFound`] — the token's session was never opened
    /// - [`RegistryError::NotActive`] — the session has Ended; the
    ///   emission raced a close and must be discarded, not displayed
    /// - [`RegistryError::NotOwner`] — the token's owner is not the
    ///   session's owner
    pub fn register_token(
        &mut self,
        claims: TokenClaims,
        text: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let key = claims.session.clone();
        let session = self
            .sessions
            .get(&key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;

        if !session.status.is_active() {
            return Err(RegistryError::NotActive(key));
        }
        if session.owner_id != claims.owner_id {
            return Err(RegistryError::NotOwner(key));
        }

        tracing::debug!(
            session = %key,
            nonce = %claims.nonce,
            issued_at_ms = claims.issued_at_ms,
            "token registered"
        );

        self.latest.insert(key, claims.nonce.clone());
        self.tokens.insert(
            claims.nonce.clone(),
            IssuedToken {
                claims,
                text: text.into(),
            },
        );
        Ok(())
    }

    /// Resolves a token by its nonce.
    ///
    /// `None` covers tampered and fabricated nonces alike — the
    /// validator maps it to its UnknownToken rejection.
    pub fn lookup_token(&self, nonce: &str) -> Option<&IssuedToken> {
        self.tokens.get(nonce)
    }

    /// The most recently registered token for a session, if any.
    pub fn latest_token(&self, key: &SessionKey) -> Option<&IssuedToken> {
        self.latest.get(key).and_then(|n| self.tokens.get(n))
    }

    /// Looks up a session by key.
    pub fn session(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// Whether an Active session exists for this key.
    pub fn is_active(&self, key: &SessionKey) -> bool {
        self.sessions
            .get(key)
            .is_some_and(|s| s.status.is_active())
    }

    /// Number of registered tokens across all sessions.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

// =========================================================================
// Tests
// =========================================================================
