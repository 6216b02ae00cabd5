//! The attendance service facade: session control, submissions, and
//! report retrieval behind one type.
//!
//! Owns the shared registry, one issuer handle per active session, the
//! validator, and the store handle. This is the layer an HTTP surface
//! or RPC collaborator wraps; the types here are its wire contract.

use std::collections::HashMap;
use std::sync::Arc;

use rollcall_analytics::{analyze, session_stats, AnomalyReport, SessionStats};
use rollcall_issuer::{spawn_issuer, IssuerHandle, RotationConfig, TokenIssued};
use rollcall_protocol::{Clock, SessionKey, SubmissionDetails, TokenCodec};
use rollcall_registry::{SessionRegistry, SharedRegistry};
use rollcall_validator::{
    validate_course_code, AttendanceStore, Decision, Validator, ValidatorConfig,
};
use tokio::sync::broadcast;
use tracing::info;

use crate::RollcallError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A submission request from the scanner collaborator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmissionRequest {
    /// Decoded QR text, exactly as scanned.
    pub raw_scan_text: String,
    /// Authenticated identity of the submitter, supplied by the
    /// identity provider — never by the submission body itself.
    pub submitter_id: String,
    pub name: String,
    pub external_id: String,
    pub group: String,
}

/// The service's answer to one submission attempt.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmissionResponse {
    /// Whether a record was created.
    pub accepted: bool,
    /// Set on rejection: the single tagged reason, rendered for the
    /// student.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Set on acceptance: the persisted record's identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

// ---------------------------------------------------------------------------
// AttendanceService
// ---------------------------------------------------------------------------

/// High-level entry point wiring registry, issuer, validator, store,
/// and analytics together.
///
/// Generic over the store (the durable collaborator) and the codec, so
/// deployments can swap either without touching the protocol flow.
pub struct AttendanceService<S: AttendanceStore, C: TokenCodec + Clone> {
    registry: SharedRegistry,
    store: Arc<S>,
    codec: C,
    clock: Arc<dyn Clock>,
    rotation: RotationConfig,
    validator: Validator<S, C>,
    /// One issuer per active session.
    issuers: tokio::sync::Mutex<HashMap<SessionKey, IssuerHandle>>,
}

impl<S: AttendanceStore, C: TokenCodec + Clone> AttendanceService<S, C> {
    /// Creates a service over the given store and codec. The rotation
    /// window doubles as the validator's freshness window, so the two
    /// can never disagree.
    pub fn new(store: Arc<S>, codec: C, clock: Arc<dyn Clock>, rotation: RotationConfig) -> Self {
        let rotation = rotation.validated();
        let registry: SharedRegistry =
            Arc::new(tokio::sync::Mutex::new(SessionRegistry::new()));
        let validator = Validator::new(
            registry.clone(),
            store.clone(),
            codec.clone(),
            clock.clone(),
            ValidatorConfig {
                rotation_window_ms: rotation.window_ms,
                ..ValidatorConfig::default()
            },
        );
        Self {
            registry,
            store,
            codec,
            clock,
            rotation,
            validator,
            issuers: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Opens a session and starts its token rotation.
    ///
    /// Returns the token stream for the display collaborator: one
    /// [`TokenIssued`] per rotation, the first of them immediate.
    ///
    /// # Errors
    /// - [`RollcallError::InvalidCourseCode`] — malformed course code
    /// - [`RollcallError::Registry`] with `AlreadyActive` — a session
    ///   for this `(course, date)` is already running
    pub async fn open_session(
        &self,
        course_code: &str,
        date: &str,
        owner_id: &str,
    ) -> Result<broadcast::Receiver<TokenIssued>, RollcallError> {
        if !validate_course_code(course_code) {
            return Err(RollcallError::InvalidCourseCode(course_code.to_string()));
        }

        let key = SessionKey::new(course_code, date);
        {
            let mut registry = self.registry.lock().await;
            registry.open_session(key.clone(), owner_id, self.clock.now_millis())?;
        }

        let handle = spawn_issuer(
            key.clone(),
            owner_id,
            self.registry.clone(),
            self.codec.clone(),
            self.clock.clone(),
            self.rotation.clone(),
        );
        let stream = handle.subscribe();
        self.issuers.lock().await.insert(key, handle);
        Ok(stream)
    }

    /// Re-subscribes to a running session's token stream — the recovery
    /// path for a display that lagged past the channel capacity.
    ///
    /// # Errors
    /// [`RollcallError::Registry`] with `NotFound` when no issuer is
    /// running for this session.
    pub async fn subscribe(
        &self,
        course_code: &str,
        date: &str,
    ) -> Result<broadcast::Receiver<TokenIssued>, RollcallError> {
        let key = SessionKey::new(course_code, date);
        let issuers = self.issuers.lock().await;
        issuers
            .get(&key)
            .map(|handle| handle.subscribe())
            .ok_or_else(|| rollcall_registry::RegistryError::NotFound(key).into())
    }

    /// Ends the session and halts its token rotation.
    ///
    /// The registry transitions first, so an emission already mid-flight
    /// is refused and discarded; the issuer task is then told to stop.
    ///
    /// # Errors
    /// [`RollcallError::Registry`] with `NotFound` or `NotOwner`.
    pub async fn close_session(
        &self,
        course_code: &str,
        date: &str,
        caller_id: &str,
    ) -> Result<(), RollcallError> {
        let key = SessionKey::new(course_code, date);
        {
            let mut registry = self.registry.lock().await;
            registry.close_session(&key, caller_id)?;
        }

        if let Some(handle) = self.issuers.lock().await.remove(&key) {
            handle.stop().await;
        }
        info!(session = %key, "session ended, rotation halted");
        Ok(())
    }

    /// Validates and, if accepted, persists one submission.
    ///
    /// # Errors
    /// [`RollcallError::Store`] when the store could not answer; the
    /// submission was neither accepted nor rejected and should be
    /// retried.
    pub async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionResponse, RollcallError> {
        let details = SubmissionDetails {
            name: request.name.clone(),
            external_id: request.external_id.clone(),
            group: request.group.clone(),
        };
        let decision = self
            .validator
            .submit(&request.raw_scan_text, &request.submitter_id, &details)
            .await?;

        Ok(match decision {
            Decision::Accepted(record) => SubmissionResponse {
                accepted: true,
                reason: None,
                record_id: Some(record.record_id()),
            },
            Decision::Rejected(reason) => SubmissionResponse {
                accepted: false,
                reason: Some(reason.to_string()),
                record_id: None,
            },
        })
    }

    /// Generates the anomaly report for an Ended session.
    ///
    /// Derived on demand from the current record set: calling it twice
    /// with no new records yields identical findings.
    ///
    /// # Errors
    /// - [`RollcallError::Registry`] with `NotFound` — never opened
    /// - [`RollcallError::SessionStillActive`] — close the session first
    pub async fn report(
        &self,
        course_code: &str,
        date: &str,
    ) -> Result<AnomalyReport, RollcallError> {
        let records = self.ended_session_records(course_code, date).await?;
        Ok(analyze(&records))
    }

    /// Aggregate statistics for an Ended session, gated like
    /// [`report`](Self::report).
    pub async fn stats(
        &self,
        course_code: &str,
        date: &str,
    ) -> Result<SessionStats, RollcallError> {
        let records = self.ended_session_records(course_code, date).await?;
        Ok(session_stats(&records))
    }

    async fn ended_session_records(
        &self,
        course_code: &str,
        date: &str,
    ) -> Result<Vec<rollcall_protocol::AttendanceRecord>, RollcallError> {
        let key = SessionKey::new(course_code, date);
        {
            let registry = self.registry.lock().await;
            let session = registry
                .session(&key)
                .ok_or_else(|| rollcall_registry::RegistryError::NotFound(key.clone()))?;
            if session.status.is_active() {
                return Err(RollcallError::SessionStillActive(key));
            }
        }
        Ok(self.store.records_for_session(&key).await?)
    }
}
