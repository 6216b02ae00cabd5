//! The validator: decode → lookup → freshness → replay → fields → persist.
//!
//! Each check short-circuits to exactly one tagged rejection. All five
//! checks are deterministic given `(token, existing records, now)`; the
//! only writes are the final record insert and the log lines.

use std::sync::Arc;

use rollcall_protocol::{
    AttendanceRecord, Clock, SubmissionDetails, TokenClaims, TokenCodec, ROTATION_WINDOW_MS,
};
use rollcall_registry::SharedRegistry;
use tracing::{debug, info};

use crate::{check_timestamp, validate_details, AttendanceStore, Decision, RejectReason, StoreError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for validation behavior.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Freshness window, matching the issuer's rotation window.
    pub rotation_window_ms: u64,
    /// Sanity bound: tokens older than this many windows are rejected
    /// as InvalidTimestamp rather than Expired — a defense against
    /// clock skew and corrupted payloads.
    pub max_token_age_windows: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            rotation_window_ms: ROTATION_WINDOW_MS,
            max_token_age_windows: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Decides ACCEPT/REJECT for incoming submissions.
///
/// Many validator invocations run concurrently — one per scanning
/// student. They share the registry behind its lock (held only for the
/// nonce lookup) and contend at the store only on the conditional
/// insert, which the store keeps atomic per `(session, submitter)`.
pub struct Validator<S: AttendanceStore, C: TokenCodec> {
    registry: SharedRegistry,
    store: Arc<S>,
    codec: C,
    clock: Arc<dyn Clock>,
    config: ValidatorConfig,
}

impl<S: AttendanceStore, C: TokenCodec> Validator<S, C> {
    pub fn new(
        registry: SharedRegistry,
        store: Arc<S>,
        codec: C,
        clock: Arc<dyn Clock>,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            codec,
            clock,
            config,
        }
    }

    /// Runs the full decision sequence for one submission attempt.
    ///
    /// Returns `Ok(Decision)` for every completed evaluation, accepted
    /// or not. `Err(StoreError)` means the store could not answer and
    /// the attempt should be retried by the caller — the student was
    /// never told yes or no.
    pub async fn submit(
        &self,
        raw_scan_text: &str,
        submitter_id: &str,
        details: &SubmissionDetails,
    ) -> Result<Decision, StoreError> {
        // 1. Decode the scanned text into claims.
        let scanned = match self.codec.decode(raw_scan_text) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(%submitter_id, error = %err, "submission rejected: malformed");
                return Ok(Decision::Rejected(RejectReason::MalformedToken(err)));
            }
        };

        // 2. Resolve the nonce against the registry. The registered
        // claims are authoritative from here on: a payload whose other
        // fields were tampered with cannot redirect a real nonce to a
        // different session.
        let claims = match self.resolve(&scanned.nonce).await {
            Some(claims) => claims,
            None => {
                debug!(%submitter_id, "submission rejected: unknown token");
                return Ok(Decision::Rejected(RejectReason::UnknownToken));
            }
        };

        // 3. Freshness and timestamp sanity.
        let now_ms = self.clock.now_millis();
        if let Err(reason) = check_timestamp(&claims, now_ms, &self.config) {
            debug!(
                %submitter_id,
                session = %claims.session,
                age_ms = now_ms.saturating_sub(claims.issued_at_ms),
                %reason,
                "submission rejected"
            );
            return Ok(Decision::Rejected(reason));
        }

        // 4. Replay: at most one accepted record per (session, submitter),
        // however many valid tokens this identity presents.
        if self.store.exists(&claims.session, submitter_id).await? {
            debug!(%submitter_id, session = %claims.session, "submission rejected: already submitted");
            return Ok(Decision::Rejected(RejectReason::AlreadySubmitted));
        }

        // 5. Field predicates.
        if let Err(detail) = validate_details(details) {
            debug!(%submitter_id, %detail, "submission rejected: invalid fields");
            return Ok(Decision::Rejected(RejectReason::InvalidFields(detail)));
        }

        // 6. Persist. The conditional write closes the race left open
        // between steps 4 and 6: if another attempt by the same identity
        // won in the meantime, this one reports AlreadySubmitted.
        let record = AttendanceRecord {
            session: claims.session.clone(),
            submitter_id: submitter_id.to_string(),
            name: details.name.trim().to_string(),
            external_id: details.external_id.clone(),
            group: details.group.clone(),
            accepted_at_ms: now_ms,
            token_nonce: claims.nonce.clone(),
        };
        if !self.store.insert_if_absent(record.clone()).await? {
            debug!(%submitter_id, session = %claims.session, "submission lost insert race");
            return Ok(Decision::Rejected(RejectReason::AlreadySubmitted));
        }

        info!(
            %submitter_id,
            session = %claims.session,
            accepted_at_ms = now_ms,
            "attendance accepted"
        );
        Ok(Decision::Accepted(record))
    }

    async fn resolve(&self, nonce: &str) -> Option<TokenClaims> {
        let registry = self.registry.lock().await;
        registry.lookup_token(nonce).map(|t| t.claims.clone())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the full decision sequence, driven by a
    //! `ManualClock` so freshness boundaries are exact. Naming
    //! convention: `test_{function}_{scenario}_{expected}`.

    use std::sync::Arc;

    use rollcall_protocol::{Base64Codec, ManualClock, SessionKey};
    use rollcall_registry::SessionRegistry;

    use super::*;
    use crate::MemoryStore;

    // -- Helpers ----------------------------------------------------------

    struct Fixture {
        validator: Validator<MemoryStore, Base64Codec>,
        registry: SharedRegistry,
        clock: ManualClock,
        store: MemoryStore,
    }

    fn key() -> SessionKey {
        SessionKey::new("CS101", "2024-01-10")
    }

    fn details() -> SubmissionDetails {
        SubmissionDetails {
            name: "Ada Lovelace".into(),
            external_id: "21CS001".into(),
            group: "CSE".into(),
        }
    }

    /// Opens the session and hands back a validator whose clock starts
    /// at 0.
    fn fixture() -> Fixture {
        let mut registry = SessionRegistry::new();
        registry.open_session(key(), "teacherA", 0).expect("should open");
        let registry: SharedRegistry = Arc::new(tokio::sync::Mutex::new(registry));
        let clock = ManualClock::new(0);
        let store = MemoryStore::new();
        let validator = Validator::new(
            registry.clone(),
            Arc::new(store.clone()),
            Base64Codec,
            Arc::new(clock.clone()),
            ValidatorConfig::default(),
        );
        Fixture {
            validator,
            registry,
            clock,
            store,
        }
    }

    /// Registers a token issued at `issued_at_ms` and returns its wire
    /// text.
    async fn issue_token(fx: &Fixture, nonce: &str, issued_at_ms: u64) -> String {
        let claims = TokenClaims {
            session: key(),
            owner_id: "teacherA".into(),
            issued_at_ms,
            nonce: nonce.into(),
        };
        let text = Base64Codec.encode(&claims);
        fx.registry
            .lock()
            .await
            .register_token(claims, text.clone())
            .expect("should register");
        text
    }

    fn reason(decision: Decision) -> RejectReason {
        match decision {
            Decision::Rejected(reason) => reason,
            Decision::Accepted(record) => panic!("expected rejection, got {record:?}"),
        }
    }

    // =====================================================================
    // Happy path and the reference scenario
    // =====================================================================

    #[tokio::test]
    async fn test_submit_fresh_token_is_accepted() {
        let fx = fixture();
        let token = issue_token(&fx, "n1", 0).await;
        fx.clock.set(5_000);

        let decision = fx
            .validator
            .submit(&token, "studentX", &details())
            .await
            .expect("store should answer");

        let Decision::Accepted(record) = decision else {
            panic!("expected acceptance, got {decision:?}");
        };
        assert_eq!(record.submitter_id, "studentX");
        assert_eq!(record.accepted_at_ms, 5_000);
        assert_eq!(record.token_nonce, "n1");
        assert_eq!(record.record_id(), "CS101_2024-01-10_studentX");
        assert_eq!(fx.store.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_second_attempt_with_newer_token_already_submitted() {
        // Reference scenario: accepted at t=5000, then the same student
        // scans a fresh rotation and tries again at t=6000.
        let fx = fixture();
        let first = issue_token(&fx, "n1", 0).await;
        fx.clock.set(5_000);
        let accepted = fx.validator.submit(&first, "studentX", &details()).await.unwrap();
        assert!(accepted.is_accepted());

        let second = issue_token(&fx, "n2", 5_500).await;
        fx.clock.set(6_000);
        let decision = fx.validator.submit(&second, "studentX", &details()).await.unwrap();

        assert_eq!(reason(decision), RejectReason::AlreadySubmitted);
        assert_eq!(fx.store.len(), 1, "no second record for one identity");
    }

    #[tokio::test]
    async fn test_submit_same_token_two_identities_both_accepted() {
        // One token, many scanners: the 15-second window is the
        // anti-screenshot control, not single-use-per-token.
        let fx = fixture();
        let token = issue_token(&fx, "n1", 0).await;
        fx.clock.set(4_000);

        let x = fx.validator.submit(&token, "studentX", &details()).await.unwrap();
        let mut other = details();
        other.external_id = "21CS002".into();
        let y = fx.validator.submit(&token, "studentY", &other).await.unwrap();

        assert!(x.is_accepted());
        assert!(y.is_accepted());
        assert_eq!(fx.store.len(), 2);
    }

    // =====================================================================
    // Rejections, in decision order
    // =====================================================================

    #[tokio::test]
    async fn test_submit_unparseable_scan_is_malformed() {
        let fx = fixture();

        let decision = fx
            .validator
            .submit("not a token at all !!!", "studentX", &details())
            .await
            .unwrap();

        assert!(matches!(
            reason(decision),
            RejectReason::MalformedToken(_)
        ));
    }

    #[tokio::test]
    async fn test_submit_fabricated_nonce_is_unknown_token() {
        // Well-formed text whose nonce was never issued.
        let fx = fixture();
        let forged = Base64Codec.encode(&TokenClaims {
            session: key(),
            owner_id: "teacherA".into(),
            issued_at_ms: 0,
            nonce: "never-issued".into(),
        });

        let decision = fx.validator.submit(&forged, "studentX", &details()).await.unwrap();

        assert_eq!(reason(decision), RejectReason::UnknownToken);
    }

    #[tokio::test]
    async fn test_submit_at_window_boundary_is_expired() {
        // Reference scenario: token issued at t=0, scanned at t=16000.
        let fx = fixture();
        let token = issue_token(&fx, "n1", 0).await;
        fx.clock.set(16_000);

        let decision = fx.validator.submit(&token, "studentX", &details()).await.unwrap();

        assert_eq!(
            reason(decision),
            RejectReason::Expired { window_ms: 15_000 }
        );
    }

    #[tokio::test]
    async fn test_submit_just_inside_window_is_not_expired() {
        let fx = fixture();
        let token = issue_token(&fx, "n1", 0).await;
        fx.clock.set(14_999);

        let decision = fx.validator.submit(&token, "studentX", &details()).await.unwrap();

        assert!(decision.is_accepted());
    }

    #[tokio::test]
    async fn test_submit_future_dated_token_is_invalid_timestamp() {
        let fx = fixture();
        let token = issue_token(&fx, "n1", 10_000).await;
        fx.clock.set(9_000);

        let decision = fx.validator.submit(&token, "studentX", &details()).await.unwrap();

        assert_eq!(reason(decision), RejectReason::InvalidTimestamp);
    }

    #[tokio::test]
    async fn test_submit_ancient_token_is_invalid_timestamp() {
        // Past the 4-window sanity bound: corruption, not mere expiry.
        let fx = fixture();
        let token = issue_token(&fx, "n1", 0).await;
        fx.clock.set(60_001);

        let decision = fx.validator.submit(&token, "studentX", &details()).await.unwrap();

        assert_eq!(reason(decision), RejectReason::InvalidTimestamp);
    }

    #[tokio::test]
    async fn test_submit_duplicate_with_bad_fields_reports_already_submitted() {
        // The replay check runs before field validation, so a duplicate
        // attempt reports AlreadySubmitted even with broken details.
        let fx = fixture();
        let token = issue_token(&fx, "n1", 0).await;
        fx.clock.set(1_000);
        fx.validator.submit(&token, "studentX", &details()).await.unwrap();

        let broken = SubmissionDetails {
            name: " ".into(),
            external_id: "nope".into(),
            group: "ROBO".into(),
        };
        let decision = fx.validator.submit(&token, "studentX", &broken).await.unwrap();

        assert_eq!(reason(decision), RejectReason::AlreadySubmitted);
    }

    #[tokio::test]
    async fn test_submit_invalid_fields_rejected_and_not_persisted() {
        let fx = fixture();
        let token = issue_token(&fx, "n1", 0).await;
        fx.clock.set(1_000);

        let broken = SubmissionDetails {
            external_id: "not-a-roll-no".into(),
            ..details()
        };
        let decision = fx.validator.submit(&token, "studentX", &broken).await.unwrap();

        assert!(matches!(reason(decision), RejectReason::InvalidFields(_)));
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_submit_tampered_session_fields_resolve_to_registered_claims() {
        // Re-encode a real nonce under a different course: the registry's
        // claims win, so the record lands in the session that actually
        // issued the nonce.
        let fx = fixture();
        issue_token(&fx, "n1", 0).await;
        fx.clock.set(1_000);
        let tampered = Base64Codec.encode(&TokenClaims {
            session: SessionKey::new("MATH201", "2024-01-10"),
            owner_id: "teacherA".into(),
            issued_at_ms: 0,
            nonce: "n1".into(),
        });

        let decision = fx.validator.submit(&tampered, "studentX", &details()).await.unwrap();

        let Decision::Accepted(record) = decision else {
            panic!("expected acceptance, got {decision:?}");
        };
        assert_eq!(record.session, key());
    }

    // =====================================================================
    // Concurrency: racing submissions for one identity
    // =====================================================================

    #[tokio::test]
    async fn test_submit_racing_identities_yield_exactly_one_record() {
        // Both attempts pass the exists() check before either writes;
        // the conditional insert lets exactly one through.
        let fx = fixture();
        let token = issue_token(&fx, "n1", 0).await;
        fx.clock.set(2_000);

        let validator = Arc::new(fx.validator);
        let details_a = details();
        let details_b = details();
        let (a, b) = tokio::join!(
            validator.submit(&token, "studentX", &details_a),
            validator.submit(&token, "studentX", &details_b),
        );

        let accepted = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|d| d.is_accepted())
            .count();
        assert_eq!(accepted, 1, "exactly one racing attempt may win");
        assert_eq!(fx.store.len(), 1);
    }
}
