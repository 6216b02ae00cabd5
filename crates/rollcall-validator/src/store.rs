//! Durable-store abstraction for attendance records.
//!
//! The core never talks to a real database — it asks a collaborator to
//! put records, list records for a session, and perform one conditional
//! write. [`MemoryStore`] backs tests and single-process deployments;
//! production wiring implements [`AttendanceStore`] over whatever
//! document store the deployment uses.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use rollcall_protocol::{AttendanceRecord, SessionKey};

/// Transient store-layer failure.
///
/// Distinct from every rejection reason: the submission was neither
/// accepted nor refused, and the caller should retry with backoff. The
/// core itself never retries — that keeps the decision sequence free of
/// hidden side effects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// What the core requires of the durable store.
///
/// The one non-negotiable primitive is [`insert_if_absent`]: the
/// duplicate check and the write must be atomic per
/// `(session, submitter)`, or two racing submissions could both land.
///
/// [`insert_if_absent`]: AttendanceStore::insert_if_absent
pub trait AttendanceStore: Send + Sync + 'static {
    /// Persists `record` unless one already exists for its
    /// `(session, submitter_id)` key.
    ///
    /// Returns `true` if the record was written, `false` if an existing
    /// record won — the caller maps `false` to an AlreadySubmitted
    /// rejection.
    fn insert_if_absent(
        &self,
        record: AttendanceRecord,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Whether a record exists for `(session, submitter_id)`.
    fn exists(
        &self,
        session: &SessionKey,
        submitter_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Every accepted record for a session, ordered by acceptance time
    /// (ties broken by submitter id, so the order is total).
    fn records_for_session(
        &self,
        session: &SessionKey,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory [`AttendanceStore`].
///
/// Cheap to clone — clones share the same record map. The single mutex
/// makes `insert_if_absent` trivially atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<(SessionKey, String), AttendanceRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all sessions.
    pub fn len(&self) -> usize {
        self.records.lock().map_or(0, |map| map.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<(SessionKey, String), AttendanceRecord>>, StoreError> {
        // A poisoned lock means a writer panicked mid-update; report it
        // as the store being unavailable rather than propagating the
        // panic into the decision path.
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("record map poisoned".into()))
    }
}

impl AttendanceStore for MemoryStore {
    async fn insert_if_absent(&self, record: AttendanceRecord) -> Result<bool, StoreError> {
        let mut records = self.guard()?;
        let key = (record.session.clone(), record.submitter_id.clone());
        if records.contains_key(&key) {
            return Ok(false);
        }
        records.insert(key, record);
        Ok(true)
    }

    async fn exists(&self, session: &SessionKey, submitter_id: &str) -> Result<bool, StoreError> {
        let records = self.guard()?;
        Ok(records.contains_key(&(session.clone(), submitter_id.to_string())))
    }

    async fn records_for_session(
        &self,
        session: &SessionKey,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let records = self.guard()?;
        let mut matching: Vec<AttendanceRecord> = records
            .values()
            .filter(|r| &r.session == session)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.accepted_at_ms
                .cmp(&b.accepted_at_ms)
                .then_with(|| a.submitter_id.cmp(&b.submitter_id))
        });
        Ok(matching)
    }
}
