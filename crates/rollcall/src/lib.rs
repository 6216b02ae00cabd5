//! # Rollcall
//!
//! Backend core for rotating-QR attendance. An instructor opens a
//! session; the issuer re-keys the QR payload every 15 seconds so a
//! photographed code is dead on arrival; students submit scans that the
//! validator accepts at most once per identity per session; after the
//! session ends, an anomaly pass flags duplicate roll numbers and
//! submission bursts.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rollcall::prelude::*;
//!
//! # async fn demo() -> Result<(), rollcall::RollcallError> {
//! let service = AttendanceService::new(
//!     Arc::new(MemoryStore::new()),
//!     Base64Codec,
//!     Arc::new(SystemClock),
//!     RotationConfig::default(),
//! );
//!
//! let mut tokens = service.open_session("CS101", "2024-01-10", "teacherA").await?;
//! // render tokens.recv().await as a QR image; submit scans via
//! // service.submit(...); close and fetch the report when done.
//! # Ok(())
//! # }
//! ```

mod error;
mod service;

pub use error::RollcallError;
pub use service::{AttendanceService, SubmissionRequest, SubmissionResponse};

// Re-export the sub-crate surface so callers depend on one crate.
pub use rollcall_analytics::{
    analyze, session_stats, AnomalyReport, Finding, FindingKind, SessionStats, Severity,
};
pub use rollcall_issuer::{spawn_issuer, IssuerHandle, RotationConfig, TokenIssued};
pub use rollcall_protocol::{
    AttendanceRecord, Base64Codec, Clock, DecodeError, ManualClock, SessionKey, SubmissionDetails,
    SystemClock, TokenClaims, TokenCodec, ROTATION_WINDOW_MS,
};
pub use rollcall_registry::{RegistryError, Session, SessionRegistry, SessionStatus, SharedRegistry};
pub use rollcall_validator::{
    AttendanceStore, Decision, MemoryStore, RejectReason, StoreError, Validator, ValidatorConfig,
};

/// Commonly used types in one import.
pub mod prelude {
    pub use crate::{
        AttendanceService, AttendanceStore, Base64Codec, Clock, Decision, MemoryStore,
        RollcallError, RotationConfig, SessionKey, SubmissionRequest, SubmissionResponse,
        SystemClock, TokenCodec, TokenIssued,
    };
}

/// Installs a `tracing` subscriber reading `RUST_LOG` from the
/// environment. Call once at startup; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
