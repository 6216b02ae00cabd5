//! Attendance validation for Rollcall.
//!
//! This crate is the security-relevant piece: the state machine that
//! decides ACCEPT or REJECT for an incoming `(token, identity, details)`
//! submission.
//!
//! 1. **Decision** — [`Decision`], [`RejectReason`], and the pure
//!    timestamp check. Every outcome is either `Accepted` or exactly one
//!    tagged rejection; nothing is silently swallowed.
//! 2. **Fields** — the pass/fail predicates for submitted identity
//!    details (name, roll number, branch).
//! 3. **Store** — the [`AttendanceStore`] trait the durable-store
//!    collaborator implements, including the conditional write that
//!    makes duplicate-check-plus-insert atomic per
//!    `(session, submitter)`, and an in-memory implementation.
//! 4. **Validator** — [`Validator`] wires the checks together around
//!    the registry and store.
//!
//! # How it fits in the stack
//!
//! ```text
//! Service facade (above)  ← turns Decisions into wire responses
//!     ↕
//! Validator (this crate)  ← decode → lookup → freshness → replay → fields → persist
//!     ↕
//! Registry / Protocol (below)
//! ```

mod decision;
mod fields;
mod store;
mod validator;

pub use decision::{check_timestamp, Decision, RejectReason};
pub use fields::{
    validate_branch, validate_course_code, validate_details, validate_name,
    validate_roll_no, BRANCHES,
};
pub use store::{AttendanceStore, MemoryStore, StoreError};
pub use validator::{Validator, ValidatorConfig};
