//! Shared protocol types for Rollcall.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//!
//! - **Types** ([`SessionKey`], [`TokenClaims`], [`AttendanceRecord`],
//!   [`SubmissionDetails`]) — the data model shared by every layer.
//! - **Codec** ([`TokenCodec`] trait, [`Base64Codec`]) — how a token's
//!   claims become the text rendered into a QR image, and back.
//! - **Clock** ([`Clock`], [`SystemClock`], [`ManualClock`]) — injectable
//!   time, so freshness checks are deterministic under test.
//! - **Errors** ([`DecodeError`]) — what can go wrong turning scanned
//!   text back into claims.
//!
//! # Architecture
//!
//! The protocol layer sits at the bottom of the stack. It performs no
//! I/O and holds no state: encoding and decoding are pure functions of
//! their inputs, which is what lets the validator above it be tested
//! without a store or a network.
//!
//! ```text
//! Issuer / Validator (state machines) → Protocol (claims + wire text)
//! ```

mod clock;
mod codec;
mod error;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Base64Codec, TokenCodec};
pub use error::DecodeError;
pub use types::{
    AttendanceRecord, SessionKey, SubmissionDetails, TokenClaims,
    ROTATION_WINDOW_MS, TOKEN_FIELD_COUNT,
};
