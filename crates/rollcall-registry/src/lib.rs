//! Session and token registry for Rollcall.
//!
//! This crate owns the lifecycle of attendance sessions and the set of
//! tokens issued for them:
//!
//! 1. **Sessions** — one Active session at a time per `(course, date)`,
//!    opened and closed by its owning instructor.
//! 2. **Tokens** — an append-only set keyed by nonce. Older tokens stay
//!    resolvable so late reuse is rejected as *expired* rather than
//!    mistaken for a fabricated token; only the latest token is handed
//!    to the display.
//!
//! # How it fits in the stack
//!
//! ```text
//! Issuer (above)    ← registers each freshly emitted token
//! Validator (above) ← resolves scanned nonces, checks session state
//!     ↕
//! Registry (this crate)
//!     ↕
//! Protocol (below)  ← SessionKey, TokenClaims
//! ```

mod error;
mod registry;
mod session;

pub use error::RegistryError;
pub use registry::{IssuedToken, SessionRegistry};
pub use session::{Session, SessionStatus};

/// The registry as shared by the issuer task and concurrent validator
/// calls. One lock orders every mutation against every lookup, which is
/// what guarantees a token is resolvable the instant registration
/// returns.
pub type SharedRegistry = std::sync::Arc<tokio::sync::Mutex<SessionRegistry>>;
