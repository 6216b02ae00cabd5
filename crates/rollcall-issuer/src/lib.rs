//! Fixed-cadence token issuer for Rollcall.
//!
//! One issuer task runs per active session. Every rotation window it
//! draws a fresh nonce, stamps the current time, encodes the claims,
//! registers the token, and publishes a [`TokenIssued`] event for the
//! display to re-render. The cadence is unconditional wall-clock time:
//! it fires whether or not anyone scanned the previous token.
//!
//! # Stop semantics
//!
//! [`IssuerHandle::stop`] is safe to call at any time. An emission that
//! was already mid-flight when the session closed loses the race inside
//! the registry — `register_token` refuses non-Active sessions — and is
//! discarded rather than displayed.
//!
//! # Integration
//!
//! ```ignore
//! let handle = spawn_issuer(session, owner, registry, codec, clock, config);
//! let mut tokens = handle.subscribe();
//! while let Ok(event) = tokens.recv().await {
//!     render_qr(&event.token_text);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rollcall_protocol::{Clock, SessionKey, TokenClaims, TokenCodec, ROTATION_WINDOW_MS};
use rollcall_registry::SharedRegistry;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the rotation cadence.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Milliseconds between emissions; also each token's validity span.
    pub window_ms: u64,
    /// Capacity of the broadcast channel carrying [`TokenIssued`]
    /// events. A display that lags past this many rotations observes a
    /// `Lagged` recv and should simply re-subscribe — only the newest
    /// token matters to it.
    pub channel_capacity: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            window_ms: ROTATION_WINDOW_MS,
            channel_capacity: 16,
        }
    }
}

impl RotationConfig {
    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`spawn_issuer`]. A zero window would
    /// spin-emit; a zero capacity is rejected by the broadcast channel.
    pub fn validated(mut self) -> Self {
        if self.window_ms == 0 {
            warn!("rotation window of 0 ms is invalid — using default");
            self.window_ms = ROTATION_WINDOW_MS;
        }
        if self.channel_capacity == 0 {
            self.channel_capacity = 16;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// TokenIssued event
// ---------------------------------------------------------------------------

/// One rotation: the token text to display and its validity bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenIssued {
    /// Encoded token text, ready to render as a QR image.
    pub token_text: String,
    /// When the token was issued, epoch milliseconds.
    pub issued_at_ms: u64,
    /// When it stops being fresh: `issued_at_ms + window`.
    pub expires_at_ms: u64,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running issuer task.
///
/// Cheap to clone. Dropping every handle does not stop the task; call
/// [`stop`](Self::stop) for that.
#[derive(Clone)]
pub struct IssuerHandle {
    session: SessionKey,
    events: broadcast::Sender<TokenIssued>,
    stop: mpsc::Sender<()>,
}

impl IssuerHandle {
    /// The session this issuer emits for.
    pub fn session(&self) -> &SessionKey {
        &self.session
    }

    /// Subscribe to the token stream. Each subscriber sees every
    /// emission from the moment it subscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<TokenIssued> {
        self.events.subscribe()
    }

    /// Halt emission. Idempotent: stopping an already-stopped issuer is
    /// a no-op.
    pub async fn stop(&self) {
        // An error means the task already exited, which is fine.
        let _ = self.stop.send(()).await;
    }
}

// ---------------------------------------------------------------------------
// Issuer task
// ---------------------------------------------------------------------------

struct IssuerTask<C: TokenCodec> {
    session: SessionKey,
    owner_id: String,
    registry: SharedRegistry,
    codec: C,
    clock: Arc<dyn Clock>,
    config: RotationConfig,
    events: broadcast::Sender<TokenIssued>,
    stop_rx: mpsc::Receiver<()>,
}

impl<C: TokenCodec> IssuerTask<C> {
    async fn run(mut self) {
        info!(
            session = %self.session,
            window_ms = self.config.window_ms,
            "issuer started"
        );

        let window = Duration::from_millis(self.config.window_ms);
        // First token immediately, then one per window. The deadline
        // advances from the schedule, not from emission completion, so
        // the cadence does not drift with emission cost.
        let mut next = TokioInstant::now() + window;

        loop {
            if !self.emit().await {
                break;
            }
            tokio::select! {
                _ = self.stop_rx.recv() => {
                    info!(session = %self.session, "issuer stopped");
                    break;
                }
                _ = time::sleep_until(next) => {
                    next += window;
                }
            }
        }

        debug!(session = %self.session, "issuer task exited");
    }

    /// Emits one token. Returns `false` when the session is no longer
    /// Active and the issuer should wind down.
    async fn emit(&self) -> bool {
        let nonce = fresh_nonce();
        let issued_at_ms = self.clock.now_millis();
        let claims = TokenClaims {
            session: self.session.clone(),
            owner_id: self.owner_id.clone(),
            issued_at_ms,
            nonce,
        };
        let text = self.codec.encode(&claims);
        let event = TokenIssued {
            token_text: text.clone(),
            issued_at_ms,
            expires_at_ms: claims.expires_at_ms(),
        };

        {
            let mut registry = self.registry.lock().await;
            if let Err(err) = registry.register_token(claims, text) {
                warn!(
                    session = %self.session,
                    error = %err,
                    "emission discarded"
                );
                return false;
            }
        }

        debug!(
            session = %self.session,
            issued_at_ms,
            expires_at_ms = event.expires_at_ms,
            "token issued"
        );
        // No subscribers yet is not an error — the registry already has
        // the token, so a scan of it still validates.
        let _ = self.events.send(event);
        true
    }
}

/// Spawns an issuer task for an (already Active) session and returns a
/// handle to subscribe and stop.
pub fn spawn_issuer<C: TokenCodec>(
    session: SessionKey,
    owner_id: impl Into<String>,
    registry: SharedRegistry,
    codec: C,
    clock: Arc<dyn Clock>,
    config: RotationConfig,
) -> IssuerHandle {
    let config = config.validated();
    let (events, _) = broadcast::channel(config.channel_capacity);
    let (stop_tx, stop_rx) = mpsc::channel(1);

    let task = IssuerTask {
        session: session.clone(),
        owner_id: owner_id.into(),
        registry,
        codec,
        clock,
        config,
        events: events.clone(),
        stop_rx,
    };
    tokio::spawn(task.run());

    IssuerHandle {
        session,
        events,
        stop: stop_tx,
    }
}

/// Draws a random 32-character hex nonce (128 bits of entropy), well
/// past the 80-bit floor needed to keep same-window tokens distinct.
fn fresh_nonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_nonce_is_32_hex_chars() {
        let nonce = fresh_nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fresh_nonce_does_not_repeat() {
        let a = fresh_nonce();
        let b = fresh_nonce();
        assert_ne!(a, b);
    }

    #[test]
    fn test_validated_rejects_zero_window() {
        let cfg = RotationConfig {
            window_ms: 0,
            channel_capacity: 0,
        }
        .validated();
        assert_eq!(cfg.window_ms, ROTATION_WINDOW_MS);
        assert_eq!(cfg.channel_capacity, 16);
    }
}
