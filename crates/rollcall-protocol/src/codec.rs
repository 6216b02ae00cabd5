//! Token codec: claims to QR-ready text and back.
//!
//! The codec is a trait so the encoding can be swapped without touching
//! the issuer or validator. [`Base64Codec`] is the reference encoding:
//! base64 over `course:date:issuedAtMillis:nonce:owner`. It carries no
//! signature — freshness and nonce registration are the controls, and an
//! authenticated encoding would slot in behind the same trait if that
//! ever changes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::{DecodeError, SessionKey, TokenClaims, TOKEN_FIELD_COUNT};

/// Converts token claims to wire text and back.
///
/// Implementations must be pure: no network, no storage, no clock.
/// `encode` followed by `decode` returns the original claims.
pub trait TokenCodec: Send + Sync + 'static {
    /// Serializes claims into the text rendered as a QR image.
    fn encode(&self, claims: &TokenClaims) -> String;

    /// Parses scanned text back into claims.
    ///
    /// # Errors
    /// [`DecodeError::Truncated`] when fields are missing,
    /// [`DecodeError::Malformed`] for anything else the text gets wrong.
    /// Whether the claims are *valid* (fresh, known nonce) is not this
    /// layer's question.
    fn decode(&self, text: &str) -> Result<TokenClaims, DecodeError>;
}

// ---------------------------------------------------------------------------
// Base64Codec
// ---------------------------------------------------------------------------

/// The reference codec: colon-joined fields wrapped in standard base64.
///
/// Field values must not contain `:`; course codes, ISO dates, hex
/// nonces, and opaque identity strings never do.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec;

impl TokenCodec for Base64Codec {
    fn encode(&self, claims: &TokenClaims) -> String {
        let payload = format!(
            "{}:{}:{}:{}:{}",
            claims.session.course_code,
            claims.session.date,
            claims.issued_at_ms,
            claims.nonce,
            claims.owner_id,
        );
        STANDARD.encode(payload)
    }

    fn decode(&self, text: &str) -> Result<TokenClaims, DecodeError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| DecodeError::Malformed(format!("not base64: {e}")))?;
        let payload = String::from_utf8(bytes)
            .map_err(|_| DecodeError::Malformed("payload is not UTF-8".into()))?;

        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() < TOKEN_FIELD_COUNT {
            return Err(DecodeError::Truncated {
                expected: TOKEN_FIELD_COUNT,
                found: parts.len(),
            });
        }
        if parts.len() > TOKEN_FIELD_COUNT {
            return Err(DecodeError::Malformed(format!(
                "expected {TOKEN_FIELD_COUNT} fields, found {}",
                parts.len()
            )));
        }
        if let Some(missing) = ["course", "date", "issued-at", "nonce", "owner"]
            .iter()
            .zip(&parts)
            .find_map(|(name, part)| part.is_empty().then_some(name))
        {
            return Err(DecodeError::Malformed(format!("empty {missing} field")));
        }

        let issued_at_ms: u64 = parts[2].parse().map_err(|_| {
            DecodeError::Malformed(format!("issued-at is not a timestamp: {:?}", parts[2]))
        })?;

        Ok(TokenClaims {
            session: SessionKey::new(parts[0], parts[1]),
            owner_id: parts[4].to_string(),
            issued_at_ms,
            nonce: parts[3].to_string(),
        })
    }
}
