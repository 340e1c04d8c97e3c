//! Session identifier generation and the signed cookie encoding.
//!
//! A token on the wire is `base64(id) "." hex(sha256(secret ++ id))`, percent-escaped so it
//! fits in a single cookie value.

use crate::error::{InvalidReason, SessionError, SessionResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Produces a fresh random identifier (UUID v4, 122 random bits).
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// Signs and encodes an identifier for transport.
pub fn encode(id: &str, secret: Option<&[u8]>) -> String {
    let payload = format!("{}.{}", STANDARD.encode(id.as_bytes()), signature(id, secret));
    urlencoding::encode(&payload).into_owned()
}

/// Verifies and decodes a token produced by [`encode`] with the same secret.
pub fn decode(token: &str, secret: Option<&[u8]>) -> SessionResult<String> {
    if !escapes_are_well_formed(token) {
        return Err(SessionError::InvalidIdentifier(InvalidReason::Escape));
    }
    let payload = urlencoding::decode(token)
        .map_err(|_| SessionError::InvalidIdentifier(InvalidReason::Escape))?;

    let mut parts = payload.split('.');
    let (Some(encoded_id), Some(sign), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(SessionError::InvalidIdentifier(InvalidReason::Structure));
    };

    let raw = STANDARD
        .decode(encoded_id)
        .map_err(|_| SessionError::InvalidIdentifier(InvalidReason::Encoding))?;
    let id = String::from_utf8(raw)
        .map_err(|_| SessionError::InvalidIdentifier(InvalidReason::Encoding))?;

    if !constant_time_eq(signature(&id, secret).as_bytes(), sign.as_bytes()) {
        return Err(SessionError::InvalidIdentifier(InvalidReason::Signature));
    }
    Ok(id)
}

/// Lowercase hex SHA-256 over `secret ++ id`. A missing secret signs with an empty key.
fn signature(id: &str, secret: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.unwrap_or_default());
    hasher.update(id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Every `%` must start a two-digit hex escape; `urlencoding` passes malformed ones through.
fn escapes_are_well_formed(token: &str) -> bool {
    let bytes = token.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        match bytes.get(i + 1..i + 3) {
            Some(pair) if pair.iter().all(u8::is_ascii_hexdigit) => i += 3,
            _ => return false,
        }
    }
    true
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
