//! Cryptographic operations for push signatures and handshake tokens.
//!
//! - HMAC-SHA256 computation/verification over raw request bodies
//! - Random secret and challenge generation

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Byte length of generated subscription secrets.
const SECRET_BYTES: usize = 32;

/// Byte length of generated handshake challenges.
const CHALLENGE_BYTES: usize = 16;

// ---------------------------------------------------------------------------
// HMAC-SHA256 signing and verification
// ---------------------------------------------------------------------------

/// Compute the HMAC-SHA256 digest of a raw request body.
///
/// The digest covers the exact bytes as received. Any re-encoding of the
/// body (whitespace, key order) would invalidate the signature, so callers
/// must never re-serialize before signing or verifying.
///
/// Returns a hex-encoded digest string.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded HMAC-SHA256 digest using constant-time comparison.
pub fn verify(secret: &str, body: &[u8], presented_hex: &str) -> bool {
    let computed = sign(secret, body);
    constant_time_eq(presented_hex.as_bytes(), computed.as_bytes())
}

/// Verify an `X-Hub-Signature` style header value ("sha256=<hex>").
///
/// A missing or malformed prefix fails verification; it never panics.
pub fn verify_signature_header(secret: &str, body: &[u8], header_value: &str) -> bool {
    match header_value.strip_prefix("sha256=") {
        Some(hex_digest) => verify(secret, body, hex_digest),
        None => false,
    }
}

/// Constant-time byte comparison to prevent timing side channels.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

// ---------------------------------------------------------------------------
// Token generation
// ---------------------------------------------------------------------------

/// Generate a fresh subscription secret (hex-encoded, 32 random bytes).
pub fn generate_secret() -> String {
    random_hex(SECRET_BYTES)
}

/// Generate a handshake challenge (hex-encoded, 16 random bytes).
pub fn generate_challenge() -> String {
    random_hex(CHALLENGE_BYTES)
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
