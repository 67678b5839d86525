//! Payload signing for outbound webhook deliveries.
//!
//! HMAC-SHA256 over the exact request body bytes, hex-encoded with a
//! `sha256=` prefix. Receivers recompute the digest with their shared
//! secret and compare; the comparison helper here is constant-time so it
//! can also back any in-process verification (test endpoints, replay
//! tooling) without leaking secret-correlated timing.

use clinora_core::{AppError, AppResult};
use clinora_domain::SigningSecret;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Computes the signature header value for one payload.
///
/// Deterministic: identical payload and secret always produce the same
/// value, so retried attempts carry the same signature as the first.
pub fn sign_payload(payload: &[u8], secret: &SigningSecret) -> AppResult<String> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.expose().as_bytes())
        .map_err(|error| AppError::Internal(format!("failed to initialize HMAC: {error}")))?;

    mac.update(payload);

    Ok(format!(
        "sha256={}",
        encode_hex(mac.finalize().into_bytes().as_slice())
    ))
}

/// Verifies a signature header value in constant time.
pub fn verify_signature(
    payload: &[u8],
    secret: &SigningSecret,
    signature: &str,
) -> AppResult<bool> {
    let expected = sign_payload(payload, secret)?;
    Ok(expected.as_bytes().ct_eq(signature.as_bytes()).into())
}

fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}
