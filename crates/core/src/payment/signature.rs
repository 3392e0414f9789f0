//! Gateway signature verification.
//!
//! The gateway signs `"{order_id}|{payment_id}"` with HMAC-SHA256 over the
//! shared key secret and sends the hex digest alongside the confirmation.
//! Webhook bodies are signed the same way with a separate webhook secret.
//!
//! Comparison is constant-time (`Mac::verify_slice`); a plain `==` over
//! the hex strings would leak a timing oracle.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a payment confirmation signature.
///
/// Returns false on any mismatch or malformed input; all inputs may be
/// attacker-controlled and this must never panic.
#[must_use]
pub fn verify(order_id: &str, payment_id: &str, provided_signature: &str, secret: &str) -> bool {
    let Ok(provided) = hex::decode(provided_signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&provided).is_ok()
}

/// Verifies a webhook body signature.
#[must_use]
pub fn verify_body(body: &[u8], provided_signature: &str, secret: &str) -> bool {
    let Ok(provided) = hex::decode(provided_signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

/// Computes the hex signature for `"{order_id}|{payment_id}"`.
#[must_use]
pub fn sign(order_id: &str, payment_id: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Computes the hex signature of a raw body.
#[must_use]
pub fn sign_body(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
