//! Webhook request signature verification.
//!
//! Slack signs each delivery with `HMAC-SHA256(secret, "v0:{timestamp}:{body}")`
//! and sends the result as `v0=<hex>` alongside the request timestamp.
//! Verification is pure: no side effects, and failure is fatal for the
//! request (401), never retried internally.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Signature scheme version prefix.
const VERSION: &str = "v0";

/// Maximum accepted clock skew between the claimed timestamp and now.
/// Requests outside this window are treated as replays.
const MAX_SKEW_SECONDS: i64 = 300;

/// Verify a claimed signature against the raw request body.
///
/// # Errors
///
/// Returns `AppError::Auth` when the timestamp is unparseable or older
/// than the skew window, when the signature is malformed, or when the
/// computed keyed hash does not match.
pub fn verify(signing_secret: &str, timestamp: &str, signature: &str, body: &[u8]) -> Result<()> {
    verify_at(signing_secret, timestamp, signature, body, Utc::now())
}

/// Verify with an explicit notion of "now" (injectable for tests).
///
/// # Errors
///
/// See [`verify`].
pub fn verify_at(
    signing_secret: &str,
    timestamp: &str,
    signature: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<()> {
    let claimed_ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::Auth("unparseable request timestamp".into()))?;

    if (now.timestamp() - claimed_ts).abs() > MAX_SKEW_SECONDS {
        return Err(AppError::Auth("request timestamp outside skew window".into()));
    }

    let claimed = signature
        .strip_prefix(&format!("{VERSION}="))
        .ok_or_else(|| AppError::Auth("unexpected signature version".into()))?;
    let claimed_bytes =
        hex::decode(claimed).map_err(|_| AppError::Auth("signature is not valid hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|err| AppError::Auth(format!("failed to key hmac: {err}")))?;
    mac.update(format!("{VERSION}:{timestamp}:").as_bytes());
    mac.update(body);

    // verify_slice compares in constant time.
    mac.verify_slice(&claimed_bytes)
        .map_err(|_| AppError::Auth("signature mismatch".into()))
}

/// Compute the expected signature header value for a body and timestamp.
///
/// Used by tests and diagnostic tooling to produce valid deliveries.
///
/// # Errors
///
/// Returns `AppError::Auth` if the secret cannot key the HMAC.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|err| AppError::Auth(format!("failed to key hmac: {err}")))?;
    mac.update(format!("{VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    Ok(format!("{VERSION}={}", hex::encode(mac.finalize().into_bytes())))
}
