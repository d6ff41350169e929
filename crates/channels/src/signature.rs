//! Slack request signing (v0).
//!
//! Slack signs `v0:{timestamp}:{raw body}` with HMAC-SHA256 keyed by the
//! app's signing secret and sends `v0=<hex digest>` in `X-Slack-Signature`.
//! Requests older than five minutes are rejected to stop replays.

use chorebot_core::error::ChannelError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Maximum accepted distance between the request timestamp and now.
pub const MAX_SKEW_SECS: u64 = 300;

/// Verify a Slack request. `now_unix` is the current Unix time in seconds.
pub fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    signature: &str,
    body: &[u8],
    now_unix: i64,
) -> Result<(), ChannelError> {
    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| ChannelError::Unauthorized("malformed request timestamp".into()))?;
    if now_unix.abs_diff(ts) > MAX_SKEW_SECS {
        return Err(ChannelError::Unauthorized("stale request timestamp".into()));
    }

    let provided = signature
        .strip_prefix("v0=")
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or_else(|| ChannelError::Unauthorized("malformed signature".into()))?;

    // Constant-time comparison via `verify_slice`
    mac_for(signing_secret, ts, body)?
        .verify_slice(&provided)
        .map_err(|_| ChannelError::Unauthorized("signature mismatch".into()))
}

/// Produce the `v0=...` header value for a body. Used by tests and tooling.
pub fn sign(signing_secret: &str, timestamp: i64, body: &[u8]) -> Result<String, ChannelError> {
    let mac = mac_for(signing_secret, timestamp, body)?;
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

fn mac_for(signing_secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256, ChannelError> {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|e| ChannelError::Unauthorized(format!("unusable signing secret: {e}")))?;
    mac.update(b"v0:");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}
