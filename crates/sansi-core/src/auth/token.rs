//! Read-only inspection of compact bearer tokens.
//!
//! Tokens are never verified here. The backend owns trust; we only peek at
//! the `exp` claim to know when to stop sending a token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Decode the `exp` claim (Unix seconds) from a token's middle segment.
///
/// Returns `None` unless the second dot-separated segment is a base64url
/// JSON payload carrying a numeric `exp`.
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;

    // Some issuers keep the padding
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;

    let millis = match exp.as_i64() {
        Some(secs) => secs.checked_mul(1000)?,
        None => {
            let secs = exp.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            (secs * 1000.0) as i64
        }
    };

    Utc.timestamp_millis_opt(millis).single()
}
