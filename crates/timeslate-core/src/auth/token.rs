//! Unverified bearer-token claim inspection.
//!
//! The client decodes the token payload only to estimate remaining
//! validity. This is a usability hint, not an authorization boundary: the
//! signature is never checked and all real enforcement stays server-side.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde::Deserialize;

/// Default freshness threshold: renew when less than 24 hours remain.
pub const DEFAULT_EXPIRY_THRESHOLD_SECS: i64 = 86_400;

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
}

/// Decode the payload segment of a three-segment token.
/// Returns `None` for anything that is not a well-formed payload.
fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => return None,
    };
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Whether the token expires within `threshold_secs` from now.
///
/// Fail-safe: a token that cannot be decoded, or that carries no numeric
/// `exp` claim, is treated as already expiring. This function never errors.
pub fn is_expiring_soon(token: &str, threshold_secs: i64) -> bool {
    let claims = match decode_claims(token) {
        Some(claims) => claims,
        None => return true,
    };
    let exp = match claims.exp {
        Some(exp) => exp,
        None => return true,
    };
    exp - Utc::now().timestamp() < threshold_secs
}
