//! Bearer token inspection.
//!
//! Tokens are JWTs issued by the backend. The client only reads the `exp`
//! claim to schedule refreshes; the signature is never checked, since the
//! server remains the only authority on whether a token is valid.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A bearer token together with its decoded expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Raw access token
    pub access_token: String,
    /// `exp` claim, if the token carries a readable one
    pub expiry_epoch_seconds: Option<i64>,
}

impl Credential {
    /// Wrap `token`, decoding its expiry claim.
    pub fn from_token(token: impl Into<String>) -> Self {
        let access_token = token.into();
        let expiry_epoch_seconds = decode_expiry(&access_token);
        Self {
            access_token,
            expiry_epoch_seconds,
        }
    }

    /// Whether less than `margin` of lifetime remains at `now`.
    ///
    /// A token without a readable expiry never counts as expiring, so a
    /// malformed token cannot trigger a refresh on every request.
    pub fn expires_within(&self, margin: Duration, now_epoch_seconds: i64) -> bool {
        match self.expiry_epoch_seconds {
            Some(exp) => {
                let margin = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
                exp.saturating_sub(now_epoch_seconds) < margin
            }
            None => false,
        }
    }
}

/// Read the `exp` claim from a JWT payload without verifying it.
///
/// Returns `None` unless the token has exactly three dot-separated segments
/// and a base64url JSON payload with a numeric `exp`.
///
/// # Examples
///
/// ```
/// use dashboard_client::auth::decode_expiry;
///
/// // {"exp":1700000000}
/// let token = "e30.eyJleHAiOjE3MDAwMDAwMDB9.c2ln";
/// assert_eq!(decode_expiry(token), Some(1_700_000_000));
/// assert_eq!(decode_expiry("only.two"), None);
/// ```
pub fn decode_expiry(token: &str) -> Option<i64> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&payload).ok()?;

    match claims.get("exp")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

/// Current Unix time in seconds.
pub fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) fn make_jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MARGIN: Duration = Duration::from_secs(600);

    #[test]
    fn test_decode_expiry() {
        let token = make_jwt(&json!({"sub": "operator", "exp": 1_800_000_000}));
        assert_eq!(decode_expiry(&token), Some(1_800_000_000));
    }

    #[test]
    fn test_decode_expiry_float_claim() {
        let token = make_jwt(&json!({"exp": 1_800_000_000.5}));
        assert_eq!(decode_expiry(&token), Some(1_800_000_000));
    }

    #[test]
    fn test_malformed_tokens_have_no_expiry() {
        assert_eq!(decode_expiry("header.payload"), None);
        assert_eq!(decode_expiry("a.b.c.d"), None);
        assert_eq!(decode_expiry("a.!!!.c"), None);
        assert_eq!(decode_expiry(&make_jwt(&json!({"sub": "x"}))), None);
        assert_eq!(decode_expiry(&make_jwt(&json!({"exp": "soon"}))), None);
    }

    #[test]
    fn test_expires_within_margin() {
        let now = 1_000_000;
        let soon = Credential::from_token(make_jwt(&json!({"exp": now + 300})));
        let later = Credential::from_token(make_jwt(&json!({"exp": now + 3600})));
        let expired = Credential::from_token(make_jwt(&json!({"exp": now - 10})));

        assert!(soon.expires_within(MARGIN, now));
        assert!(!later.expires_within(MARGIN, now));
        assert!(expired.expires_within(MARGIN, now));
    }

    #[test]
    fn test_unreadable_expiry_is_not_expiring() {
        let credential = Credential::from_token("abc.def");
        assert_eq!(credential.expiry_epoch_seconds, None);
        assert!(!credential.expires_within(MARGIN, now_epoch_seconds()));
    }
}
