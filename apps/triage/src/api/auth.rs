//! # Authentication Module
//!
//! Optional API key authentication for the triage HTTP API.
//!
//! The key comes from the loaded configuration (`[security] api_key` or
//! `TRIAGE_API_KEY`). When it is set every request except `GET /health`
//! must carry it:
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// The expected key, shared with the middleware.
pub type ApiKey = Arc<str>;

/// Compare a provided key with the expected one in constant time.
///
/// Both sides are padded to the same length first, so the comparison runs
/// over the same number of bytes whatever the provided length.
#[must_use]
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    let len = provided.len().max(expected.len());

    let mut left = vec![0u8; len];
    let mut right = vec![0u8; len];
    left[..provided.len()].copy_from_slice(provided);
    right[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = left.ct_eq(&right).into();
    bytes_match && provided.len() == expected.len()
}

/// API key authentication middleware.
///
/// Accepts `Bearer <key>` and the raw key.
pub async fn api_key_auth_middleware(
    State(expected): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match provided {
        Some(key) if keys_match(key, &expected) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_api_key",
                "Authentication failed: invalid API key"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_match() {
        assert!(keys_match("secret-key", "secret-key"));
    }

    #[test]
    fn different_keys_rejected() {
        assert!(!keys_match("secret-kez", "secret-key"));
        assert!(!keys_match("", "secret-key"));
    }

    #[test]
    fn prefix_is_not_enough() {
        assert!(!keys_match("secret", "secret-key"));
        assert!(!keys_match("secret-key-and-more", "secret-key"));
        // Zero padding must not make a shorter key equal.
        assert!(!keys_match("abc", "abc\0"));
    }
}
