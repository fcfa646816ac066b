//! Shared-secret verification for the booking webhook.

use axum::http::HeaderMap;
use relay_core::identity::constant_time_eq;
use std::collections::HashMap;

pub const SECRET_HEADER: &str = "x-webhook-secret";
pub const SECRET_PARAM: &str = "secret";

/// Check the configured shared secret against the request header or query
/// parameter. The comparison is fixed-time. No configured secret means
/// the check is disabled.
pub fn verify_shared_secret(
    configured: Option<&str>,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> bool {
    let Some(expected) = configured else {
        return true;
    };
    let supplied = headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .or_else(|| params.get(SECRET_PARAM).map(String::as_str));
    match supplied {
        Some(candidate) => constant_time_eq(candidate, expected),
        None => false,
    }
}
