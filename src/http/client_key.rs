//! Client key derivation from request headers.
//!
//! The limiter only sees an opaque string; this is where it comes from.
//! Preference order: first address in `x-forwarded-for`, then
//! `x-real-ip`, then a shared sentinel. Deterministic and free of I/O.
//! Restricting trust to a known proxy chain is left to the deployment.

use axum::http::HeaderMap;

/// Sentinel key for requests with no usable address header. All such
/// requests share one rate limit bucket.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the rate-limit key for a request.
pub fn client_key(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    UNKNOWN_CLIENT.to_string()
}
