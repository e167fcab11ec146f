//! HTTP integration surface: client key derivation and the per-route
//! admission middleware.

mod client_key;
mod middleware;

pub use client_key::{client_key, UNKNOWN_CLIENT};
pub use middleware::{enforce, rate_limit_headers, RateLimitGuard};
