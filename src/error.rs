//! Error types for the Floodgate crate.

use thiserror::Error;

/// Main error type for Floodgate operations.
///
/// A denied request is not an error: denial is carried in the
/// [`Decision`](crate::ratelimit::Decision) value returned by
/// [`RateLimiter::check`](crate::ratelimit::RateLimiter::check).
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// The caller supplied a malformed policy. Not retryable.
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// The shared store could not be reached, timed out, or the atomic
    /// update did not settle within the retry budget. The caller applies
    /// its own fail-open or fail-closed policy on top of this.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
