//! Shared counter storage behind a key-value capability trait.
//!
//! The limiter depends on this trait only, never on a concrete store
//! product. Each deployment supplies one adapter; [`MemoryStore`] ships
//! with the crate for tests and single-instance deployments.

mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),
    #[error("Store operation timed out")]
    Timeout,
    #[error("Conditional update did not settle under contention")]
    Contention,
}

/// A string-valued store with per-key expiry and an atomic conditional
/// update.
///
/// `compare_and_swap` is the primitive the limiter builds its
/// read-modify-write loop on: it must be atomic per key with respect to
/// concurrent callers, including callers in other processes sharing the
/// same backend.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value for a key, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditionally write a value, with an optional time-to-live.
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Write `value` only if the stored value still equals `expected`.
    ///
    /// `expected = None` means "create only if the key is absent"; an
    /// expired entry counts as absent. Returns `true` when the write took
    /// effect, `false` when another caller got there first.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;
}
