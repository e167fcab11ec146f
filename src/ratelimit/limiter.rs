//! Core rate limiter implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::timeout;
use tracing::{trace, warn};

use crate::error::{FloodgateError, Result};
use crate::store::{KeyValueStore, StoreError};

use super::clock::{Clock, SystemClock};
use super::policy::{Decision, Policy};
use super::window::{remaining_permits, WindowState};

/// Upper bound on compare-and-swap attempts within one check.
const MAX_CAS_ATTEMPTS: u32 = 64;
/// Namespace prefix for all limiter keys in the shared store.
const KEY_PREFIX: &str = "ratelimit";

/// Retry and timeout budget for store round trips.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt fails.
    pub max_retries: u32,
    /// Base backoff between retries, doubled per retry plus jitter.
    pub backoff: Duration,
    /// Timeout applied to each individual store operation.
    pub op_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(25),
            op_timeout: Duration::from_millis(250),
        }
    }
}

/// Sliding-window admission control over a shared store.
///
/// The limiter holds no counter state of its own; every decision is one
/// or more round trips to the store, so a single instance per process
/// with a handle to the shared backend is enough. Instances built with
/// [`RateLimiter::disabled`] are inert and admit everything, which is how
/// deployments without store configuration opt out of limiting.
pub struct RateLimiter {
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
}

impl RateLimiter {
    /// Create a limiter backed by the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create a limiter with an explicit time source.
    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Some(store),
            clock,
            retry: RetryConfig::default(),
        }
    }

    /// Create an inert limiter that always allows.
    pub fn disabled() -> Self {
        Self {
            store: None,
            clock: Arc::new(SystemClock),
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry and timeout budget.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Whether this limiter is actually enforcing limits.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Account one permit request for `key` against `policy`.
    ///
    /// Every call consumes a slot attempt: allowed or denied, the key's
    /// window state in the store is written back and its expiry
    /// refreshed. Fails with [`FloodgateError::InvalidPolicy`] for a
    /// malformed policy and [`FloodgateError::StoreUnavailable`] once the
    /// retry budget is spent.
    pub async fn check(&self, key: &str, policy: &Policy) -> Result<Decision> {
        policy.validate()?;

        let Some(store) = &self.store else {
            let now = self.clock.now_ms();
            return Ok(Decision {
                allowed: true,
                limit: policy.max_permits,
                remaining: policy.max_permits,
                reset_at_ms: now + policy.window_ms(),
            });
        };

        let storage_key = format!("{KEY_PREFIX}:{}:{}", policy.name, key);
        let mut attempt = 0;
        loop {
            match self.try_check(store.as_ref(), &storage_key, policy).await {
                Ok(decision) => {
                    trace!(
                        key = %storage_key,
                        allowed = decision.allowed,
                        remaining = decision.remaining,
                        "Rate limit decision"
                    );
                    return Ok(decision);
                }
                Err(err) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        key = %storage_key,
                        error = %err,
                        attempt = attempt,
                        "Store operation failed, retrying"
                    );
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
                Err(err) => {
                    warn!(key = %storage_key, error = %err, "Store unavailable");
                    return Err(FloodgateError::StoreUnavailable(err.to_string()));
                }
            }
        }
    }

    /// One read-estimate-write pass, made atomic by compare-and-swap.
    async fn try_check(
        &self,
        store: &dyn KeyValueStore,
        storage_key: &str,
        policy: &Policy,
    ) -> std::result::Result<Decision, StoreError> {
        let window_ms = policy.window_ms();
        // Twice the window so the previous sub-window outlives its own
        // span; idle keys expire on their own after that.
        let ttl = Some(policy.window * 2);

        for _ in 0..MAX_CAS_ATTEMPTS {
            let raw = self.store_op(store.get(storage_key)).await?;
            let now = self.clock.now_ms();

            let state = raw
                .as_deref()
                .and_then(WindowState::decode)
                .map(|s| s.advance(now, window_ms))
                .unwrap_or_else(|| WindowState::new(now, window_ms));

            let estimate = state.weighted_count(now, window_ms);
            let allowed = estimate < policy.max_permits as f64;

            let mut next = state;
            if allowed {
                next.current += 1;
            }
            let counted = if allowed { estimate + 1.0 } else { estimate };

            let decision = Decision {
                allowed,
                limit: policy.max_permits,
                remaining: remaining_permits(counted, policy),
                reset_at_ms: next.reset_at_ms(window_ms),
            };

            // Denied calls write back too: the attempt rolls the window
            // forward and refreshes the entry's expiry.
            let swapped = self
                .store_op(store.compare_and_swap(
                    storage_key,
                    raw.as_deref(),
                    &next.encode(),
                    ttl,
                ))
                .await?;
            if swapped {
                return Ok(decision);
            }
            // Lost the race to a concurrent caller; re-read and retry.
        }

        Err(StoreError::Contention)
    }

    async fn store_op<T>(
        &self,
        op: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> std::result::Result<T, StoreError> {
        timeout(self.retry.op_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.retry.backoff * 2u32.saturating_pow(attempt.saturating_sub(1));
        let jitter_ms = self.retry.backoff.as_millis() as u64 / 2;
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}
