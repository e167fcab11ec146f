//! Admission policies and decisions.

use std::time::Duration;

use crate::error::{FloodgateError, Result};

/// An admission policy: at most `max_permits` permits per `window`.
///
/// Policies are plain caller-supplied values; the limiter itself is
/// policy-agnostic. The `name` namespaces the counter state in the shared
/// store, so two policies applied to the same client track independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Name of the policy, part of the storage key.
    pub name: String,
    /// Maximum permits allowed in the window.
    pub max_permits: u32,
    /// Duration of the window.
    pub window: Duration,
}

impl Policy {
    /// Create a new policy.
    pub fn new(name: impl Into<String>, max_permits: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            max_permits,
            window,
        }
    }

    /// Convenience constructor for per-minute policies.
    pub fn per_minute(name: impl Into<String>, max_permits: u32) -> Self {
        Self::new(name, max_permits, Duration::from_secs(60))
    }

    /// Window duration in milliseconds.
    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }

    /// Reject malformed policies before they reach the store.
    pub fn validate(&self) -> Result<()> {
        if self.max_permits == 0 {
            return Err(FloodgateError::InvalidPolicy(format!(
                "policy '{}' has zero max_permits",
                self.name
            )));
        }
        if self.window.is_zero() {
            return Err(FloodgateError::InvalidPolicy(format!(
                "policy '{}' has zero window",
                self.name
            )));
        }
        Ok(())
    }
}

/// The outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// The policy limit, echoed for response headers.
    pub limit: u32,
    /// Permits still available before `reset_at_ms`, clamped to
    /// `[0, limit]`.
    pub remaining: u32,
    /// When the current window ends, in epoch milliseconds.
    pub reset_at_ms: i64,
}
