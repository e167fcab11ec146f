//! Sliding-window counter state.
//!
//! One value per key in the shared store: the counters for the current
//! fixed sub-window and the one before it. The trailing-window count is
//! estimated as a weighted blend of the two, which approximates a true
//! sliding window without storing one entry per request.

use serde::{Deserialize, Serialize};

use super::policy::Policy;

/// Durable per-key counter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    /// Start of the current sub-window, epoch milliseconds.
    pub window_start_ms: i64,
    /// Permits granted in the current sub-window.
    pub current: u64,
    /// Permits granted in the previous sub-window.
    pub previous: u64,
}

impl WindowState {
    /// Fresh state for the window containing `now_ms`.
    pub fn new(now_ms: i64, window_ms: i64) -> Self {
        Self {
            window_start_ms: window_floor(now_ms, window_ms),
            current: 0,
            previous: 0,
        }
    }

    /// Roll the state forward to the window containing `now_ms`.
    ///
    /// Moving exactly one window ahead shifts the current counter into
    /// the previous slot; moving further discards both. A timestamp
    /// exactly on a boundary belongs to the new window.
    pub fn advance(&self, now_ms: i64, window_ms: i64) -> Self {
        let start = window_floor(now_ms, window_ms);
        if start == self.window_start_ms {
            self.clone()
        } else if start == self.window_start_ms + window_ms {
            Self {
                window_start_ms: start,
                current: 0,
                previous: self.current,
            }
        } else {
            Self::new(now_ms, window_ms)
        }
    }

    /// Weighted estimate of permits granted in the trailing window
    /// ending at `now_ms`. Assumes the state has been advanced to the
    /// window containing `now_ms`.
    pub fn weighted_count(&self, now_ms: i64, window_ms: i64) -> f64 {
        let elapsed = (now_ms - self.window_start_ms) as f64 / window_ms as f64;
        self.previous as f64 * (1.0 - elapsed) + self.current as f64
    }

    /// End of the current window, epoch milliseconds.
    pub fn reset_at_ms(&self, window_ms: i64) -> i64 {
        self.window_start_ms + window_ms
    }

    pub fn encode(&self) -> String {
        // Struct of three integers, serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode stored state; `None` on corrupt or foreign data, which the
    /// limiter treats as a fresh key.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Remaining permits after an estimate of `count` against `policy`,
/// clamped to `[0, max_permits]`.
pub fn remaining_permits(count: f64, policy: &Policy) -> u32 {
    let used = count.ceil() as i64;
    (policy.max_permits as i64 - used).clamp(0, policy.max_permits as i64) as u32
}

fn window_floor(now_ms: i64, window_ms: i64) -> i64 {
    (now_ms / window_ms) * window_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: i64 = 60_000;

    #[test]
    fn test_new_state_floors_to_window_start() {
        let state = WindowState::new(90_000, WINDOW);
        assert_eq!(state.window_start_ms, 60_000);
        assert_eq!(state.current, 0);
        assert_eq!(state.previous, 0);
    }

    #[test]
    fn test_advance_within_window_is_identity() {
        let mut state = WindowState::new(0, WINDOW);
        state.current = 5;
        assert_eq!(state.advance(59_999, WINDOW), state);
    }

    #[test]
    fn test_advance_one_window_shifts_counts() {
        let mut state = WindowState::new(0, WINDOW);
        state.current = 7;
        state.previous = 3;

        let rolled = state.advance(60_001, WINDOW);
        assert_eq!(rolled.window_start_ms, 60_000);
        assert_eq!(rolled.current, 0);
        assert_eq!(rolled.previous, 7);
    }

    #[test]
    fn test_advance_two_windows_discards_counts() {
        let mut state = WindowState::new(0, WINDOW);
        state.current = 7;
        state.previous = 3;

        let rolled = state.advance(120_000, WINDOW);
        assert_eq!(rolled.window_start_ms, 120_000);
        assert_eq!(rolled.current, 0);
        assert_eq!(rolled.previous, 0);
    }

    #[test]
    fn test_boundary_belongs_to_new_window() {
        let state = WindowState::new(0, WINDOW);
        let rolled = state.advance(60_000, WINDOW);
        assert_eq!(rolled.window_start_ms, 60_000);
    }

    #[test]
    fn test_weighted_count_blends_previous_window() {
        let mut state = WindowState::new(60_000, WINDOW);
        state.previous = 10;
        state.current = 2;

        // Halfway through the window, half the previous count remains.
        let count = state.weighted_count(90_000, WINDOW);
        assert!((count - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_count_at_window_start() {
        let mut state = WindowState::new(60_000, WINDOW);
        state.previous = 10;
        assert!((state.weighted_count(60_000, WINDOW) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut state = WindowState::new(60_000, WINDOW);
        state.current = 4;
        state.previous = 9;
        assert_eq!(WindowState::decode(&state.encode()), Some(state));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(WindowState::decode("not json"), None);
    }

    #[test]
    fn test_remaining_clamps_to_zero() {
        let policy = Policy::per_minute("test", 10);
        assert_eq!(remaining_permits(12.4, &policy), 0);
        assert_eq!(remaining_permits(3.0, &policy), 7);
        assert_eq!(remaining_permits(0.0, &policy), 10);
    }
}
