//! Time source abstraction.
//!
//! The limiter reads the clock through a trait so window arithmetic can
//! be tested at fixed instants instead of sleeping through real windows.

/// A source of epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Clock;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// A clock that only moves when told to.
    #[derive(Debug, Default)]
    pub struct ManualClock {
        now_ms: AtomicI64,
    }

    impl ManualClock {
        pub fn at(now_ms: i64) -> Self {
            Self {
                now_ms: AtomicI64::new(now_ms),
            }
        }

        pub fn set(&self, now_ms: i64) {
            self.now_ms.store(now_ms, Ordering::SeqCst);
        }

        pub fn advance(&self, delta_ms: i64) {
            self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> i64 {
            self.now_ms.load(Ordering::SeqCst)
        }
    }
}
