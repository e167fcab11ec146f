//! Rate limiting logic and window state management.

mod clock;
mod limiter;
mod policy;
mod window;

pub use clock::{Clock, SystemClock};
pub use limiter::{RateLimiter, RetryConfig};
pub use policy::{Decision, Policy};
pub use window::WindowState;
