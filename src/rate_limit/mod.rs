//! Per-identity request rate limiting.
//!
//! The limiter keeps an exact sliding-window log: the timestamps of the
//! requests admitted inside the trailing window, per identity. Admission is
//! a pure function of those timestamps, which avoids the double-burst
//! artifact that fixed calendar-aligned buckets show at window boundaries.
//!
//! State is in-memory only and scoped to the process; a restart clears all
//! windows.

pub mod sliding_window;
pub mod types;

pub use sliding_window::SlidingWindowLimiter;
pub use types::{Admission, RateLimitConfig, RateStatus};
