//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! ensure_open():
//!     → timeouts.rs (deadline for the network readiness wait)
//!     → On setup failure: retries.rs (retryable? attempts left? how long
//!       to yield before the next attempt?)
//! ```
//!
//! # Design Decisions
//! - Every wait can be bounded; unbounded is an explicit configuration
//! - Retries only for provider rejections during acquisition
//! - Backoff is exponential with jitter, folded into `RetryPolicy::delay`

pub mod retries;
pub mod timeouts;
