//! Deadline helpers for cooperative waits.
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities
//! - `None` means unbounded: the deadline future never resolves

use std::time::Duration;

use tokio::time::Instant;

/// Absolute deadline for a wait of `timeout`, if bounded.
pub fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.map(|t| Instant::now() + t)
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
