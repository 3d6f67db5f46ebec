//! Service adapters built on a channel lifecycle.
//!
//! # Data Flow
//! ```text
//! caller
//!     → LogSink::log(line)        poll_status → ensure_open → payload, "\n"
//!     → HttpClient::send(request) ensure_open → send → wait_readable
//!                                 → data / headers / body → close
//! ```
//!
//! # Design Decisions
//! - Callers see success or `ServiceError::Unavailable`, nothing in between
//! - Each adapter owns exactly one `ResourceLifecycle`

pub mod http_client;
pub mod log_sink;

pub use http_client::HttpClient;
pub use log_sink::LogSink;

use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Outcome surfaced by a service adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{service} service unavailable: {source}")]
    Unavailable {
        service: String,
        #[source]
        source: LifecycleError,
    },
}

impl ServiceError {
    pub(crate) fn unavailable(service: &str, source: LifecycleError) -> Self {
        ServiceError::Unavailable {
            service: service.to_string(),
            source,
        }
    }

    /// The lifecycle error underneath.
    pub fn cause(&self) -> &LifecycleError {
        match self {
            ServiceError::Unavailable { source, .. } => source,
        }
    }
}
