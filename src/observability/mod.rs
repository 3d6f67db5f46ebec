//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with a `service` field (structured logs)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout, pretty or JSON
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments) and inert without a recorder

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
