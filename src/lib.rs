//! Notification-driven channel lifecycle manager.
//!
//! Drives notifier → network → channel acquisition against a `Provider`,
//! reacts to host notifications, and exposes log and HTTP services on top.

pub mod channel;
pub mod config;
pub mod lifecycle;
pub mod notify;
pub mod observability;
pub mod provider;
pub mod resilience;
pub mod services;

pub use config::ChannelsConfig;
pub use lifecycle::{LifecycleError, LifecycleState, ResourceLifecycle, Shutdown};
pub use provider::{Provider, SimProvider};
pub use services::{HttpClient, LogSink, ServiceError};
