//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the channel
//! services. All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the channel services.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Log sink service (opaque-bytes channel).
    pub log: ServiceConfig,

    /// HTTP client service.
    pub http: ServiceConfig,

    /// Readiness and status handling shared by every lifecycle.
    pub lifecycle: LifecycleConfig,

    /// Setup retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            log: ServiceConfig {
                irq: 43,
                queue_capacity: default_queue_capacity(),
                network_tag: default_network_tag(),
                channel_tag: default_channel_tag(),
                endpoint: "log".to_string(),
                receive_buffer_len: 16,
                send_buffer_len: 512,
            },
            http: ServiceConfig {
                irq: 44,
                queue_capacity: default_queue_capacity(),
                network_tag: default_network_tag(),
                channel_tag: default_channel_tag(),
                endpoint: String::new(),
                receive_buffer_len: 4096,
                send_buffer_len: 1024,
            },
            lifecycle: LifecycleConfig::default(),
            retries: RetryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// One service's notifier, tags and channel parameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Interrupt line the notification sink is raised on.
    pub irq: u32,

    /// Notification ring capacity in records.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Tag stamped on network status records.
    #[serde(default = "default_network_tag")]
    pub network_tag: u32,

    /// Tag stamped on channel records.
    #[serde(default = "default_channel_tag")]
    pub channel_tag: u32,

    /// Endpoint name passed to `open_channel`.
    pub endpoint: String,

    /// Receive buffer length in bytes (rounded up to whole 512-byte blocks).
    pub receive_buffer_len: usize,

    /// Send buffer length in bytes (rounded up to whole 512-byte blocks).
    pub send_buffer_len: usize,
}

fn default_queue_capacity() -> usize {
    16
}

fn default_network_tag() -> u32 {
    1
}

fn default_channel_tag() -> u32 {
    2
}

/// Lifecycle timing and status-change handling.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long `ensure_open` waits for the network, in milliseconds (0 = forever).
    pub network_ready_timeout_ms: u64,

    /// Yield between readiness checks, in milliseconds.
    pub poll_interval_ms: u64,

    /// Close the channel when a status-change record reports a drop.
    pub react_to_status_changes: bool,

    /// How long the HTTP client waits for a response, in milliseconds (0 = forever).
    pub response_timeout_ms: u64,
}

impl LifecycleConfig {
    pub fn network_ready_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.network_ready_timeout_ms)
    }

    /// Never zero, so a readiness loop always yields.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.response_timeout_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            network_ready_timeout_ms: 30_000,
            poll_interval_ms: 50,
            react_to_status_changes: true,
            response_timeout_ms: 10_000,
        }
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Retry configuration for channel setup.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of setup attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
