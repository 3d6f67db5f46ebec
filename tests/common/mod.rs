//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use mv_channels::channel::ChannelSpec;
use mv_channels::config::ChannelsConfig;
use mv_channels::lifecycle::{ResourceLifecycle, ShutdownSignal};
use mv_channels::provider::{ProviderCall, SimProvider};
use mv_channels::resilience::retries::RetryPolicy;

/// Defaults with a 1 ms poll tick and millisecond-scale retry backoff.
pub fn fast_config() -> ChannelsConfig {
    let mut config = ChannelsConfig::default();
    config.lifecycle.poll_interval_ms = 1;
    config.lifecycle.network_ready_timeout_ms = 2_000;
    config.lifecycle.response_timeout_ms = 2_000;
    config.retries.base_delay_ms = 1;
    config.retries.max_delay_ms = 5;
    config
}

/// Log-service lifecycle over `sim`.
pub fn log_lifecycle(sim: &Arc<SimProvider>, config: &ChannelsConfig) -> ResourceLifecycle<SimProvider> {
    log_lifecycle_with(sim, config, ShutdownSignal::never())
}

pub fn log_lifecycle_with(
    sim: &Arc<SimProvider>,
    config: &ChannelsConfig,
    shutdown: ShutdownSignal,
) -> ResourceLifecycle<SimProvider> {
    ResourceLifecycle::new(
        Arc::clone(sim),
        ChannelSpec::log(&config.log),
        config.lifecycle.clone(),
        RetryPolicy::from(&config.retries),
        shutdown,
    )
}

/// Short names of the acquire/release calls made so far, in order.
pub fn lifecycle_calls(sim: &SimProvider) -> Vec<&'static str> {
    sim.calls()
        .iter()
        .filter_map(|call| match call {
            ProviderCall::SetupNotifications { .. } => Some("setup_notifications"),
            ProviderCall::RequestNetwork { .. } => Some("request_network"),
            ProviderCall::OpenChannel { .. } => Some("open_channel"),
            ProviderCall::CloseChannel { .. } => Some("close_channel"),
            ProviderCall::ReleaseNetwork { .. } => Some("release_network"),
            ProviderCall::CloseNotifications { .. } => Some("close_notifications"),
            _ => None,
        })
        .collect()
}

/// Short names of the release calls only.
pub fn release_calls(sim: &SimProvider) -> Vec<&'static str> {
    lifecycle_calls(sim)
        .into_iter()
        .filter(|name| name.starts_with("close") || name.starts_with("release"))
        .collect()
}

pub fn write_payloads(sim: &SimProvider) -> Vec<Vec<u8>> {
    sim.calls()
        .into_iter()
        .filter_map(|call| match call {
            ProviderCall::WriteChannel { accepted, .. } => Some(accepted),
            _ => None,
        })
        .collect()
}
