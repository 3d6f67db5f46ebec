//! Fire-and-forget line logging over an opaque-bytes channel.

use std::sync::Arc;

use crate::channel::{ChannelIo, ChannelSpec};
use crate::config::ChannelsConfig;
use crate::lifecycle::{LifecycleError, PollOutcome, ResourceLifecycle, ShutdownSignal};
use crate::observability::metrics;
use crate::provider::Provider;
use crate::resilience::retries::RetryPolicy;
use crate::services::ServiceError;

/// Writes log lines to the `log` endpoint, opening the channel on demand.
pub struct LogSink<P: Provider + ?Sized> {
    lifecycle: ResourceLifecycle<P>,
    bytes_lost: u64,
}

impl<P: Provider + ?Sized> LogSink<P> {
    pub fn new(provider: Arc<P>, config: &ChannelsConfig, shutdown: ShutdownSignal) -> Self {
        Self::from_lifecycle(ResourceLifecycle::new(
            provider,
            ChannelSpec::log(&config.log),
            config.lifecycle.clone(),
            RetryPolicy::from(&config.retries),
            shutdown,
        ))
    }

    pub fn from_lifecycle(lifecycle: ResourceLifecycle<P>) -> Self {
        Self {
            lifecycle,
            bytes_lost: 0,
        }
    }

    /// Write `line` followed by `\n`.
    ///
    /// Pending notifications are handled first, so a network that dropped
    /// since the last call is closed and reopened rather than written into.
    /// Returns the bytes accepted; bytes the provider refused are counted as lost.
    pub async fn log(&mut self, line: &str) -> Result<usize, ServiceError> {
        let wanted = line.len() + 1;
        match self.try_log(line).await {
            Ok(accepted) => {
                self.record_lost(wanted - accepted);
                Ok(accepted)
            }
            Err(e) => {
                self.record_lost(wanted);
                tracing::debug!(service = %self.service(), error = %e, "Log line dropped");
                Err(ServiceError::unavailable(self.service(), e))
            }
        }
    }

    async fn try_log(&mut self, line: &str) -> Result<usize, LifecycleError> {
        self.lifecycle.poll_status()?;
        self.lifecycle.ensure_open().await?;

        let mut io = self.lifecycle.io()?;
        let payload = write_all(&mut io, line.as_bytes())?;
        if payload < line.len() {
            return Ok(payload);
        }
        Ok(payload + write_all(&mut io, b"\n")?)
    }

    /// Per-tick status poll; closes the channel if the network dropped.
    pub fn tick(&mut self) -> Result<PollOutcome, ServiceError> {
        self.lifecycle
            .poll_status()
            .map_err(|e| ServiceError::unavailable(self.service(), e))
    }

    /// Release the log channel.
    pub fn shutdown(&mut self) -> Result<(), ServiceError> {
        self.lifecycle
            .close()
            .map_err(|e| ServiceError::unavailable(self.service(), e))
    }

    pub fn lifecycle(&self) -> &ResourceLifecycle<P> {
        &self.lifecycle
    }

    /// Bytes that could not be delivered since creation.
    pub fn bytes_lost(&self) -> u64 {
        self.bytes_lost
    }

    fn service(&self) -> &str {
        &self.lifecycle.spec().service
    }

    fn record_lost(&mut self, bytes: usize) {
        if bytes > 0 {
            self.bytes_lost += bytes as u64;
            metrics::record_log_bytes_lost(bytes);
        }
    }
}

impl<P: Provider + ?Sized> std::fmt::Debug for LogSink<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("lifecycle", &self.lifecycle)
            .field("bytes_lost", &self.bytes_lost)
            .finish()
    }
}

/// Re-submit the unaccepted remainder until done or the provider stops accepting.
fn write_all<P: Provider + ?Sized>(io: &mut ChannelIo<'_, P>, bytes: &[u8]) -> Result<usize, LifecycleError> {
    let mut written = 0;
    while written < bytes.len() {
        let accepted = io.write(&bytes[written..])?;
        if accepted == 0 {
            break;
        }
        written += accepted;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleState;
    use crate::provider::{ProviderCall, SimProvider};

    fn sink(sim: &Arc<SimProvider>) -> LogSink<SimProvider> {
        let mut config = ChannelsConfig::default();
        config.lifecycle.poll_interval_ms = 1;
        LogSink::new(Arc::clone(sim), &config, ShutdownSignal::never())
    }

    #[tokio::test]
    async fn test_log_opens_lazily_and_appends_newline() {
        let sim = Arc::new(SimProvider::new());
        let mut log = sink(&sim);
        assert_eq!(sim.live_handles(), 0);

        assert_eq!(log.log("Debug ping 0").await.unwrap(), 13);
        assert_eq!(sim.delivered("log"), b"Debug ping 0\n");
        assert_eq!(log.lifecycle().state(), LifecycleState::ChannelOpen);
    }

    #[tokio::test]
    async fn test_short_writes_are_resubmitted() {
        let sim = Arc::new(SimProvider::new().with_write_capacity(3));
        let mut log = sink(&sim);

        log.log("abcdefg").await.unwrap();
        assert_eq!(sim.delivered("log"), b"abcdefg\n");
        assert_eq!(sim.count(|c| matches!(c, ProviderCall::WriteChannel { .. })), 4);
        assert_eq!(log.bytes_lost(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_releases_channel() {
        let sim = Arc::new(SimProvider::new());
        let mut log = sink(&sim);
        log.log("x").await.unwrap();
        log.shutdown().unwrap();
        assert_eq!(log.lifecycle().state(), LifecycleState::Idle);
        assert_eq!(sim.live_handles(), 0);
    }
}
