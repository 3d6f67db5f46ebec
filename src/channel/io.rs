//! Byte-level operations on an open channel.
//!
//! # Responsibilities
//! - Write bytes and report how many the provider accepted
//! - Send HTTP requests and read the response once it is readable
//! - Read opaque received bytes once they are readable
//!
//! # Design Decisions
//! - Borrows the lifecycle mutably so it cannot be closed mid-operation
//!   except through its own status handling
//! - No implicit retry of short writes
//! - Every read drains the notification queue first, so a queued disconnect
//!   closes the channel before its handle is used

use std::time::Duration;

use crate::lifecycle::{LifecycleError, ResourceLifecycle};
use crate::observability::metrics;
use crate::provider::{ChannelHandle, ChannelKind, HttpRequest, HttpResponseData, Provider};

/// Read/write access to the channel of an open lifecycle.
pub struct ChannelIo<'a, P: Provider + ?Sized> {
    lifecycle: &'a mut ResourceLifecycle<P>,
}

impl<'a, P: Provider + ?Sized> ChannelIo<'a, P> {
    pub(crate) fn new(lifecycle: &'a mut ResourceLifecycle<P>) -> Self {
        Self { lifecycle }
    }

    /// Queue `bytes` for sending. Returns how many were accepted, which may
    /// be fewer than requested; the caller re-submits the rest.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, LifecycleError> {
        let channel = self.lifecycle.open_channel_handle()?;
        let accepted = self
            .lifecycle
            .provider()
            .write_channel(channel, bytes)
            .map_err(|source| LifecycleError::Io { op: "write", source })?
            .min(bytes.len());

        metrics::record_bytes_written(&self.lifecycle.spec().service, accepted);
        if accepted < bytes.len() {
            tracing::trace!(
                service = %self.lifecycle.spec().service,
                requested = bytes.len(),
                accepted,
                "Short write"
            );
        }
        Ok(accepted)
    }

    /// Write `text` then a single `\n`, as two separate writes.
    ///
    /// Returns the total accepted across both.
    pub fn write_line(&mut self, text: &str) -> Result<usize, LifecycleError> {
        let payload = self.write(text.as_bytes())?;
        let terminator = self.write(b"\n")?;
        Ok(payload + terminator)
    }

    /// Copy received bytes from `offset` on an opaque-bytes channel.
    pub fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, LifecycleError> {
        let channel = self.readable_channel(ChannelKind::OpaqueBytes)?;
        self.lifecycle
            .provider()
            .read_channel(channel, offset, buf)
            .map_err(|source| LifecycleError::Io { op: "read", source })
    }

    /// Acknowledge one data-readable record. Returns false if none was pending.
    pub fn consume_readable(&mut self) -> bool {
        self.lifecycle.consume_readable()
    }

    /// Wait until a data-readable record arrives for this channel.
    ///
    /// Fails with `Disconnected` if the channel closes first.
    pub async fn wait_readable(&mut self, timeout: Option<Duration>) -> Result<(), LifecycleError> {
        self.lifecycle.wait_readable(timeout).await
    }

    pub fn send_http_request(&mut self, request: &HttpRequest) -> Result<(), LifecycleError> {
        let channel = self.lifecycle.open_channel_handle()?;
        self.require_kind(ChannelKind::Http)?;
        tracing::debug!(
            service = %self.lifecycle.spec().service,
            method = %request.method,
            url = %request.url,
            "Sending HTTP request"
        );
        self.lifecycle
            .provider()
            .send_http_request(channel, request)
            .map_err(|source| LifecycleError::Io { op: "send http request", source })
    }

    pub fn http_response_data(&mut self) -> Result<HttpResponseData, LifecycleError> {
        let channel = self.readable_channel(ChannelKind::Http)?;
        self.lifecycle
            .provider()
            .read_http_response_data(channel)
            .map_err(|source| LifecycleError::Io { op: "read response data", source })
    }

    /// Copy header `index` (`Name: value`) into `buf`.
    pub fn read_header(&mut self, index: u32, buf: &mut [u8]) -> Result<usize, LifecycleError> {
        let channel = self.readable_channel(ChannelKind::Http)?;
        self.lifecycle
            .provider()
            .read_http_response_header(channel, index, buf)
            .map_err(|source| LifecycleError::Io { op: "read response header", source })
    }

    /// Copy response body bytes from `offset` into `buf`.
    pub fn read_body(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, LifecycleError> {
        let channel = self.readable_channel(ChannelKind::Http)?;
        self.lifecycle
            .provider()
            .read_http_response_body(channel, offset, buf)
            .map_err(|source| LifecycleError::Io { op: "read response body", source })
    }

    fn require_kind(&self, expected: ChannelKind) -> Result<(), LifecycleError> {
        if self.lifecycle.spec().kind == expected {
            Ok(())
        } else {
            Err(LifecycleError::WrongChannelKind { expected })
        }
    }

    /// Channel handle for a read, after acting on any queued disconnect.
    fn readable_channel(&mut self, expected: ChannelKind) -> Result<ChannelHandle, LifecycleError> {
        self.lifecycle.open_channel_handle()?;
        self.require_kind(expected)?;

        let outcome = self.lifecycle.poll_status()?;
        if outcome.disconnected || !self.lifecycle.is_open() {
            return Err(LifecycleError::Disconnected);
        }
        if self.lifecycle.pending_readable() == 0 {
            return Err(LifecycleError::NotReadable);
        }
        self.lifecycle.open_channel_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::channel::ChannelSpec;
    use crate::config::ChannelsConfig;
    use crate::lifecycle::ShutdownSignal;
    use crate::provider::{ProviderCall, SimProvider};
    use crate::resilience::retries::RetryPolicy;

    fn open_log(sim: &Arc<SimProvider>) -> ResourceLifecycle<SimProvider> {
        let config = ChannelsConfig::default();
        ResourceLifecycle::new(
            Arc::clone(sim),
            ChannelSpec::log(&config.log),
            config.lifecycle.clone(),
            RetryPolicy::fail_fast(),
            ShutdownSignal::never(),
        )
    }

    #[tokio::test]
    async fn test_write_line_is_two_writes() {
        let sim = Arc::new(SimProvider::new());
        let mut lc = open_log(&sim);
        lc.ensure_open().await.unwrap();

        let accepted = lc.io().unwrap().write_line("abc").unwrap();
        assert_eq!(accepted, 4);

        let writes: Vec<Vec<u8>> = sim
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                ProviderCall::WriteChannel { accepted, .. } => Some(accepted),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![b"abc".to_vec(), b"\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_short_write_is_reported() {
        let sim = Arc::new(SimProvider::new().with_write_capacity(2));
        let mut lc = open_log(&sim);
        lc.ensure_open().await.unwrap();

        let mut io = lc.io().unwrap();
        assert_eq!(io.write(b"hello").unwrap(), 2);
        assert_eq!(io.write(b"llo").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_io_requires_open_channel() {
        let sim = Arc::new(SimProvider::new());
        let mut lc = open_log(&sim);
        assert!(matches!(lc.io(), Err(LifecycleError::ChannelNotOpen)));
    }

    #[tokio::test]
    async fn test_read_requires_readable_event() {
        let sim = Arc::new(SimProvider::new());
        let mut lc = open_log(&sim);
        lc.ensure_open().await.unwrap();

        let mut buf = [0u8; 8];
        let err = lc.io().unwrap().read(0, &mut buf).unwrap_err();
        assert_eq!(err, LifecycleError::NotReadable);
    }

    #[tokio::test]
    async fn test_read_after_inbound_data() {
        let sim = Arc::new(SimProvider::new());
        let mut lc = open_log(&sim);
        lc.ensure_open().await.unwrap();

        sim.deliver(lc.handles().channel, b"ack");
        lc.io().unwrap().wait_readable(Some(Duration::from_millis(500))).await.unwrap();

        let mut io = lc.io().unwrap();
        let mut buf = [0u8; 8];
        let n = io.read(0, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"ack");
        assert!(io.consume_readable());
        assert!(!io.consume_readable());
    }

    #[tokio::test]
    async fn test_read_after_disconnect_is_refused() {
        let sim = Arc::new(SimProvider::new());
        let mut lc = open_log(&sim);
        lc.ensure_open().await.unwrap();

        sim.deliver(lc.handles().channel, b"ack");
        lc.io().unwrap().wait_readable(Some(Duration::from_millis(500))).await.unwrap();
        sim.drop_network();
        sim.clear_calls();

        let mut buf = [0u8; 8];
        let err = lc.io().unwrap().read(0, &mut buf).unwrap_err();
        assert_eq!(err, LifecycleError::Disconnected);
        assert!(!sim
            .calls()
            .iter()
            .any(|c| matches!(c, ProviderCall::ReadChannel { .. })));
    }

    #[tokio::test]
    async fn test_http_ops_rejected_on_opaque_channel() {
        let sim = Arc::new(SimProvider::new());
        let mut lc = open_log(&sim);
        lc.ensure_open().await.unwrap();

        let request = HttpRequest {
            method: "GET".into(),
            url: "http://example.com".into(),
            headers: Vec::new(),
            body: Vec::new(),
            timeout_ms: 1000,
        };
        let err = lc.io().unwrap().send_http_request(&request).unwrap_err();
        assert_eq!(err, LifecycleError::WrongChannelKind { expected: ChannelKind::Http });
    }
}
