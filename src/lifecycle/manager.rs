//! Notification-driven channel lifecycle.
//!
//! # Responsibilities
//! - Acquire notifier → network → channel, waiting for readiness
//! - Demultiplex notifications by (kind, tag) in queue order
//! - Close on request or when the network drops, releasing in reverse order
//! - Retry transient setup failures with backoff
//!
//! # Design Decisions
//! - The lifecycle is the only caller of acquire/release provider calls
//! - Handles never outlive a close; every reopen starts from Idle
//! - A handle that does not return to zero faults this lifecycle only

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::channel::{ChannelBuffers, ChannelIo, ChannelSpec};
use crate::config::LifecycleConfig;
use crate::lifecycle::error::{LifecycleError, ReleaseFailure};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::state::LifecycleState;
use crate::notify::{EventFilter, EventKind, EventQueue, EventRecord};
use crate::observability::metrics;
use crate::provider::{
    ChannelHandle, NetworkHandle, NetworkStatus, NotificationHandle, OpenChannelParams, Provider,
    ProviderError, ProviderResult, RequestNetworkParams, Resource,
};
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts;

/// The three provider handles a lifecycle owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Handles {
    pub notification: NotificationHandle,
    pub network: NetworkHandle,
    pub channel: ChannelHandle,
}

impl Handles {
    pub fn none_held(&self) -> bool {
        !self.notification.is_held() && !self.network.is_held() && !self.channel.is_held()
    }
}

/// What a `poll_status` drain observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// The channel was closed because the network or channel dropped.
    pub disconnected: bool,
    /// Data-readable records seen for this channel.
    pub data_readable: u32,
    /// Records that belonged to no part of this lifecycle's current state.
    pub discarded: u32,
}

enum Wake {
    Notified,
    Tick,
    Cancelled,
    Deadline,
}

/// Owns and drives the notifier/network/channel handles of one service.
pub struct ResourceLifecycle<P: Provider + ?Sized> {
    spec: ChannelSpec,
    config: LifecycleConfig,
    retry: RetryPolicy,
    provider: Arc<P>,
    queue: EventQueue,
    handles: Handles,
    state: LifecycleState,
    buffers: Option<ChannelBuffers>,
    readable: u32,
    shutdown: ShutdownSignal,
}

impl<P: Provider + ?Sized> ResourceLifecycle<P> {
    pub fn new(
        provider: Arc<P>,
        spec: ChannelSpec,
        config: LifecycleConfig,
        retry: RetryPolicy,
        shutdown: ShutdownSignal,
    ) -> Self {
        let queue = EventQueue::new(spec.service.clone(), spec.irq, spec.queue_capacity);
        Self {
            spec,
            config,
            retry,
            provider,
            queue,
            handles: Handles::default(),
            state: LifecycleState::Idle,
            buffers: None,
            readable: 0,
            shutdown,
        }
    }

    pub fn spec(&self) -> &ChannelSpec {
        &self.spec
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn handles(&self) -> Handles {
        self.handles
    }

    pub fn is_open(&self) -> bool {
        self.state == LifecycleState::ChannelOpen
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Data-readable records observed and not yet consumed.
    pub fn pending_readable(&self) -> u32 {
        self.readable
    }

    /// Open the channel, or return at once if it already is.
    ///
    /// May suspend while the network comes up. Transient setup failures
    /// are retried per the retry policy; everything acquired by a failed
    /// attempt is released before the next one.
    pub async fn ensure_open(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::ChannelOpen => return Ok(()),
            LifecycleState::Faulted => return Err(LifecycleError::Faulted),
            LifecycleState::Idle => {}
            stale => {
                // An earlier open was abandoned mid-way.
                tracing::warn!(
                    service = %self.spec.service,
                    state = %stale,
                    "Releasing partially acquired resources before reopening"
                );
                self.close()?;
            }
        }

        let mut attempt = 1;
        loop {
            if self.shutdown.is_triggered() {
                return Err(self.cancelled());
            }

            let err = match self.acquire().await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            self.close()?;

            if !err.is_transient() || !self.retry.allows_retry(attempt) {
                tracing::error!(
                    service = %self.spec.service,
                    attempt,
                    error = %err,
                    "Channel setup failed"
                );
                return Err(err);
            }

            let delay = self.retry.delay(attempt);
            tracing::warn!(
                service = %self.spec.service,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Channel setup failed, retrying"
            );
            metrics::record_setup_retry(&self.spec.service);

            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return Err(self.cancelled()),
            }
            attempt += 1;
        }
    }

    async fn acquire(&mut self) -> Result<(), LifecycleError> {
        self.transition(LifecycleState::NotifierUp);
        let notification = self
            .queue
            .setup(&*self.provider)
            .and_then(non_null(NotificationHandle::is_held))
            .map_err(|source| self.setup_error(Resource::Notifications, source))?;
        self.handles.notification = notification;
        tracing::info!(service = %self.spec.service, handle = %notification, "Notification sink up");

        self.transition(LifecycleState::NetworkRequested);
        let params = RequestNetworkParams {
            notification,
            tag: self.spec.tags.network,
        };
        let network = self
            .provider
            .request_network(&params)
            .and_then(non_null(NetworkHandle::is_held))
            .map_err(|source| self.setup_error(Resource::Network, source))?;
        self.handles.network = network;
        tracing::info!(service = %self.spec.service, handle = %network, "Network requested");

        self.wait_for_network().await?;

        let buffers = ChannelBuffers::new(self.spec.receive_buffer_len, self.spec.send_buffer_len);
        let params = OpenChannelParams {
            notification,
            tag: self.spec.tags.channel,
            network,
            buffers: &buffers,
            kind: self.spec.kind,
            endpoint: &self.spec.endpoint,
        };
        let channel = self
            .provider
            .open_channel(&params)
            .and_then(non_null(ChannelHandle::is_held))
            .map_err(|source| self.setup_error(Resource::Channel, source))?;
        self.handles.channel = channel;
        self.buffers = Some(buffers);
        self.transition(LifecycleState::ChannelOpen);
        tracing::info!(
            service = %self.spec.service,
            handle = %channel,
            endpoint = %self.spec.endpoint,
            "Channel open"
        );
        Ok(())
    }

    async fn wait_for_network(&mut self) -> Result<(), LifecycleError> {
        let started = Instant::now();
        let deadline = timeouts::deadline_after(self.config.network_ready_timeout());

        loop {
            let mut outcome = PollOutcome::default();
            self.drain(&mut outcome)?;

            if self.state == LifecycleState::NetworkRequested
                && self.query_network_status() == Some(NetworkStatus::Connected)
            {
                self.transition(LifecycleState::NetworkUp);
            }
            if self.state == LifecycleState::NetworkUp {
                tracing::info!(
                    service = %self.spec.service,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Network connected"
                );
                return Ok(());
            }

            match self.idle(deadline).await {
                Wake::Notified | Wake::Tick => {}
                Wake::Cancelled => return Err(self.cancelled()),
                Wake::Deadline => {
                    return Err(LifecycleError::NetworkTimeout {
                        service: self.spec.service.clone(),
                        waited_ms: started.elapsed().as_millis() as u64,
                    })
                }
            }
        }
    }

    /// Suspend until a notification, the next poll tick, shutdown or the deadline.
    async fn idle(&self, deadline: Option<Instant>) -> Wake {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = self.queue.notified() => Wake::Notified,
            _ = tokio::time::sleep(self.config.poll_interval()) => Wake::Tick,
            _ = shutdown.cancelled() => Wake::Cancelled,
            _ = timeouts::sleep_until_deadline(deadline) => Wake::Deadline,
        }
    }

    /// Release everything held, channel first and notifier last.
    ///
    /// A no-op on an idle lifecycle. Stops at the first handle that fails
    /// to return to zero and leaves the lifecycle `Faulted`.
    pub fn close(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Idle => return Ok(()),
            LifecycleState::Faulted => {
                tracing::warn!(service = %self.spec.service, "Close ignored on faulted lifecycle");
                return Ok(());
            }
            _ => {}
        }

        self.transition(LifecycleState::Closing);
        self.readable = 0;

        if self.handles.channel.is_held() {
            let result = self.provider.close_channel(&mut self.handles.channel);
            let still_held = self.handles.channel.is_held();
            self.check_released(Resource::Channel, result, still_held)?;
        }

        if self.handles.network.is_held() {
            let result = self.provider.release_network(&mut self.handles.network);
            let still_held = self.handles.network.is_held();
            self.check_released(Resource::Network, result, still_held)?;
        }

        let had_sink = self.handles.notification.is_held();
        let result = self.queue.teardown(&*self.provider, &mut self.handles.notification);
        if had_sink || result.is_err() {
            let still_held = self.handles.notification.is_held();
            self.check_released(Resource::Notifications, result, still_held)?;
        }

        self.buffers = None;
        self.transition(LifecycleState::Idle);
        Ok(())
    }

    /// Drain pending notifications and react to them.
    ///
    /// Call once per scheduler tick, including while the channel is open,
    /// so a dropped network closes the channel instead of absorbing writes.
    pub fn poll_status(&mut self) -> Result<PollOutcome, LifecycleError> {
        let mut outcome = PollOutcome::default();
        if matches!(self.state, LifecycleState::Idle | LifecycleState::Faulted) {
            return Ok(outcome);
        }
        self.drain(&mut outcome)?;
        Ok(outcome)
    }

    /// Byte-level access to the open channel.
    pub fn io(&mut self) -> Result<ChannelIo<'_, P>, LifecycleError> {
        self.open_channel_handle()?;
        Ok(ChannelIo::new(self))
    }

    pub(crate) fn provider(&self) -> &P {
        &self.provider
    }

    pub(crate) fn open_channel_handle(&self) -> Result<ChannelHandle, LifecycleError> {
        if self.state == LifecycleState::ChannelOpen && self.handles.channel.is_held() {
            Ok(self.handles.channel)
        } else {
            Err(LifecycleError::ChannelNotOpen)
        }
    }

    /// Acknowledge one data-readable record. Returns false if none was pending.
    pub(crate) fn consume_readable(&mut self) -> bool {
        if self.readable == 0 {
            return false;
        }
        self.readable -= 1;
        true
    }

    /// Wait for a data-readable record on the open channel.
    pub(crate) async fn wait_readable(&mut self, timeout: Option<Duration>) -> Result<(), LifecycleError> {
        let deadline = timeouts::deadline_after(timeout);
        loop {
            let outcome = self.poll_status()?;
            if outcome.disconnected || !self.is_open() {
                return Err(LifecycleError::Disconnected);
            }
            if self.readable > 0 {
                return Ok(());
            }

            match self.idle(deadline).await {
                Wake::Notified | Wake::Tick => {}
                Wake::Cancelled => {
                    self.close()?;
                    return Err(self.cancelled());
                }
                Wake::Deadline => {
                    let waited = timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
                    return Err(LifecycleError::ResponseTimeout(waited));
                }
            }
        }
    }

    fn drain(&mut self, outcome: &mut PollOutcome) -> Result<(), LifecycleError> {
        if !self.queue.has_pending() {
            return Ok(());
        }
        self.queue.clear_pending();

        while let Some(record) = self.queue.poll_one(EventFilter::Any) {
            self.dispatch(record, outcome)?;
            if self.state == LifecycleState::Idle {
                // Closed mid-drain; the ring was reset with it.
                break;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, record: EventRecord, outcome: &mut PollOutcome) -> Result<(), LifecycleError> {
        metrics::record_notification(&self.spec.service, record.kind);
        let tags = self.spec.tags;

        match (record.kind, self.state) {
            (EventKind::NetworkStatusChanged, state) if record.tag == tags.network => {
                let status = self.query_network_status();
                tracing::debug!(
                    service = %self.spec.service,
                    status = ?status,
                    state = %state,
                    "Network status changed"
                );
                match state {
                    LifecycleState::NetworkRequested if status == Some(NetworkStatus::Connected) => {
                        self.transition(LifecycleState::NetworkUp);
                    }
                    LifecycleState::ChannelOpen if status != Some(NetworkStatus::Connected) => {
                        if self.config.react_to_status_changes {
                            self.handle_disconnect(outcome)?;
                        } else {
                            tracing::debug!(
                                service = %self.spec.service,
                                "Status change ignored, reaction disabled"
                            );
                        }
                    }
                    _ => {}
                }
            }
            (EventKind::ChannelDataReadable, LifecycleState::ChannelOpen) if record.tag == tags.channel => {
                self.readable = self.readable.saturating_add(1);
                outcome.data_readable += 1;
            }
            (EventKind::ChannelNotConnected, LifecycleState::ChannelOpen)
                if record.tag == tags.channel && self.config.react_to_status_changes =>
            {
                self.handle_disconnect(outcome)?;
            }
            _ => {
                tracing::debug!(
                    service = %self.spec.service,
                    kind = %record.kind,
                    tag = record.tag,
                    foreign = !tags.contains(record.tag),
                    state = %self.state,
                    "Discarding notification"
                );
                outcome.discarded += 1;
                metrics::record_notification_discarded(&self.spec.service);
            }
        }
        Ok(())
    }

    fn handle_disconnect(&mut self, outcome: &mut PollOutcome) -> Result<(), LifecycleError> {
        tracing::warn!(service = %self.spec.service, "Connection dropped while channel open, closing");
        metrics::record_disconnect(&self.spec.service);
        outcome.disconnected = true;
        self.close()
    }

    fn query_network_status(&self) -> Option<NetworkStatus> {
        if !self.handles.network.is_held() {
            return None;
        }
        match self.provider.network_status(self.handles.network) {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::debug!(service = %self.spec.service, error = %e, "Network status query failed");
                None
            }
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state == next {
            return;
        }
        tracing::debug!(
            service = %self.spec.service,
            from = %self.state,
            to = %next,
            "Lifecycle transition"
        );
        metrics::record_transition(&self.spec.service, next);
        self.state = next;
    }

    fn check_released(
        &mut self,
        resource: Resource,
        result: ProviderResult<()>,
        still_held: bool,
    ) -> Result<(), LifecycleError> {
        let cause = match (result, still_held) {
            (Ok(()), false) => {
                tracing::info!(service = %self.spec.service, resource = %resource, "Released");
                return Ok(());
            }
            (Err(e), _) => ReleaseFailure::Provider(e),
            (Ok(()), true) => ReleaseFailure::HandleNotZeroed,
        };

        tracing::error!(
            service = %self.spec.service,
            resource = %resource,
            error = %cause,
            "Release failed, lifecycle faulted"
        );
        self.transition(LifecycleState::Faulted);
        Err(LifecycleError::ReleaseFailed {
            service: self.spec.service.clone(),
            resource,
            cause,
        })
    }

    fn setup_error(&self, stage: Resource, source: ProviderError) -> LifecycleError {
        LifecycleError::Setup {
            service: self.spec.service.clone(),
            stage,
            source,
        }
    }

    fn cancelled(&self) -> LifecycleError {
        LifecycleError::Cancelled {
            service: self.spec.service.clone(),
        }
    }
}

impl<P: Provider + ?Sized> Drop for ResourceLifecycle<P> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(service = %self.spec.service, error = %e, "Release on drop failed");
        }
    }
}

impl<P: Provider + ?Sized> std::fmt::Debug for ResourceLifecycle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLifecycle")
            .field("service", &self.spec.service)
            .field("state", &self.state)
            .field("handles", &self.handles)
            .field("readable", &self.readable)
            .finish()
    }
}

/// Reject a successful call that handed back the "not held" handle.
fn non_null<H: Copy>(held: fn(&H) -> bool) -> impl Fn(H) -> ProviderResult<H> {
    move |handle| {
        if held(&handle) {
            Ok(handle)
        } else {
            Err(ProviderError::NullHandle)
        }
    }
}
