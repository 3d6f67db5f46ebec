//! In-process model of the host provider.
//!
//! # Responsibilities
//! - Hand out non-zero handles and zero them on release
//! - Post notifications the way the host interrupt path would
//! - Record every call so tests can assert ordering and counts
//! - Inject latency, short writes, setup failures and release failures
//!
//! # Design Decisions
//! - One mutex around all state; calls are short and never await
//! - Records are posted straight into the registered `NotificationBuffer`
//! - Accepted log bytes are kept per endpoint, surviving channel close

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::notify::{EventKind, EventRecord, NotificationBuffer};
use crate::provider::types::{
    ChannelHandle, ChannelKind, HttpRequest, HttpResponseData, NetworkHandle, NetworkStatus,
    NotificationHandle, NotificationSetup, OpenChannelParams, ProviderError, ProviderResult,
    RequestNetworkParams, Resource, Status,
};
use crate::provider::Provider;

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    SetupNotifications { irq: u32, handle: u32 },
    RequestNetwork { tag: u32, handle: u32 },
    NetworkStatus { network: u32 },
    OpenChannel { endpoint: String, kind: ChannelKind, handle: u32 },
    WriteChannel { channel: u32, accepted: Vec<u8> },
    ReadChannel { channel: u32, offset: usize },
    SendHttpRequest { channel: u32, method: String, url: String },
    ReadHttpResponseData { channel: u32 },
    ReadHttpResponseHeader { channel: u32, index: u32 },
    ReadHttpResponseBody { channel: u32, offset: usize },
    CloseChannel { channel: u32 },
    ReleaseNetwork { network: u32 },
    CloseNotifications { notification: u32 },
}

impl ProviderCall {
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            ProviderCall::SetupNotifications { .. }
                | ProviderCall::RequestNetwork { .. }
                | ProviderCall::OpenChannel { .. }
        )
    }

    pub fn is_release(&self) -> bool {
        matches!(
            self,
            ProviderCall::CloseChannel { .. }
                | ProviderCall::ReleaseNetwork { .. }
                | ProviderCall::CloseNotifications { .. }
        )
    }
}

/// Canned HTTP response produced by the simulated host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl SimResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: body.into(),
        }
    }
}

type Responder = Box<dyn Fn(&HttpRequest) -> SimResponse + Send + Sync>;

struct SimSink {
    buffer: Arc<NotificationBuffer>,
}

struct SimNetwork {
    sink: u32,
    tag: u32,
    status: NetworkStatus,
    polls_until_connected: u32,
}

struct SimChannel {
    sink: u32,
    tag: u32,
    network: u32,
    kind: ChannelKind,
    endpoint: String,
    inbound: Vec<u8>,
    response: Option<SimResponse>,
}

#[derive(Default)]
struct SimState {
    next_handle: u32,
    calls: Vec<ProviderCall>,
    sinks: HashMap<u32, SimSink>,
    networks: HashMap<u32, SimNetwork>,
    channels: HashMap<u32, SimChannel>,
    delivered: HashMap<String, Vec<u8>>,
    link_down: bool,
    connect_delay: u32,
    write_capacity: Option<usize>,
    body_limit: Option<usize>,
    setup_failures: HashMap<Resource, u32>,
    stuck_release: Option<Resource>,
    failing_release: Option<Resource>,
    responder: Option<Responder>,
}

impl SimState {
    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn injected_failure(&mut self, stage: Resource) -> ProviderResult<()> {
        match self.setup_failures.get_mut(&stage) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ProviderError::Status(Status::Unavailable))
            }
            _ => Ok(()),
        }
    }

    /// Outcome of a release call before the handle is touched.
    fn release_override(&self, resource: Resource) -> Option<ProviderResult<()>> {
        if self.failing_release == Some(resource) {
            return Some(Err(ProviderError::Status(Status::UnknownError)));
        }
        if self.stuck_release == Some(resource) {
            return Some(Ok(()));
        }
        None
    }
}

/// Deterministic host model for the demo binary and tests.
pub struct SimProvider {
    state: Mutex<SimState>,
    started: Instant,
}

impl SimProvider {
    /// A host whose network connects as soon as it is requested.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            started: Instant::now(),
        }
    }

    /// Report `Connecting` for the first `polls - 1` status queries.
    pub fn with_connect_delay(mut self, polls: u32) -> Self {
        self.state_mut().connect_delay = polls;
        self
    }

    /// Accept at most `bytes` per write call.
    pub fn with_write_capacity(mut self, bytes: usize) -> Self {
        self.state_mut().write_capacity = Some(bytes);
        self
    }

    pub fn with_http_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> SimResponse + Send + Sync + 'static,
    {
        self.state_mut().responder = Some(Box::new(responder));
        self
    }

    /// Start with the link down; requested networks stay `Connecting`.
    pub fn with_link_down(mut self) -> Self {
        self.state_mut().link_down = true;
        self
    }

    /// Serve at most `bytes` of any response body while still reporting
    /// the full length.
    pub fn truncate_http_bodies(&self, bytes: usize) {
        self.lock().body_limit = Some(bytes);
    }

    /// Reject the next `times` calls for `stage`.
    pub fn fail_setup(&self, stage: Resource, times: u32) {
        self.lock().setup_failures.insert(stage, times);
    }

    /// Releases of `resource` report success but leave the handle set.
    pub fn stick_release(&self, resource: Resource) {
        self.lock().stuck_release = Some(resource);
    }

    /// Releases of `resource` return an error status.
    pub fn fail_release(&self, resource: Resource) {
        self.lock().failing_release = Some(resource);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Sinks, networks and channels currently allocated.
    pub fn live_handles(&self) -> usize {
        let state = self.lock();
        state.sinks.len() + state.networks.len() + state.channels.len()
    }

    /// All bytes ever accepted on channels to `endpoint`.
    pub fn delivered(&self, endpoint: &str) -> Vec<u8> {
        self.lock().delivered.get(endpoint).cloned().unwrap_or_default()
    }

    /// Post an arbitrary record to a registered sink, as the interrupt path would.
    pub fn inject(&self, notification: NotificationHandle, kind: EventKind, tag: u32) -> bool {
        let state = self.lock();
        self.post(&state, notification.raw(), kind, tag)
    }

    /// Drop the link: every connected network goes `Disconnected` and its
    /// sink receives a status-change record.
    pub fn drop_network(&self) {
        let mut state = self.lock();
        state.link_down = true;
        let mut posts = Vec::new();
        for network in state.networks.values_mut() {
            if network.status != NetworkStatus::Disconnected {
                network.status = NetworkStatus::Disconnected;
                posts.push((network.sink, network.tag));
            }
        }
        for (sink, tag) in posts {
            self.post(&state, sink, EventKind::NetworkStatusChanged, tag);
        }
    }

    /// Bring the link back; waiting networks connect and are notified.
    pub fn restore_network(&self) {
        let mut state = self.lock();
        state.link_down = false;
        let mut posts = Vec::new();
        for network in state.networks.values_mut() {
            if network.status != NetworkStatus::Connected {
                network.status = NetworkStatus::Connected;
                posts.push((network.sink, network.tag));
            }
        }
        for (sink, tag) in posts {
            self.post(&state, sink, EventKind::NetworkStatusChanged, tag);
        }
    }

    /// Make `bytes` readable on `channel` and raise a data-readable record.
    pub fn deliver(&self, channel: ChannelHandle, bytes: &[u8]) -> bool {
        let mut state = self.lock();
        let Some(ch) = state.channels.get_mut(&channel.raw()) else {
            return false;
        };
        ch.inbound.extend_from_slice(bytes);
        let (sink, tag) = (ch.sink, ch.tag);
        self.post(&state, sink, EventKind::ChannelDataReadable, tag)
    }

    fn post(&self, state: &SimState, sink: u32, kind: EventKind, tag: u32) -> bool {
        match state.sinks.get(&sink) {
            Some(s) => s.buffer.post(EventRecord::new(self.now_micros(), kind, tag)),
            None => false,
        }
    }

    fn now_micros(&self) -> u64 {
        self.started.elapsed().as_micros() as u64
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut SimState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SimProvider")
            .field("sinks", &state.sinks.len())
            .field("networks", &state.networks.len())
            .field("channels", &state.channels.len())
            .field("calls", &state.calls.len())
            .finish()
    }
}

fn copy_from(source: &[u8], offset: usize, buf: &mut [u8]) -> usize {
    let available = source.get(offset..).unwrap_or_default();
    let n = available.len().min(buf.len());
    buf[..n].copy_from_slice(&available[..n]);
    n
}

impl Provider for SimProvider {
    fn setup_notifications(&self, setup: &NotificationSetup) -> ProviderResult<NotificationHandle> {
        let mut state = self.lock();
        let result = state.injected_failure(Resource::Notifications).map(|()| {
            let handle = state.allocate();
            state.sinks.insert(
                handle,
                SimSink {
                    buffer: Arc::clone(&setup.buffer),
                },
            );
            handle
        });
        state.calls.push(ProviderCall::SetupNotifications {
            irq: setup.irq,
            handle: *result.as_ref().unwrap_or(&0),
        });
        result.map(NotificationHandle::from_raw)
    }

    fn request_network(&self, params: &RequestNetworkParams) -> ProviderResult<NetworkHandle> {
        let mut state = self.lock();
        let sink = params.notification.raw();
        let result = if !state.sinks.contains_key(&sink) {
            Err(ProviderError::Status(Status::InvalidHandle))
        } else {
            state.injected_failure(Resource::Network).map(|()| {
                let connected = !state.link_down && state.connect_delay == 0;
                let handle = state.allocate();
                let network = SimNetwork {
                    sink,
                    tag: params.tag,
                    status: if connected {
                        NetworkStatus::Connected
                    } else {
                        NetworkStatus::Connecting
                    },
                    polls_until_connected: state.connect_delay,
                };
                state.networks.insert(handle, network);
                (handle, connected)
            })
        };
        state.calls.push(ProviderCall::RequestNetwork {
            tag: params.tag,
            handle: result.as_ref().map(|(h, _)| *h).unwrap_or(0),
        });

        let (handle, connected) = result?;
        if connected {
            self.post(&state, sink, EventKind::NetworkStatusChanged, params.tag);
        }
        Ok(NetworkHandle::from_raw(handle))
    }

    fn network_status(&self, network: NetworkHandle) -> ProviderResult<NetworkStatus> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::NetworkStatus {
            network: network.raw(),
        });
        let link_down = state.link_down;
        let Some(net) = state.networks.get_mut(&network.raw()) else {
            return Err(ProviderError::Status(Status::InvalidHandle));
        };

        let mut became_connected = false;
        if net.status == NetworkStatus::Connecting && !link_down {
            net.polls_until_connected = net.polls_until_connected.saturating_sub(1);
            if net.polls_until_connected == 0 {
                net.status = NetworkStatus::Connected;
                became_connected = true;
            }
        }
        let (status, sink, tag) = (net.status, net.sink, net.tag);
        if became_connected {
            self.post(&state, sink, EventKind::NetworkStatusChanged, tag);
        }
        Ok(status)
    }

    fn open_channel(&self, params: &OpenChannelParams<'_>) -> ProviderResult<ChannelHandle> {
        let mut state = self.lock();
        let result = (|| {
            if !state.sinks.contains_key(&params.notification.raw()) {
                return Err(ProviderError::Status(Status::InvalidHandle));
            }
            match state.networks.get(&params.network.raw()) {
                None => return Err(ProviderError::Status(Status::InvalidHandle)),
                Some(net) if net.status != NetworkStatus::Connected => {
                    return Err(ProviderError::Status(Status::NotConnected))
                }
                Some(_) => {}
            }
            if !params.buffers.is_valid() {
                return Err(ProviderError::Status(Status::InvalidBuffer));
            }
            if params.kind == ChannelKind::OpaqueBytes && params.endpoint.is_empty() {
                return Err(ProviderError::Rejected(
                    "opaque-bytes channel needs an endpoint".to_string(),
                ));
            }
            state.injected_failure(Resource::Channel)?;

            let handle = state.allocate();
            state.channels.insert(
                handle,
                SimChannel {
                    sink: params.notification.raw(),
                    tag: params.tag,
                    network: params.network.raw(),
                    kind: params.kind,
                    endpoint: params.endpoint.to_string(),
                    inbound: Vec::new(),
                    response: None,
                },
            );
            Ok(handle)
        })();
        state.calls.push(ProviderCall::OpenChannel {
            endpoint: params.endpoint.to_string(),
            kind: params.kind,
            handle: *result.as_ref().unwrap_or(&0),
        });
        result.map(ChannelHandle::from_raw)
    }

    fn write_channel(&self, channel: ChannelHandle, bytes: &[u8]) -> ProviderResult<usize> {
        let mut state = self.lock();
        let capacity = state.write_capacity.unwrap_or(usize::MAX);
        let (endpoint, network) = match state.channels.get(&channel.raw()) {
            Some(ch) => (ch.endpoint.clone(), ch.network),
            None => return Err(ProviderError::Status(Status::InvalidHandle)),
        };
        let connected = state
            .networks
            .get(&network)
            .is_some_and(|n| n.status == NetworkStatus::Connected);
        if !connected {
            return Err(ProviderError::Status(Status::NotConnected));
        }

        let accepted = &bytes[..bytes.len().min(capacity)];
        state
            .delivered
            .entry(endpoint)
            .or_default()
            .extend_from_slice(accepted);
        state.calls.push(ProviderCall::WriteChannel {
            channel: channel.raw(),
            accepted: accepted.to_vec(),
        });
        Ok(accepted.len())
    }

    fn read_channel(&self, channel: ChannelHandle, offset: usize, buf: &mut [u8]) -> ProviderResult<usize> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::ReadChannel {
            channel: channel.raw(),
            offset,
        });
        let ch = state
            .channels
            .get(&channel.raw())
            .ok_or(ProviderError::Status(Status::InvalidHandle))?;
        Ok(copy_from(&ch.inbound, offset, buf))
    }

    fn send_http_request(&self, channel: ChannelHandle, request: &HttpRequest) -> ProviderResult<()> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::SendHttpRequest {
            channel: channel.raw(),
            method: request.method.clone(),
            url: request.url.clone(),
        });

        let response = match &state.responder {
            Some(responder) => responder(request),
            None => SimResponse::ok("OK"),
        };
        let ch = state
            .channels
            .get_mut(&channel.raw())
            .ok_or(ProviderError::Status(Status::InvalidHandle))?;
        if ch.kind != ChannelKind::Http {
            return Err(ProviderError::Status(Status::ParameterFault));
        }
        ch.response = Some(response);
        let (sink, tag) = (ch.sink, ch.tag);
        self.post(&state, sink, EventKind::ChannelDataReadable, tag);
        Ok(())
    }

    fn read_http_response_data(&self, channel: ChannelHandle) -> ProviderResult<HttpResponseData> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::ReadHttpResponseData {
            channel: channel.raw(),
        });
        let ch = state
            .channels
            .get(&channel.raw())
            .ok_or(ProviderError::Status(Status::InvalidHandle))?;
        let response = ch
            .response
            .as_ref()
            .ok_or(ProviderError::Status(Status::NotReady))?;
        Ok(HttpResponseData {
            result: Status::Okay,
            status_code: response.status,
            num_headers: response.headers.len() as u32,
            body_length: response.body.len() as u32,
        })
    }

    fn read_http_response_header(
        &self,
        channel: ChannelHandle,
        index: u32,
        buf: &mut [u8],
    ) -> ProviderResult<usize> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::ReadHttpResponseHeader {
            channel: channel.raw(),
            index,
        });
        let ch = state
            .channels
            .get(&channel.raw())
            .ok_or(ProviderError::Status(Status::InvalidHandle))?;
        let (name, value) = ch
            .response
            .as_ref()
            .ok_or(ProviderError::Status(Status::NotReady))?
            .headers
            .get(index as usize)
            .ok_or(ProviderError::Status(Status::InvalidIndex))?;
        let line = format!("{name}: {value}");
        Ok(copy_from(line.as_bytes(), 0, buf))
    }

    fn read_http_response_body(
        &self,
        channel: ChannelHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> ProviderResult<usize> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::ReadHttpResponseBody {
            channel: channel.raw(),
            offset,
        });
        let ch = state
            .channels
            .get(&channel.raw())
            .ok_or(ProviderError::Status(Status::InvalidHandle))?;
        let response = ch
            .response
            .as_ref()
            .ok_or(ProviderError::Status(Status::NotReady))?;
        let served = state.body_limit.unwrap_or(usize::MAX).min(response.body.len());
        Ok(copy_from(&response.body[..served], offset, buf))
    }

    fn close_channel(&self, channel: &mut ChannelHandle) -> ProviderResult<()> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::CloseChannel {
            channel: channel.raw(),
        });
        if let Some(result) = state.release_override(Resource::Channel) {
            return result;
        }
        state
            .channels
            .remove(&channel.raw())
            .ok_or(ProviderError::Status(Status::InvalidHandle))?;
        channel.clear();
        Ok(())
    }

    fn release_network(&self, network: &mut NetworkHandle) -> ProviderResult<()> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::ReleaseNetwork {
            network: network.raw(),
        });
        if let Some(result) = state.release_override(Resource::Network) {
            return result;
        }
        state
            .networks
            .remove(&network.raw())
            .ok_or(ProviderError::Status(Status::InvalidHandle))?;
        network.clear();
        Ok(())
    }

    fn close_notifications(&self, notification: &mut NotificationHandle) -> ProviderResult<()> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::CloseNotifications {
            notification: notification.raw(),
        });
        if let Some(result) = state.release_override(Resource::Notifications) {
            return result;
        }
        state
            .sinks
            .remove(&notification.raw())
            .ok_or(ProviderError::Status(Status::InvalidHandle))?;
        notification.clear();
        Ok(())
    }
}
