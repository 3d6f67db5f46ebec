//! Provider subsystem: the syscall-style boundary to the host.
//!
//! # Data Flow
//! ```text
//! ResourceLifecycle
//!     → setup_notifications / request_network / open_channel   (acquire)
//!     → network_status                                          (readiness)
//!     → write_channel / read_* / send_http_request              (ChannelIo)
//!     → close_channel / release_network / close_notifications   (release)
//!
//! Provider (interrupt path)
//!     → NotificationBuffer::post(record)
//! ```
//!
//! # Design Decisions
//! - Handles are opaque; `0` means "not held"
//! - Release calls zero the handle in place on success
//! - Calls are synchronous; the only wait happens in the lifecycle
//! - `SimProvider` models the host in-process for the demo and tests

pub mod sim;
pub mod types;

pub use sim::{ProviderCall, SimProvider, SimResponse};
pub use types::{
    ChannelHandle, ChannelKind, HttpRequest, HttpResponseData, NetworkHandle, NetworkStatus,
    NotificationHandle, NotificationSetup, OpenChannelParams, ProviderError, ProviderResult,
    RequestNetworkParams, Resource, Status,
};

/// The narrow contract a host exposes for notifications, networking and channels.
pub trait Provider {
    /// Register `setup.buffer` as the notification ring raised on `setup.irq`.
    fn setup_notifications(&self, setup: &NotificationSetup) -> ProviderResult<NotificationHandle>;

    /// Ask for a network attachment. Readiness is reported asynchronously.
    fn request_network(&self, params: &RequestNetworkParams) -> ProviderResult<NetworkHandle>;

    fn network_status(&self, network: NetworkHandle) -> ProviderResult<NetworkStatus>;

    /// Open a channel. The network must already be connected.
    fn open_channel(&self, params: &OpenChannelParams<'_>) -> ProviderResult<ChannelHandle>;

    /// Queue bytes for sending. Returns how many bytes were accepted.
    fn write_channel(&self, channel: ChannelHandle, bytes: &[u8]) -> ProviderResult<usize>;

    /// Copy received bytes starting at `offset` into `buf`.
    fn read_channel(&self, channel: ChannelHandle, offset: usize, buf: &mut [u8]) -> ProviderResult<usize>;

    fn send_http_request(&self, channel: ChannelHandle, request: &HttpRequest) -> ProviderResult<()>;

    fn read_http_response_data(&self, channel: ChannelHandle) -> ProviderResult<HttpResponseData>;

    /// Copy header `index` (as `Name: value`) into `buf`.
    fn read_http_response_header(
        &self,
        channel: ChannelHandle,
        index: u32,
        buf: &mut [u8],
    ) -> ProviderResult<usize>;

    fn read_http_response_body(
        &self,
        channel: ChannelHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> ProviderResult<usize>;

    fn close_channel(&self, channel: &mut ChannelHandle) -> ProviderResult<()>;

    fn release_network(&self, network: &mut NetworkHandle) -> ProviderResult<()>;

    fn close_notifications(&self, notification: &mut NotificationHandle) -> ProviderResult<()>;
}
