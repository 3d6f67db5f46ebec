//! Provider-facing types: handles, status codes and call parameters.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::channel::ChannelBuffers;
use crate::notify::NotificationBuffer;

/// 32-bit provider result code. The top bit marks an error.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Okay = 0x0,
    ParameterFault = 0x8000_0002,
    InvalidHandle = 0x8000_0003,
    InvalidBuffer = 0x8000_0004,
    NotReady = 0x8000_0005,
    NotConnected = 0x8000_0006,
    Unavailable = 0x8000_0007,
    InvalidIndex = 0x8000_0008,
    UnknownError = 0x8000_00ff,
}

impl Status {
    /// Raw wire value.
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn is_error(self) -> bool {
        self.code() & 0x8000_0000 != 0
    }
}

impl From<u32> for Status {
    fn from(val: u32) -> Self {
        match val {
            0x0 => Status::Okay,
            0x8000_0002 => Status::ParameterFault,
            0x8000_0003 => Status::InvalidHandle,
            0x8000_0004 => Status::InvalidBuffer,
            0x8000_0005 => Status::NotReady,
            0x8000_0006 => Status::NotConnected,
            0x8000_0007 => Status::Unavailable,
            0x8000_0008 => Status::InvalidIndex,
            _ => Status::UnknownError,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:08x})", self, self.code())
    }
}

/// Errors returned by a provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider answered with a non-okay status.
    #[error("provider returned {0}")]
    Status(Status),

    /// The call was refused before reaching the provider.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The provider reported success but handed back the "not held" handle.
    #[error("provider returned a null handle")]
    NullHandle,
}

/// Result type for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

macro_rules! provider_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel for "not held".
            pub const NONE: Self = Self(0);

            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(&self) -> u32 {
                self.0
            }

            pub const fn is_held(&self) -> bool {
                self.0 != 0
            }

            /// Zero the handle in place. Only a provider does this, on a
            /// successful release.
            pub fn clear(&mut self) {
                self.0 = 0;
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }
    };
}

provider_handle!(
    /// Names a registered notification sink.
    NotificationHandle,
    "notifications"
);
provider_handle!(
    /// Names a network attachment.
    NetworkHandle,
    "network"
);
provider_handle!(
    /// Names an open data channel.
    ChannelHandle,
    "channel"
);

/// The three provider-held resources, in acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Notifications,
    Network,
    Channel,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Notifications => "notifications",
            Resource::Network => "network",
            Resource::Channel => "channel",
        };
        f.write_str(name)
    }
}

/// Network attachment status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Kind of logical channel to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Plain byte stream, e.g. the server log.
    OpaqueBytes,
    /// Request/response HTTP exchange.
    Http,
}

/// Parameters for registering a notification sink.
#[derive(Debug, Clone)]
pub struct NotificationSetup {
    /// Interrupt raised whenever a record is posted.
    pub irq: u32,
    /// Ring the provider writes records into.
    pub buffer: Arc<NotificationBuffer>,
}

/// Parameters for requesting a network attachment.
#[derive(Debug, Clone, Copy)]
pub struct RequestNetworkParams {
    pub notification: NotificationHandle,
    /// Tag carried by status-change records for this attachment.
    pub tag: u32,
}

/// Parameters for opening a channel over an established network.
#[derive(Debug, Clone, Copy)]
pub struct OpenChannelParams<'a> {
    pub notification: NotificationHandle,
    /// Tag carried by data-readable records for this channel.
    pub tag: u32,
    pub network: NetworkHandle,
    pub buffers: &'a ChannelBuffers,
    pub kind: ChannelKind,
    pub endpoint: &'a str,
}

/// An HTTP request in the shape the provider accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout_ms: u32,
}

/// Summary of a received HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponseData {
    /// Transport-level outcome of the exchange.
    pub result: Status,
    pub status_code: u16,
    pub num_headers: u32,
    pub body_length: u32,
}
