//! Channel subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceConfig → ChannelSpec (what to open, where, with which tags)
//!     → ResourceLifecycle::ensure_open()
//!     → ResourceLifecycle::io() → ChannelIo
//!         write / write_line            (opaque bytes and HTTP)
//!         send_http_request → wait_readable → response accessors
//!         read / consume_readable       (opaque bytes)
//! ```
//!
//! # Design Decisions
//! - Short writes are reported, never retried implicitly
//! - Reads are only legal after a data-readable record was observed
//! - Every operation re-checks that the channel is still open

pub mod buffers;
pub mod io;

pub use buffers::{AlignedBuffer, ChannelBuffers, CHANNEL_BUFFER_ALIGN};
pub use io::ChannelIo;

use crate::config::ServiceConfig;
use crate::provider::ChannelKind;

/// Correlation tags a lifecycle attaches to its asynchronous requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpace {
    /// Tag for the network request.
    pub network: u32,
    /// Tag for the channel open.
    pub channel: u32,
}

impl TagSpace {
    pub fn contains(&self, tag: u32) -> bool {
        tag == self.network || tag == self.channel
    }
}

/// Everything a lifecycle needs to know about the channel it manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Service name, used in logs and metrics.
    pub service: String,
    pub irq: u32,
    pub queue_capacity: usize,
    pub tags: TagSpace,
    pub kind: ChannelKind,
    pub endpoint: String,
    pub receive_buffer_len: usize,
    pub send_buffer_len: usize,
}

impl ChannelSpec {
    pub fn from_config(service: impl Into<String>, kind: ChannelKind, config: &ServiceConfig) -> Self {
        Self {
            service: service.into(),
            irq: config.irq,
            queue_capacity: config.queue_capacity,
            tags: TagSpace {
                network: config.network_tag,
                channel: config.channel_tag,
            },
            kind,
            endpoint: config.endpoint.clone(),
            receive_buffer_len: config.receive_buffer_len,
            send_buffer_len: config.send_buffer_len,
        }
    }

    /// Opaque-bytes channel to the server log.
    pub fn log(config: &ServiceConfig) -> Self {
        Self::from_config("log", ChannelKind::OpaqueBytes, config)
    }

    /// HTTP channel with an empty endpoint.
    pub fn http(config: &ServiceConfig) -> Self {
        Self::from_config("http", ChannelKind::Http, config)
    }
}
