//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! ensure_open():
//!     Idle → NotifierUp (EventQueue::setup)
//!          → NetworkRequested (request_network, tag = network)
//!          → NetworkUp (status Connected, via notification or poll)
//!          → ChannelOpen (open_channel, tag = channel)
//!
//! poll_status():
//!     drain EventQueue in order → dispatch by (kind, tag)
//!     → network/channel dropped while open → Closing → Idle
//!
//! close() / Shutdown:
//!     Closing: channel → network → notifier → Idle
//! ```
//!
//! # Design Decisions
//! - Ordered acquisition, strictly reversed release
//! - The readiness wait yields between checks and honours a deadline
//! - Shutdown cancels outstanding waits and releases what was acquired
//! - Release failure is terminal for the lifecycle, not the process

pub mod error;
pub mod manager;
pub mod shutdown;
pub mod state;

pub use error::{LifecycleError, ReleaseFailure};
pub use manager::{Handles, PollOutcome, ResourceLifecycle};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::LifecycleState;
