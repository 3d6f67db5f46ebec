//! Notification subsystem.
//!
//! # Data Flow
//! ```text
//! Provider / interrupt path:
//!     NotificationBuffer::post(record)
//!     → slot written, valid marker stored last
//!     → pending flag set, consumer woken
//!
//! Owning lifecycle:
//!     has_pending() → clear_pending() → poll_one(filter) until empty
//!     → dispatch by (kind, tag)
//! ```
//!
//! # Design Decisions
//! - Single producer, single consumer, no locks
//! - Overflow drops the newest record and is counted
//! - Tag namespaces keep lifecycles that share an interrupt apart

pub mod event;
pub mod queue;

pub use event::{EventFilter, EventKind, EventRecord};
pub use queue::{EventQueue, NotificationBuffer};
