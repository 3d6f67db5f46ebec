//! Notification records.

use std::fmt;

/// Kind of a posted notification. `Unset` marks an empty slot.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Unset = 0,
    NetworkStatusChanged = 1,
    ChannelDataReadable = 2,
    /// The remote end of a channel went away.
    ChannelNotConnected = 3,
}

impl EventKind {
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Decode a raw slot marker. Unknown values read as `Unset`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => EventKind::NetworkStatusChanged,
            2 => EventKind::ChannelDataReadable,
            3 => EventKind::ChannelNotConnected,
            _ => EventKind::Unset,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Unset => "unset",
            EventKind::NetworkStatusChanged => "network_status_changed",
            EventKind::ChannelDataReadable => "channel_data_readable",
            EventKind::ChannelNotConnected => "channel_not_connected",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One notification as written by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    /// Provider clock, microseconds.
    pub timestamp: u64,
    pub kind: EventKind,
    /// Correlation id chosen when the originating request was issued.
    pub tag: u32,
}

impl EventRecord {
    pub fn new(timestamp: u64, kind: EventKind, tag: u32) -> Self {
        Self { timestamp, kind, tag }
    }
}

/// Selects which records `EventQueue::poll_one` hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    Any,
    Kind(EventKind),
    Exact { kind: EventKind, tag: u32 },
}

impl EventFilter {
    pub fn matches(&self, record: &EventRecord) -> bool {
        match *self {
            EventFilter::Any => true,
            EventFilter::Kind(kind) => record.kind == kind,
            EventFilter::Exact { kind, tag } => record.kind == kind && record.tag == tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_decoding() {
        assert_eq!(EventKind::from_raw(1), EventKind::NetworkStatusChanged);
        assert_eq!(EventKind::from_raw(0), EventKind::Unset);
        assert_eq!(EventKind::from_raw(99), EventKind::Unset);
        assert_eq!(EventKind::ChannelDataReadable.as_raw(), 2);
    }

    #[test]
    fn test_filter_matching() {
        let record = EventRecord::new(10, EventKind::ChannelDataReadable, 2);
        assert!(EventFilter::Any.matches(&record));
        assert!(EventFilter::Kind(EventKind::ChannelDataReadable).matches(&record));
        assert!(!EventFilter::Kind(EventKind::NetworkStatusChanged).matches(&record));
        assert!(EventFilter::Exact { kind: EventKind::ChannelDataReadable, tag: 2 }.matches(&record));
        assert!(!EventFilter::Exact { kind: EventKind::ChannelDataReadable, tag: 1 }.matches(&record));
    }
}
