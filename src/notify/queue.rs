//! Fixed-capacity notification ring.
//!
//! # Responsibilities
//! - Hold up to `capacity` records posted by the interrupt path
//! - Hand records to the single consumer oldest-first
//! - Drop (and count) records that arrive while every slot is occupied
//!
//! # Design Decisions
//! - One index discipline: the producer owns `write_index`, the consumer
//!   owns `read_index`, and both walk the ring in the same order
//! - A slot's `kind` doubles as its valid marker; it is the last field the
//!   producer stores and the last field the consumer clears
//! - The consumer must drain at least as fast as records of interest
//!   arrive, otherwise a status change can be lost to overflow

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::notify::event::{EventFilter, EventKind, EventRecord};
use crate::observability::metrics;
use crate::provider::{NotificationHandle, NotificationSetup, Provider, ProviderResult};

const UNSET: u32 = 0;

#[derive(Debug, Default)]
struct Slot {
    timestamp: AtomicU64,
    tag: AtomicU32,
    kind: AtomicU32,
}

/// Ring shared between the provider (producer) and one `EventQueue` (consumer).
#[derive(Debug)]
pub struct NotificationBuffer {
    slots: Box<[Slot]>,
    write_index: AtomicUsize,
    read_index: AtomicUsize,
    /// Set on every post; the consumer clears it before draining.
    pending: AtomicBool,
    /// Mirrors the interrupt enable; posts are ignored while false.
    enabled: AtomicBool,
    dropped: AtomicU64,
    wake: Notify,
}

impl NotificationBuffer {
    /// Create an empty, disabled ring. `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1)).map(|_| Slot::default()).collect();
        Self {
            slots,
            write_index: AtomicUsize::new(0),
            read_index: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            wake: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Records lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Producer side. Must only be called from a single producer.
    ///
    /// Returns `false` if the record was not stored: the ring is disabled,
    /// the record is `Unset`, or every slot is occupied.
    pub fn post(&self, record: EventRecord) -> bool {
        if !self.is_enabled() || record.kind == EventKind::Unset {
            return false;
        }

        let index = self.write_index.load(Ordering::Relaxed);
        let slot = &self.slots[index];
        if slot.kind.load(Ordering::Acquire) != UNSET {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::record_notification_dropped();
            tracing::warn!(
                kind = %record.kind,
                tag = record.tag,
                capacity = self.capacity(),
                "Notification ring full, record dropped"
            );
            return false;
        }

        slot.timestamp.store(record.timestamp, Ordering::Relaxed);
        slot.tag.store(record.tag, Ordering::Relaxed);
        slot.kind.store(record.kind.as_raw(), Ordering::Release);

        self.write_index
            .store((index + 1) % self.capacity(), Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
        self.wake.notify_one();
        true
    }

    /// Consumer side: take the oldest record, if any.
    fn take(&self) -> Option<EventRecord> {
        let index = self.read_index.load(Ordering::Relaxed);
        let slot = &self.slots[index];
        let kind = EventKind::from_raw(slot.kind.load(Ordering::Acquire));
        if kind == EventKind::Unset {
            return None;
        }

        let record = EventRecord {
            timestamp: slot.timestamp.load(Ordering::Relaxed),
            kind,
            tag: slot.tag.load(Ordering::Relaxed),
        };
        slot.kind.store(UNSET, Ordering::Release);
        self.read_index
            .store((index + 1) % self.capacity(), Ordering::Relaxed);
        Some(record)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Empty every slot and rewind both indices. Only valid while disabled.
    fn reset(&self) {
        for slot in self.slots.iter() {
            slot.kind.store(UNSET, Ordering::Relaxed);
            slot.tag.store(0, Ordering::Relaxed);
            slot.timestamp.store(0, Ordering::Relaxed);
        }
        self.write_index.store(0, Ordering::Relaxed);
        self.read_index.store(0, Ordering::Relaxed);
        self.pending.store(false, Ordering::Release);
    }
}

/// Consumer half of a notification sink.
#[derive(Debug)]
pub struct EventQueue {
    label: String,
    irq: u32,
    buffer: Arc<NotificationBuffer>,
}

impl EventQueue {
    /// Create a queue for `label` (used in logs and metrics) raised on `irq`.
    pub fn new(label: impl Into<String>, irq: u32, capacity: usize) -> Self {
        Self {
            label: label.into(),
            irq,
            buffer: Arc::new(NotificationBuffer::new(capacity)),
        }
    }

    pub fn irq(&self) -> u32 {
        self.irq
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Shared ring, as handed to the provider.
    pub fn buffer(&self) -> &Arc<NotificationBuffer> {
        &self.buffer
    }

    /// Register the ring with the provider and enable the interrupt.
    pub fn setup<P: Provider + ?Sized>(&self, provider: &P) -> ProviderResult<NotificationHandle> {
        self.buffer.set_enabled(false);
        self.buffer.reset();

        let setup = NotificationSetup {
            irq: self.irq,
            buffer: Arc::clone(&self.buffer),
        };
        let handle = provider.setup_notifications(&setup)?;

        self.buffer.pending.store(false, Ordering::Release);
        self.buffer.set_enabled(true);
        tracing::debug!(queue = %self.label, irq = self.irq, handle = %handle, "Notification sink registered");
        Ok(handle)
    }

    /// Oldest unconsumed record matching `filter`.
    ///
    /// Records ahead of the match that do not satisfy the filter are
    /// consumed and discarded, so the queue never reorders.
    pub fn poll_one(&self, filter: EventFilter) -> Option<EventRecord> {
        while let Some(record) = self.buffer.take() {
            if filter.matches(&record) {
                return Some(record);
            }
            tracing::debug!(
                queue = %self.label,
                kind = %record.kind,
                tag = record.tag,
                "Discarding notification that does not match filter"
            );
            metrics::record_notification_discarded(&self.label);
        }
        None
    }

    /// True if a record was posted since the flag was last cleared.
    pub fn has_pending(&self) -> bool {
        self.buffer.pending.load(Ordering::Acquire)
    }

    pub fn clear_pending(&self) {
        self.buffer.pending.store(false, Ordering::Release);
    }

    /// Resolves once the producer posts (or has posted since the last wait).
    pub async fn notified(&self) {
        self.buffer.wake.notified().await;
    }

    /// Disable the interrupt and unregister the ring. Safe to repeat.
    ///
    /// The provider zeroes `handle` on success; a handle that is already
    /// zero causes no provider call.
    pub fn teardown<P: Provider + ?Sized>(
        &self,
        provider: &P,
        handle: &mut NotificationHandle,
    ) -> ProviderResult<()> {
        self.buffer.set_enabled(false);
        if handle.is_held() {
            provider.close_notifications(handle)?;
        }
        self.buffer.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_queue(capacity: usize) -> EventQueue {
        let queue = EventQueue::new("test", 43, capacity);
        queue.buffer.set_enabled(true);
        queue
    }

    fn record(ts: u64, kind: EventKind, tag: u32) -> EventRecord {
        EventRecord::new(ts, kind, tag)
    }

    #[test]
    fn test_poll_returns_records_oldest_first() {
        let queue = enabled_queue(4);
        let buffer = queue.buffer();
        assert!(buffer.post(record(1, EventKind::NetworkStatusChanged, 1)));
        assert!(buffer.post(record(2, EventKind::ChannelDataReadable, 2)));
        assert!(queue.has_pending());

        assert_eq!(queue.poll_one(EventFilter::Any).map(|r| r.timestamp), Some(1));
        assert_eq!(queue.poll_one(EventFilter::Any).map(|r| r.timestamp), Some(2));
        assert_eq!(queue.poll_one(EventFilter::Any), None);
    }

    #[test]
    fn test_overflow_keeps_first_capacity_records() {
        let queue = enabled_queue(4);
        for ts in 0..7 {
            queue.buffer().post(record(ts, EventKind::ChannelDataReadable, 2));
        }
        assert_eq!(queue.buffer().dropped(), 3);

        let drained: Vec<u64> = std::iter::from_fn(|| queue.poll_one(EventFilter::Any))
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_ring_wraps_after_drain() {
        let queue = enabled_queue(2);
        for round in 0..5u64 {
            assert!(queue.buffer().post(record(round, EventKind::NetworkStatusChanged, 1)));
            assert_eq!(queue.poll_one(EventFilter::Any).map(|r| r.timestamp), Some(round));
        }
        assert_eq!(queue.buffer().dropped(), 0);
    }

    #[test]
    fn test_filter_discards_earlier_non_matching_records() {
        let queue = enabled_queue(8);
        queue.buffer().post(record(1, EventKind::NetworkStatusChanged, 9));
        queue.buffer().post(record(2, EventKind::ChannelDataReadable, 2));
        queue.buffer().post(record(3, EventKind::NetworkStatusChanged, 1));

        let filter = EventFilter::Exact { kind: EventKind::ChannelDataReadable, tag: 2 };
        assert_eq!(queue.poll_one(filter).map(|r| r.timestamp), Some(2));
        // The discarded record is gone; the later one is still queued.
        assert_eq!(queue.poll_one(EventFilter::Any).map(|r| r.timestamp), Some(3));
    }

    #[test]
    fn test_disabled_ring_ignores_posts() {
        let queue = EventQueue::new("test", 43, 4);
        assert!(!queue.buffer().post(record(1, EventKind::NetworkStatusChanged, 1)));
        assert!(!queue.has_pending());
        assert_eq!(queue.buffer().dropped(), 0);
    }

    #[test]
    fn test_unset_records_are_never_stored() {
        let queue = enabled_queue(4);
        assert!(!queue.buffer().post(record(1, EventKind::Unset, 1)));
        assert_eq!(queue.poll_one(EventFilter::Any), None);
    }

    #[test]
    fn test_pending_flag_clears() {
        let queue = enabled_queue(4);
        queue.buffer().post(record(1, EventKind::NetworkStatusChanged, 1));
        queue.clear_pending();
        assert!(!queue.has_pending());
        assert!(queue.poll_one(EventFilter::Any).is_some());
    }

    #[tokio::test]
    async fn test_notified_resolves_after_post() {
        let queue = enabled_queue(4);
        queue.buffer().post(record(1, EventKind::NetworkStatusChanged, 1));
        tokio::time::timeout(std::time::Duration::from_millis(100), queue.notified())
            .await
            .expect("post should wake the consumer");
    }
}
