//! Outbound message queue
//!
//! Buffers envelopes produced while no connection is active. Strictly FIFO:
//! drained in insertion order through the normal send path once the manager
//! reaches Connected. Bounded by configuration, with an explicit overflow
//! policy instead of silent unbounded growth.

use std::collections::VecDeque;

use crate::config::OverflowPolicy;
use crate::protocol::Envelope;

/// Result of an enqueue attempt
#[derive(Debug)]
pub(crate) enum EnqueueOutcome {
    /// The envelope was buffered
    Queued { id: String },
    /// The envelope was buffered after evicting the oldest entry
    DroppedOldest { queued_id: String, dropped_id: String },
    /// The queue was full and the envelope was refused
    Rejected { id: String },
}

/// FIFO buffer for envelopes awaiting a connection
pub(crate) struct OutboundQueue {
    items: VecDeque<Envelope>,
    capacity: usize,
    overflow: OverflowPolicy,
}

impl OutboundQueue {
    /// Create a queue; `capacity` of 0 means unbounded
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            overflow,
        }
    }

    /// Append an envelope, applying the overflow policy when full
    pub fn enqueue(&mut self, envelope: Envelope) -> EnqueueOutcome {
        if self.capacity > 0 && self.items.len() >= self.capacity {
            match self.overflow {
                OverflowPolicy::RejectNewest => EnqueueOutcome::Rejected { id: envelope.id },
                OverflowPolicy::DropOldest => {
                    // capacity > 0 implies the queue is non-empty here
                    let dropped = self.items.pop_front().map(|e| e.id).unwrap_or_default();
                    let queued_id = envelope.id.clone();
                    self.items.push_back(envelope);
                    EnqueueOutcome::DroppedOldest {
                        queued_id,
                        dropped_id: dropped,
                    }
                }
            }
        } else {
            let id = envelope.id.clone();
            self.items.push_back(envelope);
            EnqueueOutcome::Queued { id }
        }
    }

    /// Remove the oldest envelope
    pub fn pop_front(&mut self) -> Option<Envelope> {
        self.items.pop_front()
    }

    /// Put an envelope back at the head (failed mid-drain write)
    pub fn push_front(&mut self, envelope: Envelope) {
        self.items.push_front(envelope);
    }

    /// Drop everything; returns how many envelopes were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessagePayload, SyncPayload};
    use serde_json::Value;

    fn envelope(n: u32) -> Envelope {
        let mut e = Envelope::new(
            "test",
            MessagePayload::Sync(SyncPayload {
                scope: None,
                state: Value::Null,
            }),
        );
        e.id = format!("m-{}", n);
        e
    }

    #[test]
    fn test_fifo_order() {
        let mut q = OutboundQueue::new(0, OverflowPolicy::RejectNewest);
        for n in 0..5 {
            q.enqueue(envelope(n));
        }

        let drained: Vec<String> = std::iter::from_fn(|| q.pop_front()).map(|e| e.id).collect();
        assert_eq!(drained, vec!["m-0", "m-1", "m-2", "m-3", "m-4"]);
    }

    #[test]
    fn test_unbounded_when_capacity_zero() {
        let mut q = OutboundQueue::new(0, OverflowPolicy::RejectNewest);
        for n in 0..10_000 {
            assert!(matches!(q.enqueue(envelope(n)), EnqueueOutcome::Queued { .. }));
        }
        assert_eq!(q.len(), 10_000);
    }

    #[test]
    fn test_reject_newest() {
        let mut q = OutboundQueue::new(2, OverflowPolicy::RejectNewest);
        q.enqueue(envelope(0));
        q.enqueue(envelope(1));

        match q.enqueue(envelope(2)) {
            EnqueueOutcome::Rejected { id } => assert_eq!(id, "m-2"),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop_front().unwrap().id, "m-0");
    }

    #[test]
    fn test_drop_oldest() {
        let mut q = OutboundQueue::new(2, OverflowPolicy::DropOldest);
        q.enqueue(envelope(0));
        q.enqueue(envelope(1));

        match q.enqueue(envelope(2)) {
            EnqueueOutcome::DroppedOldest {
                queued_id,
                dropped_id,
            } => {
                assert_eq!(queued_id, "m-2");
                assert_eq!(dropped_id, "m-0");
            }
            other => panic!("expected eviction, got {:?}", other),
        }
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop_front().unwrap().id, "m-1");
    }

    #[test]
    fn test_push_front_requeues_at_head() {
        let mut q = OutboundQueue::new(0, OverflowPolicy::RejectNewest);
        q.enqueue(envelope(1));
        let e = envelope(0);
        q.push_front(e);
        assert_eq!(q.pop_front().unwrap().id, "m-0");
    }

    #[test]
    fn test_clear_reports_dropped_count() {
        let mut q = OutboundQueue::new(0, OverflowPolicy::RejectNewest);
        for n in 0..3 {
            q.enqueue(envelope(n));
        }
        assert_eq!(q.clear(), 3);
        assert!(q.is_empty());
    }
}
