//! In-process event bus.
//!
//! Components publish named business events here; a single adapter can
//! forward them to whatever transport a shell uses (UI channel, test
//! harness, log sink). Components never emit directly to consumers.
//!
//! Delivery is at-least-once from the producer's point of view and strictly
//! ordered per subscription; every envelope carries a monotonically
//! increasing sequence number. Subscriber queues are bounded — a slow
//! subscriber loses observation events (all bus traffic is observational;
//! authoritative state is re-readable from the owning component) rather
//! than blocking producers.

mod types;

pub use types::{Event, LockChangeKind};

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::time::Duration;

use tracing::warn;

use crate::config::OBSERVATION_QUEUE_BOUND;

/// One published event plus its global sequence number.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub seq: u64,
    pub event: Event,
}

/// A bounded per-subscriber queue of envelopes.
pub struct Subscription {
    receiver: Receiver<Envelope>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Envelope> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.receiver.try_recv() {
            out.push(envelope);
        }
        out
    }

    /// Drain, keeping only events a predicate selects.
    pub fn drain_filtered(&self, mut keep: impl FnMut(&Event) -> bool) -> Vec<Envelope> {
        self.drain().into_iter().filter(|e| keep(&e.event)).collect()
    }
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<SyncSender<Envelope>>>,
    seq: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = sync_channel(OBSERVATION_QUEUE_BOUND);
        self.subscribers.lock().expect("event bus poisoned").push(tx);
        Subscription { receiver: rx }
    }

    /// Publish an event to every live subscriber; returns its sequence number.
    pub fn publish(&self, event: Event) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let envelope = Envelope { seq, event };

        let mut subscribers = self.subscribers.lock().expect("event bus poisoned");
        subscribers.retain(|tx| match tx.try_send(envelope.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    event = "core.events.subscriber_overflow",
                    dropped_event = dropped.event.name(),
                    seq = dropped.seq,
                    total_dropped = total,
                );
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        seq
    }

    /// Count of events lost to slow subscribers since startup.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_protocol::SessionId;

    #[test]
    fn test_sequence_numbers_increase() {
        let bus = EventBus::new();
        let sub = bus.subscribe();

        bus.publish(Event::SessionClosed {
            session_id: SessionId::new("sess_00000001"),
        });
        bus.publish(Event::SessionClosed {
            session_id: SessionId::new("sess_00000002"),
        });

        let envelopes = sub.drain();
        assert_eq!(envelopes.len(), 2);
        assert!(envelopes[0].seq < envelopes[1].seq);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(Event::SessionClosed {
            session_id: SessionId::new("sess_00000001"),
        });
        let sub = bus.subscribe();
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_overflow_drops_instead_of_blocking() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        for i in 0..(OBSERVATION_QUEUE_BOUND + 10) {
            bus.publish(Event::SessionClosed {
                session_id: SessionId::new(format!("sess_{i:08}")),
            });
        }
        assert_eq!(bus.dropped_count(), 10);
        assert_eq!(sub.drain().len(), OBSERVATION_QUEUE_BOUND);
    }

    #[test]
    fn test_disconnected_subscriber_is_pruned() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        drop(sub);
        bus.publish(Event::SessionClosed {
            session_id: SessionId::new("sess_00000001"),
        });
        assert_eq!(bus.subscribers.lock().unwrap().len(), 0);
    }
}
