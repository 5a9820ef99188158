//! Typed event dispatch
//!
//! Routes inbound envelopes to a generic message channel and to one channel
//! per message kind, plus a channel for transport lifecycle events. The
//! channel set is closed: every `MessageKind` has exactly one slot in the
//! dispatch table, so adding a kind forces every match site to be revisited.
//!
//! Delivery is synchronous, in subscriber-registration order, inside the
//! connection actor's turn. A slow handler blocks delivery to the next
//! subscriber and everything else the actor does; handlers must be cheap and
//! hand real work to their own tasks.
//!
//! The registry lock is released before any handler runs, so a handler may
//! subscribe more handlers. A subscription made mid-delivery takes effect
//! from the next envelope or event, not the one being delivered.

use std::sync::Arc;

use parking_lot::Mutex;

use super::events::TransportEvent;
use crate::protocol::{Envelope, MessageKind};

type MessageHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;
type EventHandler = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    /// Generic channel: every successfully parsed envelope
    message: Vec<MessageHandler>,
    /// Per-kind channels, indexed by `MessageKind::index()`
    by_kind: [Vec<MessageHandler>; MessageKind::COUNT],
    /// Transport lifecycle events
    events: Vec<EventHandler>,
}

/// Publish/subscribe hub for envelopes and transport events
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl EventDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Subscribe to every successfully parsed inbound envelope
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.registry.lock().message.push(Arc::new(handler));
    }

    /// Subscribe to inbound envelopes of a single kind
    pub fn on_kind<F>(&self, kind: MessageKind, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.registry.lock().by_kind[kind.index()].push(Arc::new(handler));
    }

    /// Subscribe to transport lifecycle events
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.registry.lock().events.push(Arc::new(handler));
    }

    /// Deliver an inbound envelope: generic subscribers first, then the
    /// matching kind channel, each in registration order. The handler lists
    /// are snapshotted so handlers run without the registry lock held.
    pub(crate) fn dispatch(&self, envelope: &Envelope) {
        let (generic, kinded) = {
            let registry = self.registry.lock();
            (
                registry.message.clone(),
                registry.by_kind[envelope.kind().index()].clone(),
            )
        };
        for handler in &generic {
            handler(envelope);
        }
        for handler in &kinded {
            handler(envelope);
        }
    }

    /// Deliver a transport lifecycle event in registration order, with the
    /// registry lock released before any handler runs
    pub(crate) fn emit(&self, event: &TransportEvent) {
        let handlers = self.registry.lock().events.clone();
        for handler in &handlers {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessagePayload, StatusPayload, SyncPayload};
    use parking_lot::Mutex as PlMutex;
    use serde_json::Value;

    fn status_envelope() -> Envelope {
        Envelope::new(
            "gateway",
            MessagePayload::Status(StatusPayload {
                component: "inference".to_string(),
                status: "ready".to_string(),
                progress: None,
                metrics: None,
            }),
        )
    }

    #[test]
    fn test_generic_then_kind_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        let l = log.clone();
        dispatcher.on_message(move |_| l.lock().push("message"));
        let l = log.clone();
        dispatcher.on_kind(MessageKind::Status, move |_| l.lock().push("status"));

        dispatcher.dispatch(&status_envelope());

        assert_eq!(*log.lock(), vec!["message", "status"]);
    }

    #[test]
    fn test_exactly_one_delivery_per_channel() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        let l = log.clone();
        dispatcher.on_message(move |e| l.lock().push(format!("message:{}", e.id)));
        let l = log.clone();
        dispatcher.on_kind(MessageKind::Status, move |e| {
            l.lock().push(format!("status:{}", e.id))
        });
        let l = log.clone();
        dispatcher.on_kind(MessageKind::Heartbeat, move |e| {
            l.lock().push(format!("heartbeat:{}", e.id))
        });

        let envelope = status_envelope();
        dispatcher.dispatch(&envelope);

        let entries = log.lock().clone();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], format!("message:{}", envelope.id));
        assert_eq!(entries[1], format!("status:{}", envelope.id));
    }

    #[test]
    fn test_registration_order_within_channel() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        for n in 0..4 {
            let l = log.clone();
            dispatcher.on_message(move |_| l.lock().push(n));
        }

        dispatcher.dispatch(&status_envelope());
        assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_kind_channel_ignores_other_kinds() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(PlMutex::new(0));

        let c = count.clone();
        dispatcher.on_kind(MessageKind::Sync, move |_| *c.lock() += 1);

        dispatcher.dispatch(&status_envelope());
        assert_eq!(*count.lock(), 0);

        dispatcher.dispatch(&Envelope::new(
            "gateway",
            MessagePayload::Sync(SyncPayload {
                scope: None,
                state: Value::Null,
            }),
        ));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_handler_may_subscribe_during_delivery() {
        let dispatcher = EventDispatcher::new();
        let late_deliveries = Arc::new(PlMutex::new(0u32));

        let inner_dispatcher = dispatcher.clone();
        let late = late_deliveries.clone();
        let registered = Arc::new(PlMutex::new(false));
        let registered_flag = registered.clone();
        dispatcher.on_event(move |_| {
            let mut done = registered_flag.lock();
            if !*done {
                *done = true;
                let late = late.clone();
                inner_dispatcher.on_message(move |_| *late.lock() += 1);
            }
        });

        // Re-entrant subscription must not wedge delivery
        dispatcher.emit(&TransportEvent::Connected);

        // The handler added mid-delivery sees subsequent envelopes
        dispatcher.dispatch(&status_envelope());
        assert_eq!(*late_deliveries.lock(), 1);
    }

    #[test]
    fn test_subscription_during_dispatch_skips_current_envelope() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(PlMutex::new(0u32));

        let inner_dispatcher = dispatcher.clone();
        let count_clone = count.clone();
        dispatcher.on_message(move |_| {
            let count = count_clone.clone();
            inner_dispatcher.on_message(move |_| *count.lock() += 1);
        });

        dispatcher.dispatch(&status_envelope());
        // The handler registered mid-dispatch did not see this envelope
        assert_eq!(*count.lock(), 0);

        dispatcher.dispatch(&status_envelope());
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_transport_events_delivered_in_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        let l = log.clone();
        dispatcher.on_event(move |e| {
            if let TransportEvent::Connected = e {
                l.lock().push("first");
            }
        });
        let l = log.clone();
        dispatcher.on_event(move |e| {
            if let TransportEvent::Connected = e {
                l.lock().push("second");
            }
        });

        dispatcher.emit(&TransportEvent::Connected);
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }
}
