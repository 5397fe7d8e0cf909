//=========================================================================
// Operation Events
//=========================================================================
//
// Fan-out of operation lifecycle events to subscribers.
//
// Architecture:
//   EventBus
//     └─ subscribers: Vec<Sender<OperationEvent>>   (bounded channels)
//
// A full subscriber misses the event, a disconnected one is dropped.
// Receivers may live on other threads.
//
//=========================================================================

//=== External Dependencies ===============================================

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, trace};

//=== Internal Dependencies ===============================================

use crate::core::action::Outcome;
use crate::core::operation::{Lane, OperationId};

//=== OperationEvent ======================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// Waiting behind the lane's active operation.
    Queued,

    /// Began running.
    Started,

    /// Progress rose to the given value.
    Progress(f32),

    /// Reached a terminal phase.
    Finished(Outcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationEvent {
    pub id: OperationId,
    pub label: String,
    pub lane: Lane,
    pub kind: EventKind,
}

//=== EventBus ============================================================

#[derive(Debug)]
pub struct EventBus {
    subscribers: Vec<Sender<OperationEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Creates a bus whose subscriber channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            capacity,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<OperationEvent> {
        let (tx, rx) = bounded(self.capacity);
        self.subscribers.push(tx);
        debug!("Event subscriber added ({} total)", self.subscribers.len());
        rx
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delivers `event` to every subscriber without blocking.
    pub fn publish(&mut self, event: OperationEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Subscriber full, dropping {:?} for {}", event.kind, event.id);
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Event subscriber disconnected");
                false
            }
        });
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u64, kind: EventKind) -> OperationEvent {
        OperationEvent {
            id: OperationId(id),
            label: format!("op {id}"),
            lane: Lane::Standalone,
            kind,
        }
    }

    #[test]
    fn every_subscriber_receives_events() {
        let mut bus = EventBus::new(8);
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(event(1, EventKind::Started));

        assert_eq!(a.try_recv().unwrap().kind, EventKind::Started);
        assert_eq!(b.try_recv().unwrap().id, OperationId(1));
    }

    #[test]
    fn full_subscriber_drops_events() {
        let mut bus = EventBus::new(1);
        let rx = bus.subscribe();

        bus.publish(event(1, EventKind::Queued));
        bus.publish(event(1, EventKind::Started));

        assert_eq!(rx.try_recv().unwrap().kind, EventKind::Queued);
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn disconnected_subscriber_is_removed() {
        let mut bus = EventBus::new(4);
        let rx = bus.subscribe();
        drop(rx);

        bus.publish(event(1, EventKind::Finished(Outcome::Completed)));
        assert!(!bus.has_subscribers());
    }

    #[test]
    fn receiver_works_across_threads() {
        let mut bus = EventBus::new(4);
        let rx = bus.subscribe();
        let handle = std::thread::spawn(move || rx.recv().map(|e| e.kind));

        bus.publish(event(2, EventKind::Progress(0.5)));
        assert_eq!(handle.join().unwrap(), Ok(EventKind::Progress(0.5)));
    }
}
