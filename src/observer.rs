//! Change notification for timelines
//!
//! Observers are told when a timeline is emptied, so consumers holding
//! derived state (cached frames, last synchronized timestamp) can reset.
//! Nothing is emitted for individual pushes, pops or evictions.
//!
//! Notification is fire-and-forget: it happens after the timeline's lock is
//! released and observers must not block. [`ChannelObserver`] queues events
//! for a consumer thread to drain at its own pace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;

/// Event emitted by a timeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimelineEvent {
    /// All entries were removed.
    Cleared,
}

/// Observer that receives timeline events.
pub trait TimelineObserver: Send + Sync {
    /// Called once per event. Must return promptly.
    fn on_event(&self, event: TimelineEvent);

    /// False once the observer can no longer receive events; it is then dropped.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Channel-based observer - sends events to a channel
pub struct ChannelObserver {
    sender: Mutex<Sender<TimelineEvent>>,
    connected: AtomicBool,
}

impl ChannelObserver {
    pub fn new(sender: Sender<TimelineEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
            connected: AtomicBool::new(true),
        }
    }
}

impl TimelineObserver for ChannelObserver {
    fn on_event(&self, event: TimelineEvent) {
        if self.sender.lock().send(event).is_err() {
            self.connected.store(false, Ordering::Relaxed);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Observer list owned by one timeline.
#[derive(Default)]
pub(crate) struct Notifier {
    observers: Mutex<Vec<Arc<dyn TimelineObserver>>>,
}

impl Notifier {
    pub(crate) fn add(&self, observer: Arc<dyn TimelineObserver>) {
        self.observers.lock().push(observer);
    }

    /// Register a channel observer and hand back its receiving end.
    pub(crate) fn subscribe(&self) -> Receiver<TimelineEvent> {
        let (tx, rx) = mpsc::channel();
        self.add(Arc::new(ChannelObserver::new(tx)));
        rx
    }

    pub(crate) fn notify(&self, event: TimelineEvent) {
        // Snapshot so observer code never runs under the list lock.
        let observers: Vec<_> = {
            let mut list = self.observers.lock();
            list.retain(|o| o.is_connected());
            list.clone()
        };
        for observer in observers {
            observer.on_event(event.clone());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.lock().len()
    }
}
