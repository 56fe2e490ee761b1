//! Change notifications emitted by sweep loops

use tokio::sync::watch;

/// What changed on a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepEvent {
    /// No change yet
    Created,
    /// Axes were added, removed or resized
    ParametersChanged,
    /// Member values under the loop were rewritten (restore after a run)
    ValuesChanged,
}

/// Latest event and a counter of all events so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    /// Most recent event
    pub event: SweepEvent,
    /// Number of events emitted
    pub generation: u64,
}

/// Broadcasts the latest [`SweepEvent`] to any number of subscribers
#[derive(Debug)]
pub struct ChangeNotifier {
    tx: watch::Sender<Notification>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(Notification {
            event: SweepEvent::Created,
            generation: 0,
        });
        Self { tx }
    }
}

impl ChangeNotifier {
    /// Notifier with no events
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an event
    pub fn notify(&self, event: SweepEvent) {
        self.tx.send_modify(|n| {
            n.event = event;
            n.generation += 1;
        });
    }

    /// Receive future notifications
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Latest notification
    #[must_use]
    pub fn last(&self) -> Notification {
        *self.tx.borrow()
    }
}
