//! Session lifecycle events and their observer list

use camkit_core::StreamSource;
use std::fmt;
use tracing::debug;

/// Lifecycle events emitted by a [`CaptureSession`](crate::CaptureSession)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Streams, shutter and recorder are ready
    Initialized {
        /// Primary stream identifier
        stream_id: String,
    },
    /// One of the two streams was replaced
    SourceChanged {
        /// Slot that changed
        source: StreamSource,
        /// Identifier of the new stream
        stream_id: String,
    },
    /// All tracks were released
    Destroyed,
}

impl SessionEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::Initialized { .. } => "initialized",
            SessionEvent::SourceChanged { .. } => "source_changed",
            SessionEvent::Destroyed => "destroyed",
        }
    }
}

/// Handle returned by [`subscribe`](crate::CaptureSession::subscribe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn Fn(&SessionEvent) + Send + Sync>;

/// Callbacks run synchronously, in subscription order
#[derive(Default)]
pub(crate) struct EventListeners {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback)>,
}

impl EventListeners {
    pub(crate) fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    pub(crate) fn emit(&self, event: &SessionEvent) {
        debug!(
            "Dispatching {} to {} listeners",
            event.event_type(),
            self.callbacks.len()
        );
        for (_, callback) in &self.callbacks {
            callback(event);
        }
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut listeners = EventListeners::default();

        let counter = hits.clone();
        let id = listeners.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(&SessionEvent::Destroyed);
        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        listeners.emit(&SessionEvent::Destroyed);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
