// Capture event observers
//
// Observers are fire-and-forget sinks (a UI view, a log tap). Delivery is
// at most once and never blocks the capture; an observer whose receiving
// end went away is dropped from the list on the next publish.

use tokio::sync::mpsc;

use crate::domain::capture::CaptureEvent;

/// Sink for capture events
pub trait Observer: Send + Sync {
    /// Delivers an event, returning false once the observer is closed
    fn deliver(&self, event: &CaptureEvent) -> bool;
}

/// Observer backed by an unbounded tokio channel
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<CaptureEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<CaptureEvent>) -> Self {
        Self { tx }
    }

    /// Creates an observer together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Observer for ChannelObserver {
    fn deliver(&self, event: &CaptureEvent) -> bool {
        self.tx.send(event.clone()).is_ok()
    }
}

/// Publish list of observers attached to a session
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<Box<dyn Observer>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Attaches a channel observer and returns its receiver
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CaptureEvent> {
        let (observer, rx) = ChannelObserver::channel();
        self.attach(Box::new(observer));
        rx
    }

    /// Delivers the event to every observer, pruning closed ones
    ///
    /// Returns the number of observers that received it. An empty list is
    /// not an error.
    pub fn publish(&mut self, event: &CaptureEvent) -> usize {
        self.observers.retain(|observer| observer.deliver(event));

        tracing::debug!(
            event = event.kind(),
            observers = self.observers.len(),
            "Capture event published"
        );
        self.observers.len()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
