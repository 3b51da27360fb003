//! EventSink port - where consumer activity is reported.
//!
//! Sinks are called inline on the consumer's task, so `emit` must be cheap
//! and must not block.

use std::sync::Arc;

use crate::domain::ConsumerEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ConsumerEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &ConsumerEvent) {}
}

/// Fans each event out to every registered sink, in registration order.
#[derive(Default, Clone)]
pub struct Notifier {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Notifier {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for Notifier {
    fn emit(&self, event: &ConsumerEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueueId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<&'static str>>);

    impl EventSink for Recorder {
        fn emit(&self, event: &ConsumerEvent) {
            self.0.lock().unwrap().push(event.event_type());
        }
    }

    #[test]
    fn notifier_forwards_to_every_sink() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let notifier = Notifier::new(vec![a.clone(), b.clone(), Arc::new(NoopEventSink)]);

        notifier.emit(&ConsumerEvent::QueueConsumed(QueueId::new("orders").unwrap()));

        assert_eq!(*a.0.lock().unwrap(), vec!["QueueConsumed"]);
        assert_eq!(*b.0.lock().unwrap(), vec!["QueueConsumed"]);
        assert_eq!(notifier.len(), 3);
    }
}
