//! Strategy Events
//!
//! The closed set of work items the consumer loop executes, and the sender
//! handle producers use to enqueue them.

use std::fmt;
use std::sync::Arc;

use crate::domain::market::Timeframe;
use crate::domain::queue::EventQueue;
use crate::infrastructure::metrics;

/// Follow-up logic to run later on the consumer thread with exclusive access
/// to the strategy.
pub type DeferredTask<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// A unit of work for the consumer loop.
pub enum Event<S> {
    /// Run the strategy's per-cycle hook.
    Tick,
    /// Run the strategy's bar hook for a timeframe that just closed a bar.
    Bar(Timeframe),
    /// Run an arbitrary deferred task.
    Deferred(DeferredTask<S>),
    /// Stop the loop once everything queued before it has run.
    Terminate,
}

impl<S> Event<S> {
    /// Wrap a closure as a deferred task event.
    pub fn deferred<F>(task: F) -> Self
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        Self::Deferred(Box::new(task))
    }

    /// The variant tag, without the payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Tick => EventKind::Tick,
            Self::Bar(_) => EventKind::Bar,
            Self::Deferred(_) => EventKind::Deferred,
            Self::Terminate => EventKind::Terminate,
        }
    }

    /// Whether this is the termination sentinel.
    #[must_use]
    pub const fn is_terminate(&self) -> bool {
        matches!(self, Self::Terminate)
    }
}

impl<S> fmt::Debug for Event<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tick => f.write_str("Tick"),
            Self::Bar(timeframe) => f.debug_tuple("Bar").field(timeframe).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Terminate => f.write_str("Terminate"),
        }
    }
}

/// Payload-free tag of an [`Event`], used for logging and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Per-cycle tick hook.
    Tick,
    /// Per-timeframe bar hook.
    Bar,
    /// Deferred task.
    Deferred,
    /// Termination sentinel.
    Terminate,
}

impl EventKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Bar => "bar",
            Self::Deferred => "deferred",
            Self::Terminate => "terminate",
        }
    }
}

// =============================================================================
// Event Sender
// =============================================================================

/// Cloneable producer handle onto a strategy's event queue.
///
/// Safe to use from any thread, including from inside a running event.
pub struct EventSender<S> {
    queue: Arc<EventQueue<Event<S>>>,
}

impl<S> EventSender<S> {
    /// Create a sender for `queue`.
    #[must_use]
    pub const fn new(queue: Arc<EventQueue<Event<S>>>) -> Self {
        Self { queue }
    }

    /// Enqueue an event.
    pub fn send(&self, event: Event<S>) {
        metrics::record_event_enqueued(event.kind());
        self.queue.push(event);
    }

    /// Enqueue a deferred task.
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.send(Event::deferred(task));
    }

    /// Enqueue the termination sentinel.
    pub fn terminate(&self) {
        self.send(Event::Terminate);
    }

    /// Number of events waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<S> Clone for EventSender<S> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<S> fmt::Debug for EventSender<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("pending", &self.pending())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ::metrics::{
        Counter as MetricCounter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder,
        SharedString, Unit,
    };
    use parking_lot::Mutex;

    use super::*;

    /// Counts `strategy_events_enqueued_total` increments per `kind` label.
    #[derive(Default)]
    struct EnqueueRecorder {
        by_kind: Arc<Mutex<BTreeMap<String, u64>>>,
    }

    struct KindCounter {
        kind: String,
        by_kind: Arc<Mutex<BTreeMap<String, u64>>>,
    }

    impl CounterFn for KindCounter {
        fn increment(&self, value: u64) {
            *self.by_kind.lock().entry(self.kind.clone()).or_default() += value;
        }

        fn absolute(&self, value: u64) {
            self.by_kind.lock().insert(self.kind.clone(), value);
        }
    }

    impl Recorder for EnqueueRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> MetricCounter {
            if key.name() != "strategy_events_enqueued_total" {
                return MetricCounter::noop();
            }
            let kind = key
                .labels()
                .find(|label| label.key() == "kind")
                .map(|label| label.value().to_string())
                .unwrap_or_default();
            MetricCounter::from_arc(Arc::new(KindCounter {
                kind,
                by_kind: Arc::clone(&self.by_kind),
            }))
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    #[test]
    fn kinds_and_labels() {
        assert_eq!(Event::<Counter>::Tick.kind(), EventKind::Tick);
        assert_eq!(Event::<Counter>::Bar(Timeframe::Day).kind(), EventKind::Bar);
        assert_eq!(
            Event::<Counter>::deferred(|c| c.hits += 1).kind(),
            EventKind::Deferred
        );
        assert!(Event::<Counter>::Terminate.is_terminate());
        assert!(!Event::<Counter>::Tick.is_terminate());

        assert_eq!(EventKind::Tick.as_str(), "tick");
        assert_eq!(EventKind::Bar.as_str(), "bar");
        assert_eq!(EventKind::Deferred.as_str(), "deferred");
        assert_eq!(EventKind::Terminate.as_str(), "terminate");
    }

    #[test]
    fn debug_hides_closure() {
        assert_eq!(
            format!("{:?}", Event::<Counter>::Bar(Timeframe::Min5)),
            "Bar(Min5)"
        );
        assert_eq!(
            format!("{:?}", Event::<Counter>::deferred(|_| {})),
            "Deferred(..)"
        );
    }

    #[test]
    fn sender_clones_share_one_queue() {
        let queue = Arc::new(EventQueue::new());
        let sender = EventSender::new(Arc::clone(&queue));
        let other = sender.clone();

        sender.send(Event::Tick);
        other.defer(|c: &mut Counter| c.hits += 2);
        sender.terminate();

        assert_eq!(other.pending(), 3);
        assert!(matches!(queue.pop_blocking(), Event::Tick));

        let mut counter = Counter::default();
        match queue.pop_blocking() {
            Event::Deferred(task) => task(&mut counter),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(counter.hits, 2);
        assert!(queue.pop_blocking().is_terminate());
    }

    #[test]
    fn every_enqueue_is_counted_by_kind() {
        let recorder = EnqueueRecorder::default();
        let sender = EventSender::new(Arc::new(EventQueue::new()));

        ::metrics::with_local_recorder(&recorder, || {
            sender.send(Event::Tick);
            sender.send(Event::Bar(Timeframe::Day));
            sender.defer(|c: &mut Counter| c.hits += 1);
            sender.defer(|c: &mut Counter| c.hits += 1);
            sender.terminate();
        });

        let counts = recorder.by_kind.lock().clone();
        assert_eq!(counts.get("tick"), Some(&1));
        assert_eq!(counts.get("bar"), Some(&1));
        assert_eq!(counts.get("deferred"), Some(&2));
        assert_eq!(counts.get("terminate"), Some(&1));
        assert_eq!(sender.pending(), 5);
    }
}
