//! Lock event collector

use crate::Histogram;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scheduler event being counted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockEvent {
    /// A lock was granted (immediately or from a queue)
    Granted,
    /// A procedure was suspended on a scope's waiter queue
    Queued,
    /// A held lock was released
    Released,
    /// A queued wait was withdrawn before being granted
    Cancelled,
    /// A wake call matched no held or queued state
    InvalidRelease,
    /// An implicit enclosing lock could not be re-taken during a grant
    HierarchyViolation,
}

impl LockEvent {
    /// Every event, in export order
    pub const ALL: [LockEvent; 6] = [
        LockEvent::Granted,
        LockEvent::Queued,
        LockEvent::Released,
        LockEvent::Cancelled,
        LockEvent::InvalidRelease,
        LockEvent::HierarchyViolation,
    ];

    /// Metric name of this event
    pub fn name(&self) -> &'static str {
        match self {
            LockEvent::Granted => "locks.granted",
            LockEvent::Queued => "locks.queued",
            LockEvent::Released => "locks.released",
            LockEvent::Cancelled => "locks.cancelled",
            LockEvent::InvalidRelease => "locks.invalid_release",
            LockEvent::HierarchyViolation => "locks.hierarchy_violation",
        }
    }
}

/// Thread-safe metrics for one scheduler
///
/// Counters are labelled by scope kind (`server`, `namespace`, `table`,
/// `region`) so hot scopes are visible.
pub struct LockMetrics {
    /// Event counters keyed by (event, scope label)
    events: RwLock<HashMap<(LockEvent, &'static str), Arc<AtomicU64>>>,
    /// Procedures currently suspended
    waiting: AtomicI64,
    /// Queue-to-grant latency in microseconds
    wait_latency: Histogram,
}

impl LockMetrics {
    /// Create an empty metrics store
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            waiting: AtomicI64::new(0),
            wait_latency: Histogram::new(),
        }
    }

    /// Count one `event` on a scope of kind `scope`
    pub fn record(&self, event: LockEvent, scope: &'static str) {
        let events = self.events.read();
        if let Some(c) = events.get(&(event, scope)) {
            c.fetch_add(1, Ordering::Relaxed);
            return;
        }
        drop(events);

        let mut events = self.events.write();
        let c = events
            .entry((event, scope))
            .or_insert_with(|| Arc::new(AtomicU64::new(0)));
        c.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the number of suspended procedures
    pub fn set_waiting(&self, waiting: usize) {
        self.waiting
            .store(i64::try_from(waiting).unwrap_or(i64::MAX), Ordering::Relaxed);
    }

    /// Record how long a procedure sat in a queue before its grant
    pub fn observe_wait(&self, waited: Duration) {
        let micros = u64::try_from(waited.as_micros()).unwrap_or(u64::MAX);
        self.wait_latency.observe(micros);
        tracing::trace!(micros, "lock wait observed");
    }

    /// Total count of `event` across all scope kinds
    pub fn event_count(&self, event: LockEvent) -> u64 {
        self.events
            .read()
            .iter()
            .filter(|((e, _), _)| *e == event)
            .map(|(_, c)| c.load(Ordering::Relaxed))
            .sum()
    }

    /// Count of `event` on scopes of kind `scope`
    pub fn event_count_for(&self, event: LockEvent, scope: &str) -> u64 {
        self.events
            .read()
            .iter()
            .find(|((e, s), _)| *e == event && *s == scope)
            .map(|(_, c)| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Get all `(event, scope, count)` triples
    pub fn all_events(&self) -> Vec<(LockEvent, &'static str, u64)> {
        self.events
            .read()
            .iter()
            .map(|((e, s), c)| (*e, *s, c.load(Ordering::Relaxed)))
            .collect()
    }

    /// Current number of suspended procedures
    pub fn waiting(&self) -> i64 {
        self.waiting.load(Ordering::Relaxed)
    }

    /// Queue-to-grant latency histogram
    pub fn wait_latency(&self) -> &Histogram {
        &self.wait_latency
    }
}

impl Default for LockMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_counts_per_scope() {
        let metrics = LockMetrics::new();
        metrics.record(LockEvent::Granted, "table");
        metrics.record(LockEvent::Granted, "table");
        metrics.record(LockEvent::Granted, "namespace");
        metrics.record(LockEvent::Queued, "table");

        assert_eq!(metrics.event_count(LockEvent::Granted), 3);
        assert_eq!(metrics.event_count_for(LockEvent::Granted, "table"), 2);
        assert_eq!(metrics.event_count_for(LockEvent::Queued, "region"), 0);
    }

    #[test]
    fn test_waiting_gauge() {
        let metrics = LockMetrics::new();
        metrics.set_waiting(3);
        assert_eq!(metrics.waiting(), 3);
        metrics.set_waiting(0);
        assert_eq!(metrics.waiting(), 0);
    }

    #[test]
    fn test_observe_wait() {
        let metrics = LockMetrics::new();
        metrics.observe_wait(Duration::from_micros(150));
        metrics.observe_wait(Duration::from_micros(250));
        assert_eq!(metrics.wait_latency().total_count(), 2);
        assert_eq!(metrics.wait_latency().mean(), 200.0);
    }

    #[test]
    fn test_event_names_are_unique() {
        let mut names: Vec<_> = LockEvent::ALL.iter().map(|e| e.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), LockEvent::ALL.len());
    }
}
