//! Metrics export and snapshot functionality

use crate::{Histogram, LockEvent, LockMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of all lock metrics at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Event name -> scope kind -> count
    pub events: BTreeMap<String, BTreeMap<String, u64>>,
    /// Procedures suspended when the snapshot was taken
    pub waiting: i64,
    /// Queue-to-grant latency summary
    pub wait_micros: HistogramSummary,
}

/// Summary of a histogram
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSummary {
    /// Mean value
    pub mean: f64,
    /// Largest value
    pub max: u64,
    /// Total observation count
    pub count: u64,
}

impl From<&Histogram> for HistogramSummary {
    fn from(h: &Histogram) -> Self {
        Self {
            mean: h.mean(),
            max: h.max(),
            count: h.total_count(),
        }
    }
}

impl MetricsSnapshot {
    /// Create a snapshot from a metrics store
    pub fn from_metrics(metrics: &LockMetrics) -> Self {
        let mut events: BTreeMap<String, BTreeMap<String, u64>> = LockEvent::ALL
            .iter()
            .map(|e| (e.name().to_string(), BTreeMap::new()))
            .collect();
        for (event, scope, count) in metrics.all_events() {
            events
                .entry(event.name().to_string())
                .or_default()
                .insert(scope.to_string(), count);
        }

        Self {
            events,
            waiting: metrics.waiting(),
            wait_micros: HistogramSummary::from(metrics.wait_latency()),
        }
    }

    /// Total of one event across scopes
    pub fn total(&self, event: LockEvent) -> u64 {
        self.events
            .get(event.name())
            .map(|per_scope| per_scope.values().sum())
            .unwrap_or(0)
    }

    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export snapshot as compact JSON string
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
