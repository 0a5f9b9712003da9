//! # proclock-metrics
//!
//! Observability for the proclock lock scheduler.
//!
//! Features:
//! - Per-scope event counters (granted, queued, released, ...)
//! - Gauge of currently suspended procedures
//! - Histogram of queue-to-grant latency
//! - JSON export

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collector;
mod export;
mod histogram;

pub use collector::{LockEvent, LockMetrics};
pub use export::{HistogramSummary, MetricsSnapshot};
pub use histogram::Histogram;
