//! Histogram implementation for lock wait latency

use std::sync::atomic::{AtomicU64, Ordering};

/// Histogram for tracking value distributions
///
/// Bucket `i` counts observations `<= boundary[i]`; the final overflow
/// bucket counts everything above the last boundary.
pub struct Histogram {
    /// Bucket boundaries (in microseconds)
    boundaries: Vec<u64>,
    /// Counts per bucket, one longer than `boundaries`
    counts: Vec<AtomicU64>,
    /// Sum of all values
    sum: AtomicU64,
    /// Largest value seen
    max: AtomicU64,
    /// Total count
    count: AtomicU64,
}

impl Histogram {
    /// Create histogram with buckets suited to lock waits (10us to 10s)
    pub fn new() -> Self {
        Self::with_boundaries(vec![
            10, 100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000,
        ])
    }

    /// Create histogram with custom, ascending bucket boundaries
    pub fn with_boundaries(mut boundaries: Vec<u64>) -> Self {
        boundaries.sort_unstable();
        boundaries.dedup();
        let counts = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Histogram {
            boundaries,
            counts,
            sum: AtomicU64::new(0),
            max: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value
    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);

        let bucket = self.boundaries.partition_point(|boundary| *boundary < value);
        self.counts[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Get mean value
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Largest observed value
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Get total count
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// `(upper bound, count)` per bucket; the overflow bucket reports `None`
    pub fn buckets(&self) -> Vec<(Option<u64>, u64)> {
        self.boundaries
            .iter()
            .map(|b| Some(*b))
            .chain(std::iter::once(None))
            .zip(self.counts.iter().map(|c| c.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}
