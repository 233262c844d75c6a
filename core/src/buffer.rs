//! Bounded window of recently received telemetry samples.
//!
//! Keeps the most recent `capacity` samples in arrival order and evicts the
//! oldest first. This window is what gets handed to the maintenance analysis.

use std::collections::VecDeque;

use crate::device::{DeviceKind, Metric, TelemetrySample};

/// Default number of samples retained
pub const DEFAULT_CAPACITY: usize = 10;

/// A single chart point for one metric
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// Sliding window of telemetry samples, oldest first.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    capacity: usize,
    samples: VecDeque<TelemetrySample>,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SampleBuffer {
    /// Create a buffer retaining at most `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a sample and evict from the front until the window fits.
    /// Returns the updated contents in arrival order.
    pub fn append(&mut self, sample: TelemetrySample) -> &VecDeque<TelemetrySample> {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        &self.samples
    }

    /// Clear all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    /// Owned copy of the window, oldest first
    pub fn snapshot(&self) -> Vec<TelemetrySample> {
        self.samples.iter().cloned().collect()
    }

    /// The last `n` samples, oldest first
    pub fn recent(&self, n: usize) -> Vec<TelemetrySample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).cloned().collect()
    }

    /// Newest sample reported by a device of `kind`
    pub fn latest_for(&self, kind: DeviceKind) -> Option<&TelemetrySample> {
        self.samples.iter().rev().find(|s| s.kind() == kind)
    }

    /// Values of `metric` across all samples of `kind`, oldest first
    pub fn series(&self, kind: DeviceKind, metric: Metric) -> Vec<SeriesPoint> {
        series_of(self.samples.iter(), kind, metric)
    }
}

/// Chart points for `metric` over any run of samples of `kind`
pub fn series_of<'a>(
    samples: impl IntoIterator<Item = &'a TelemetrySample>,
    kind: DeviceKind,
    metric: Metric,
) -> Vec<SeriesPoint> {
    samples
        .into_iter()
        .filter(|s| s.kind() == kind)
        .filter_map(|s| {
            s.metric(metric).map(|value| SeriesPoint {
                timestamp: s.timestamp,
                value,
            })
        })
        .collect()
}
