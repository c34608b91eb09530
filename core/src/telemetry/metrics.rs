use serde::Serialize;
use std::sync::Mutex;

/// Batch-wide counters shared across ingestion workers.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub runs_processed: usize,
    pub runs_failed: usize,
    pub corrupted_frames: usize,
}

#[derive(Default)]
struct Metrics {
    runs_processed: usize,
    runs_failed: usize,
    corrupted_frames: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_processed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.runs_processed += 1;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.runs_failed += 1;
        }
    }

    pub fn record_corrupted_frames(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.corrupted_frames += count;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                runs_processed: metrics.runs_processed,
                runs_failed: metrics.runs_failed,
                corrupted_frames: metrics.corrupted_frames,
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
