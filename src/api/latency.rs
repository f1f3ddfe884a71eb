//! Histogram of snapshot build times (all six upstream calls plus extraction).

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Values stored in microseconds, reported in milliseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Serialize)]
pub struct LatencyReport {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl LatencyStats {
    /// Tracks 1us to 10 minutes, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 600_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, 600_000_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    pub fn report(&self) -> LatencyReport {
        let to_ms = |us: u64| us as f64 / 1000.0;
        let Ok(h) = self.inner.lock() else {
            return LatencyReport { samples: 0, p50_ms: None, p95_ms: None, p99_ms: None, max_ms: None };
        };
        if h.len() == 0 {
            return LatencyReport { samples: 0, p50_ms: None, p95_ms: None, p99_ms: None, max_ms: None };
        }
        LatencyReport {
            samples: h.len(),
            p50_ms: Some(to_ms(h.value_at_quantile(0.5))),
            p95_ms: Some(to_ms(h.value_at_quantile(0.95))),
            p99_ms: Some(to_ms(h.value_at_quantile(0.99))),
            max_ms: Some(to_ms(h.max())),
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
