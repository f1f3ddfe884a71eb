//! Counters behind the /health endpoint. Updated once per snapshot build.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct HealthState {
    builds_total: AtomicU64,
    /// Builds where at least one upstream step failed.
    degraded_builds: AtomicU64,
    /// Unix milliseconds of the last build (0 = none yet).
    last_build_at_ms: AtomicI64,
    /// Unix milliseconds of the last build with no failures (0 = none yet).
    last_complete_build_at_ms: AtomicI64,
    last_build_degraded: AtomicBool,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub builds_total: u64,
    pub degraded_builds: u64,
    pub last_build_at_ms: Option<i64>,
    pub last_complete_build_at_ms: Option<i64>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_build(&self, degraded: bool, at_ms: i64) {
        self.builds_total.fetch_add(1, Ordering::Relaxed);
        self.last_build_at_ms.store(at_ms, Ordering::Relaxed);
        self.last_build_degraded.store(degraded, Ordering::Relaxed);
        if degraded {
            self.degraded_builds.fetch_add(1, Ordering::Relaxed);
        } else {
            self.last_complete_build_at_ms.store(at_ms, Ordering::Relaxed);
        }
    }

    pub fn report(&self) -> HealthReport {
        let non_zero = |v: i64| (v != 0).then_some(v);
        let last_build = self.last_build_at_ms.load(Ordering::Relaxed);
        let last_complete = self.last_complete_build_at_ms.load(Ordering::Relaxed);
        HealthReport {
            status: if self.last_build_degraded.load(Ordering::Relaxed) { "degraded" } else { "ok" },
            builds_total: self.builds_total.load(Ordering::Relaxed),
            degraded_builds: self.degraded_builds.load(Ordering::Relaxed),
            last_build_at_ms: non_zero(last_build),
            last_complete_build_at_ms: non_zero(last_complete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_ok() {
        let report = HealthState::new().report();
        assert_eq!(report.status, "ok");
        assert_eq!(report.builds_total, 0);
        assert!(report.last_build_at_ms.is_none());
    }

    #[test]
    fn partial_build_marks_degraded_until_next_clean_one() {
        let health = HealthState::new();
        health.record_build(false, 1_000);
        health.record_build(true, 2_000);
        let report = health.report();
        assert_eq!(report.status, "degraded");
        assert_eq!(report.builds_total, 2);
        assert_eq!(report.degraded_builds, 1);
        assert_eq!(report.last_complete_build_at_ms, Some(1_000));

        health.record_build(false, 3_000);
        assert_eq!(health.report().status, "ok");
    }

    #[test]
    fn degraded_build_in_the_same_millisecond_still_reports_degraded() {
        let health = HealthState::new();
        health.record_build(false, 5_000);
        health.record_build(true, 5_000);
        let report = health.report();
        assert_eq!(report.status, "degraded");
        assert_eq!(report.last_build_at_ms, report.last_complete_build_at_ms);
    }
}
