//! Per-extractor performance counters.
//!
//! One attempt is recorded per extractor run (however many escalation levels
//! it took), so `attempts` counts how often an extractor was tried on a URL.
//! Cache hits short-circuit before any extractor runs and only bump
//! `cached_failures`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Default)]
struct ExtractorCounters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_latency_ms: AtomicU64,
}

/// Concurrent, process-lifetime metrics store.
///
/// Counter updates are atomic; the map lock is released before the counters
/// are touched, so recording never contends across extractors.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    extractors: DashMap<String, Arc<ExtractorCounters>>,
    cached_failures: AtomicU64,
}

/// Snapshot of one extractor's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractorStats {
    /// Runs started.
    pub attempts: u64,
    /// Runs that produced valid content.
    pub successes: u64,
    /// Runs that did not.
    pub failures: u64,
    /// `successes / attempts` as a percentage, two decimals.
    pub success_rate: f64,
    /// Mean run time in milliseconds, two decimals.
    pub avg_latency_ms: f64,
}

/// Snapshot of the whole recorder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    /// Per-extractor stats keyed by name.
    pub extractors: BTreeMap<String, ExtractorStats>,
    /// Attempts across all extractors.
    pub total_attempts: u64,
    /// Successes across all extractors.
    pub total_successes: u64,
    /// Overall success rate percentage, two decimals.
    pub success_rate: f64,
    /// Requests answered from the failure cache.
    pub cached_failures: u64,
}

impl MetricsRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one extractor run.
    #[allow(clippy::cast_possible_truncation)]
    pub fn record_attempt(&self, extractor: &str, success: bool, elapsed: Duration) {
        let counters = Arc::clone(
            self.extractors
                .entry(extractor.to_string())
                .or_default()
                .value(),
        );
        counters.attempts.fetch_add(1, Ordering::Relaxed);
        if success {
            counters.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        counters
            .total_latency_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    /// Records a request answered from the failure cache.
    pub fn record_cache_hit(&self) {
        self.cached_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current cache-hit count.
    #[must_use]
    pub fn cached_failures(&self) -> u64 {
        self.cached_failures.load(Ordering::Relaxed)
    }

    /// Takes a snapshot of every counter.
    #[must_use]
    pub fn report(&self) -> MetricsReport {
        let mut extractors = BTreeMap::new();
        let mut total_attempts = 0;
        let mut total_successes = 0;

        for entry in &self.extractors {
            let counters = entry.value();
            let attempts = counters.attempts.load(Ordering::Relaxed);
            let successes = counters.successes.load(Ordering::Relaxed);
            let latency = counters.total_latency_ms.load(Ordering::Relaxed);
            total_attempts += attempts;
            total_successes += successes;
            extractors.insert(
                entry.key().clone(),
                ExtractorStats {
                    attempts,
                    successes,
                    failures: counters.failures.load(Ordering::Relaxed),
                    success_rate: percentage(successes, attempts),
                    avg_latency_ms: ratio(latency, attempts),
                },
            );
        }

        MetricsReport {
            extractors,
            total_attempts,
            total_successes,
            success_rate: percentage(total_successes, total_attempts),
            cached_failures: self.cached_failures(),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.extractors.clear();
        self.cached_failures.store(0, Ordering::Relaxed);
        debug!("Metrics reset");
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 / denominator as f64)
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report() {
        let report = MetricsRecorder::new().report();
        assert!(report.extractors.is_empty());
        assert_eq!(report.total_attempts, 0);
        assert!(report.success_rate.abs() < f64::EPSILON);
        assert_eq!(report.cached_failures, 0);
    }

    #[test]
    fn test_rates_and_latency() {
        let metrics = MetricsRecorder::new();
        metrics.record_attempt("http", true, Duration::from_millis(100));
        metrics.record_attempt("http", false, Duration::from_millis(200));
        metrics.record_attempt("http", true, Duration::from_millis(300));
        metrics.record_attempt("browser", false, Duration::from_millis(50));

        let report = metrics.report();
        let http = &report.extractors["http"];
        assert_eq!(http.attempts, 3);
        assert_eq!(http.successes, 2);
        assert_eq!(http.failures, 1);
        assert!((http.success_rate - 66.67).abs() < 1e-9);
        assert!((http.avg_latency_ms - 200.0).abs() < 1e-9);

        assert_eq!(report.total_attempts, 4);
        assert_eq!(report.total_successes, 2);
        assert!((report.success_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_cache_hits_are_separate() {
        let metrics = MetricsRecorder::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        let report = metrics.report();
        assert_eq!(report.cached_failures, 2);
        assert_eq!(report.total_attempts, 0);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let metrics = MetricsRecorder::new();
        metrics.record_attempt("http", true, Duration::from_millis(10));
        metrics.record_cache_hit();
        metrics.reset();
        let report = metrics.report();
        assert!(report.extractors.is_empty());
        assert_eq!(report.cached_failures, 0);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let metrics = MetricsRecorder::new();
        metrics.record_attempt("http", true, Duration::from_millis(10));
        let json = serde_json::to_value(metrics.report()).unwrap();
        assert_eq!(json["extractors"]["http"]["attempts"], 1);
        assert_eq!(json["cached_failures"], 0);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let metrics = Arc::new(MetricsRecorder::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = Arc::clone(&metrics);
            handles.push(tokio::spawn(async move {
                for _ in 0..250 {
                    metrics.record_attempt("http", true, Duration::from_millis(1));
                    metrics.record_cache_hit();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let report = metrics.report();
        assert_eq!(report.extractors["http"].attempts, 2000);
        assert_eq!(report.cached_failures, 2000);
    }
}
