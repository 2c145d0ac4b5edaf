//! Reduction of a measurement phase into latency, throughput and error statistics.

use std::time::Duration;

use serde::Serialize;

use crate::phase::{FailureCounts, PhaseResult};

/// Aggregated statistics of one phase.
///
/// Latency figures only consider successful requests. With no successful requests, all latency
/// figures are `0`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Mean latency in milliseconds.
    pub avg_latency_ms: f64,
    /// Median latency in milliseconds.
    pub p50_latency_ms: f64,
    /// 95th percentile latency in milliseconds.
    pub p95_latency_ms: f64,
    /// 99th percentile latency in milliseconds.
    pub p99_latency_ms: f64,
    /// Slowest successful request in milliseconds.
    pub max_latency_ms: f64,
    /// Successful requests per second of phase wall-clock time.
    pub throughput_req_sec: f64,
    /// Number of successful requests.
    pub success_count: u64,
    /// Number of failed requests.
    pub error_count: u64,
    /// Share of failed requests, between `0` and `1`.
    pub error_rate: f64,
    /// Wall-clock duration of the phase in seconds.
    pub elapsed_seconds: f64,
    /// Total response body bytes of successful requests.
    pub bytes_received: u64,
    /// Failed requests by cause.
    pub failures: FailureCounts,
}

impl Summary {
    /// Aggregates the results of a phase.
    pub fn from_phase(phase: &PhaseResult) -> Self {
        let mut latencies: Vec<f64> = phase.latencies.iter().copied().map(millis).collect();
        latencies.sort_by(f64::total_cmp);

        let elapsed_seconds = phase.elapsed.as_secs_f64();
        let throughput_req_sec = if elapsed_seconds > 0.0 {
            phase.success_count as f64 / elapsed_seconds
        } else {
            0.0
        };

        let total = phase.success_count + phase.error_count;
        let error_rate = if total > 0 {
            phase.error_count as f64 / total as f64
        } else {
            0.0
        };

        Self {
            avg_latency_ms: mean(&latencies),
            p50_latency_ms: percentile(&latencies, 50.0),
            p95_latency_ms: percentile(&latencies, 95.0),
            p99_latency_ms: percentile(&latencies, 99.0),
            max_latency_ms: latencies.last().copied().unwrap_or(0.0),
            throughput_req_sec,
            success_count: phase.success_count,
            error_count: phase.error_count,
            error_rate,
            elapsed_seconds,
            bytes_received: phase.bytes_received,
            failures: phase.failures,
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Returns the `p`-th percentile of ascending `sorted` values.
///
/// Uses the nearest-rank method: the value at one-based rank `ceil(n * p / 100)`, clamped to
/// `1..=n`. Returns `0` for an empty slice.
///
/// ```
/// use loadtest::stats::percentile;
///
/// let values = [10.0, 20.0, 30.0, 40.0, 100.0];
/// assert_eq!(percentile(&values, 95.0), 100.0);
/// assert_eq!(percentile(&values, 50.0), 30.0);
/// assert_eq!(percentile(&[], 99.0), 0.0);
/// ```
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let rank = (n as f64 * p / 100.0).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

#[cfg(test)]
mod tests {
    use crate::phase::PhaseKind;

    use super::*;

    fn phase(latencies_ms: &[u64], errors: u64, elapsed: Duration) -> PhaseResult {
        PhaseResult {
            kind: PhaseKind::Measurement,
            elapsed,
            success_count: latencies_ms.len() as u64,
            error_count: errors,
            latencies: latencies_ms
                .iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect(),
            failures: FailureCounts {
                status: errors,
                ..Default::default()
            },
            bytes_received: 0,
            worker_queries: Vec::new(),
        }
    }

    #[test]
    fn empty_phase_is_all_zero() {
        let summary = Summary::from_phase(&phase(&[], 0, Duration::ZERO));
        assert_eq!(summary.avg_latency_ms, 0.0);
        assert_eq!(summary.p95_latency_ms, 0.0);
        assert_eq!(summary.p99_latency_ms, 0.0);
        assert_eq!(summary.throughput_req_sec, 0.0);
        assert_eq!(summary.error_rate, 0.0);
    }

    #[test]
    fn reference_latencies() {
        // Unsorted on purpose, the aggregator must not depend on completion order.
        let phase = phase(&[40, 100, 10, 30, 20], 0, Duration::from_secs(2));
        let summary = Summary::from_phase(&phase);
        assert_eq!(summary.avg_latency_ms, 40.0);
        assert_eq!(summary.p95_latency_ms, 100.0);
        assert_eq!(summary.p99_latency_ms, 100.0);
        assert_eq!(summary.p50_latency_ms, 30.0);
        assert_eq!(summary.max_latency_ms, 100.0);
        assert_eq!(summary.throughput_req_sec, 2.5);
    }

    #[test]
    fn all_failures() {
        let summary = Summary::from_phase(&phase(&[], 8, Duration::from_secs(1)));
        assert_eq!(summary.error_rate, 1.0);
        assert_eq!(summary.avg_latency_ms, 0.0);
        assert_eq!(summary.throughput_req_sec, 0.0);
        assert_eq!(summary.failures.status, 8);
    }

    #[test]
    fn error_rate_counts_all_outcomes() {
        let summary = Summary::from_phase(&phase(&[5, 5, 5], 1, Duration::from_secs(1)));
        assert_eq!(summary.error_rate, 0.25);
        assert_eq!(summary.throughput_req_sec, 3.0);
    }

    #[test]
    fn percentile_clamps_small_inputs() {
        assert_eq!(percentile(&[7.0], 0.0), 7.0);
        assert_eq!(percentile(&[7.0], 1.0), 7.0);
        assert_eq!(percentile(&[7.0], 100.0), 7.0);
        assert_eq!(percentile(&[1.0, 2.0], 50.0), 1.0);
        assert_eq!(percentile(&[1.0, 2.0], 51.0), 2.0);

        let hundred: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&hundred, 95.0), 95.0);
        assert_eq!(percentile(&hundred, 99.0), 99.0);
    }
}
