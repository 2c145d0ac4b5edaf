//! A complete benchmark: preflight, a discarded warmup phase and a measured phase.

use std::sync::Arc;
use std::time::Duration;

use fieldbench_datagen::seed::derive_seed;
use fieldbench_types::Query;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::events::{Event, Events};
use crate::executor::SharedExecutor;
use crate::phase::{PhaseKind, PhaseParams, run_phase};
use crate::stats::Summary;

const WARMUP_STREAM: u64 = 1;
const MEASUREMENT_STREAM: u64 = 2;

/// Parameters of a benchmark run.
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    /// Number of concurrent workers in both phases.
    pub concurrency: usize,
    /// Number of requests in the warmup phase, whose results are discarded.
    pub warmup_requests: u64,
    /// Number of requests in the measurement phase.
    pub total_requests: u64,
    /// Timeout of a single request.
    pub request_timeout: Duration,
    /// Upper bound for the wall-clock time of each phase.
    pub phase_deadline: Duration,
    /// Master seed from which all worker streams are derived.
    pub seed: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            warmup_requests: 5_000,
            total_requests: 100_000,
            request_timeout: Duration::from_secs(2),
            phase_deadline: Duration::from_secs(30 * 60),
            seed: 42,
        }
    }
}

impl BenchmarkConfig {
    fn phase(&self, kind: PhaseKind) -> PhaseParams {
        let (requests, stream) = match kind {
            PhaseKind::Warmup => (self.warmup_requests, WARMUP_STREAM),
            PhaseKind::Measurement => (self.total_requests, MEASUREMENT_STREAM),
        };

        PhaseParams {
            kind,
            requests,
            concurrency: self.concurrency,
            seed: derive_seed(self.seed, stream),
            request_timeout: self.request_timeout,
            deadline: self.phase_deadline,
        }
    }
}

/// Lifecycle of a [`Benchmark`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Not started yet.
    Idle,
    /// Running the warmup phase.
    WarmingUp,
    /// Running the measurement phase.
    Measuring,
    /// Finished successfully.
    Done,
}

/// The record produced by a successful benchmark.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BenchmarkResult {
    /// Statistics of the measurement phase.
    #[serde(flatten)]
    pub summary: Summary,
    /// Number of warmup requests that were run and discarded.
    pub warmup_requests: u64,
    /// Number of measured requests.
    pub benchmark_requests: u64,
}

/// Runs a query set against an executor.
#[derive(Debug)]
pub struct Benchmark {
    executor: SharedExecutor,
    queries: Arc<[Query]>,
    config: BenchmarkConfig,
    events: Events,
    state: State,
}

impl Benchmark {
    /// Creates a benchmark after validating its inputs.
    ///
    /// # Errors
    ///
    /// Fails on an empty query set, zero concurrency or zero measured requests.
    pub fn new(
        executor: SharedExecutor,
        queries: impl Into<Arc<[Query]>>,
        config: BenchmarkConfig,
    ) -> Result<Self> {
        let queries = queries.into();
        if queries.is_empty() {
            return Err(Error::EmptyQuerySet);
        }
        if config.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
        }
        if config.total_requests == 0 {
            return Err(Error::InvalidConfig(
                "total_requests must be at least 1".into(),
            ));
        }

        Ok(Self {
            executor,
            queries,
            config,
            events: Events::none(),
            state: State::Idle,
        })
    }

    /// Emits progress events to the given handle.
    pub fn with_events(mut self, events: Events) -> Self {
        self.events = events;
        self
    }

    /// Returns the current lifecycle state.
    ///
    /// After a failed run, this is the state in which the failure happened.
    pub fn state(&self) -> State {
        self.state
    }

    /// Runs the benchmark to completion.
    pub async fn run(&mut self) -> Result<BenchmarkResult> {
        self.executor.preflight().await?;
        self.events.emit(Event::Connected);

        self.state = State::WarmingUp;
        let warmup = run_phase(
            Arc::clone(&self.executor),
            Arc::clone(&self.queries),
            &self.config.phase(PhaseKind::Warmup),
            &self.events,
        )
        .await?;
        tracing::info!(
            requests = warmup.total(),
            errors = warmup.error_count,
            elapsed = ?warmup.elapsed,
            "warmup complete"
        );

        self.state = State::Measuring;
        let measurement = run_phase(
            Arc::clone(&self.executor),
            Arc::clone(&self.queries),
            &self.config.phase(PhaseKind::Measurement),
            &self.events,
        )
        .await?;

        let summary = Summary::from_phase(&measurement);
        if summary.success_count == 0 {
            tracing::warn!(
                errors = summary.error_count,
                "every measured request failed, latency figures are zero"
            );
        }
        tracing::info!(
            throughput = summary.throughput_req_sec,
            p95_ms = summary.p95_latency_ms,
            error_rate = summary.error_rate,
            "measurement complete"
        );

        self.state = State::Done;
        Ok(BenchmarkResult {
            summary,
            warmup_requests: warmup.total(),
            benchmark_requests: measurement.total(),
        })
    }
}
