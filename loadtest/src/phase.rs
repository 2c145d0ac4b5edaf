//! Runs a fixed number of requests through a bounded pool of workers.
//!
//! A phase spawns exactly `concurrency` worker tasks, each with its own bounded queue. The runner
//! deals `requests` work items into those queues round-robin: item `k` goes to worker
//! `k % concurrency`. Each worker claims one item at a time, picks a query with its own random
//! stream, executes it and hands the [`Outcome`] to a single collector task. The phase ends once
//! every item has been claimed and every outcome collected.
//!
//! # Determinism
//!
//! Worker `i` picks queries from a stream seeded with `derive_seed(seed, i)` and claims exactly
//! [`worker_quota`] items. For a fixed seed, concurrency and request count, every worker
//! therefore executes the same query indices in the same order on every run, no matter how the
//! runtime schedules it. Only the interleaving of requests across workers varies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use fieldbench_datagen::seed::{SeededRng, derive_seed, seeded_rng};
use fieldbench_types::Query;
use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::events::{Event, Events};
use crate::executor::{Failure, Outcome, SharedExecutor, execute_timed};

/// The two kinds of phases in a benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    /// Warms up the service and client. Latencies are discarded.
    Warmup,
    /// The recorded phase.
    Measurement,
}

impl PhaseKind {
    /// Whether success latencies are kept for this phase.
    pub fn records_latencies(self) -> bool {
        matches!(self, PhaseKind::Measurement)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Warmup => f.write_str("warmup"),
            PhaseKind::Measurement => f.write_str("measurement"),
        }
    }
}

/// Parameters of a single phase.
#[derive(Clone, Debug)]
pub struct PhaseParams {
    /// Which phase this is.
    pub kind: PhaseKind,
    /// Number of requests to run.
    pub requests: u64,
    /// Number of workers.
    pub concurrency: usize,
    /// Master seed from which every worker stream is derived.
    pub seed: u64,
    /// Timeout applied to every request.
    pub request_timeout: Duration,
    /// Upper bound on the duration of the whole phase.
    pub deadline: Duration,
}

/// Number of failed requests by cause.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    /// Responses with a status outside of `200..300`.
    pub status: u64,
    /// Requests that exceeded the request timeout.
    pub timeout: u64,
    /// Requests that failed below HTTP.
    pub transport: u64,
}

impl FailureCounts {
    fn record(&mut self, failure: &Failure) {
        match failure {
            Failure::Status(_) => self.status += 1,
            Failure::Timeout => self.timeout += 1,
            Failure::Transport(_) => self.transport += 1,
        }
    }

    /// Total number of failures.
    pub fn total(&self) -> u64 {
        self.status + self.timeout + self.transport
    }
}

/// Everything collected during one phase.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseResult {
    /// Which phase this is.
    pub kind: PhaseKind,
    /// Time from releasing the first work item until the last outcome was collected.
    pub elapsed: Duration,
    /// Number of successful requests.
    pub success_count: u64,
    /// Number of failed requests.
    pub error_count: u64,
    /// Latencies of successful requests, in completion order.
    ///
    /// Empty for phases that do not record latencies.
    pub latencies: Vec<Duration>,
    /// Failed requests by cause.
    pub failures: FailureCounts,
    /// Total response body bytes of successful requests.
    pub bytes_received: u64,
    /// The query indices each worker executed, in claim order, indexed by worker ordinal.
    pub worker_queries: Vec<Vec<usize>>,
}

impl PhaseResult {
    fn new(kind: PhaseKind, concurrency: usize) -> Self {
        Self {
            kind,
            elapsed: Duration::ZERO,
            success_count: 0,
            error_count: 0,
            latencies: Vec::new(),
            failures: FailureCounts::default(),
            bytes_received: 0,
            worker_queries: vec![Vec::new(); concurrency],
        }
    }

    /// Total number of recorded outcomes.
    pub fn total(&self) -> u64 {
        self.success_count + self.error_count
    }

    fn record(&mut self, completion: Completion) {
        self.worker_queries[completion.worker].push(completion.query_index);

        match completion.outcome.result {
            Ok(response) => {
                self.success_count += 1;
                self.bytes_received += response.bytes;
                if self.kind.records_latencies() {
                    self.latencies.push(completion.outcome.latency);
                }
            }
            Err(failure) => {
                self.error_count += 1;
                self.failures.record(&failure);
            }
        }
    }
}

/// Number of work items worker `ordinal` claims when `requests` items are dealt round-robin to
/// `concurrency` workers. `concurrency` must be at least 1.
pub fn worker_quota(requests: u64, concurrency: usize, ordinal: usize) -> u64 {
    let concurrency = concurrency as u64;
    let ordinal = ordinal as u64;
    requests / concurrency + u64::from(ordinal < requests % concurrency)
}

/// A worker's private stream of query indices.
#[derive(Debug)]
pub struct QueryPicker {
    rng: SeededRng,
    len: usize,
}

impl QueryPicker {
    /// Creates the stream of worker `ordinal` for a phase seeded with `seed`, picking from
    /// `len` queries.
    pub fn new(seed: u64, ordinal: usize, len: usize) -> Self {
        Self {
            rng: seeded_rng(derive_seed(seed, ordinal as u64)),
            len,
        }
    }

    /// Picks the next query index uniformly from `0..len`.
    pub fn next_index(&mut self) -> usize {
        self.rng.random_range(0..self.len)
    }
}

#[derive(Debug)]
struct Completion {
    worker: usize,
    query_index: usize,
    outcome: Outcome,
}

struct Worker {
    ordinal: usize,
    picker: QueryPicker,
    executor: SharedExecutor,
    queries: Arc<[Query]>,
    timeout: Duration,
}

impl Worker {
    async fn run(
        mut self,
        mut work: mpsc::Receiver<u64>,
        completions: mpsc::UnboundedSender<Completion>,
    ) {
        while let Some(_item) = work.recv().await {
            let query_index = self.picker.next_index();
            let query = &self.queries[query_index];
            let outcome = execute_timed(self.executor.as_ref(), query, self.timeout).await;

            let completion = Completion {
                worker: self.ordinal,
                query_index,
                outcome,
            };
            if completions.send(completion).is_err() {
                break;
            }
        }
    }
}

async fn collect(
    mut completions: mpsc::UnboundedReceiver<Completion>,
    mut result: PhaseResult,
    events: Events,
) -> PhaseResult {
    while let Some(completion) = completions.recv().await {
        events.emit(Event::RequestCompleted {
            phase: result.kind,
            success: completion.outcome.is_success(),
        });
        result.record(completion);
    }
    result
}

/// Runs one phase and returns its collected results.
///
/// Failed requests are counted and never abort the phase. The phase fails if work cannot be
/// queued or drained before `params.deadline`, or if a worker task dies.
pub async fn run_phase(
    executor: SharedExecutor,
    queries: Arc<[Query]>,
    params: &PhaseParams,
    events: &Events,
) -> Result<PhaseResult> {
    if queries.is_empty() {
        return Err(Error::EmptyQuerySet);
    }
    if params.concurrency == 0 {
        return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
    }

    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    let mut queues = Vec::with_capacity(params.concurrency);
    let mut workers = JoinSet::new();
    for ordinal in 0..params.concurrency {
        let (work_tx, work_rx) = mpsc::channel::<u64>(1);
        queues.push(work_tx);
        let worker = Worker {
            ordinal,
            picker: QueryPicker::new(params.seed, ordinal, queries.len()),
            executor: Arc::clone(&executor),
            queries: Arc::clone(&queries),
            timeout: params.request_timeout,
        };
        workers.spawn(worker.run(work_rx, completion_tx.clone()));
    }
    drop(completion_tx);

    let collector = tokio::spawn(collect(
        completion_rx,
        PhaseResult::new(params.kind, params.concurrency),
        events.clone(),
    ));

    tracing::debug!(
        phase = %params.kind,
        requests = params.requests,
        concurrency = params.concurrency,
        "starting phase"
    );
    events.emit(Event::PhaseStarted {
        phase: params.kind,
        requests: params.requests,
        concurrency: params.concurrency,
    });

    let start = Instant::now();
    let deadline = start + params.deadline;

    for submitted in 0..params.requests {
        let queue = &queues[(submitted % params.concurrency as u64) as usize];
        match tokio::time::timeout_at(deadline, queue.send(submitted)).await {
            Ok(Ok(())) => {}
            // The worker is gone, joining it below reports why.
            Ok(Err(_)) => break,
            Err(_) => {
                return Err(Error::QueueExhausted {
                    phase: params.kind,
                    deadline: params.deadline,
                    submitted,
                    requests: params.requests,
                });
            }
        }
    }
    drop(queues);

    let drain = async {
        while let Some(joined) = workers.join_next().await {
            joined?;
        }
        Ok::<_, Error>(collector.await?)
    };

    let mut result = match tokio::time::timeout_at(deadline, drain).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(Error::PhaseTimeout {
                phase: params.kind,
                deadline: params.deadline,
            });
        }
    };
    result.elapsed = start.elapsed();

    if result.total() != params.requests {
        return Err(Error::IncompletePhase {
            phase: params.kind,
            recorded: result.total(),
            requests: params.requests,
        });
    }

    tracing::debug!(
        phase = %params.kind,
        elapsed = ?result.elapsed,
        success_count = result.success_count,
        error_count = result.error_count,
        "finished phase"
    );
    events.emit(Event::PhaseFinished {
        phase: params.kind,
        elapsed: result.elapsed,
        success_count: result.success_count,
        error_count: result.error_count,
    });

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};

    use fieldbench_types::Filter;

    use crate::executor::{Executor, Response};

    use super::*;

    /// Answers every query after a fixed delay with a fixed status.
    #[derive(Debug)]
    struct Constant {
        delay: Duration,
        status: u16,
        calls: AtomicU64,
    }

    impl Constant {
        fn shared(delay: Duration, status: u16) -> Arc<Self> {
            Arc::new(Self {
                delay,
                status,
                calls: AtomicU64::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl Executor for Constant {
        async fn preflight(&self) -> Result<()> {
            Ok(())
        }

        async fn execute(&self, _query: &Query) -> Result<Response, Failure> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(self.delay).await;
            Ok(Response {
                status: self.status,
                bytes: 100,
            })
        }
    }

    /// Never answers.
    #[derive(Debug)]
    struct Hanging;

    #[async_trait::async_trait]
    impl Executor for Hanging {
        async fn preflight(&self) -> Result<()> {
            Ok(())
        }

        async fn execute(&self, _query: &Query) -> Result<Response, Failure> {
            std::future::pending().await
        }
    }

    fn queries(count: usize) -> Arc<[Query]> {
        (0..count)
            .map(|i| {
                let filter = Filter {
                    path: "color".into(),
                    value: format!("value-{i}"),
                };
                Query::new("idx", vec![filter]).unwrap()
            })
            .collect()
    }

    fn params(kind: PhaseKind, requests: u64, concurrency: usize, seed: u64) -> PhaseParams {
        PhaseParams {
            kind,
            requests,
            concurrency,
            seed,
            request_timeout: Duration::from_secs(2),
            deadline: Duration::from_secs(600),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_request_is_recorded() {
        for concurrency in [1, 2, 7, 32] {
            for requests in [0, 1, 5, 100] {
                let executor = Constant::shared(Duration::from_millis(3), 200);
                let result = run_phase(
                    executor.clone(),
                    queries(4),
                    &params(PhaseKind::Measurement, requests, concurrency, 1),
                    &Events::none(),
                )
                .await
                .unwrap();

                assert_eq!(result.success_count + result.error_count, requests);
                assert_eq!(result.latencies.len() as u64, requests);
                assert_eq!(executor.calls.load(Ordering::Relaxed), requests);
                assert_eq!(result.worker_queries.len(), concurrency);
                for (ordinal, claimed) in result.worker_queries.iter().enumerate() {
                    let quota = worker_quota(requests, concurrency, ordinal);
                    assert_eq!(claimed.len() as u64, quota);
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_worker_is_reproducible() {
        let run = || async {
            run_phase(
                Constant::shared(Duration::from_millis(1), 200),
                queries(2),
                &params(PhaseKind::Measurement, 3, 1, 42),
                &Events::none(),
            )
            .await
            .unwrap()
        };

        let first = run().await;
        let second = run().await;
        assert_eq!(first.worker_queries[0].len(), 3);
        assert_eq!(first.worker_queries, second.worker_queries);

        let mut picker = QueryPicker::new(42, 0, 2);
        let expected: Vec<_> = (0..3).map(|_| picker.next_index()).collect();
        assert_eq!(first.worker_queries[0], expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn worker_sequences_are_reproducible_across_threads() {
        let run = || async {
            run_phase(
                Constant::shared(Duration::from_millis(1), 200),
                queries(50),
                &params(PhaseKind::Measurement, 400, 8, 42),
                &Events::none(),
            )
            .await
            .unwrap()
        };

        let first = run().await;
        for _ in 0..3 {
            let again = run().await;
            assert_eq!(again.success_count, first.success_count);
            assert_eq!(again.error_count, first.error_count);
            assert_eq!(again.worker_queries, first.worker_queries);
        }

        for (ordinal, claimed) in first.worker_queries.iter().enumerate() {
            let mut picker = QueryPicker::new(42, ordinal, 50);
            let expected: Vec<_> = (0..50).map(|_| picker.next_index()).collect();
            assert_eq!(claimed, &expected);
        }
    }

    #[test]
    fn quotas_cover_every_request() {
        for concurrency in 1..=9 {
            for requests in [0, 1, 7, 8, 9, 100, 401] {
                let quotas: Vec<_> = (0..concurrency)
                    .map(|ordinal| worker_quota(requests, concurrency, ordinal))
                    .collect();
                assert_eq!(quotas.iter().sum::<u64>(), requests);
                let max = quotas.iter().max().copied().unwrap_or(0);
                let min = quotas.iter().min().copied().unwrap_or(0);
                assert!(max - min <= 1);
            }
        }
        assert_eq!(worker_quota(10, 4, 0), 3);
        assert_eq!(worker_quota(10, 4, 1), 3);
        assert_eq!(worker_quota(10, 4, 2), 2);
        assert_eq!(worker_quota(10, 4, 3), 2);
    }

    #[test]
    fn worker_streams_differ() {
        let draw = |ordinal| {
            let mut picker = QueryPicker::new(42, ordinal, 1000);
            (0..20).map(|_| picker.next_index()).collect::<Vec<_>>()
        };
        let streams: HashSet<_> = (0..8).map(draw).collect();
        assert_eq!(streams.len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_counted_not_fatal() {
        let result = run_phase(
            Constant::shared(Duration::from_millis(2), 500),
            queries(3),
            &params(PhaseKind::Measurement, 40, 4, 1),
            &Events::none(),
        )
        .await
        .unwrap();

        assert_eq!(result.success_count, 0);
        assert_eq!(result.error_count, 40);
        assert_eq!(result.failures.status, 40);
        assert!(result.latencies.is_empty());
        assert_eq!(result.bytes_received, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_release_workers() {
        let mut params = params(PhaseKind::Measurement, 10, 2, 1);
        params.request_timeout = Duration::from_millis(50);

        let result = run_phase(Arc::new(Hanging), queries(1), &params, &Events::none())
            .await
            .unwrap();

        assert_eq!(result.error_count, 10);
        assert_eq!(result.failures.timeout, 10);
        // Two workers, five sequential timeouts each.
        assert_eq!(result.elapsed, Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_discards_latencies() {
        let result = run_phase(
            Constant::shared(Duration::from_millis(1), 200),
            queries(3),
            &params(PhaseKind::Warmup, 20, 2, 1),
            &Events::none(),
        )
        .await
        .unwrap();

        assert_eq!(result.success_count, 20);
        assert!(result.latencies.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_queue_is_reported_distinctly() {
        let mut params = params(PhaseKind::Measurement, 100, 1, 1);
        params.request_timeout = Duration::from_secs(3600);
        params.deadline = Duration::from_secs(1);

        let err = run_phase(Arc::new(Hanging), queries(1), &params, &Events::none())
            .await
            .unwrap_err();

        // One item is in flight and one is buffered, the third cannot be queued.
        assert!(matches!(
            err,
            Error::QueueExhausted {
                submitted: 2,
                requests: 100,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_drain_times_out() {
        let mut params = params(PhaseKind::Measurement, 1, 1, 1);
        params.request_timeout = Duration::from_secs(3600);
        params.deadline = Duration::from_secs(1);

        let err = run_phase(Arc::new(Hanging), queries(1), &params, &Events::none())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PhaseTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_invalid_input() {
        let executor = Constant::shared(Duration::ZERO, 200);
        let err = run_phase(
            executor.clone(),
            queries(0),
            &params(PhaseKind::Measurement, 1, 1, 1),
            &Events::none(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::EmptyQuerySet));

        let err = run_phase(
            executor,
            queries(1),
            &params(PhaseKind::Measurement, 1, 0, 1),
            &Events::none(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn emits_phase_boundaries() {
        let (events, mut receiver) = Events::channel();
        run_phase(
            Constant::shared(Duration::from_millis(1), 200),
            queries(1),
            &params(PhaseKind::Warmup, 3, 1, 1),
            &events,
        )
        .await
        .unwrap();
        drop(events);

        let mut received = Vec::new();
        while let Some(event) = receiver.recv().await {
            received.push(event);
        }

        assert!(matches!(
            received.first(),
            Some(Event::PhaseStarted {
                phase: PhaseKind::Warmup,
                requests: 3,
                ..
            })
        ));
        let completed = received
            .iter()
            .filter(|e| matches!(e, Event::RequestCompleted { success: true, .. }))
            .count();
        assert_eq!(completed, 3);
        assert!(matches!(
            received.last(),
            Some(Event::PhaseFinished {
                success_count: 3,
                ..
            })
        ));
    }
}
