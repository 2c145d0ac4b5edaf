use std::time::Duration;

use crate::phase::PhaseKind;

/// Fatal errors that abort a benchmark.
///
/// Failures of individual requests are not errors; they are counted in the phase results.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The benchmark parameters are invalid.
    #[error("invalid benchmark configuration: {0}")]
    InvalidConfig(String),

    /// There are no queries to run.
    #[error("the query set is empty")]
    EmptyQuerySet,

    /// The target service could not be reached before the benchmark started.
    #[error("preflight check against {url} failed: {reason}")]
    Preflight {
        /// The URL that was checked.
        url: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Work items could not be handed to the workers before the phase deadline.
    #[error(
        "{phase} phase could not queue work within {deadline:?}: {submitted} of {requests} items submitted"
    )]
    QueueExhausted {
        /// The phase that was running.
        phase: PhaseKind,
        /// The phase deadline.
        deadline: Duration,
        /// Number of items handed to workers.
        submitted: u64,
        /// Number of items the phase should have run.
        requests: u64,
    },

    /// All work was queued, but the workers did not drain it before the phase deadline.
    #[error("{phase} phase did not finish within {deadline:?}")]
    PhaseTimeout {
        /// The phase that was running.
        phase: PhaseKind,
        /// The phase deadline.
        deadline: Duration,
    },

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// The number of recorded outcomes does not match the submitted work.
    #[error("{phase} phase recorded {recorded} outcomes for {requests} requests")]
    IncompletePhase {
        /// The phase that was running.
        phase: PhaseKind,
        /// Number of outcomes collected.
        recorded: u64,
        /// Number of items submitted.
        requests: u64,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
