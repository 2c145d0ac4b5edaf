//! Execution of single queries against the target service.
//!
//! An [`Executor`] performs one request and reports the raw response. [`execute_timed`] wraps it
//! with the per-request timeout, measures latency and classifies the result into an [`Outcome`].

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use fieldbench_types::Query;
use tokio::time::Instant;

use crate::error::Result;

/// A type-erased, shareable [`Executor`] instance.
pub type SharedExecutor = Arc<dyn Executor>;

/// Performs requests against the service under test.
#[async_trait::async_trait]
pub trait Executor: Debug + Send + Sync + 'static {
    /// Checks that the service is reachable before any phase starts.
    ///
    /// An error here aborts the whole benchmark.
    async fn preflight(&self) -> Result<()>;

    /// Runs one query and fully consumes the response body.
    ///
    /// Any HTTP status is returned as a [`Response`]; only transport-level problems yield a
    /// [`Failure`]. Dropping the returned future must cancel the request.
    async fn execute(&self, query: &Query) -> Result<Response, Failure>;
}

/// The status and body size of a completed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Response {
    /// The HTTP status code.
    pub status: u16,
    /// Number of body bytes read.
    pub bytes: u64,
}

impl Response {
    /// Returns `true` for statuses in `200..300`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a single request did not succeed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// The service answered with a status outside of `200..300`.
    #[error("unexpected status {0}")]
    Status(u16),
    /// The request did not complete within the request timeout.
    #[error("request timed out")]
    Timeout,
    /// The request failed below HTTP, for example with a refused connection.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The classified result of one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Wall-clock time from issuing the request until its body was consumed or it failed.
    pub latency: Duration,
    /// The successful response, or why the request failed.
    pub result: Result<Response, Failure>,
}

impl Outcome {
    /// Returns `true` if the request succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Executes `query` with a timeout and classifies the result.
///
/// Latency is measured from immediately before the request until the executor returns, which
/// includes reading the full response body. On timeout, the in-flight request is dropped and
/// thereby cancelled.
pub async fn execute_timed(executor: &dyn Executor, query: &Query, timeout: Duration) -> Outcome {
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, executor.execute(query)).await;
    let latency = start.elapsed();

    let result = match result {
        Ok(Ok(response)) if response.is_success() => Ok(response),
        Ok(Ok(response)) => Err(Failure::Status(response.status)),
        Ok(Err(failure)) => Err(failure),
        Err(_elapsed) => Err(Failure::Timeout),
    };

    Outcome { latency, result }
}
