//! Concurrent load generation against a search service.
//!
//! A [`Benchmark`] first checks that the target is reachable, then runs a warmup [phase] whose
//! results are discarded, and finally a measured phase. Each phase drives a fixed number of
//! requests through a fixed-size pool of workers. Workers pick queries uniformly at random from
//! an immutable query set using their own seeded random stream and claim a fixed share of the
//! work, so per-worker sequences are reproducible for a given master seed and concurrency.
//!
//! Requests go through an [`Executor`]. [`HttpExecutor`] talks to an Elasticsearch-compatible
//! HTTP API; tests substitute their own implementations. Failed requests never abort a phase;
//! they are counted and reported in the resulting [`stats::Summary`].
//!
//! Progress is reported through [`Events`] so that callers can render it.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod bench;
mod error;
pub mod events;
pub mod executor;
pub mod http;
pub mod phase;
pub mod stats;

pub use crate::bench::{Benchmark, BenchmarkConfig, BenchmarkResult, State};
pub use crate::error::{Error, Result};
pub use crate::events::{Event, Events};
pub use crate::executor::{Executor, Failure, Outcome, Response, SharedExecutor};
pub use crate::http::{Credentials, HttpExecutor};
