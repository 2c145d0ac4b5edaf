//! Deterministic generation of benchmark data and queries.
//!
//! Documents and queries are both driven by the *skewed-rank sampler* in [`sampler`]: the first
//! three values of every field take 60% of the probability mass, and the remaining values share
//! the rest with geometrically decaying weights. This models real-world attribute data with a few
//! dominant values and a long tail.
//!
//! All randomness comes from seeded streams (see [`seed`]), so that two independent runs with
//! the same seed, for example the keyword and flattened bulk files, produce the same logical
//! documents and queries.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod bulk;
pub mod documents;
mod error;
pub mod queries;
pub mod sampler;
pub mod seed;
pub mod selector;

pub use crate::error::{Error, Result};
