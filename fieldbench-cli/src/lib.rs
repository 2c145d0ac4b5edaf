//! The `fieldbench` command line tool.
//!
//! Compares two ways of modeling sparse, low-cardinality metadata in a search engine: one
//! `keyword` field per attribute, or a single `flattened` field holding all attributes. The tool
//! generates matching data and query sets for both layouts, loads the data, and benchmarks the
//! query sets with [`loadtest`].
//!
//! All commands share one [`config::Config`], loaded from an optional YAML file and `FB__`
//! environment variables.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod benchmark;
pub mod cli;
pub mod config;
pub mod generate;
pub mod healthcheck;
pub mod indexer;
pub mod observability;
pub mod report;
