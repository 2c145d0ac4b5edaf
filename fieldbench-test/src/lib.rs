//! Test utilities for fieldbench and its load generator.
//!
//! This crate provides utilities to facilitate testing against a search service without running
//! one. See the modules for all available utilities.

pub mod server;
pub mod tracing;
