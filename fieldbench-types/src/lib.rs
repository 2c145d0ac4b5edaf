//! Shared records for the fieldbench tools.
//!
//! This crate contains the types passed between data generation, persistence and the load test:
//!
//!  - [`FieldCatalog`] holds the ranked candidate values of every benchmark field.
//!  - [`Query`] is one filter-only search request against a target index.
//!  - [`FieldLayout`] decides how a logical field name maps to a document path.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod catalog;
pub mod query;

pub use catalog::{CatalogError, Field, FieldCatalog};
pub use query::{FieldLayout, Filter, Query, QueryError, TermsAggregation};
