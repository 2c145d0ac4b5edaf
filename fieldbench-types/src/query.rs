//! Filter-only search queries and their persisted representation.
//!
//! A [`Query`] targets one index and carries a list of exact-match [`Filter`]s. On disk and on
//! the wire, a query is stored together with its search body:
//!
//! ```json
//! {
//!   "index": "bench_flattened",
//!   "body": {
//!     "track_total_hits": false,
//!     "query": { "bool": { "filter": [ { "term": { "data.color": "red" } } ] } }
//!   }
//! }
//! ```
//!
//! Loading a persisted query parses the filters back out of the body, so a query set written by
//! the generator can be read, transformed and re-serialized without loss.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the aggregation added by [`Query::with_aggregation`].
const AGGREGATION_NAME: &str = "field_values";

/// Errors raised when constructing or loading a [`Query`].
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The query does not name a target index.
    #[error("query has an empty target index")]
    EmptyIndex,
    /// The query has no filters.
    #[error("query has no filters")]
    NoFilters,
    /// The same field path is filtered twice.
    #[error("query filters `{0}` more than once")]
    DuplicateFilter(String),
    /// A `term` clause does not contain exactly one field.
    #[error("term clause must contain exactly one field, found {0}")]
    MalformedTerm(usize),
}

/// How catalog fields are laid out in the indexed documents.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldLayout {
    /// Every field is an explicit top-level `keyword` field.
    #[default]
    Keyword,
    /// All fields are packed into one `flattened` field named `data`.
    Flattened,
}

impl FieldLayout {
    /// Name of the packed field in the [`FieldLayout::Flattened`] layout.
    pub const FLATTENED_FIELD: &'static str = "data";

    /// Returns the document path under which a catalog field is indexed.
    ///
    /// ```
    /// use fieldbench_types::FieldLayout;
    ///
    /// assert_eq!(FieldLayout::Keyword.path("color"), "color");
    /// assert_eq!(FieldLayout::Flattened.path("color"), "data.color");
    /// ```
    pub fn path(self, field: &str) -> String {
        match self {
            FieldLayout::Keyword => field.to_owned(),
            FieldLayout::Flattened => format!("{}.{field}", Self::FLATTENED_FIELD),
        }
    }

    /// Returns the name of this layout as used in configuration and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldLayout::Keyword => "keyword",
            FieldLayout::Flattened => "flattened",
        }
    }
}

impl fmt::Display for FieldLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`FieldLayout`] from a string.
#[derive(Clone, Debug, thiserror::Error)]
#[error(r#"error parsing "{0}" as layout: expected one of "keyword", "flattened""#)]
pub struct LayoutParseError(String);

impl FromStr for FieldLayout {
    type Err = LayoutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("keyword") => Ok(FieldLayout::Keyword),
            s if s.eq_ignore_ascii_case("flattened") => Ok(FieldLayout::Flattened),
            s => Err(LayoutParseError(s.to_owned())),
        }
    }
}

/// An exact-match filter on one document path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Filter {
    /// The full document path, including any layout prefix.
    pub path: String,
    /// The value the path must equal.
    pub value: String,
}

/// A `terms` aggregation bucketing the results by one document path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermsAggregation {
    /// The full document path to aggregate on.
    pub path: String,
    /// Number of buckets to return.
    pub size: u32,
}

/// An immutable filter-only search query against one index.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "QueryRecord", into = "QueryRecord")]
pub struct Query {
    index: String,
    filters: Vec<Filter>,
    aggregation: Option<TermsAggregation>,
}

impl Query {
    /// Creates and validates a query.
    ///
    /// The index must be non-empty, and there must be at least one filter. Every path may only be
    /// filtered once.
    pub fn new(index: impl Into<String>, filters: Vec<Filter>) -> Result<Self, QueryError> {
        let index = index.into();
        if index.is_empty() {
            return Err(QueryError::EmptyIndex);
        }
        if filters.is_empty() {
            return Err(QueryError::NoFilters);
        }

        let mut seen = HashSet::with_capacity(filters.len());
        for filter in &filters {
            if !seen.insert(filter.path.as_str()) {
                return Err(QueryError::DuplicateFilter(filter.path.clone()));
            }
        }

        Ok(Self {
            index,
            filters,
            aggregation: None,
        })
    }

    /// Returns the target index.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Returns the filters in the order they are sent.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Returns the aggregation attached to this query, if any.
    pub fn aggregation(&self) -> Option<&TermsAggregation> {
        self.aggregation.as_ref()
    }

    /// Returns a copy of this query that additionally requests the given aggregation.
    ///
    /// An aggregation already present on this query is replaced in the copy. `self` is left
    /// untouched.
    pub fn with_aggregation(&self, aggregation: TermsAggregation) -> Self {
        Self {
            index: self.index.clone(),
            filters: self.filters.clone(),
            aggregation: Some(aggregation),
        }
    }

    /// Builds the search request body for this query.
    pub fn to_body(&self) -> SearchBody {
        let filter = self
            .filters
            .iter()
            .map(|filter| TermClause {
                term: BTreeMap::from([(filter.path.clone(), filter.value.clone())]),
            })
            .collect();

        let aggs = self.aggregation.as_ref().map(|aggregation| {
            BTreeMap::from([(
                AGGREGATION_NAME.to_owned(),
                AggregationClause {
                    terms: TermsClause {
                        field: aggregation.path.clone(),
                        size: aggregation.size,
                    },
                },
            )])
        });

        SearchBody {
            track_total_hits: false,
            query: QueryClause {
                bool: BoolClause { filter },
            },
            aggs,
        }
    }
}

/// The persisted form of a [`Query`]: its target index and search body.
#[derive(Debug, Deserialize, Serialize)]
struct QueryRecord {
    index: String,
    body: SearchBody,
}

/// The JSON body of a filter-only search request.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SearchBody {
    #[serde(default)]
    track_total_hits: bool,
    query: QueryClause,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aggs: Option<BTreeMap<String, AggregationClause>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
struct QueryClause {
    bool: BoolClause,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
struct BoolClause {
    filter: Vec<TermClause>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
struct TermClause {
    term: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
struct AggregationClause {
    terms: TermsClause,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
struct TermsClause {
    field: String,
    size: u32,
}

impl TryFrom<QueryRecord> for Query {
    type Error = QueryError;

    fn try_from(record: QueryRecord) -> Result<Self, Self::Error> {
        let filters = record
            .body
            .query
            .bool
            .filter
            .into_iter()
            .map(|clause| {
                let found = clause.term.len();
                let mut term = clause.term.into_iter();
                match (term.next(), term.next()) {
                    (Some((path, value)), None) => Ok(Filter { path, value }),
                    _ => Err(QueryError::MalformedTerm(found)),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut query = Query::new(record.index, filters)?;
        query.aggregation = record
            .body
            .aggs
            .and_then(|mut aggs| aggs.remove(AGGREGATION_NAME))
            .map(|clause| TermsAggregation {
                path: clause.terms.field,
                size: clause.terms.size,
            });

        Ok(query)
    }
}

impl From<Query> for QueryRecord {
    fn from(query: Query) -> Self {
        let body = query.to_body();
        QueryRecord {
            index: query.index,
            body,
        }
    }
}
