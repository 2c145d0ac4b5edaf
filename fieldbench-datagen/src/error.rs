use fieldbench_types::QueryError;

/// Errors that can occur while generating benchmark data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The filter bounds do not fit the catalog.
    #[error("invalid filter bounds {min}..={max} for a catalog with {fields} fields")]
    InvalidBounds {
        /// Requested minimum number of filters.
        min: usize,
        /// Requested maximum number of filters.
        max: usize,
        /// Number of fields in the catalog.
        fields: usize,
    },
    /// A generated query failed validation.
    #[error("invalid query: {0}")]
    Query(#[from] QueryError),
    /// An I/O error while reading or writing generated files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A line of a generated file is not valid JSON.
    #[error("malformed JSON on line {line}: {source}")]
    Json {
        /// One-based line number.
        line: usize,
        /// The underlying parse error.
        source: serde_json::Error,
    },
    /// A bulk file does not follow the header plus action/document layout.
    #[error("malformed bulk file: {0}")]
    MalformedBulk(String),
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
