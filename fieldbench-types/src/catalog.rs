//! The field catalog: benchmark fields and their ranked candidate values.
//!
//! A catalog is persisted as a JSON object mapping every field name to an array of candidate
//! values:
//!
//! ```json
//! {
//!   "color": ["red", "green", "blue", "black", "white"],
//!   "region": ["eu", "us", "apac", "latam", "mea", "anz"]
//! }
//! ```
//!
//! The position of a value in its array is its *rank*, which drives how often the value is
//! sampled. Fields are kept sorted by name so that iteration order never depends on the layout
//! of the source file.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::query::FieldLayout;

/// Allowed number of candidate values per field.
pub const VALUES_PER_FIELD: RangeInclusive<usize> = 5..=50;

/// Name of the document identifier field, present in both layouts.
pub const ID_FIELD: &str = "id";

/// Field names the generated documents use themselves and a catalog may not declare.
pub const RESERVED_NAMES: [&str; 2] = [ID_FIELD, FieldLayout::FLATTENED_FIELD];

/// Errors raised while loading or validating a [`FieldCatalog`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file is not a JSON object of string arrays.
    #[error("failed to parse field catalog: {0}")]
    Parse(#[from] serde_json::Error),
    /// The catalog does not contain any field.
    #[error("field catalog is empty")]
    Empty,
    /// A field has an empty name.
    #[error("field catalog contains a field with an empty name")]
    EmptyName,
    /// A field uses a name reserved for document structure.
    #[error("field name `{0}` is reserved")]
    ReservedName(String),
    /// A field has too few or too many candidate values.
    #[error("field `{field}` has {count} values, expected between 5 and 50")]
    ValueCount {
        /// Name of the offending field.
        field: String,
        /// Number of values found.
        count: usize,
    },
    /// A field lists the same value twice.
    #[error("field `{field}` contains duplicate value `{value}`")]
    DuplicateValue {
        /// Name of the offending field.
        field: String,
        /// The repeated value.
        value: String,
    },
}

/// A single benchmark field and its candidate values in rank order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    name: String,
    values: Vec<String>,
}

impl Field {
    /// Creates and validates a field.
    ///
    /// The field must have between 5 and 50 unique values and a name outside of
    /// [`RESERVED_NAMES`].
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldbench_types::Field;
    ///
    /// let field = Field::new("color", ["red", "green", "blue", "black", "white"]).unwrap();
    /// assert_eq!(field.values()[0], "red");
    ///
    /// // Too few values are rejected.
    /// assert!(Field::new("color", ["red"]).is_err());
    /// ```
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = name.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();

        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(CatalogError::ReservedName(name));
        }
        if !VALUES_PER_FIELD.contains(&values.len()) {
            return Err(CatalogError::ValueCount {
                field: name,
                count: values.len(),
            });
        }

        let mut seen = HashSet::with_capacity(values.len());
        for value in &values {
            if !seen.insert(value.as_str()) {
                return Err(CatalogError::DuplicateValue {
                    field: name,
                    value: value.clone(),
                });
            }
        }

        Ok(Self { name, values })
    }

    /// Returns the name of the field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the candidate values, ordered by rank.
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// An immutable, validated collection of [`Field`]s sorted by name.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct FieldCatalog {
    fields: Vec<Field>,
}

impl FieldCatalog {
    /// Builds a catalog from already validated fields.
    ///
    /// Fields are sorted by name. Returns [`CatalogError::Empty`] if no field is given.
    pub fn new(mut fields: Vec<Field>) -> Result<Self, CatalogError> {
        if fields.is_empty() {
            return Err(CatalogError::Empty);
        }
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { fields })
    }

    /// Parses and validates a catalog from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses and validates a catalog from a reader yielding JSON.
    pub fn from_reader(reader: impl Read) -> Result<Self, CatalogError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Returns all fields sorted by name.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field with the given name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields
            .binary_search_by(|field| field.name.as_str().cmp(name))
            .ok()
            .map(|index| &self.fields[index])
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always `false`, a catalog holds at least one field.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for FieldCatalog {
    type Error = CatalogError;

    fn try_from(map: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        let fields = map
            .into_iter()
            .map(|(name, values)| Field::new(name, values))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields)
    }
}

impl From<FieldCatalog> for BTreeMap<String, Vec<String>> {
    fn from(catalog: FieldCatalog) -> Self {
        catalog
            .fields
            .into_iter()
            .map(|field| (field.name, field.values))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("v{i}")).collect()
    }

    #[test]
    fn parses_and_sorts_fields() {
        let json = r#"{
            "region": ["eu", "us", "apac", "latam", "mea"],
            "color": ["red", "green", "blue", "black", "white", "pink"]
        }"#;

        let catalog = FieldCatalog::from_json(json).unwrap();
        let names: Vec<_> = catalog.fields().iter().map(Field::name).collect();
        assert_eq!(names, ["color", "region"]);

        // Rank order within a field is preserved.
        let color = catalog.get("color").unwrap();
        assert_eq!(color.values()[0], "red");
        assert_eq!(color.values()[5], "pink");
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn rejects_value_count_out_of_range() {
        let err = Field::new("small", values(4)).unwrap_err();
        assert!(matches!(err, CatalogError::ValueCount { count: 4, .. }));

        let err = Field::new("large", values(51)).unwrap_err();
        assert!(matches!(err, CatalogError::ValueCount { count: 51, .. }));

        assert!(Field::new("lower", values(5)).is_ok());
        assert!(Field::new("upper", values(50)).is_ok());
    }

    #[test]
    fn rejects_duplicates() {
        let err = Field::new("dup", ["a", "b", "c", "b", "e"]).unwrap_err();
        match err {
            CatalogError::DuplicateValue { field, value } => {
                assert_eq!(field, "dup");
                assert_eq!(value, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_reserved_names() {
        for name in ["id", "data"] {
            let err = Field::new(name, values(5)).unwrap_err();
            assert!(matches!(err, CatalogError::ReservedName(ref n) if n == name));
        }
        assert!(Field::new("identifier", values(5)).is_ok());

        let err = FieldCatalog::from_json(
            r#"{"id": ["a", "b", "c", "d", "e"], "color": ["r", "g", "b", "k", "w"]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("field name `id` is reserved"));
    }

    #[test]
    fn rejects_empty_catalog() {
        let err = FieldCatalog::from_json("{}").unwrap_err();
        // serde wraps the conversion error into its own error type.
        assert!(err.to_string().contains("field catalog is empty"));
    }

    #[test]
    fn reads_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"size": ["xs", "s", "m", "l", "xl"]}"#)
            .unwrap();

        let reader = std::fs::File::open(file.path()).unwrap();
        let catalog = FieldCatalog::from_reader(reader).unwrap();
        assert_eq!(catalog.len(), 1);
    }
}
