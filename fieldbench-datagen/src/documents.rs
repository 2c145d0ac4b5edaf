//! Index mappings and synthetic documents for both field layouts.

use std::collections::BTreeMap;

use fieldbench_types::{FieldCatalog, FieldLayout};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sampler::FieldSampler;

pub use fieldbench_types::catalog::ID_FIELD;

/// Returns the identifier of the document with the given one-based ordinal.
///
/// ```
/// assert_eq!(fieldbench_datagen::documents::document_id(7), "doc-000007");
/// ```
pub fn document_id(ordinal: u64) -> String {
    format!("doc-{ordinal:06}")
}

/// Everything needed to create a benchmark index.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct IndexPayload {
    /// Name of the index.
    pub index: String,
    /// Index settings.
    pub settings: IndexSettings,
    /// Field mappings.
    pub mappings: Mappings,
}

/// Shard layout of a benchmark index.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct IndexSettings {
    /// Number of primary shards.
    pub number_of_shards: u32,
    /// Number of replicas per shard.
    pub number_of_replicas: u32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 1,
        }
    }
}

/// Static mappings of a benchmark index.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Mappings {
    /// Whether unmapped fields are indexed dynamically. Always `false` for benchmarks.
    pub dynamic: bool,
    /// Mapped fields by name.
    pub properties: BTreeMap<String, FieldMapping>,
}

/// The mapping of a single field.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldMapping {
    /// The field type, such as `keyword` or `flattened`.
    #[serde(rename = "type")]
    pub ty: String,
}

impl FieldMapping {
    fn of(ty: &str) -> Self {
        Self { ty: ty.to_owned() }
    }
}

impl IndexPayload {
    /// Builds the index payload for `catalog` in the given layout.
    ///
    /// In the keyword layout, every catalog field becomes a `keyword` field. In the flattened
    /// layout, all catalog fields live in a single `flattened` field.
    pub fn new(index: impl Into<String>, layout: FieldLayout, catalog: &FieldCatalog) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(ID_FIELD.to_owned(), FieldMapping::of("keyword"));

        match layout {
            FieldLayout::Keyword => {
                for field in catalog.fields() {
                    properties.insert(field.name().to_owned(), FieldMapping::of("keyword"));
                }
            }
            FieldLayout::Flattened => {
                properties.insert(
                    FieldLayout::FLATTENED_FIELD.to_owned(),
                    FieldMapping::of("flattened"),
                );
            }
        }

        Self {
            index: index.into(),
            settings: IndexSettings::default(),
            mappings: Mappings {
                dynamic: false,
                properties,
            },
        }
    }
}

/// Generates synthetic documents with one sampled value per catalog field.
///
/// Each field draws from its own stream derived from the seed, so generators for both layouts
/// with the same seed produce the same logical documents.
#[derive(Debug)]
pub struct DocumentGenerator<'c> {
    layout: FieldLayout,
    samplers: Vec<FieldSampler<'c>>,
    next_ordinal: u64,
}

impl<'c> DocumentGenerator<'c> {
    /// Creates a generator for the given layout.
    pub fn new(catalog: &'c FieldCatalog, layout: FieldLayout, seed: u64) -> Self {
        Self {
            layout,
            samplers: FieldSampler::for_catalog(catalog, seed),
            next_ordinal: 1,
        }
    }

    /// Generates the next document, returning its identifier and source.
    pub fn next_document(&mut self) -> (String, Value) {
        let id = document_id(self.next_ordinal);
        self.next_ordinal += 1;

        let values: Map<String, Value> = self
            .samplers
            .iter_mut()
            .map(|sampler| {
                let name = sampler.field().name().to_owned();
                (name, Value::from(sampler.next_value()))
            })
            .collect();

        let mut document = Map::new();
        document.insert(ID_FIELD.to_owned(), Value::from(id.clone()));
        match self.layout {
            FieldLayout::Keyword => document.extend(values),
            FieldLayout::Flattened => {
                document.insert(FieldLayout::FLATTENED_FIELD.to_owned(), Value::Object(values));
            }
        }

        (id, Value::Object(document))
    }
}

#[cfg(test)]
mod tests {
    use fieldbench_types::Field;
    use serde_json::json;

    use super::*;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(vec![
            Field::new("color", ["red", "green", "blue", "black", "white"]).unwrap(),
            Field::new("size", ["xs", "s", "m", "l", "xl", "xxl"]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn keyword_payload() {
        let payload = IndexPayload::new("kw", FieldLayout::Keyword, &catalog());
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "index": "kw",
                "settings": { "number_of_shards": 1, "number_of_replicas": 1 },
                "mappings": {
                    "dynamic": false,
                    "properties": {
                        "color": { "type": "keyword" },
                        "id": { "type": "keyword" },
                        "size": { "type": "keyword" },
                    }
                }
            })
        );
    }

    #[test]
    fn flattened_payload() {
        let payload = IndexPayload::new("flat", FieldLayout::Flattened, &catalog());
        let properties = &payload.mappings.properties;
        assert_eq!(properties.len(), 2);
        assert_eq!(properties["data"].ty, "flattened");
        assert_eq!(properties["id"].ty, "keyword");
    }

    #[test]
    fn layouts_produce_the_same_logical_documents() {
        let catalog = catalog();
        let mut keyword = DocumentGenerator::new(&catalog, FieldLayout::Keyword, 42);
        let mut flattened = DocumentGenerator::new(&catalog, FieldLayout::Flattened, 42);

        for ordinal in 1..=100 {
            let (kw_id, kw_doc) = keyword.next_document();
            let (flat_id, flat_doc) = flattened.next_document();

            assert_eq!(kw_id, document_id(ordinal));
            assert_eq!(kw_id, flat_id);
            assert_eq!(kw_doc["id"], flat_doc["id"]);
            assert_eq!(kw_doc["color"], flat_doc["data"]["color"]);
            assert_eq!(kw_doc["size"], flat_doc["data"]["size"]);
        }
    }
}
