//! Selection of filter sets for synthetic queries.

use fieldbench_types::{Field, FieldCatalog, FieldLayout, Filter, Query, QueryError};
use rand::Rng;
use rand::seq::index;

use crate::error::{Error, Result};
use crate::sampler;

/// Inclusive bounds on the number of filters per query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterBounds {
    min: usize,
    max: usize,
}

impl FilterBounds {
    /// Validates the bounds against a catalog.
    ///
    /// `min` must be at least 1, not exceed `max`, and `max` must not exceed the number of fields
    /// in the catalog, since a query filters every field at most once.
    pub fn new(min: usize, max: usize, catalog: &FieldCatalog) -> Result<Self> {
        if min == 0 || min > max || max > catalog.len() {
            return Err(Error::InvalidBounds {
                min,
                max,
                fields: catalog.len(),
            });
        }
        Ok(Self { min, max })
    }

    /// The smallest number of filters.
    pub fn min(&self) -> usize {
        self.min
    }

    /// The largest number of filters.
    pub fn max(&self) -> usize {
        self.max
    }
}

/// A set of distinct catalog fields, each paired with one sampled value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterSet<'c> {
    entries: Vec<(&'c Field, &'c str)>,
}

impl<'c> FilterSet<'c> {
    /// Returns the selected fields and values in selection order.
    pub fn entries(&self) -> &[(&'c Field, &'c str)] {
        &self.entries
    }

    /// Returns the number of filters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no field was selected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the filter set as a query against `index`, with paths mapped by `layout`.
    ///
    /// Two renderings of the same set with different layouts are the same logical query.
    pub fn to_query(&self, index: &str, layout: FieldLayout) -> Result<Query, QueryError> {
        let filters = self
            .entries
            .iter()
            .map(|(field, value)| Filter {
                path: layout.path(field.name()),
                value: (*value).to_owned(),
            })
            .collect();
        Query::new(index, filters)
    }
}

/// Builds a random filter set.
///
/// The number of filters is drawn uniformly from `bounds`. That many distinct fields are chosen
/// without replacement, and one value is drawn for each with the skewed-rank sampler. All
/// decisions consume the given stream.
pub fn build_filter_set<'c, R: Rng + ?Sized>(
    catalog: &'c FieldCatalog,
    rng: &mut R,
    bounds: FilterBounds,
) -> FilterSet<'c> {
    let count = rng.random_range(bounds.min..=bounds.max);
    let fields = catalog.fields();

    let entries = index::sample(rng, fields.len(), count)
        .into_iter()
        .map(|i| {
            let field = &fields[i];
            (field, sampler::sample(field, rng))
        })
        .collect();

    FilterSet { entries }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::seed::seeded_rng;

    use super::*;

    fn catalog(fields: usize) -> FieldCatalog {
        let fields = (0..fields)
            .map(|f| Field::new(format!("field_{f:02}"), (0..8).map(|v| format!("{f}-{v}"))).unwrap())
            .collect();
        FieldCatalog::new(fields).unwrap()
    }

    #[test]
    fn bounds_are_validated() {
        let catalog = catalog(3);
        assert!(FilterBounds::new(1, 3, &catalog).is_ok());
        assert!(FilterBounds::new(0, 3, &catalog).is_err());
        assert!(FilterBounds::new(3, 2, &catalog).is_err());
        assert!(matches!(
            FilterBounds::new(1, 5, &catalog),
            Err(Error::InvalidBounds { fields: 3, .. })
        ));
    }

    #[test]
    fn filter_sets_respect_bounds_and_uniqueness() {
        let catalog = catalog(20);
        let bounds = FilterBounds::new(1, 5, &catalog).unwrap();
        let mut rng = seeded_rng(42);
        let mut lengths = HashSet::new();

        for _ in 0..2_000 {
            let set = build_filter_set(&catalog, &mut rng, bounds);
            assert!((1..=5).contains(&set.len()));
            lengths.insert(set.len());

            let names: HashSet<_> = set.entries().iter().map(|(f, _)| f.name()).collect();
            assert_eq!(names.len(), set.len(), "fields must be distinct");

            for (field, value) in set.entries() {
                assert!(field.values().iter().any(|v| v == value));
            }
        }

        // Both ends of the range are reachable.
        assert_eq!(lengths, (1..=5).collect());
    }

    #[test]
    fn layouts_render_the_same_logical_query() {
        let catalog = catalog(6);
        let bounds = FilterBounds::new(2, 4, &catalog).unwrap();
        let set = build_filter_set(&catalog, &mut seeded_rng(5), bounds);

        let keyword = set.to_query("kw", FieldLayout::Keyword).unwrap();
        let flattened = set.to_query("flat", FieldLayout::Flattened).unwrap();

        assert_eq!(keyword.filters().len(), flattened.filters().len());
        for (k, f) in keyword.filters().iter().zip(flattened.filters()) {
            assert_eq!(f.path, format!("data.{}", k.path));
            assert_eq!(f.value, k.value);
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let catalog = catalog(10);
        let bounds = FilterBounds::new(1, 5, &catalog).unwrap();

        let run = |seed| {
            let mut rng = seeded_rng(seed);
            (0..100)
                .map(|_| build_filter_set(&catalog, &mut rng, bounds))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(11), run(11));
    }
}
