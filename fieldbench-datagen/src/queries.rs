//! Generation of paired query sets for the keyword and flattened indices.

use fieldbench_types::{FieldCatalog, FieldLayout, Query, TermsAggregation};
use rand::Rng;

use crate::error::Result;
use crate::seed::seeded_rng;
use crate::selector::{FilterBounds, build_filter_set};

/// Number of buckets requested by aggregations added with [`with_aggregations`].
pub const AGGREGATION_SIZE: u32 = 10;

/// Parameters for [`generate_query_sets`].
#[derive(Clone, Debug)]
pub struct QuerySetParams<'a> {
    /// Target index of the keyword queries.
    pub keyword_index: &'a str,
    /// Target index of the flattened queries.
    pub flattened_index: &'a str,
    /// Number of queries per set.
    pub count: usize,
    /// Bounds on the number of filters per query.
    pub bounds: FilterBounds,
    /// Seed of the selection stream.
    pub seed: u64,
}

/// Two query sets in which the query at each position is the same logical query.
#[derive(Clone, Debug, Default)]
pub struct QuerySets {
    /// Queries against the keyword index.
    pub keyword: Vec<Query>,
    /// Queries against the flattened index, with `data.` prefixed paths.
    pub flattened: Vec<Query>,
}

/// Generates paired query sets.
///
/// Every filter set is drawn once and rendered for both layouts, so the two benchmark targets
/// receive semantically equivalent queries in the same order.
pub fn generate_query_sets(catalog: &FieldCatalog, params: &QuerySetParams<'_>) -> Result<QuerySets> {
    let mut rng = seeded_rng(params.seed);
    let mut sets = QuerySets {
        keyword: Vec::with_capacity(params.count),
        flattened: Vec::with_capacity(params.count),
    };

    for _ in 0..params.count {
        let filters = build_filter_set(catalog, &mut rng, params.bounds);
        sets.keyword
            .push(filters.to_query(params.keyword_index, FieldLayout::Keyword)?);
        sets.flattened
            .push(filters.to_query(params.flattened_index, FieldLayout::Flattened)?);
    }

    tracing::debug!(
        count = params.count,
        min_filters = params.bounds.min(),
        max_filters = params.bounds.max(),
        "generated query sets"
    );

    Ok(sets)
}

/// Returns copies of `queries` that each aggregate on one of their own filter paths.
///
/// The path is chosen uniformly from the query's filters with a stream seeded from `seed`. The
/// input queries are not modified.
pub fn with_aggregations(queries: &[Query], seed: u64) -> Vec<Query> {
    let mut rng = seeded_rng(seed);
    queries
        .iter()
        .map(|query| {
            let filters = query.filters();
            let filter = &filters[rng.random_range(0..filters.len())];
            query.with_aggregation(TermsAggregation {
                path: filter.path.clone(),
                size: AGGREGATION_SIZE,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use fieldbench_types::Field;

    use super::*;

    fn catalog() -> FieldCatalog {
        let fields = ["brand", "color", "material", "region", "size", "tier"]
            .into_iter()
            .map(|name| Field::new(name, (0..10).map(|i| format!("{name}-{i}"))).unwrap())
            .collect();
        FieldCatalog::new(fields).unwrap()
    }

    fn params(bounds: FilterBounds) -> QuerySetParams<'static> {
        QuerySetParams {
            keyword_index: "bench_keyword",
            flattened_index: "bench_flattened",
            count: 500,
            bounds,
            seed: 42,
        }
    }

    #[test]
    fn sets_are_paired() {
        let catalog = catalog();
        let bounds = FilterBounds::new(1, 5, &catalog).unwrap();
        let sets = generate_query_sets(&catalog, &params(bounds)).unwrap();

        assert_eq!(sets.keyword.len(), 500);
        assert_eq!(sets.flattened.len(), 500);

        for (kw, flat) in sets.keyword.iter().zip(&sets.flattened) {
            assert_eq!(kw.index(), "bench_keyword");
            assert_eq!(flat.index(), "bench_flattened");
            assert!((1..=5).contains(&kw.filters().len()));

            for (k, f) in kw.filters().iter().zip(flat.filters()) {
                assert_eq!(f.path, FieldLayout::Flattened.path(&k.path));
                assert_eq!(f.value, k.value);
            }
        }
    }

    #[test]
    fn generation_is_reproducible() {
        let catalog = catalog();
        let bounds = FilterBounds::new(1, 3, &catalog).unwrap();

        let a = generate_query_sets(&catalog, &params(bounds)).unwrap();
        let b = generate_query_sets(&catalog, &params(bounds)).unwrap();
        assert_eq!(a.keyword, b.keyword);
        assert_eq!(a.flattened, b.flattened);
    }

    #[test]
    fn aggregations_use_own_filter_paths() {
        let catalog = catalog();
        let bounds = FilterBounds::new(1, 5, &catalog).unwrap();
        let sets = generate_query_sets(&catalog, &params(bounds)).unwrap();

        let aggregated = with_aggregations(&sets.flattened, 42);
        assert_eq!(aggregated.len(), sets.flattened.len());

        for (original, query) in sets.flattened.iter().zip(&aggregated) {
            assert!(original.aggregation().is_none());
            let aggregation = query.aggregation().unwrap();
            assert_eq!(aggregation.size, AGGREGATION_SIZE);
            assert!(aggregation.path.starts_with("data."));
            assert!(original.filters().iter().any(|f| f.path == aggregation.path));
        }

        assert_eq!(with_aggregations(&sets.flattened, 42), aggregated);
    }
}
