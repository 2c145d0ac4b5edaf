//! Generation of bulk files and query sets from a field catalog.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use fieldbench_datagen::bulk::{expected_lines, write_bulk};
use fieldbench_datagen::documents::{DocumentGenerator, IndexPayload};
use fieldbench_datagen::queries::{QuerySetParams, generate_query_sets};
use fieldbench_datagen::selector::FilterBounds;
use fieldbench_types::{FieldCatalog, FieldLayout, Query};

use crate::config::Generate;

/// Loads and validates a field catalog.
pub fn load_catalog(path: &Path) -> Result<FieldCatalog> {
    let file = File::open(path)
        .with_context(|| format!("failed to open fields file {}", path.display()))?;
    let catalog = FieldCatalog::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid fields file {}", path.display()))?;

    tracing::info!(fields = catalog.len(), path = %path.display(), "loaded field catalog");
    Ok(catalog)
}

/// Loads a query set written by [`generate_queries`].
pub fn load_queries(path: &Path) -> Result<Vec<Query>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open queries file {}", path.display()))?;
    let queries: Vec<Query> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid queries file {}", path.display()))?;

    tracing::info!(queries = queries.len(), path = %path.display(), "loaded query set");
    Ok(queries)
}

/// Writes a query set as a pretty-printed JSON array.
pub fn write_queries(path: &Path, queries: &[Query]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, queries)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Writes a bulk file for one index layout and verifies its line count.
pub fn generate_bulk(
    config: &Generate,
    layout: FieldLayout,
    index: &str,
    fields_file: &Path,
    output: &Path,
) -> Result<()> {
    let catalog = load_catalog(fields_file)?;
    let payload = IndexPayload::new(index, layout, &catalog);
    let mut generator = DocumentGenerator::new(&catalog, layout, config.seed);

    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let lines = write_bulk(
        BufWriter::new(file),
        &payload,
        &mut generator,
        config.doc_count,
    )
    .with_context(|| format!("failed to write {}", output.display()))?;

    let expected = expected_lines(config.doc_count);
    let counted = count_lines(output)?;
    if lines != expected || counted != expected {
        anyhow::bail!(
            "{} has {counted} lines, expected {expected}",
            output.display()
        );
    }

    let size = std::fs::metadata(output)?.len();
    tracing::info!(
        %layout,
        index,
        documents = config.doc_count,
        lines,
        "generated bulk file"
    );
    println!(
        "Wrote {} documents ({} lines, {}) for {layout} index {index} to {}",
        config.doc_count,
        lines,
        ByteSize::b(size),
        output.display()
    );

    Ok(())
}

/// Writes the keyword and flattened query sets.
pub fn generate_queries(
    config: &Generate,
    fields_file: &Path,
    keyword_output: &Path,
    flattened_output: &Path,
) -> Result<()> {
    let catalog = load_catalog(fields_file)?;
    let bounds = FilterBounds::new(config.min_filters, config.max_filters, &catalog)?;

    let params = QuerySetParams {
        keyword_index: &config.keyword_index,
        flattened_index: &config.flattened_index,
        count: config.query_count,
        bounds,
        seed: config.seed,
    };
    let sets = generate_query_sets(&catalog, &params)?;

    for query in sets.keyword.iter().chain(&sets.flattened) {
        check_bounds(query, &bounds)?;
    }

    write_queries(keyword_output, &sets.keyword)?;
    write_queries(flattened_output, &sets.flattened)?;

    println!(
        "Wrote {} keyword queries to {}",
        sets.keyword.len(),
        keyword_output.display()
    );
    println!(
        "Wrote {} flattened queries to {}",
        sets.flattened.len(),
        flattened_output.display()
    );

    Ok(())
}

fn check_bounds(query: &Query, bounds: &FilterBounds) -> Result<()> {
    let filters = query.filters().len();
    if filters < bounds.min() || filters > bounds.max() {
        anyhow::bail!(
            "query against {} has {filters} filters, expected {} to {}",
            query.index(),
            bounds.min(),
            bounds.max()
        );
    }
    Ok(())
}

fn count_lines(path: &Path) -> Result<u64> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        line?;
        count += 1;
    }
    Ok(count)
}
