//! The `bench` command: runs a query set and writes the resulting statistics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fieldbench_datagen::queries::with_aggregations;
use fieldbench_types::Query;
use loadtest::{Benchmark, BenchmarkConfig, BenchmarkResult, Events, HttpExecutor, SharedExecutor};

use crate::config::Config;
use crate::generate::load_queries;
use crate::report;

/// Default location of the result file.
pub const DEFAULT_OUTPUT: &str = "results.json";

/// Runs the benchmark described by `config` over the queries in `queries_file`.
///
/// With aggregations enabled, a second benchmark runs over the same queries with a terms
/// aggregation added, and its results go next to `output` with a `_with_aggs` suffix.
pub async fn bench(config: &Config, queries_file: &Path, output: &Path) -> Result<()> {
    let queries = load_queries(queries_file)?;
    let executor: SharedExecutor = Arc::new(
        HttpExecutor::builder(config.target.url.as_str())
            .credentials(config.target.credentials())
            .connect_timeout(config.target.connect_timeout)
            .build()?,
    );

    let seed = config.bench.seed;
    let result = run(
        Arc::clone(&executor),
        &queries,
        config.bench.benchmark_config(seed),
    )
    .await?;
    write_result(output, &result)?;
    report::print_result(&queries_file.display().to_string(), &result);
    println!("Results written to {}", output.display());

    if config.bench.aggregations {
        let queries = with_aggregations(&queries, seed);
        let config = config.bench.benchmark_config(seed.wrapping_add(1));
        let result = run(executor, &queries, config).await?;

        let output = aggregations_output(output);
        write_result(&output, &result)?;
        report::print_result(
            &format!("{} with aggregations", queries_file.display()),
            &result,
        );
        println!("Aggregation results written to {}", output.display());
    }

    Ok(())
}

async fn run(
    executor: SharedExecutor,
    queries: &[Query],
    config: BenchmarkConfig,
) -> Result<BenchmarkResult> {
    let (events, receiver) = Events::channel();
    let progress = report::spawn_progress(receiver);

    let mut benchmark = Benchmark::new(executor, queries, config)?.with_events(events);
    let result = benchmark.run().await;

    // The progress task ends once the benchmark and its events handle are gone.
    drop(benchmark);
    progress.await.ok();

    Ok(result?)
}

/// Writes the result as pretty-printed JSON.
pub fn write_result(path: &Path, result: &BenchmarkResult) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Returns the path of the aggregation results: `results.json` becomes `results_with_aggs.json`.
pub fn aggregations_output(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(extension) => format!("{stem}_with_aggs.{}", extension.to_string_lossy()),
        None => format!("{stem}_with_aggs"),
    };
    output.with_file_name(name)
}
