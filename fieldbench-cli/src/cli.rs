use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;
use fieldbench_types::FieldLayout;

use crate::config::Config;
use crate::{benchmark, generate, healthcheck, indexer, observability};

/// Benchmarks filtering on keyword fields against a single flattened field.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    GenerateBulk(GenerateBulkCommand),
    GenerateQueries(GenerateQueriesCommand),
    Index(IndexCommand),
    Bench(BenchCommand),
    Healthcheck(HealthcheckCommand),
    Version(VersionCommand),
}

/// generate a bulk file with index mappings and documents
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "generate-bulk")]
struct GenerateBulkCommand {
    /// index layout, either "keyword" or "flattened"
    #[argh(option)]
    mode: FieldLayout,

    /// name of the index to create
    #[argh(option)]
    index_name: String,

    /// path to the JSON field catalog
    #[argh(option)]
    fields_file: PathBuf,

    /// path of the bulk file to write
    #[argh(option)]
    output: PathBuf,
}

/// generate paired keyword and flattened query sets
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "generate-queries")]
struct GenerateQueriesCommand {
    /// path to the JSON field catalog
    #[argh(option)]
    fields_file: PathBuf,

    /// path of the keyword query set to write
    #[argh(option)]
    output_keyword: PathBuf,

    /// path of the flattened query set to write
    #[argh(option)]
    output_flattened: PathBuf,
}

/// create an index and load a bulk file into it
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "index")]
struct IndexCommand {
    /// path to a bulk file written by generate-bulk
    #[argh(option)]
    bulk_file: PathBuf,
}

/// run a query set against the search service and record latency statistics
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "bench")]
struct BenchCommand {
    /// path to a query set written by generate-queries
    #[argh(option)]
    queries_file: PathBuf,

    /// path of the JSON result file
    #[argh(option, default = "PathBuf::from(benchmark::DEFAULT_OUTPUT)")]
    output: PathBuf,
}

/// check that the search service is reachable
///
/// This sends a request to the root endpoint of the configured target and fails unless it answers
/// with a success status.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "healthcheck")]
struct HealthcheckCommand {}

/// print the fieldbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("fieldbench {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;
    observability::init_tracing(&config);
    tracing::debug!(?config);

    // Generation is synchronous file I/O and does not need a runtime.
    match &args.command {
        Command::GenerateBulk(command) => {
            return generate::generate_bulk(
                &config.generate,
                command.mode,
                &command.index_name,
                &command.fields_file,
                &command.output,
            );
        }
        Command::GenerateQueries(command) => {
            return generate::generate_queries(
                &config.generate,
                &command.fields_file,
                &command.output_keyword,
                &command.output_flattened,
            );
        }
        _ => {}
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads.max(1))
        .build()?;

    runtime.block_on(async move {
        match args.command {
            Command::Index(IndexCommand { bulk_file }) => {
                indexer::index(&config, &bulk_file).await.map(|_| ())
            }
            Command::Bench(BenchCommand {
                queries_file,
                output,
            }) => benchmark::bench(&config, &queries_file, &output).await,
            Command::Healthcheck(HealthcheckCommand {}) => healthcheck::healthcheck(&config).await,
            Command::GenerateBulk(_) | Command::GenerateQueries(_) | Command::Version(_) => {
                unreachable!()
            }
        }
    })
}
