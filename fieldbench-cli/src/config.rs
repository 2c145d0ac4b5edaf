//! Configuration for the fieldbench tool.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `FB__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration sections and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `FB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `FB__TARGET__URL=http://es.internal:9200` sets the search service URL
//! - `FB__BENCH__CONCURRENCY=64` sets the number of workers
//! - `FB__BENCH__REQUEST_TIMEOUT=500ms` sets the per-request timeout
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! target:
//!   url: http://es.internal:9200
//!
//! bench:
//!   concurrency: 64
//!   request_timeout: 500ms
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use loadtest::{BenchmarkConfig, Credentials};
use secrecy::{CloneableSecret, ExposeSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "FB__";

/// Newtype around `String` that may protect against accidental
/// logging of secrets in our configuration struct. Use with
/// [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// The search service under test.
///
/// Used in: [`Config::target`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Target {
    /// Base URL of the Elasticsearch-compatible HTTP API.
    ///
    /// # Default
    ///
    /// `http://localhost:9200`
    ///
    /// # Environment Variable
    ///
    /// `FB__TARGET__URL`
    pub url: String,

    /// User name for HTTP basic authentication.
    ///
    /// Authentication is only used if both a user name and a password are set.
    ///
    /// # Environment Variable
    ///
    /// `FB__TARGET__USERNAME`
    pub username: Option<String>,

    /// Password for HTTP basic authentication.
    ///
    /// # Environment Variable
    ///
    /// `FB__TARGET__PASSWORD`
    pub password: Option<SecretBox<ConfigSecret>>,

    /// Timeout for establishing TCP connections.
    ///
    /// # Default
    ///
    /// `5s`
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Target {
    /// Returns basic authentication credentials if configured.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(
                username.as_str(),
                password.expose_secret().as_str(),
            )),
            _ => None,
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".into(),
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Parameters of the `bench` command.
///
/// Used in: [`Config::bench`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Bench {
    /// Number of concurrent workers.
    ///
    /// # Default
    ///
    /// `32`
    ///
    /// # Environment Variable
    ///
    /// `FB__BENCH__CONCURRENCY`
    pub concurrency: usize,

    /// Number of warmup requests whose results are discarded.
    ///
    /// # Default
    ///
    /// `5000`
    pub warmup_requests: u64,

    /// Number of measured requests.
    ///
    /// # Default
    ///
    /// `100000`
    pub total_requests: u64,

    /// Timeout of a single search request. Slower requests count as failures.
    ///
    /// # Default
    ///
    /// `2s`
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Upper bound on the duration of each phase. Exceeding it aborts the benchmark.
    ///
    /// # Default
    ///
    /// `30m`
    #[serde(with = "humantime_serde")]
    pub phase_deadline: Duration,

    /// Master seed of the workers' query selection.
    ///
    /// # Default
    ///
    /// `42`
    pub seed: u64,

    /// Also run the query set with a terms aggregation added to every query.
    ///
    /// # Default
    ///
    /// `false`
    pub aggregations: bool,
}

impl Bench {
    /// Converts this section into the parameters of a benchmark run with the given seed.
    pub fn benchmark_config(&self, seed: u64) -> BenchmarkConfig {
        BenchmarkConfig {
            concurrency: self.concurrency,
            warmup_requests: self.warmup_requests,
            total_requests: self.total_requests,
            request_timeout: self.request_timeout,
            phase_deadline: self.phase_deadline,
            seed,
        }
    }
}

impl Default for Bench {
    fn default() -> Self {
        let defaults = BenchmarkConfig::default();
        Self {
            concurrency: defaults.concurrency,
            warmup_requests: defaults.warmup_requests,
            total_requests: defaults.total_requests,
            request_timeout: defaults.request_timeout,
            phase_deadline: defaults.phase_deadline,
            seed: defaults.seed,
            aggregations: false,
        }
    }
}

/// Parameters of the `generate-bulk` and `generate-queries` commands.
///
/// Used in: [`Config::generate`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Generate {
    /// Seed of all generated values.
    ///
    /// # Default
    ///
    /// `42`
    pub seed: u64,

    /// Number of documents per bulk file.
    ///
    /// # Default
    ///
    /// `100000`
    pub doc_count: u64,

    /// Number of queries per query set.
    ///
    /// # Default
    ///
    /// `5000`
    pub query_count: usize,

    /// Minimum number of filters per query.
    ///
    /// # Default
    ///
    /// `1`
    pub min_filters: usize,

    /// Maximum number of filters per query.
    ///
    /// # Default
    ///
    /// `5`
    pub max_filters: usize,

    /// Index targeted by keyword queries.
    ///
    /// # Default
    ///
    /// `bench_keyword`
    pub keyword_index: String,

    /// Index targeted by flattened queries.
    ///
    /// # Default
    ///
    /// `bench_flattened`
    pub flattened_index: String,
}

impl Default for Generate {
    fn default() -> Self {
        Self {
            seed: 42,
            doc_count: 100_000,
            query_count: 5_000,
            min_filters: 1,
            max_filters: 5,
            keyword_index: "bench_keyword".into(),
            flattened_index: "bench_flattened".into(),
        }
    }
}

/// Parameters of the `index` command.
///
/// Used in: [`Config::index`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Index {
    /// Number of documents per bulk request.
    ///
    /// # Default
    ///
    /// `2000`
    pub chunk_docs: usize,

    /// Timeout of every request to the search service.
    ///
    /// # Default
    ///
    /// `120s`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Delete the index before creating it.
    ///
    /// # Default
    ///
    /// `false`
    pub recreate: bool,

    /// Refresh the index after loading, making all documents searchable.
    ///
    /// # Default
    ///
    /// `false`
    pub refresh: bool,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            chunk_docs: 2_000,
            timeout: Duration::from_secs(120),
            recreate: false,
            refresh: false,
        }
    }
}

/// Runtime configuration for the Tokio async runtime.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads for the runtime.
    ///
    /// Benchmark workers are tasks, not threads, so this bounds how many requests are processed
    /// in parallel on the client side.
    ///
    /// # Default
    ///
    /// Defaults to the number of CPU cores on the host machine.
    ///
    /// # Environment Variable
    ///
    /// `FB__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO loadtest::bench: measurement complete throughput=1523.4
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2025-06-04T12:10:32Z  INFO loadtest::bench: measurement complete throughput=1523.4
    /// ```
    Simplified,

    /// Dump out JSON lines.
    ///
    /// ```text
    /// {"timestamp":"2025-06-04T12:11:08.729716Z","level":"INFO","message":"measurement complete","throughput":1523.4,"target":"loadtest::bench"}
    /// ```
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they never mix with command output on stdout.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// Valid levels in increasing severity: TRACE, DEBUG, INFO, WARN, ERROR, OFF. The `RUST_LOG`
    /// environment variable overrides this and provides more granular control per module.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `FB__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// See [`LogFormat`] for available options and examples.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `FB__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for the fieldbench tool.
///
/// Every section has defaults, so an empty configuration is valid. Values are merged from
/// defaults, an optional YAML file and `FB__` environment variables, in that order.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// The search service under test.
    pub target: Target,
    /// Benchmark parameters.
    pub bench: Bench,
    /// Data and query generation parameters.
    pub generate: Generate,
    /// Bulk indexing parameters.
    pub index: Index,
    /// Async runtime configuration.
    pub runtime: Runtime,
    /// Logging configuration.
    pub logging: Logging,
}

impl Config {
    /// Loads configuration from an optional YAML file and the environment.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if `path` is given)
    /// 3. Environment variables (prefixed with `FB__`)
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if any value has the wrong
    /// type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}
