//! Loads a bulk file into a freshly created index.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fieldbench_datagen::bulk::{BulkEntry, BulkReader};
use fieldbench_datagen::documents::IndexPayload;
use indicatif::{ProgressBar, ProgressStyle};
use loadtest::{Credentials, Executor, HttpExecutor};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Config;

/// Maximum number of item errors printed when indexing fails.
const SAMPLE_ERRORS: usize = 5;

/// Outcome of loading a bulk file.
#[derive(Debug)]
pub struct IndexReport {
    /// The index documents were loaded into.
    pub index: String,
    /// Number of documents indexed successfully.
    pub indexed: u64,
    /// Number of documents the service rejected.
    pub failed: u64,
    /// Wall-clock time from creating the index until the last request.
    pub elapsed: Duration,
    /// Descriptions of the first rejected documents.
    pub sample_errors: Vec<String>,
}

impl IndexReport {
    /// Indexed documents per second.
    pub fn docs_per_sec(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.indexed as f64 / seconds
        } else {
            0.0
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BTreeMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl BulkItem {
    fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }

    fn describe(&self) -> String {
        let id = self.id.as_deref().unwrap_or("<unknown>");
        let error = self.error.as_ref().unwrap_or(&Value::Null);
        format!("{id}: status {} {error}", self.status)
    }
}

struct Client {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl Client {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let request = self.http.request(method, url);
        match &self.credentials {
            Some(credentials) => credentials.apply(request),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to {what}"))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("failed to {what}: status {status}: {body}");
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    async fn set_refresh_interval(&self, index: &str, interval: &str) -> Result<()> {
        let request = self
            .request(Method::PUT, &format!("{index}/_settings"))
            .json(&json!({ "index.refresh_interval": interval }));
        self.send(request, "update index settings").await?;
        Ok(())
    }
}

/// Creates the index described by the bulk file header and loads all of its documents.
///
/// Fails if the service is unreachable, the index cannot be created, or any document is
/// rejected. Rejections are counted and reported in the error instead of aborting the load.
pub async fn index(config: &Config, bulk_file: &Path) -> Result<IndexReport> {
    let file = File::open(bulk_file)
        .with_context(|| format!("failed to open bulk file {}", bulk_file.display()))?;
    let (payload, entries) = BulkReader::open(BufReader::new(file))
        .with_context(|| format!("invalid bulk file {}", bulk_file.display()))?;

    let report = load(config, &payload, entries).await?;

    println!(
        "Indexed {} documents into {} in {:.2}s ({:.0} docs/sec)",
        report.indexed,
        report.index,
        report.elapsed.as_secs_f64(),
        report.docs_per_sec()
    );

    if report.failed > 0 {
        for error in &report.sample_errors {
            eprintln!("  {error}");
        }
        anyhow::bail!(
            "{} of {} documents were rejected by {}",
            report.failed,
            report.failed + report.indexed,
            report.index
        );
    }

    Ok(report)
}

async fn load<I>(config: &Config, payload: &IndexPayload, entries: I) -> Result<IndexReport>
where
    I: Iterator<Item = fieldbench_datagen::Result<BulkEntry>>,
{
    HttpExecutor::builder(config.target.url.as_str())
        .credentials(config.target.credentials())
        .connect_timeout(config.target.connect_timeout)
        .build()?
        .preflight()
        .await?;

    let client = Client {
        http: reqwest::Client::builder()
            .connect_timeout(config.target.connect_timeout)
            .timeout(config.index.timeout)
            .build()?,
        base_url: config.target.url.trim_end_matches('/').to_owned(),
        credentials: config.target.credentials(),
    };
    let index = payload.index.as_str();

    if config.index.recreate {
        let response = client
            .request(Method::DELETE, index)
            .send()
            .await
            .context("failed to delete index")?;
        match response.status() {
            StatusCode::NOT_FOUND => tracing::debug!(index, "index did not exist"),
            status if status.is_success() => println!("Deleted existing index {index}"),
            status => anyhow::bail!("failed to delete index {index}: status {status}"),
        }
    }

    let start = Instant::now();
    let request = client.request(Method::PUT, index).json(&json!({
        "settings": payload.settings,
        "mappings": payload.mappings,
    }));
    client.send(request, "create index").await?;
    println!("Created index {index}");

    client.set_refresh_interval(index, "-1").await?;
    tracing::debug!(index, "disabled refresh for bulk load");

    let bar = ProgressBar::new_spinner()
        .with_style(ProgressStyle::with_template("{spinner} {msg} {pos} docs {elapsed}")?)
        .with_message(format!("Indexing into {index}:"));
    bar.enable_steady_tick(Duration::from_millis(100));

    let mut report = IndexReport {
        index: index.to_owned(),
        indexed: 0,
        failed: 0,
        elapsed: Duration::ZERO,
        sample_errors: Vec::new(),
    };

    let chunk_docs = config.index.chunk_docs.max(1);
    let mut chunk = String::new();
    let mut chunk_len = 0;
    let mut entries = entries.peekable();

    while let Some(entry) = entries.next() {
        append_entry(&mut chunk, index, entry?)?;
        chunk_len += 1;

        if chunk_len == chunk_docs || entries.peek().is_none() {
            send_chunk(&client, std::mem::take(&mut chunk), &mut report).await?;
            bar.inc(chunk_len as u64);
            chunk_len = 0;
        }
    }
    bar.finish_and_clear();

    client.set_refresh_interval(index, "1s").await?;
    if config.index.refresh {
        let request = client.request(Method::POST, &format!("{index}/_refresh"));
        client.send(request, "refresh index").await?;
    }
    report.elapsed = start.elapsed();

    tracing::info!(
        index,
        indexed = report.indexed,
        failed = report.failed,
        elapsed = ?report.elapsed,
        "bulk load complete"
    );

    Ok(report)
}

fn append_entry(chunk: &mut String, index: &str, mut entry: BulkEntry) -> Result<()> {
    entry.action.index.index = index.to_owned();
    writeln!(chunk, "{}", serde_json::to_string(&entry.action)?)?;
    writeln!(chunk, "{}", serde_json::to_string(&entry.source)?)?;
    Ok(())
}

async fn send_chunk(client: &Client, body: String, report: &mut IndexReport) -> Result<()> {
    let request = client
        .request(Method::POST, "_bulk")
        .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
        .body(body);
    let response = client.send(request, "send bulk request").await?;
    let response: BulkResponse =
        serde_json::from_value(response).context("invalid bulk response")?;

    for item in response.items.iter().flat_map(|item| item.values()) {
        if item.is_success() {
            report.indexed += 1;
        } else {
            report.failed += 1;
            if report.sample_errors.len() < SAMPLE_ERRORS {
                report.sample_errors.push(item.describe());
            }
        }
    }

    if response.errors {
        tracing::warn!(failed = report.failed, "bulk request contained rejected documents");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use fieldbench_datagen::bulk::{ActionMeta, BulkAction};

    use super::*;

    #[test]
    fn entries_target_the_header_index() {
        let entry = BulkEntry {
            action: BulkAction {
                index: ActionMeta {
                    index: "elsewhere".into(),
                    id: "doc-000001".into(),
                },
            },
            source: json!({ "id": "doc-000001", "color": "red" }),
        };

        let mut chunk = String::new();
        append_entry(&mut chunk, "bench_keyword", entry).unwrap();
        let lines: Vec<&str> = chunk.lines().collect();
        assert_eq!(
            lines,
            [
                r#"{"index":{"_index":"bench_keyword","_id":"doc-000001"}}"#,
                r#"{"color":"red","id":"doc-000001"}"#,
            ]
        );
    }

    #[test]
    fn bulk_items_with_errors_fail() {
        let response: BulkResponse = serde_json::from_value(json!({
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 201 } },
                { "index": { "_id": "b", "status": 400, "error": { "type": "x" } } },
            ],
        }))
        .unwrap();

        let items: Vec<_> = response.items.iter().flat_map(|i| i.values()).collect();
        assert!(items[0].is_success());
        assert!(!items[1].is_success());
        assert!(items[1].describe().starts_with("b: status 400"));
    }

    #[test]
    fn docs_per_sec_handles_zero_elapsed() {
        let report = IndexReport {
            index: "idx".into(),
            indexed: 10,
            failed: 0,
            elapsed: Duration::ZERO,
            sample_errors: Vec::new(),
        };
        assert_eq!(report.docs_per_sec(), 0.0);

        let report = IndexReport {
            elapsed: Duration::from_secs(2),
            ..report
        };
        assert_eq!(report.docs_per_sec(), 5.0);
    }
}
