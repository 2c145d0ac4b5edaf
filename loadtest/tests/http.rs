use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use fieldbench_test::server::TestServer;
use fieldbench_types::{Filter, Query};
use loadtest::{Benchmark, BenchmarkConfig, Credentials, Error, Executor, HttpExecutor, Response};
use serde_json::json;

fn queries() -> Vec<Query> {
    [("color", "red"), ("size", "xl")]
        .into_iter()
        .map(|(path, value)| {
            let filter = Filter {
                path: path.into(),
                value: value.into(),
            };
            Query::new("bench_keyword", vec![filter]).unwrap()
        })
        .collect()
}

fn config() -> BenchmarkConfig {
    BenchmarkConfig {
        concurrency: 3,
        warmup_requests: 5,
        total_requests: 30,
        request_timeout: Duration::from_secs(2),
        phase_deadline: Duration::from_secs(30),
        seed: 42,
    }
}

#[tokio::test]
async fn test_search_request_shape() -> anyhow::Result<()> {
    fieldbench_test::tracing::init();
    let server = TestServer::new().await;

    let executor = HttpExecutor::builder(server.url("/"))
        .credentials(Some(Credentials::new("elastic", "changeme")))
        .build()?;
    executor.preflight().await?;

    let query = &queries()[0];
    let response = executor.execute(query).await?;
    assert_eq!(response.status, 200);
    assert!(response.bytes > 0);

    let searches = server.searches();
    assert_eq!(searches.len(), 1);
    let (index, body) = &searches[0];
    assert_eq!(index, "bench_keyword");
    assert_eq!(
        body,
        &json!({
            "track_total_hits": false,
            "query": { "bool": { "filter": [{ "term": { "color": "red" } }] } },
        })
    );
    // base64("elastic:changeme")
    assert_eq!(
        server.search_authorizations(),
        [Some("Basic ZWxhc3RpYzpjaGFuZ2VtZQ==".to_owned())]
    );

    Ok(())
}

#[tokio::test]
async fn test_benchmark_success() {
    fieldbench_test::tracing::init();
    let server = TestServer::new().await;

    let executor = HttpExecutor::builder(server.url("/")).build().unwrap();
    let mut bench = Benchmark::new(Arc::new(executor), queries(), config()).unwrap();
    let result = bench.run().await.unwrap();

    assert_eq!(result.warmup_requests, 5);
    assert_eq!(result.benchmark_requests, 30);
    assert_eq!(result.summary.success_count, 30);
    assert_eq!(result.summary.error_count, 0);
    assert!(result.summary.p99_latency_ms >= result.summary.p50_latency_ms);
    assert!(result.summary.throughput_req_sec > 0.0);
    assert_eq!(server.searches().len(), 35);
}

#[tokio::test]
async fn test_benchmark_server_errors() {
    fieldbench_test::tracing::init();
    let server = TestServer::builder().search_status(500).start().await;

    let executor = HttpExecutor::builder(server.url("/")).build().unwrap();
    let mut bench = Benchmark::new(Arc::new(executor), queries(), config()).unwrap();
    let result = bench.run().await.unwrap();

    assert_eq!(result.summary.error_rate, 1.0);
    assert_eq!(result.summary.avg_latency_ms, 0.0);
    assert_eq!(result.summary.failures.status, 30);
}

#[tokio::test]
async fn test_slow_responses_time_out() {
    fieldbench_test::tracing::init();
    let server = TestServer::builder()
        .search_delay(Duration::from_secs(5))
        .start()
        .await;

    let executor = HttpExecutor::builder(server.url("/")).build().unwrap();
    let config = BenchmarkConfig {
        concurrency: 2,
        warmup_requests: 0,
        total_requests: 4,
        request_timeout: Duration::from_millis(50),
        ..config()
    };
    let mut bench = Benchmark::new(Arc::new(executor), queries(), config).unwrap();
    let result = bench.run().await.unwrap();

    assert_eq!(result.summary.failures.timeout, 4);
    assert_eq!(result.summary.success_count, 0);
    assert_eq!(server.searches().len(), 4);
}

#[tokio::test]
async fn test_preflight_unreachable() {
    // Nothing listens on a port that was just released.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let executor = HttpExecutor::builder(format!("http://127.0.0.1:{port}"))
        .build()
        .unwrap();
    let mut bench = Benchmark::new(Arc::new(executor), queries(), config()).unwrap();

    let error = bench.run().await.unwrap_err();
    assert!(matches!(error, Error::Preflight { .. }), "{error}");
}

#[tokio::test]
async fn test_preflight_rejected() {
    let server = TestServer::builder().root_status(401).start().await;

    let executor = HttpExecutor::builder(server.url("/")).build().unwrap();
    let error = executor.preflight().await.unwrap_err();
    assert!(error.to_string().contains("401"), "{error}");
    assert!(server.searches().is_empty());
}

#[tokio::test]
async fn test_response_counts_body_bytes() {
    let server = TestServer::new().await;
    let executor = HttpExecutor::builder(server.url("/")).build().unwrap();

    let Response { status, bytes } = executor.execute(&queries()[1]).await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(
        bytes,
        r#"{"hits":{"hits":[]},"timed_out":false,"took":1}"#.len() as u64
    );
}
