//! Exposes an in-process mock search service for use in integration tests.
//!
//! The mock implements the small part of the Elasticsearch HTTP API that fieldbench uses and
//! records every request it receives:
//!
//! - `GET /` answers the connectivity check.
//! - `PUT /{index}` and `DELETE /{index}` create and delete indices.
//! - `PUT /{index}/_settings` and `POST /{index}/_refresh` are acknowledged.
//! - `POST /_bulk` counts indexed documents per index.
//! - `POST /{index}/_search` answers with an empty hit list.
//!
//! ```
//! use fieldbench_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/bench_keyword/_search");
//!    // use the URL in tests...
//! }
//! ```

use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

type Reply = (StatusCode, Json<Value>);

/// Everything the mock service received.
#[derive(Debug, Default)]
struct Recorded {
    searches: Vec<(String, Value)>,
    search_authorizations: Vec<Option<String>>,
    indices: BTreeMap<String, IndexState>,
    deleted: Vec<String>,
    settings: Vec<(String, Value)>,
    refreshed: Vec<String>,
}

#[derive(Debug, Default)]
struct IndexState {
    definition: Value,
    documents: u64,
}

#[derive(Debug)]
struct Shared {
    root_status: StatusCode,
    search_status: StatusCode,
    search_delay: Duration,
    reject_documents: bool,
    recorded: Mutex<Recorded>,
}

impl Shared {
    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

/// Builder to configure the behavior of a [`TestServer`].
#[must_use]
#[derive(Debug)]
pub struct TestServerBuilder {
    root_status: u16,
    search_status: u16,
    search_delay: Duration,
    reject_documents: bool,
}

impl TestServerBuilder {
    /// Sets the status returned by `GET /`.
    pub fn root_status(mut self, status: u16) -> Self {
        self.root_status = status;
        self
    }

    /// Sets the status returned by every search request.
    pub fn search_status(mut self, status: u16) -> Self {
        self.search_status = status;
        self
    }

    /// Delays every search response by the given duration.
    pub fn search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    /// Makes every document in a bulk request fail with a mapping error.
    pub fn reject_documents(mut self) -> Self {
        self.reject_documents = true;
        self
    }

    /// Binds to a random port on localhost and starts serving.
    pub async fn start(self) -> TestServer {
        let shared = Arc::new(Shared {
            root_status: status(self.root_status),
            search_status: status(self.search_status),
            search_delay: self.search_delay,
            reject_documents: self.reject_documents,
            recorded: Mutex::default(),
        });

        let app = Router::new()
            .route("/", get(root))
            .route("/_bulk", post(bulk))
            .route("/{index}", put(create_index).delete(delete_index))
            .route("/{index}/_settings", put(update_settings))
            .route("/{index}/_refresh", post(refresh))
            .route("/{index}/_search", post(search))
            .with_state(Arc::clone(&shared));

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            handle,
            socket,
            shared,
        }
    }
}

/// An in-process mock search service for use in integration tests.
///
/// It listens on a random available port on localhost and stops when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    shared: Arc<Shared>,
}

impl TestServer {
    /// Starts a server that answers every request successfully and immediately.
    pub async fn new() -> Self {
        Self::builder().start().await
    }

    /// Returns a builder to customize the server's responses.
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder {
            root_status: 200,
            search_status: 200,
            search_delay: Duration::ZERO,
            reject_documents: false,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }

    /// Returns the index and body of every search request, in arrival order.
    pub fn searches(&self) -> Vec<(String, Value)> {
        self.shared.recorded().searches.clone()
    }

    /// Returns the `Authorization` header of every search request, in arrival order.
    pub fn search_authorizations(&self) -> Vec<Option<String>> {
        self.shared.recorded().search_authorizations.clone()
    }

    /// Returns the creation payload of an existing index.
    pub fn index_definition(&self, index: &str) -> Option<Value> {
        let recorded = self.shared.recorded();
        recorded
            .indices
            .get(index)
            .map(|state| state.definition.clone())
    }

    /// Returns the number of documents indexed into `index`.
    pub fn document_count(&self, index: &str) -> u64 {
        let recorded = self.shared.recorded();
        recorded.indices.get(index).map_or(0, |state| state.documents)
    }

    /// Returns the names of deleted indices, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.shared.recorded().deleted.clone()
    }

    /// Returns the index and body of every settings update, in order.
    pub fn settings_updates(&self) -> Vec<(String, Value)> {
        self.shared.recorded().settings.clone()
    }

    /// Returns the names of refreshed indices, in order.
    pub fn refreshed(&self) -> Vec<String> {
        self.shared.recorded().refreshed.clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn acknowledged() -> Reply {
    (StatusCode::OK, Json(json!({ "acknowledged": true })))
}

fn error(status: StatusCode, ty: &str, reason: String) -> Reply {
    let body = json!({
        "error": { "type": ty, "reason": reason },
        "status": status.as_u16(),
    });
    (status, Json(body))
}

async fn root(State(shared): State<Arc<Shared>>) -> Reply {
    let body = json!({
        "name": "fieldbench-mock",
        "version": { "number": "8.13.0" },
        "tagline": "You Know, for Search",
    });
    (shared.root_status, Json(body))
}

async fn create_index(
    State(shared): State<Arc<Shared>>,
    Path(index): Path<String>,
    body: String,
) -> Reply {
    let definition = serde_json::from_str(&body).unwrap_or(Value::Null);
    let mut recorded = shared.recorded();
    if recorded.indices.contains_key(&index) {
        let reason = format!("index [{index}] already exists");
        return error(
            StatusCode::BAD_REQUEST,
            "resource_already_exists_exception",
            reason,
        );
    }

    recorded.indices.insert(
        index.clone(),
        IndexState {
            definition,
            documents: 0,
        },
    );
    (
        StatusCode::OK,
        Json(json!({ "acknowledged": true, "index": index })),
    )
}

async fn delete_index(State(shared): State<Arc<Shared>>, Path(index): Path<String>) -> Reply {
    let mut recorded = shared.recorded();
    if recorded.indices.remove(&index).is_none() {
        let reason = format!("no such index [{index}]");
        return error(StatusCode::NOT_FOUND, "index_not_found_exception", reason);
    }
    recorded.deleted.push(index);
    acknowledged()
}

async fn update_settings(
    State(shared): State<Arc<Shared>>,
    Path(index): Path<String>,
    body: String,
) -> Reply {
    let settings = serde_json::from_str(&body).unwrap_or(Value::Null);
    shared.recorded().settings.push((index, settings));
    acknowledged()
}

async fn refresh(State(shared): State<Arc<Shared>>, Path(index): Path<String>) -> Reply {
    shared.recorded().refreshed.push(index);
    (
        StatusCode::OK,
        Json(json!({ "_shards": { "total": 1, "successful": 1, "failed": 0 } })),
    )
}

async fn bulk(State(shared): State<Arc<Shared>>, body: String) -> Reply {
    let mut lines = body.lines().filter(|line| !line.trim().is_empty());
    let mut items = Vec::new();
    let mut recorded = shared.recorded();

    while let (Some(action), Some(_source)) = (lines.next(), lines.next()) {
        let action: Value = serde_json::from_str(action).unwrap_or(Value::Null);
        let index = action["index"]["_index"].as_str().unwrap_or_default();
        let id = action["index"]["_id"].clone();

        if shared.reject_documents {
            items.push(json!({ "index": {
                "_index": index,
                "_id": id,
                "status": 400,
                "error": {
                    "type": "document_parsing_exception",
                    "reason": format!("failed to parse document [{id}]"),
                },
            }}));
            continue;
        }

        recorded.indices.entry(index.to_owned()).or_default().documents += 1;
        items.push(json!({ "index": {
            "_index": index,
            "_id": id,
            "result": "created",
            "status": 201,
        }}));
    }

    let body = json!({
        "took": 1,
        "errors": shared.reject_documents && !items.is_empty(),
        "items": items,
    });
    (StatusCode::OK, Json(body))
}

async fn search(
    State(shared): State<Arc<Shared>>,
    Path(index): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Reply {
    let query = serde_json::from_str(&body).unwrap_or(Value::Null);
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    {
        let mut recorded = shared.recorded();
        recorded.searches.push((index, query));
        recorded.search_authorizations.push(authorization);
    }

    if !shared.search_delay.is_zero() {
        tokio::time::sleep(shared.search_delay).await;
    }

    let body = json!({
        "took": 1,
        "timed_out": false,
        "hits": { "hits": [] },
    });
    (shared.search_status, Json(body))
}
