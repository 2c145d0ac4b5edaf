//! An [`Executor`] that sends search requests to an Elasticsearch-compatible HTTP service.

use std::time::Duration;

use fieldbench_types::Query;
use reqwest::{RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};
use crate::executor::{Executor, Failure, Response};

const USER_AGENT: &str = concat!("fieldbench/", env!("CARGO_PKG_VERSION"));

/// HTTP basic authentication credentials.
#[derive(Debug)]
pub struct Credentials {
    /// The user name.
    pub username: String,
    /// The password, redacted from debug output.
    pub password: SecretString,
}

impl Credentials {
    /// Creates credentials from a user name and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Adds basic authentication to the request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(self.password.expose_secret()))
    }
}

/// Builder to create an [`HttpExecutor`].
#[must_use]
#[derive(Debug)]
pub struct HttpExecutorBuilder {
    url: reqwest::Result<Url>,
    credentials: Option<Credentials>,
    connect_timeout: Duration,
}

impl HttpExecutorBuilder {
    /// Authenticates every request with the given credentials.
    pub fn credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the TCP connect timeout of the client.
    ///
    /// The overall request timeout is enforced by the phase runner, not by the client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns an [`HttpExecutor`] that uses this configuration.
    ///
    /// # Errors
    ///
    /// Fails if the base URL is invalid or the [`reqwest::Client`] cannot be built.
    pub fn build(self) -> Result<HttpExecutor> {
        let base_url = self.url?;
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(HttpExecutor {
            client,
            base_url,
            credentials: self.credentials,
        })
    }
}

/// Sends each query as `POST {base}/{index}/_search` with a JSON body.
#[derive(Debug)]
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl HttpExecutor {
    /// Creates a new builder targeting the service at `base_url`.
    pub fn builder(base_url: impl reqwest::IntoUrl) -> HttpExecutorBuilder {
        HttpExecutorBuilder {
            url: base_url.into_url(),
            credentials: None,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Returns the base URL of the target service.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn search_url(&self, index: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{index}/_search")
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => credentials.apply(request),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl Executor for HttpExecutor {
    async fn preflight(&self) -> Result<()> {
        let url = self.base_url.to_string();
        let preflight_error = |reason: String| Error::Preflight {
            url: url.clone(),
            reason,
        };

        let response = self
            .authenticated(self.client.get(self.base_url.clone()))
            .send()
            .await
            .map_err(|err| preflight_error(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(preflight_error(format!("unexpected status {status}")));
        }

        tracing::info!(%url, "connected to target");
        Ok(())
    }

    async fn execute(&self, query: &Query) -> Result<Response, Failure> {
        let request = self
            .client
            .post(self.search_url(query.index()))
            .json(&query.to_body());

        let mut response = self
            .authenticated(request)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let mut bytes = 0;
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            bytes += chunk.len() as u64;
        }

        Ok(Response { status, bytes })
    }
}

fn classify(error: reqwest::Error) -> Failure {
    if error.is_timeout() {
        Failure::Timeout
    } else {
        Failure::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_ignores_trailing_slash() {
        for base in ["http://localhost:9200", "http://localhost:9200/"] {
            let executor = HttpExecutor::builder(base).build().unwrap();
            assert_eq!(
                executor.search_url("bench_keyword"),
                "http://localhost:9200/bench_keyword/_search"
            );
        }
    }

    #[test]
    fn search_url_keeps_base_path() {
        let executor = HttpExecutor::builder("http://proxy.local/es/")
            .build()
            .unwrap();
        assert_eq!(
            executor.search_url("idx"),
            "http://proxy.local/es/idx/_search"
        );
    }

    #[test]
    fn rejects_invalid_url() {
        let result = HttpExecutor::builder("not a url").build();
        assert!(matches!(result, Err(Error::Client(_))));
    }

    #[test]
    fn credentials_are_redacted() {
        let credentials = Credentials::new("elastic", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("elastic"));
        assert!(!debug.contains("hunter2"));
    }
}
