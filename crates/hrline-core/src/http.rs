//! Blocking HTTP transport over a shared async client.
//!
//! Uses async reqwest internally, but presents a sync interface so the
//! pagination engine can run on plain threads or rayon workers.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

/// Connection / request timeouts for the API client
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request failed before any status was received (DNS, connect, timeout, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    /// Strip the URL from a reqwest error to avoid leaking endpoints and
    /// query parameters in logs and reports
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self(e.without_url().to_string())
    }
}

/// The three HTTP exchanges the pipeline performs.
///
/// Non-2xx statuses are returned as [`HttpResponse`], not as errors; callers
/// decide how to classify them.
pub trait Transport: Send + Sync {
    /// GET with query parameters and a bearer token
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        bearer: &str,
    ) -> Result<HttpResponse, TransportError>;

    /// Form POST authenticated with HTTP Basic credentials
    fn post_form_basic(
        &self,
        url: &str,
        username: &str,
        password: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError>;

    /// JSON POST (webhooks)
    fn post_json(&self, url: &str, body: &serde_json::Value)
        -> Result<HttpResponse, TransportError>;
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Production [`Transport`] backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(TransportError::from_reqwest)?;
        Ok(Self { client })
    }

    fn execute(&self, request: reqwest::RequestBuilder) -> Result<HttpResponse, TransportError> {
        SHARED_RUNTIME.handle().block_on(async {
            let resp = request.send().await.map_err(TransportError::from_reqwest)?;
            let status = resp.status().as_u16();
            let body = resp.text().await.map_err(TransportError::from_reqwest)?;
            Ok(HttpResponse { status, body })
        })
    }
}

impl Transport for ReqwestTransport {
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        bearer: &str,
    ) -> Result<HttpResponse, TransportError> {
        let request = self
            .client
            .get(url)
            .query(query)
            .header(AUTHORIZATION, format!("Bearer {bearer}"));
        self.execute(request)
    }

    fn post_form_basic(
        &self,
        url: &str,
        username: &str,
        password: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        let request = self
            .client
            .post(url)
            .basic_auth(username, Some(password))
            .form(form);
        self.execute(request)
    }

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError> {
        let payload = serde_json::to_vec(body).map_err(|e| TransportError(e.to_string()))?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        self.execute(request)
    }
}

/// Join a base URL and an endpoint path with exactly one slash
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
