//! In-process transport double for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::http::{HttpResponse, Transport, TransportError};

type GetHandler =
    Box<dyn Fn(&str, &[(String, String)]) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// One recorded GET: url, query, bearer token
#[derive(Debug, Clone)]
pub struct RecordedGet {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer: String,
}

impl RecordedGet {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted transport: token responses are served from a queue (the last one
/// repeats), GETs go through a handler closure.
pub struct FakeTransport {
    token_responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    token_delay: Duration,
    get_handler: GetHandler,
    pub token_calls: AtomicUsize,
    pub token_credentials: Mutex<Vec<(String, String)>>,
    pub gets: Mutex<Vec<RecordedGet>>,
    pub posts: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            token_responses: Mutex::new(VecDeque::new()),
            token_delay: Duration::ZERO,
            get_handler: Box::new(|url, _| Ok(HttpResponse::new(404, format!("no route: {url}")))),
            token_calls: AtomicUsize::new(0),
            token_credentials: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_token(self, body: impl Into<String>) -> Self {
        self.with_token_response(Ok(HttpResponse::new(200, body)))
    }

    pub fn with_token_response(self, resp: Result<HttpResponse, TransportError>) -> Self {
        self.token_responses.lock().unwrap().push_back(resp);
        self
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    pub fn with_get(
        mut self,
        handler: impl Fn(&str, &[(String, String)]) -> Result<HttpResponse, TransportError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.get_handler = Box::new(handler);
        self
    }

    pub fn recorded_gets(&self) -> Vec<RecordedGet> {
        self.gets.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        bearer: &str,
    ) -> Result<HttpResponse, TransportError> {
        self.gets.lock().unwrap().push(RecordedGet {
            url: url.to_string(),
            query: query.to_vec(),
            bearer: bearer.to_string(),
        });
        (self.get_handler)(url, query)
    }

    fn post_form_basic(
        &self,
        _url: &str,
        username: &str,
        password: &str,
        _form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.token_credentials
            .lock()
            .unwrap()
            .push((username.to_string(), password.to_string()));
        if !self.token_delay.is_zero() {
            std::thread::sleep(self.token_delay);
        }
        let mut queue = self.token_responses.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(TransportError("no token response scripted".into())))
        }
    }

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        Ok(HttpResponse::new(200, "ok"))
    }
}

/// Personio-shaped token response
pub fn token_body(token: &str, expires_in: u64) -> String {
    format!(r#"{{"success": true, "data": {{"token": "{token}", "expires_in": {expires_in}}}}}"#)
}

/// `{"data": [...], "metadata": {...}}` page with `count` records starting at `first_id`
pub fn page_body(first_id: u64, count: u64, metadata: serde_json::Value) -> String {
    let data: Vec<_> = (first_id..first_id + count)
        .map(|id| serde_json::json!({ "id": id }))
        .collect();
    serde_json::json!({ "success": true, "data": data, "metadata": metadata }).to_string()
}

/// Query param lookup helper for GET handlers
pub fn param<'a>(query: &'a [(String, String)], name: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}
