//! HTTP stub server for transport tests

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::Response,
    Router,
};
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::form_urlencoded;

/// A request received by a [`MockServer`]
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Query pairs decoded as `application/x-www-form-urlencoded`, in order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }

    /// Body parsed as JSON
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[derive(Debug, Clone)]
struct Stub {
    status: u16,
    content_type: Option<&'static str>,
    body: String,
}

#[derive(Default)]
struct MockState {
    stubs: Mutex<HashMap<(String, String), Stub>>,
    requests: Mutex<Vec<ReceivedRequest>>,
}

/// A stub HTTP server on a random local port.
///
/// Unmatched requests get a 404 with a JSON `message`.
pub struct MockServer {
    state: Arc<MockState>,
    base_url: String,
    port: u16,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Start a new server on an available port
    pub async fn start() -> Result<Self, TestError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| TestError::StartFailed(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| TestError::StartFailed(e.to_string()))?
            .port();

        let state = Arc::new(MockState::default());
        let router = Router::new()
            .fallback(handle_request)
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!(error = %e, "mock server stopped");
            }
        });

        info!(port = port, "Mock AIMS server listening");

        Ok(Self {
            state,
            base_url: format!("http://127.0.0.1:{port}"),
            port,
            handle,
        })
    }

    /// Get the base URL
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Answer `method path` with a JSON body
    pub fn mock(&self, method: &str, path: &str, status: u16, body: Value) {
        self.insert(
            method,
            path,
            Stub {
                status,
                content_type: Some("application/json"),
                body: body.to_string(),
            },
        );
    }

    /// Answer `method path` with a plain text body
    pub fn mock_text(&self, method: &str, path: &str, status: u16, body: &str) {
        self.insert(
            method,
            path,
            Stub {
                status,
                content_type: Some("text/plain"),
                body: body.to_string(),
            },
        );
    }

    /// Answer `method path` with no body at all
    pub fn mock_empty(&self, method: &str, path: &str, status: u16) {
        self.insert(
            method,
            path,
            Stub {
                status,
                content_type: None,
                body: String::new(),
            },
        );
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.state.requests.lock().clone()
    }

    /// The most recent request
    pub fn last_request(&self) -> Option<ReceivedRequest> {
        self.state.requests.lock().last().cloned()
    }

    /// Forget recorded requests and stubs
    pub fn reset(&self) {
        self.state.requests.lock().clear();
        self.state.stubs.lock().clear();
    }

    fn insert(&self, method: &str, path: &str, stub: Stub) {
        self.state
            .stubs
            .lock()
            .insert((method.to_ascii_uppercase(), path.to_string()), stub);
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_request(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let received = ReceivedRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body,
    };

    let stub = state
        .stubs
        .lock()
        .get(&(received.method.clone(), received.path.clone()))
        .cloned();
    state.requests.lock().push(received);

    let stub = stub.unwrap_or_else(|| Stub {
        status: 404,
        content_type: Some("application/json"),
        body: serde_json::json!({
            "message": format!("no stub for {} {}", method, uri.path())
        })
        .to_string(),
    });

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(stub.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    if let Some(content_type) = stub.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(stub.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

/// Errors that can occur with the mock server
#[derive(Debug)]
pub enum TestError {
    StartFailed(String),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::StartFailed(msg) => write!(f, "Failed to start server: {}", msg),
        }
    }
}

impl std::error::Error for TestError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_serves_stub_and_records_request() {
        let server = MockServer::start().await.unwrap();
        server.mock("GET", "/aims/v1/roles", 200, json!({"roles": []}));

        let response = reqwest::Client::new()
            .get(format!("{}/aims/v1/roles?out=full", server.url()))
            .header("X-Test", "yes")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(
            response.json::<Value>().await.unwrap(),
            json!({"roles": []})
        );

        let request = server.last_request().unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/aims/v1/roles");
        assert_eq!(
            request.query_pairs(),
            vec![("out".to_string(), "full".to_string())]
        );
        assert_eq!(request.header("x-test"), Some("yes"));
    }

    #[tokio::test]
    async fn test_query_pairs_are_decoded() {
        let server = MockServer::start().await.unwrap();
        server.mock("GET", "/aims/v1/users", 200, json!({"users": []}));

        reqwest::Client::new()
            .get(format!(
                "{}/aims/v1/users?email=a%40b.com&name=a+b&tag=x%26y%3Dz&flag",
                server.url()
            ))
            .send()
            .await
            .unwrap();

        let request = server.last_request().unwrap();
        assert_eq!(
            request.query_pairs(),
            vec![
                ("email".to_string(), "a@b.com".to_string()),
                ("name".to_string(), "a b".to_string()),
                ("tag".to_string(), "x&y=z".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unmatched_request_is_404() {
        let server = MockServer::start().await.unwrap();

        let response = reqwest::Client::new()
            .delete(format!("{}/nothing", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
        assert_eq!(server.requests().len(), 1);

        server.reset();
        assert!(server.requests().is_empty());
    }
}
