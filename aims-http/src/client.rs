//! HTTP implementation of [`ApiClient`]

use aims_core::{ApiClient, ApiError, ApiRequest, Error, Params, RequestId, Verb};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn, Instrument};
use url::Url;

use crate::config::HttpConfig;
use crate::session::{Session, AUTH_TOKEN_HEADER, REQUEST_ID_HEADER, SESSION_TOKEN_HEADER};

/// How a request identifies its caller
enum Auth<'a> {
    /// The stored session token, if any
    Session,
    Basic { username: &'a str, password: &'a str },
    MfaSession(&'a str),
}

/// reqwest-backed AIMS transport.
///
/// Cloning is cheap; clones share the connection pool and the session.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    session: Arc<Session>,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, Error> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("invalid base URL '{}': {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }
        if config.timeout_secs == 0 {
            return Err(Error::Config("timeout must be at least one second".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            session: Arc::new(Session::new()),
        })
    }

    /// Start with a token obtained elsewhere
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.session.set(token, None);
        self
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.session.set(token, None);
    }

    pub fn clear_token(&self) {
        self.session.clear();
    }

    pub fn token(&self) -> Option<String> {
        self.session.token()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/{service}/{version}[/{account_id}]{path}?{params}`
    ///
    /// Each segment is pushed separately, so a caller value always stays
    /// inside its own segment.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, Error> {
        let segments = request.url_segments()?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::Config(format!("base URL '{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(&segments);

        if let Some(params) = &request.params {
            let pairs = query_pairs(params);
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        request: ApiRequest,
        body: Option<Value>,
        auth: Auth<'_>,
    ) -> Result<Value, Error> {
        let url = self.url_for(&request)?;
        let path = request.scoped_path();
        let request_id = RequestId::new();

        if let Some(ttl) = request.ttl {
            trace!(ttl_secs = ttl.as_secs(), "cache hint ignored");
        }

        let mut builder = self
            .client
            .request(method.clone(), url)
            .header(REQUEST_ID_HEADER, request_id.as_str());

        builder = match auth {
            Auth::Session => match self.session.token() {
                Some(token) => {
                    if self.session.is_expired_at(chrono::Utc::now()) {
                        warn!("session token has expired; sending it anyway");
                    }
                    builder.header(AUTH_TOKEN_HEADER, token)
                }
                None => builder,
            },
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Auth::MfaSession(token) => builder.header(SESSION_TOKEN_HEADER, token),
        };

        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let span = tracing::debug_span!(
            "aims_http",
            method = %method,
            path = %path,
            request_id = %request_id
        );

        async move {
            let started = Instant::now();
            let response = builder.send().await.map_err(transport_error)?;
            debug!(
                status = response.status().as_u16(),
                elapsed = ?started.elapsed(),
                "AIMS response"
            );
            read_response(response, &path, &request_id).await
        }
        .instrument(span)
        .await
    }

    async fn send(&self, verb: Verb, request: ApiRequest) -> Result<Value, Error> {
        let method = match verb {
            Verb::Fetch => Method::GET,
            Verb::Post => Method::POST,
            Verb::Set => Method::PUT,
            Verb::Delete => Method::DELETE,
        };
        let body = request.data.clone();
        self.execute(method, request, body, Auth::Session).await
    }

    /// Store the token from a login response and return the bare
    /// authentication record
    fn finish_authentication(&self, value: Value) -> Value {
        let authentication = unwrap_authentication(value);
        if !self.session.store_from_response(&authentication) {
            warn!("authentication response carried no token");
        }
        authentication
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.session.token().is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ApiClient for HttpClient {
    async fn fetch(&self, request: ApiRequest) -> Result<Value, Error> {
        self.send(Verb::Fetch, request).await
    }

    async fn post(&self, request: ApiRequest) -> Result<Value, Error> {
        self.send(Verb::Post, request).await
    }

    async fn set(&self, request: ApiRequest) -> Result<Value, Error> {
        self.send(Verb::Set, request).await
    }

    async fn delete(&self, request: ApiRequest) -> Result<Value, Error> {
        self.send(Verb::Delete, request).await
    }

    async fn authenticate(
        &self,
        request: ApiRequest,
        username: &str,
        password: &str,
        mfa_code: Option<&str>,
    ) -> Result<Value, Error> {
        let body = mfa_code.map(|code| json!({ "mfa_code": code }));
        let value = self
            .execute(
                Method::POST,
                request,
                body,
                Auth::Basic { username, password },
            )
            .await?;
        Ok(self.finish_authentication(value))
    }

    async fn authenticate_with_mfa_session_token(
        &self,
        request: ApiRequest,
        session_token: &str,
        mfa_code: &str,
    ) -> Result<Value, Error> {
        let body = Some(json!({ "mfa_code": mfa_code }));
        let value = self
            .execute(Method::POST, request, body, Auth::MfaSession(session_token))
            .await?;
        Ok(self.finish_authentication(value))
    }
}

async fn read_response(
    response: Response,
    path: &str,
    request_id: &RequestId,
) -> Result<Value, Error> {
    let status = response.status();
    let session_token = response
        .headers()
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = response.text().await.map_err(transport_error)?;

    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&text).map_err(|e| Error::decode(path, e));
    }

    let mut error = ApiError::from_body(status.as_u16(), &text).with_request_id(request_id.as_str());
    if let Some(token) = session_token {
        error = error.with_session_token(token);
    }
    debug!(status = error.status, code = %error.code, "AIMS request failed");
    Err(Error::Api(error))
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::Transport(Box::new(e))
}

/// AIMS wraps login results in `{"authentication": {...}}`
fn unwrap_authentication(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("authentication") => map
            .remove("authentication")
            .unwrap_or(Value::Null),
        other => other,
    }
}

/// Flatten a params object into query pairs.
///
/// Strings go as-is, scalars as their JSON text, arrays repeat the key,
/// nulls are dropped.
fn query_pairs(params: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> HttpClient {
        HttpClient::new(&HttpConfig::default().with_base_url("https://api.example.com/")).unwrap()
    }

    #[test]
    fn test_url_without_account() {
        let url = client()
            .url_for(&ApiRequest::new("aims", "/token_info"))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/aims/v1/token_info");
    }

    #[test]
    fn test_url_with_account_and_params() {
        let request = ApiRequest::new("aims", "/users")
            .with_account("12345678")
            .with_query(&json!({"include_role_ids": true, "skip": null, "tag": ["a", "b"]}))
            .unwrap();
        let url = client().url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/aims/v1/12345678/users?include_role_ids=true&tag=a&tag=b"
        );
    }

    #[test]
    fn test_url_keeps_encoded_segments() {
        let request = ApiRequest::new("aims", "/roles/a%2Fb");
        let url = client().url_for(&request).unwrap();
        assert_eq!(url.path(), "/aims/v1/roles/a%2Fb");
    }

    #[test]
    fn test_url_encodes_account() {
        let request = ApiRequest::new("aims", "/roles/R1").with_account("123?x=1#");
        let url = client().url_for(&request).unwrap();
        assert_eq!(url.path(), "/aims/v1/123%3Fx=1%23/roles/R1");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_url_rejects_dot_segments() {
        for request in [
            ApiRequest::new("aims", "/roles/.."),
            ApiRequest::new("aims", "/roles/%2e%2E"),
            ApiRequest::new("aims", "/roles").with_account(".."),
        ] {
            assert!(matches!(
                client().url_for(&request),
                Err(Error::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_base_url_with_prefix() {
        let client =
            HttpClient::new(&HttpConfig::default().with_base_url("http://localhost:8080/proxy"))
                .unwrap();
        let url = client.url_for(&ApiRequest::new("aims", "/roles")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/proxy/aims/v1/roles");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpClient::new(&HttpConfig::default().with_base_url("not a url"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = HttpClient::new(&HttpConfig::default().with_timeout(Duration::ZERO));
        assert!(matches!(result, Err(Error::Config(_))));

        let result = HttpClient::new(&HttpConfig::default().with_timeout(Duration::from_millis(1)));
        assert!(result.is_ok());
    }

    #[test]
    fn test_unwrap_authentication() {
        let wrapped = json!({"authentication": {"token": "abc"}});
        assert_eq!(unwrap_authentication(wrapped), json!({"token": "abc"}));

        let bare = json!({"token": "abc"});
        assert_eq!(unwrap_authentication(bare.clone()), bare);
    }

    #[test]
    fn test_token_management() {
        let client = client().with_token("abc");
        assert_eq!(client.token().as_deref(), Some("abc"));

        let clone = client.clone();
        clone.set_token("def");
        assert_eq!(client.token().as_deref(), Some("def"));

        client.clear_token();
        assert!(clone.token().is_none());
    }
}
