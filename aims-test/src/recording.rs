//! In-memory client that records calls instead of sending them

use aims_core::{ApiClient, ApiRequest, Error, Verb};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// One call received by a [`RecordingClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Request {
        verb: Verb,
        request: ApiRequest,
    },
    Authenticate {
        request: ApiRequest,
        username: String,
        password: String,
        mfa_code: Option<String>,
    },
    MfaSessionToken {
        request: ApiRequest,
        session_token: String,
        mfa_code: String,
    },
}

impl RecordedCall {
    /// The verb, for plain requests
    pub fn verb(&self) -> Option<Verb> {
        match self {
            Self::Request { verb, .. } => Some(*verb),
            _ => None,
        }
    }

    pub fn request(&self) -> &ApiRequest {
        match self {
            Self::Request { request, .. }
            | Self::Authenticate { request, .. }
            | Self::MfaSessionToken { request, .. } => request,
        }
    }
}

/// Client double for mapper tests.
///
/// Responses are served in the order they were queued. Once the queue is
/// empty every call answers with an empty JSON object.
#[derive(Debug, Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<VecDeque<Result<Value, Error>>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn respond_with(&self, value: Value) -> &Self {
        self.responses.lock().push_back(Ok(value));
        self
    }

    /// Queue a failure
    pub fn fail_with(&self, error: Error) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// The only call received.
    ///
    /// Panics unless exactly one call was made.
    pub fn single_call(&self) -> RecordedCall {
        let calls = self.calls.lock();
        assert_eq!(calls.len(), 1, "expected exactly one call, got {calls:?}");
        calls[0].clone()
    }

    fn record(&self, call: RecordedCall) -> Result<Value, Error> {
        tracing::trace!(?call, "recorded call");
        self.calls.lock().push(call);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Value::Object(Map::new())))
    }

    fn record_request(&self, verb: Verb, request: ApiRequest) -> Result<Value, Error> {
        self.record(RecordedCall::Request { verb, request })
    }
}

#[async_trait]
impl ApiClient for RecordingClient {
    async fn fetch(&self, request: ApiRequest) -> Result<Value, Error> {
        self.record_request(Verb::Fetch, request)
    }

    async fn post(&self, request: ApiRequest) -> Result<Value, Error> {
        self.record_request(Verb::Post, request)
    }

    async fn set(&self, request: ApiRequest) -> Result<Value, Error> {
        self.record_request(Verb::Set, request)
    }

    async fn delete(&self, request: ApiRequest) -> Result<Value, Error> {
        self.record_request(Verb::Delete, request)
    }

    async fn authenticate(
        &self,
        request: ApiRequest,
        username: &str,
        password: &str,
        mfa_code: Option<&str>,
    ) -> Result<Value, Error> {
        self.record(RecordedCall::Authenticate {
            request,
            username: username.to_string(),
            password: password.to_string(),
            mfa_code: mfa_code.map(str::to_string),
        })
    }

    async fn authenticate_with_mfa_session_token(
        &self,
        request: ApiRequest,
        session_token: &str,
        mfa_code: &str,
    ) -> Result<Value, Error> {
        self.record(RecordedCall::MfaSessionToken {
            request,
            session_token: session_token.to_string(),
            mfa_code: mfa_code.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aims_core::ApiError;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let client = RecordingClient::new();
        client.fetch(ApiRequest::new("aims", "/roles")).await.unwrap();
        client
            .delete(ApiRequest::new("aims", "/roles/R1").with_account("1"))
            .await
            .unwrap();

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].verb(), Some(Verb::Fetch));
        assert_eq!(calls[1].verb(), Some(Verb::Delete));
        assert_eq!(calls[1].request().account_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_serves_queued_responses() {
        let client = RecordingClient::new();
        client
            .respond_with(json!({"id": "1"}))
            .fail_with(ApiError::new(404, "missing").into());

        let first = client.fetch(ApiRequest::new("aims", "/a")).await.unwrap();
        assert_eq!(first, json!({"id": "1"}));

        let second = client.fetch(ApiRequest::new("aims", "/b")).await;
        assert!(matches!(second, Err(Error::Api(e)) if e.status == 404));

        let third = client.fetch(ApiRequest::new("aims", "/c")).await.unwrap();
        assert_eq!(third, json!({}));
    }

    #[tokio::test]
    async fn test_records_authentication() {
        let client = RecordingClient::new();
        client
            .authenticate(ApiRequest::new("aims", "/authenticate"), "bob", "hunter2", None)
            .await
            .unwrap();

        match client.single_call() {
            RecordedCall::Authenticate {
                username, mfa_code, ..
            } => {
                assert_eq!(username, "bob");
                assert!(mfa_code.is_none());
            }
            other => panic!("unexpected call {other:?}"),
        }
    }
}
