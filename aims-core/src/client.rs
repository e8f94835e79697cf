//! The client seam every AIMS transport implements

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;
use crate::request::ApiRequest;

/// The four request verbs an [`ApiClient`] exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Read (GET)
    Fetch,
    /// Create or update (POST)
    Post,
    /// Idempotent replace (PUT)
    Set,
    /// Remove (DELETE)
    Delete,
}

impl Verb {
    /// HTTP method name
    pub fn method(&self) -> &'static str {
        match self {
            Self::Fetch => "GET",
            Self::Post => "POST",
            Self::Set => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.method())
    }
}

/// Generic JSON-over-HTTP client.
///
/// Implementations own transport, authentication headers and status
/// handling. Callers get the decoded JSON body back, or `Value::Null` when
/// the response had no body.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// GET the described resource
    async fn fetch(&self, request: ApiRequest) -> Result<Value, Error>;

    /// POST the request data
    async fn post(&self, request: ApiRequest) -> Result<Value, Error>;

    /// PUT the request data
    async fn set(&self, request: ApiRequest) -> Result<Value, Error>;

    /// DELETE the described resource
    async fn delete(&self, request: ApiRequest) -> Result<Value, Error>;

    /// Authenticate with username and password, optionally with an MFA code
    async fn authenticate(
        &self,
        request: ApiRequest,
        username: &str,
        password: &str,
        mfa_code: Option<&str>,
    ) -> Result<Value, Error>;

    /// Complete an MFA challenge using the session token from a prior
    /// `authenticate` call
    async fn authenticate_with_mfa_session_token(
        &self,
        request: ApiRequest,
        session_token: &str,
        mfa_code: &str,
    ) -> Result<Value, Error>;

    /// Dispatch `request` to the method matching `verb`
    async fn call(&self, verb: Verb, request: ApiRequest) -> Result<Value, Error> {
        match verb {
            Verb::Fetch => self.fetch(request).await,
            Verb::Post => self.post(request).await,
            Verb::Set => self.set(request).await,
            Verb::Delete => self.delete(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records which method `call` reached
    #[derive(Default)]
    struct VerbRecorder {
        seen: Mutex<Vec<&'static str>>,
    }

    impl VerbRecorder {
        fn record(&self, name: &'static str) -> Result<Value, Error> {
            self.seen.lock().unwrap().push(name);
            Ok(Value::Null)
        }
    }

    #[async_trait]
    impl ApiClient for VerbRecorder {
        async fn fetch(&self, _request: ApiRequest) -> Result<Value, Error> {
            self.record("fetch")
        }

        async fn post(&self, _request: ApiRequest) -> Result<Value, Error> {
            self.record("post")
        }

        async fn set(&self, _request: ApiRequest) -> Result<Value, Error> {
            self.record("set")
        }

        async fn delete(&self, _request: ApiRequest) -> Result<Value, Error> {
            self.record("delete")
        }

        async fn authenticate(
            &self,
            _request: ApiRequest,
            _username: &str,
            _password: &str,
            _mfa_code: Option<&str>,
        ) -> Result<Value, Error> {
            self.record("authenticate")
        }

        async fn authenticate_with_mfa_session_token(
            &self,
            _request: ApiRequest,
            _session_token: &str,
            _mfa_code: &str,
        ) -> Result<Value, Error> {
            self.record("authenticate_with_mfa_session_token")
        }
    }

    #[test]
    fn test_verb_methods() {
        assert_eq!(Verb::Fetch.method(), "GET");
        assert_eq!(Verb::Post.method(), "POST");
        assert_eq!(Verb::Set.method(), "PUT");
        assert_eq!(Verb::Delete.method(), "DELETE");
        assert_eq!(Verb::Set.to_string(), "PUT");
    }

    #[tokio::test]
    async fn test_call_dispatches_by_verb() {
        let recorder = VerbRecorder::default();
        for verb in [Verb::Fetch, Verb::Post, Verb::Set, Verb::Delete] {
            recorder
                .call(verb, ApiRequest::new("aims", "/roles"))
                .await
                .unwrap();
        }
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["fetch", "post", "set", "delete"]
        );
    }
}
