//! Request descriptors handed to an [`ApiClient`](crate::ApiClient)

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::Error;
use crate::DEFAULT_SERVICE_VERSION;

/// Query parameters, as a JSON object
pub type Params = Map<String, Value>;

/// Characters escaped when a caller value becomes one path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Reject values that cannot stand as a single path segment.
///
/// Empty values and the dot segments `.` and `..` would be collapsed or
/// resolved by URL normalization and so address a different resource.
pub fn check_segment(value: &str) -> Result<&str, Error> {
    match value {
        "" => Err(Error::InvalidRequest("empty path segment".to_string())),
        "." | ".." => Err(Error::InvalidRequest(format!(
            "'{value}' is not allowed as a path segment"
        ))),
        _ => Ok(value),
    }
}

/// Percent-encode `value` as one path segment
pub fn encode_segment(value: &str) -> Result<String, Error> {
    let value = check_segment(value)?;
    Ok(utf8_percent_encode(value, PATH_SEGMENT).to_string())
}

/// A transport-neutral description of one API call.
///
/// The URL a transport builds from it is
/// `{base}/{service_name}/{service_version}[/{account_id}]{path}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub service_name: String,
    pub service_version: String,
    pub account_id: Option<String>,
    pub path: String,
    pub params: Option<Params>,
    pub data: Option<Value>,
    /// Cache hint; transports are free to ignore it
    pub ttl: Option<Duration>,
}

impl ApiRequest {
    pub fn new(service_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: DEFAULT_SERVICE_VERSION.to_string(),
            account_id: None,
            path: path.into(),
            params: None,
            data: None,
            ttl: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    /// Serialize `query` into the params object.
    ///
    /// The value must serialize to a JSON object; anything else is rejected.
    pub fn with_query<Q: Serialize + ?Sized>(self, query: &Q) -> Result<Self, Error> {
        match serde_json::to_value(query).map_err(Error::Encode)? {
            Value::Object(params) => Ok(self.with_params(params)),
            other => Err(Error::InvalidRequest(format!(
                "query parameters must be an object, got {other}"
            ))),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize `body` into the request data
    pub fn with_body<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, Error> {
        let data = serde_json::to_value(body).map_err(Error::Encode)?;
        Ok(self.with_data(data))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Path relative to the service root, including the account segment.
    ///
    /// The account id is percent-encoded; `path` is taken as already
    /// encoded.
    pub fn scoped_path(&self) -> String {
        match &self.account_id {
            Some(account_id) => format!(
                "/{}{}",
                utf8_percent_encode(account_id, PATH_SEGMENT),
                self.path
            ),
            None => self.path.clone(),
        }
    }

    /// Decoded URL path segments:
    /// `service_name`, `service_version`, the account id if any, then each
    /// segment of `path`.
    ///
    /// Fails with [`Error::InvalidRequest`] when any segment is empty, `.`
    /// or `..`, including percent-encoded dots.
    pub fn url_segments(&self) -> Result<Vec<String>, Error> {
        let mut segments = vec![
            check_segment(&self.service_name)?.to_string(),
            check_segment(&self.service_version)?.to_string(),
        ];
        if let Some(account_id) = &self.account_id {
            segments.push(check_segment(account_id)?.to_string());
        }

        let path = self.path.strip_prefix('/').unwrap_or(&self.path);
        for raw in path.split('/') {
            let decoded = percent_decode_str(raw).decode_utf8().map_err(|_| {
                Error::InvalidRequest(format!("path segment '{raw}' is not valid UTF-8"))
            })?;
            segments.push(check_segment(&decoded)?.to_string());
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let request = ApiRequest::new("aims", "/token_info");
        assert_eq!(request.service_version, "v1");
        assert!(request.account_id.is_none());
        assert!(request.params.is_none());
        assert!(request.data.is_none());
        assert!(request.ttl.is_none());
        assert_eq!(request.scoped_path(), "/token_info");
    }

    #[test]
    fn test_scoped_path() {
        let request = ApiRequest::new("aims", "/roles").with_account("12345");
        assert_eq!(request.scoped_path(), "/12345/roles");
    }

    #[test]
    fn test_scoped_path_encodes_account() {
        let request = ApiRequest::new("aims", "/roles/R1").with_account("123/users?x=1#");
        assert_eq!(request.scoped_path(), "/123%2Fusers%3Fx=1%23/roles/R1");
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("admin@company.com").unwrap(), "admin@company.com");
        assert_eq!(encode_segment("a/b").unwrap(), "a%2Fb");
        assert_eq!(encode_segment("a b?c#d").unwrap(), "a%20b%3Fc%23d");
        assert_eq!(encode_segment("100%").unwrap(), "100%25");
        assert_eq!(encode_segment("%2E%2E").unwrap(), "%252E%252E");
        assert_eq!(encode_segment("..a").unwrap(), "..a");
    }

    #[test]
    fn test_dot_segments_rejected() {
        for value in ["", ".", ".."] {
            assert!(matches!(
                encode_segment(value),
                Err(Error::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_url_segments() {
        let request = ApiRequest::new("aims", "/roles/a%2Fb").with_account("123/x");
        assert_eq!(
            request.url_segments().unwrap(),
            vec!["aims", "v1", "123/x", "roles", "a/b"]
        );
    }

    #[test]
    fn test_url_segments_reject_dots() {
        let cases = [
            ApiRequest::new("aims", "/roles/.."),
            ApiRequest::new("aims", "/roles/%2E%2E"),
            ApiRequest::new("aims", "/roles/%2e"),
            ApiRequest::new("aims", "/roles/"),
            ApiRequest::new("aims", "/roles").with_account(".."),
            ApiRequest::new("aims", "/roles").with_account(""),
        ];
        for request in cases {
            assert!(
                matches!(request.url_segments(), Err(Error::InvalidRequest(_))),
                "{request:?}"
            );
        }
    }

    #[test]
    fn test_with_query_object() {
        #[derive(Serialize)]
        struct Query {
            include_role_ids: bool,
        }

        let request = ApiRequest::new("aims", "/users")
            .with_query(&Query {
                include_role_ids: true,
            })
            .unwrap();
        assert_eq!(
            Value::Object(request.params.unwrap()),
            json!({"include_role_ids": true})
        );
    }

    #[test]
    fn test_with_query_rejects_non_object() {
        let result = ApiRequest::new("aims", "/users").with_query(&vec!["a", "b"]);
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_with_body() {
        let request = ApiRequest::new("aims", "/account")
            .with_body(&json!({"mfa_required": true}))
            .unwrap();
        assert_eq!(request.data, Some(json!({"mfa_required": true})));
    }
}
