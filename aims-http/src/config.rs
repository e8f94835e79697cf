//! Transport configuration

use serde::Deserialize;
use std::time::Duration;

/// Settings for [`HttpClient`](crate::HttpClient)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    /// API root, without the service segment
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sub-second remainders round up, so a non-zero timeout never becomes zero
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://api.cloudinsight.alertlogic.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("aims-client/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.base_url, "https://api.cloudinsight.alertlogic.com");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("aims-client/"));
    }

    #[test]
    fn test_partial_deserialize() {
        let config: HttpConfig =
            serde_json::from_str(r#"{"base_url": "http://localhost:8080"}"#).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_builders() {
        let config = HttpConfig::default()
            .with_base_url("http://127.0.0.1:9000")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_sub_second_timeout_rounds_up() {
        let config = HttpConfig::default().with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout_secs, 1);
        let config = HttpConfig::default().with_timeout(Duration::from_millis(2500));
        assert_eq!(config.timeout_secs, 3);
        let config = HttpConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(config.timeout_secs, 0);
    }
}
