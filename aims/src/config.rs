//! Configuration management

use aims_http::HttpConfig;
use serde::Deserialize;

/// Settings read from `aims.toml` and `AIMS_*` variables.
///
/// Command-line flags override everything here.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub token: Option<String>,

    /// Account used when a command does not name one
    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: None,
            token: None,
            account_id: None,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("aims").required(false))
            .add_source(config::Environment::with_prefix("AIMS"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }

    /// Transport settings, with defaults for anything unset
    pub fn http_config(&self) -> HttpConfig {
        let mut http = HttpConfig::default();
        if let Some(base_url) = &self.base_url {
            http = http.with_base_url(base_url.as_str());
        }
        if let Some(secs) = self.timeout_secs {
            http.timeout_secs = secs;
        }
        http
    }
}
