//! Client configuration: base URL, default headers, timeout.
//!
//! A `ClientConfig` is fixed once it is handed to `ApiClient`; nothing mutates
//! it per call.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
pub const BASE_URL_ENV: &str = "API_URL";
pub const TIMEOUT_ENV: &str = "API_TIMEOUT_SECS";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid API_TIMEOUT_SECS value {value:?}")]
    InvalidTimeout { value: String },

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[source] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Absolute URL without a trailing slash.
    pub base_url: String,
    pub default_headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        url::Url::parse(base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            timeout: Some(DEFAULT_TIMEOUT),
        })
    }

    /// Read `API_URL` and `API_TIMEOUT_SECS` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(&base_url)?;
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout { value: raw.clone() })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Add a header sent with every request. Replaces an existing header of
    /// the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.default_headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.default_headers.push((name, value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Join `path` onto the base URL with exactly one `/` between them.
    pub fn url_for(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return self.base_url.clone();
        }
        format!("{}/{path}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ClientConfig::new("http://localhost:3000/").unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.url_for("/todos"), "http://localhost:3000/todos");
        assert_eq!(config.url_for("todos/1"), "http://localhost:3000/todos/1");
    }

    #[test]
    fn defaults_to_json_content_type_and_timeout() {
        let config = ClientConfig::new("http://localhost:3000").unwrap();
        assert_eq!(
            config.default_headers,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let err = ClientConfig::new("todos").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn lookup_falls_back_to_default_base_url() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn lookup_reads_url_and_timeout() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("API_URL", "http://10.0.0.1:8080/api/"),
            ("API_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.1:8080/api");
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("API_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { value } if value == "soon"));
    }

    #[test]
    fn with_header_replaces_same_name() {
        let config = ClientConfig::new("http://localhost")
            .unwrap()
            .with_header("content-type", "text/plain")
            .with_header("Authorization", "Bearer t");
        assert_eq!(
            config.default_headers,
            vec![
                ("content-type".to_string(), "text/plain".to_string()),
                ("Authorization".to_string(), "Bearer t".to_string()),
            ]
        );
    }
}
