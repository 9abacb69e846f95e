//! Connection configuration.

use std::time::Duration;

use crate::request::DEFAULT_API_ROOT;

/// Server URL used by `ConnectionConfig::from_env` when `DOCDB_URL` is unset.
pub const DEFAULT_URL: &str = "http://localhost:8529";

/// Settings for building a `Connection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Base URL of the server, e.g. `http://localhost:8529`.
    pub url: String,
    /// Path segment prefixed to every logical path.
    pub api_root: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Global per-request timeout handed to the HTTP transport.
    pub timeout: Option<Duration>,
    /// Largest response body accepted, in bytes. `None` means unlimited.
    pub max_response_bytes: Option<u64>,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_root: DEFAULT_API_ROOT.to_string(),
            username: None,
            password: None,
            timeout: None,
            max_response_bytes: None,
        }
    }

    /// Read `DOCDB_URL`, `DOCDB_USERNAME`, `DOCDB_PASSWORD`,
    /// `DOCDB_TIMEOUT_SECS` and `DOCDB_MAX_RESPONSE_BYTES`. Unparsable numbers
    /// are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new(lookup("DOCDB_URL").unwrap_or_else(|| DEFAULT_URL.to_string()));
        config.username = lookup("DOCDB_USERNAME");
        config.password = lookup("DOCDB_PASSWORD");
        config.timeout = lookup("DOCDB_TIMEOUT_SECS")
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        config.max_response_bytes =
            lookup("DOCDB_MAX_RESPONSE_BYTES").and_then(|bytes| bytes.trim().parse::<u64>().ok());
        config
    }

    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_response_bytes(mut self, limit: u64) -> Self {
        self.max_response_bytes = Some(limit);
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ConnectionConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ConnectionConfig::default());
        assert_eq!(config.api_root, "_api");
    }

    #[test]
    fn environment_overrides() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("DOCDB_URL", "https://db.example.com:8530"),
            ("DOCDB_USERNAME", "root"),
            ("DOCDB_PASSWORD", "secret"),
            ("DOCDB_TIMEOUT_SECS", "15"),
            ("DOCDB_MAX_RESPONSE_BYTES", "1048576"),
        ]));
        assert_eq!(config.url, "https://db.example.com:8530");
        assert_eq!(config.username.as_deref(), Some("root"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.max_response_bytes, Some(1_048_576));
    }

    #[test]
    fn bad_numbers_are_ignored() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("DOCDB_TIMEOUT_SECS", "soon"),
            ("DOCDB_MAX_RESPONSE_BYTES", "lots"),
        ]));
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_response_bytes, None);
    }
}
