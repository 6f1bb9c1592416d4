//! Client configuration.
//!
//! Defaults match a backend running locally on port 8000.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for talking to the agent backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the versioned API (e.g., "http://localhost:8000/api/v1").
    #[serde(default = "ClientConfig::default_api_base")]
    pub api_base: String,

    /// Upper bound for a whole request, including a streamed body, in seconds.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Capacity of the session update channel.
    #[serde(default = "ClientConfig::default_channel_capacity")]
    pub channel_capacity: usize,
}

impl ClientConfig {
    fn default_api_base() -> String {
        "http://localhost:8000/api/v1".to_string()
    }

    const fn default_request_timeout() -> u64 {
        300 // 5 minutes
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    const fn default_channel_capacity() -> usize {
        128
    }

    /// Build a config for the given API base with every other field defaulted.
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }

    /// API base without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: Self::default_api_base(),
            request_timeout_secs: Self::default_request_timeout(),
            connect_timeout_secs: Self::default_connect_timeout(),
            channel_capacity: Self::default_channel_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base, "http://localhost:8000/api/v1");
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.channel_capacity, 128);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"api_base":"http://agent.internal/api/v1/"}"#).unwrap();
        assert_eq!(config.base_url(), "http://agent.internal/api/v1");
        assert_eq!(config.request_timeout_secs, 300);
    }
}
