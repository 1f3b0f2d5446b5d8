//! Client configuration resolved from command-line arguments.

use std::time::Duration;

use streamchat_stream::StreamConfig;

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The API base URL is not http(s).
    #[error("API base must start with http:// or https://, got '{0}'")]
    InvalidApiBase(String),

    /// The WebSocket base URL is not ws(s).
    #[error("WebSocket base must start with ws:// or wss://, got '{0}'")]
    InvalidWsBase(String),

    /// A stream timing value that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroTiming(&'static str),
}

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST base URL, without trailing slash.
    pub api_base: String,
    /// WebSocket base URL, without trailing slash.
    pub ws_base: String,
    /// Stream timing.
    pub stream: StreamConfig,
    /// Timeout for REST calls.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Resolve the configuration. The WebSocket base defaults to the API base with
    /// its scheme swapped.
    ///
    /// # Errors
    ///
    /// Returns an error if either base has an unexpected scheme, or if the poll
    /// interval or idle threshold is zero.
    pub fn resolve(
        api_base: &str,
        ws_base: Option<&str>,
        stream: StreamConfig,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let api_base = api_base.trim().trim_end_matches('/').to_string();
        if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
            return Err(ConfigError::InvalidApiBase(api_base));
        }

        let ws_base = match ws_base {
            Some(ws) => {
                let ws = ws.trim().trim_end_matches('/').to_string();
                if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
                    return Err(ConfigError::InvalidWsBase(ws));
                }
                ws
            }
            None => derive_ws_base(&api_base),
        };

        if stream.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroTiming("poll interval"));
        }
        if stream.idle_threshold_ms == 0 {
            return Err(ConfigError::ZeroTiming("idle threshold"));
        }

        Ok(Self {
            api_base,
            ws_base,
            stream,
            request_timeout,
        })
    }
}

/// `http://` becomes `ws://`, `https://` becomes `wss://`.
fn derive_ws_base(api_base: &str) -> String {
    if let Some(rest) = api_base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(api: &str, ws: Option<&str>) -> Result<ClientConfig, ConfigError> {
        ClientConfig::resolve(api, ws, StreamConfig::default(), Duration::from_secs(30))
    }

    #[test]
    fn derives_ws_from_http() {
        let config = resolve("http://127.0.0.1:8000/", None).unwrap();
        assert_eq!(config.api_base, "http://127.0.0.1:8000");
        assert_eq!(config.ws_base, "ws://127.0.0.1:8000");
    }

    #[test]
    fn derives_wss_from_https() {
        let config = resolve("https://chat.example.com/api", None).unwrap();
        assert_eq!(config.ws_base, "wss://chat.example.com/api");
    }

    #[test]
    fn explicit_ws_base_wins() {
        let config = resolve("http://localhost:8000", Some("wss://push.example.com/")).unwrap();
        assert_eq!(config.ws_base, "wss://push.example.com");
    }

    #[test]
    fn rejects_bad_schemes() {
        assert_eq!(
            resolve("ftp://host", None).unwrap_err(),
            ConfigError::InvalidApiBase("ftp://host".into())
        );
        assert!(matches!(
            resolve("http://host", Some("http://host")),
            Err(ConfigError::InvalidWsBase(_))
        ));
    }

    #[test]
    fn rejects_zero_timing() {
        let stream = StreamConfig {
            poll_interval_ms: 0,
            ..StreamConfig::default()
        };
        assert_eq!(
            ClientConfig::resolve("http://host", None, stream, Duration::from_secs(30)),
            Err(ConfigError::ZeroTiming("poll interval"))
        );

        let stream = StreamConfig {
            idle_threshold_ms: 0,
            ..StreamConfig::default()
        };
        assert_eq!(
            ClientConfig::resolve("http://host", None, stream, Duration::from_secs(30)),
            Err(ConfigError::ZeroTiming("idle threshold"))
        );
    }
}
