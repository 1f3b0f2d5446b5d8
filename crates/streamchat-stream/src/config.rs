//! Stream timing configuration.
//!
//! This module defines the knobs that govern completion inference and the
//! send-while-disconnected retry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the stream controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// How often the completion watchdog checks for inactivity, in milliseconds.
    #[serde(default = "StreamConfig::default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Silence after which a stream is considered complete, in milliseconds.
    #[serde(default = "StreamConfig::default_idle_threshold")]
    pub idle_threshold_ms: u64,

    /// Delay before the single retry of a send attempted while disconnected.
    #[serde(default = "StreamConfig::default_send_retry_delay")]
    pub send_retry_delay_ms: u64,

    /// Capacity of the per-connection outbound frame queue.
    #[serde(default = "StreamConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl StreamConfig {
    const fn default_poll_interval() -> u64 {
        500
    }

    const fn default_idle_threshold() -> u64 {
        3000
    }

    const fn default_send_retry_delay() -> u64 {
        1000
    }

    const fn default_outbound_buffer() -> usize {
        32
    }

    /// Get the watchdog poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get the inactivity threshold as a `Duration`.
    #[must_use]
    pub const fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }

    /// Get the send retry delay as a `Duration`.
    #[must_use]
    pub const fn send_retry_delay(&self) -> Duration {
        Duration::from_millis(self.send_retry_delay_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval(),
            idle_threshold_ms: Self::default_idle_threshold(),
            send_retry_delay_ms: Self::default_send_retry_delay(),
            outbound_buffer: Self::default_outbound_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.idle_threshold(), Duration::from_secs(3));
        assert_eq!(config.send_retry_delay(), Duration::from_secs(1));
        assert_eq!(config.outbound_buffer, 32);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: StreamConfig = serde_json::from_str(r#"{"idle_threshold_ms": 5000}"#).unwrap();
        assert_eq!(config.idle_threshold(), Duration::from_secs(5));
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.outbound_buffer, 32);
    }
}
