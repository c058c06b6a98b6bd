//! Listener configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the inspector HTTP + WebSocket listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Host to bind to; also used verbatim in advertised URLs
    pub host: String,

    /// Port to bind to (0 for an ephemeral port)
    pub port: u16,

    /// Largest accepted WebSocket message in bytes (default 1 GiB, heap snapshots are big)
    pub max_payload_length: usize,

    /// Seconds without inbound traffic before a connection is closed
    pub idle_timeout_secs: u64,

    /// Queued-but-unwritten bytes allowed per connection (default 64 MiB)
    pub max_backpressure: usize,

    /// Close a connection that exceeds `max_backpressure` instead of dropping the message
    pub close_on_backpressure_limit: bool,

    /// Whether outbound traffic also resets the idle timer
    pub reset_idle_timeout_on_send: bool,

    /// Send WebSocket pings so live clients answer before the idle timeout
    pub send_pings_automatically: bool,

    /// Request per-message compression
    pub compression: bool,

    /// `Browser` string reported by `/json/version`
    pub browser_version: String,

    /// `Protocol-Version` string reported by `/json/version`
    pub protocol_version: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9229,
            max_payload_length: 1024 * 1024 * 1024, // 1 GiB
            idle_timeout_secs: 512,
            max_backpressure: 64 * 1024 * 1024, // 64 MiB
            close_on_backpressure_limit: false,
            reset_idle_timeout_on_send: false,
            send_pings_automatically: true,
            compression: false,
            browser_version: "node.js/19.6.0".to_string(),
            protocol_version: "1.1".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Create a listener configuration for `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set maximum WebSocket message size
    pub fn with_max_payload_length(mut self, size: usize) -> Self {
        self.max_payload_length = size;
        self
    }

    /// Set idle timeout in seconds
    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    /// Set per-connection backpressure ceiling
    pub fn with_max_backpressure(mut self, bytes: usize) -> Self {
        self.max_backpressure = bytes;
        self
    }

    /// Close connections over the backpressure ceiling
    pub fn with_close_on_backpressure_limit(mut self, close: bool) -> Self {
        self.close_on_backpressure_limit = close;
        self
    }

    /// Let outbound traffic reset the idle timer
    pub fn with_reset_idle_timeout_on_send(mut self, reset: bool) -> Self {
        self.reset_idle_timeout_on_send = reset;
        self
    }

    /// Enable or disable automatic pings
    pub fn with_send_pings_automatically(mut self, enabled: bool) -> Self {
        self.send_pings_automatically = enabled;
        self
    }

    /// Request per-message compression
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Set the `Browser` string for `/json/version`
    pub fn with_browser_version(mut self, version: impl Into<String>) -> Self {
        self.browser_version = version.into();
        self
    }

    /// Idle timeout as a duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Interval between automatic pings: half the idle timeout, at least one second
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs((self.idle_timeout_secs / 2).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ListenerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.max_payload_length, 1024 * 1024 * 1024);
        assert_eq!(config.idle_timeout(), Duration::from_secs(512));
        assert_eq!(config.max_backpressure, 64 * 1024 * 1024);
        assert!(!config.close_on_backpressure_limit);
        assert!(!config.reset_idle_timeout_on_send);
        assert!(config.send_pings_automatically);
        assert!(!config.compression);
        assert_eq!(config.protocol_version, "1.1");
    }

    #[test]
    fn test_builder_pattern() {
        let config = ListenerConfig::new("0.0.0.0", 9230)
            .with_max_payload_length(1024)
            .with_idle_timeout_secs(10)
            .with_max_backpressure(2048)
            .with_close_on_backpressure_limit(true)
            .with_browser_version("custom/1.0");

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9230);
        assert_eq!(config.max_payload_length, 1024);
        assert_eq!(config.max_backpressure, 2048);
        assert!(config.close_on_backpressure_limit);
        assert_eq!(config.browser_version, "custom/1.0");
        assert_eq!(config.ping_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_ping_interval_floor() {
        let config = ListenerConfig::default().with_idle_timeout_secs(1);
        assert_eq!(config.ping_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_deserialize_from_json() {
        let mut value = serde_json::to_value(ListenerConfig::default()).unwrap();
        value["port"] = serde_json::json!(6499);

        let config: ListenerConfig = serde_json::from_value(value).unwrap();
        assert_eq!(config.port, 6499);
    }
}
