use std::time::Duration;

use crate::net::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY, ReconnectPolicy};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
pub const DEFAULT_MIN_MOVEMENT_M: f64 = 10.0;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base address of the API; the socket scheme is derived from it.
    pub server_url: String,
    pub min_movement_m: f64,
    pub heartbeat_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub initial_fix_attempts: u32,
    pub fix_backoff_base: Duration,
    pub fix_backoff_cap: Duration,
    pub fix_timeout: Duration,
    pub cached_fix_max_age: Duration,
    pub fallback_poll_interval: Duration,
    pub keepalive_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            min_movement_m: DEFAULT_MIN_MOVEMENT_M,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            initial_fix_attempts: 3,
            fix_backoff_base: Duration::from_secs(1),
            fix_backoff_cap: Duration::from_secs(5),
            fix_timeout: Duration::from_secs(10),
            cached_fix_max_age: Duration::from_secs(5 * 60),
            fallback_poll_interval: Duration::from_secs(15),
            keepalive_interval: Some(Duration::from_secs(25)),
        }
    }
}

impl SessionConfig {
    pub fn with_server_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: self.reconnect_base_delay,
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.initial_fix_attempts, 3);
        assert_eq!(config.cached_fix_max_age, Duration::from_secs(300));

        let policy = config.reconnect_policy();
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn test_with_server_url_keeps_defaults() {
        let config = SessionConfig::with_server_url("https://api.example.com");
        assert_eq!(config.server_url, "https://api.example.com");
        assert_eq!(config.min_movement_m, DEFAULT_MIN_MOVEMENT_M);
    }
}
