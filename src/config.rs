//! Runtime configuration for the history server

use std::net::SocketAddr;
use std::time::Duration;

use crate::github::client::{DEFAULT_GRAPHQL_URL, DEFAULT_REST_BASE_URL};

/// Default address the HTTP server binds to
pub const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 5000);

/// Default interval between stream keep-alive events
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Token used for both GraphQL and REST calls. Unauthenticated when `None`.
    pub github_token: Option<String>,
    pub heartbeat_interval: Duration,
    pub graphql_url: String,
    pub rest_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(DEFAULT_BIND_ADDR),
            github_token: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            rest_base_url: DEFAULT_REST_BASE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(config.graphql_url, "https://api.github.com/graphql");
        assert!(config.github_token.is_none());
    }
}
