//! Configuration for the preview session core.

use std::time::Duration;

/// Tunables for one preview session.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// How long to wait for the connect acknowledgment before reporting
    /// the channel as disconnected.
    pub connect_timeout: Duration,
    /// Optional delay coalescing rapid execution requests into one send.
    pub debounce: Option<Duration>,
    /// How long a fetched auth token stays valid in the cache.
    pub token_validity: Duration,
}

impl PreviewConfig {
    /// Create a configuration with default timings.
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_millis(3000),
            debounce: None,
            token_validity: Duration::from_secs(300),
        }
    }

    /// Set the connect-acknowledgment timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable execution-request debouncing with the given delay.
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    /// Set the token cache validity window.
    pub fn with_token_validity(mut self, validity: Duration) -> Self {
        self.token_validity = validity;
        self
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_timings() {
        let config = PreviewConfig::new();
        assert_eq!(config.connect_timeout, Duration::from_millis(3000));
        assert!(config.debounce.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = PreviewConfig::new()
            .with_connect_timeout(Duration::from_millis(500))
            .with_debounce(Duration::from_millis(250))
            .with_token_validity(Duration::from_secs(60));

        assert_eq!(config.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.debounce, Some(Duration::from_millis(250)));
        assert_eq!(config.token_validity, Duration::from_secs(60));
    }
}
