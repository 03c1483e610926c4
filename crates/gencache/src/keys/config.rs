//! Key synthesizer configuration

use std::time::Duration;

/// Key synthesizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyConfig {
    /// Additional attempts for a refresh batch after a retryable store error
    pub refresh_retries: u32,
    /// Pause between refresh attempts
    pub refresh_backoff: Duration,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            refresh_retries: 3,
            refresh_backoff: Duration::from_millis(50),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_config_default() {
        let config = KeyConfig::default();
        assert_eq!(config.refresh_retries, 3);
        assert_eq!(config.refresh_backoff, Duration::from_millis(50));
        assert_eq!(config, KeyConfig::new());
    }
}
