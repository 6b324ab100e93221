//! Sync configuration.

use std::time::Duration;

use serde::Deserialize;

/// Settings for the periodic snapshot refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Seconds between background refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl SyncConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.refresh_interval_secs, 600);
        assert_eq!(config.refresh_interval(), Duration::from_secs(600));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.refresh_interval_secs, 600);

        let config: SyncConfig =
            serde_json::from_str(r#"{"refresh_interval_secs": 60}"#).unwrap();
        assert_eq!(config.refresh_interval_secs, 60);
    }
}
