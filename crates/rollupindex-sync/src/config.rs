//! Sync engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Engine settings, typically loaded from a JSON file next to the
/// database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base-layer height the contracts were deployed at; syncing starts no
    /// lower than this.
    pub deploy_height: u64,
    /// Confirmations required before the first windows are trusted.
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u64,
    /// Seconds to wait before retrying a failed or empty window.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Contract addresses by their address-book names, as hex strings.
    #[serde(default)]
    pub addresses: std::collections::BTreeMap<String, String>,
}

fn default_min_confirmations() -> u64 {
    6
}

fn default_poll_interval_secs() -> u64 {
    15
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            deploy_height: 0,
            min_confirmations: default_min_confirmations(),
            poll_interval_secs: default_poll_interval_secs(),
            addresses: Default::default(),
        }
    }
}

impl SyncConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SyncError::Config(format!("read {}: {e}", path.as_ref().display())))?;
        serde_json::from_str(&raw).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: SyncConfig = serde_json::from_str(r#"{"deploy_height": 100}"#).unwrap();
        assert_eq!(cfg.deploy_height, 100);
        assert_eq!(cfg.min_confirmations, 6);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(15));
        assert!(cfg.addresses.is_empty());
    }

    #[test]
    fn load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        let mut cfg = SyncConfig::default();
        cfg.deploy_height = 7;
        cfg.addresses.insert(
            "RollupInputChain".into(),
            "0x00000000000000000000000000000000000000aa".into(),
        );
        std::fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();
        let loaded = SyncConfig::load(&path).unwrap();
        assert_eq!(loaded.deploy_height, 7);
        assert_eq!(loaded.addresses.len(), 1);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(matches!(
            SyncConfig::load("/nonexistent/sync.json"),
            Err(SyncError::Config(_))
        ));
    }
}
