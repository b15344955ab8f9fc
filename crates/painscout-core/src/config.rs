//! Store configuration.
//!
//! Loaded from an optional TOML file. Every field may be omitted; effective
//! values fall back to [`ConfigDefaults`], so a partial file only overrides
//! what it names:
//!
//! ```toml
//! [lock]
//! attempts = 10
//! retry_delay_ms = 200
//! stale_after_seconds = 600   # unset = never reclaim abandoned lock tokens
//!
//! [storage]
//! durability = "sync"         # "flush" (default) or "sync"
//! ```

use crate::error::{Result, StoreError};
use crate::lock::LockPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Central source of truth for all configuration defaults.
pub struct ConfigDefaults;

impl ConfigDefaults {
    pub const LOCK_ATTEMPTS: u32 = 10;
    pub const LOCK_RETRY_DELAY_MS: u64 = 200;
    pub const DURABILITY: Durability = Durability::Flush;
}

/// How far a write must get before the operation reports success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Data is handed to the OS; survives a process crash, not a power loss.
    #[default]
    Flush,
    /// Data is fsynced before rename and after every append.
    Sync,
}

impl Durability {
    pub fn should_sync(self) -> bool {
        self == Durability::Sync
    }
}

/// `[lock]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LockConfig {
    /// Acquisition attempts before giving up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,

    /// Fixed delay between attempts, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,

    /// Age after which an existing lock token is treated as abandoned and
    /// removed. Unset disables reclamation entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after_seconds: Option<u64>,
}

impl LockConfig {
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts.unwrap_or(ConfigDefaults::LOCK_ATTEMPTS).max(1)
    }

    #[inline]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(
            self.retry_delay_ms
                .unwrap_or(ConfigDefaults::LOCK_RETRY_DELAY_MS),
        )
    }

    #[inline]
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_seconds.map(Duration::from_secs)
    }
}

/// `[storage]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durability: Option<Durability>,
}

impl StorageConfig {
    #[inline]
    pub fn durability(&self) -> Durability {
        self.durability.unwrap_or(ConfigDefaults::DURABILITY)
    }
}

/// Top-level configuration shared by both stores.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StoreConfig {
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl StoreConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|message| StoreError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Lock behaviour derived from the `[lock]` table.
    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            attempts: self.lock.attempts(),
            retry_delay: self.lock.retry_delay(),
            stale_after: self.lock.stale_after(),
        }
    }

    pub fn durability(&self) -> Durability {
        self.storage.durability()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        let policy = config.lock_policy();
        assert_eq!(policy.attempts, 10);
        assert_eq!(policy.retry_delay, Duration::from_millis(200));
        assert_eq!(policy.stale_after, None);
        assert_eq!(config.durability(), Durability::Flush);
    }

    #[test]
    fn test_partial_override() {
        let config = StoreConfig::from_toml(
            r#"
[lock]
retry_delay_ms = 5

[storage]
durability = "sync"
"#,
        )
        .unwrap();
        let policy = config.lock_policy();
        assert_eq!(policy.attempts, 10);
        assert_eq!(policy.retry_delay, Duration::from_millis(5));
        assert_eq!(config.durability(), Durability::Sync);
    }

    #[test]
    fn test_stale_after_seconds() {
        let config = StoreConfig::from_toml("[lock]\nstale_after_seconds = 600\n").unwrap();
        assert_eq!(
            config.lock_policy().stale_after,
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let config = StoreConfig::from_toml("[lock]\nattempts = 0\n").unwrap();
        assert_eq!(config.lock_policy().attempts, 1);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_load_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("painscout.toml");
        fs::write(&path, "[storage]\ndurability = \"eventually\"\n").unwrap();

        let err = StoreConfig::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Config { .. }));
        assert!(err.to_string().contains("painscout.toml"));
    }
}
