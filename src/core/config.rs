//! Configuration for the conversation store.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{StoreError, StoreResult};

/// Top-level configuration for the conversation store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Skip chats whose history only carries protocol stubs.
    pub filter_chats: bool,
    /// Sort pinned chats ahead of everything else.
    pub pin_chats_first: bool,
    /// Maximum number of live user-defined labels.
    pub label_capacity: usize,
    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Background maintenance settings.
    pub cleanup: CleanupConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            filter_chats: false,
            pin_chats_first: true,
            label_capacity: 20,
            event_buffer: 1024,
            storage: StorageConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Parse a JSON configuration and validate it.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the values are invalid.
    pub fn from_json_str(raw: &str) -> StoreResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> StoreResult<()> {
        if self.label_capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "label_capacity must be > 0".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(StoreError::InvalidConfig(
                "event_buffer must be > 0".to_string(),
            ));
        }

        validate_table_name("storage.documents_table", &self.storage.documents_table)?;
        validate_table_name("storage.auth_table", &self.storage.auth_table)?;

        if self.cleanup.interval_seconds == 0 {
            return Err(StoreError::InvalidConfig(
                "cleanup.interval_seconds must be > 0".to_string(),
            ));
        }

        if self.cleanup.status_ttl_seconds == 0 {
            return Err(StoreError::InvalidConfig(
                "cleanup.status_ttl_seconds must be > 0".to_string(),
            ));
        }

        if let Some(name) = &self.cleanup.snapshot_name
            && name.trim().is_empty()
        {
            return Err(StoreError::InvalidConfig(
                "cleanup.snapshot_name must not be blank".to_string(),
            ));
        }

        Ok(())
    }
}

// Table names are interpolated into SQL, so only plain identifiers pass.
fn validate_table_name(field: &str, name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidConfig(format!(
            "{field} must be a plain SQL identifier, got {name:?}"
        )))
    }
}

/// Storage configuration for the durable backends.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Table holding entity documents.
    pub documents_table: String,
    /// Table holding credential blobs.
    pub auth_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("convo_mirror.sqlite"),
            documents_table: "store_documents".to_string(),
            auth_table: "auth_documents".to_string(),
        }
    }
}

/// Configuration for background cleanup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Whether background cleanup is enabled.
    pub enabled: bool,
    /// Interval between cleanup runs (in seconds).
    pub interval_seconds: u64,
    /// Age after which status broadcast entries are dropped.
    pub status_ttl_seconds: u64,
    /// Snapshot to refresh on each run, if any.
    pub snapshot_name: Option<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
            status_ttl_seconds: 60 * 60 * 24,
            snapshot_name: None,
        }
    }
}

/// Builder for cleanup configuration.
#[derive(Debug, Clone, Default)]
pub struct CleanupConfigBuilder {
    enabled: Option<bool>,
    interval_seconds: Option<u64>,
    status_ttl_seconds: Option<u64>,
    snapshot_name: Option<String>,
}

impl CleanupConfigBuilder {
    /// Create a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable background cleanup.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Set the cleanup interval in seconds.
    #[must_use]
    pub const fn interval_seconds(mut self, seconds: u64) -> Self {
        self.interval_seconds = Some(seconds);
        self
    }

    /// Set the status broadcast retention in seconds.
    #[must_use]
    pub const fn status_ttl_seconds(mut self, seconds: u64) -> Self {
        self.status_ttl_seconds = Some(seconds);
        self
    }

    /// Refresh the named snapshot on every run.
    #[must_use]
    pub fn snapshot_name(mut self, name: impl Into<String>) -> Self {
        self.snapshot_name = Some(name.into());
        self
    }

    /// Build the cleanup configuration.
    #[must_use]
    pub fn build(self) -> CleanupConfig {
        let default = CleanupConfig::default();
        CleanupConfig {
            enabled: self.enabled.unwrap_or(default.enabled),
            interval_seconds: self.interval_seconds.unwrap_or(default.interval_seconds),
            status_ttl_seconds: self
                .status_ttl_seconds
                .unwrap_or(default.status_ttl_seconds),
            snapshot_name: self.snapshot_name.or(default.snapshot_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.label_capacity, 20);
        assert!(!config.filter_chats);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = StoreConfig {
            label_capacity: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let mut config = StoreConfig::default();
        config.storage.documents_table = "docs; DROP TABLE x".to_string();
        assert!(config.validate().is_err());

        config.storage.documents_table = "1docs".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = StoreConfig::from_json_str(r#"{"filter_chats": true}"#).unwrap();
        assert!(config.filter_chats);
        assert_eq!(config.event_buffer, 1024);
        assert_eq!(config.storage.documents_table, "store_documents");
    }

    #[test]
    fn test_cleanup_builder() {
        let config = CleanupConfigBuilder::new()
            .interval_seconds(30)
            .enabled(false)
            .status_ttl_seconds(10)
            .snapshot_name("main")
            .build();

        assert_eq!(config.interval_seconds, 30);
        assert!(!config.enabled);
        assert_eq!(config.status_ttl_seconds, 10);
        assert_eq!(config.snapshot_name.as_deref(), Some("main"));
    }
}
