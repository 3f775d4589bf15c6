//! Controller-scope configuration.

use std::path::PathBuf;

/// Configuration for the transfer-controller core.
///
/// Controls registry and log bounds, orchestration timeouts, and the
/// tree-broadcast rate limit.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Directory holding the persisted registry and transaction-log files.
    pub database_directory: PathBuf,
    /// Maximum number of stored exports before oldest-first eviction.
    pub max_storage_size: usize,
    /// Maximum number of persisted transaction-log entries.
    pub max_persisted_logs: usize,
    /// Validation watchdog timeout in milliseconds.
    pub validation_timeout_ms: u64,
    /// Default bound for waiting on a stored export to appear.
    pub wait_for_export_default_ms: u64,
    /// Maximum tree broadcasts per second (coalesced).
    pub tree_broadcast_max_rate_per_sec: u32,
    /// Number of transfer records retained after terminal transitions.
    pub active_transfers_retention: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            database_directory: PathBuf::from("database"),
            max_storage_size: 100,
            max_persisted_logs: 10,
            validation_timeout_ms: 120_000,
            wait_for_export_default_ms: 10_000,
            tree_broadcast_max_rate_per_sec: 2,
            active_transfers_retention: 100,
        }
    }
}

impl ControllerConfig {
    /// Path of the persisted export-registry file.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        self.database_directory.join("surface_export_storage.json")
    }

    /// Path of the persisted transaction-log file.
    #[must_use]
    pub fn transaction_log_path(&self) -> PathBuf {
        self.database_directory
            .join("surface_export_transaction_logs.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_bounds() {
        let config = ControllerConfig::default();
        assert_eq!(config.max_storage_size, 100);
        assert_eq!(config.max_persisted_logs, 10);
        assert_eq!(config.validation_timeout_ms, 120_000);
        assert_eq!(config.wait_for_export_default_ms, 10_000);
        assert_eq!(config.tree_broadcast_max_rate_per_sec, 2);
        assert_eq!(config.active_transfers_retention, 100);
    }

    #[test]
    fn file_paths_live_under_the_database_directory() {
        let config = ControllerConfig {
            database_directory: PathBuf::from("/var/lib/controller"),
            ..ControllerConfig::default()
        };
        assert_eq!(
            config.storage_path(),
            PathBuf::from("/var/lib/controller/surface_export_storage.json")
        );
        assert_eq!(
            config.transaction_log_path(),
            PathBuf::from("/var/lib/controller/surface_export_transaction_logs.json")
        );
    }
}
