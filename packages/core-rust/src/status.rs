//! Transfer status and operation-type enums with their wire strings.
//!
//! Statuses serialize to snake_case strings on every outward projection.
//! The legacy status string `"importing"` is accepted on input and
//! normalized to `"transporting"` everywhere it could be observed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Kind of operation a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Cross-instance transfer: export on source, import on target.
    Transfer,
    /// Local export of a platform to the controller registry.
    Export,
    /// Local import of a previously stored export.
    Import,
}

/// State of a transfer operation.
///
/// See the orchestrator state machine: `Transporting` and
/// `AwaitingValidation` and `Cleanup` are in-flight; `Completed`,
/// `Failed`, `CleanupFailed`, and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    /// Payload is being shipped to the target instance.
    Transporting,
    /// Target accepted the import; waiting for in-game validation.
    AwaitingValidation,
    /// Validation passed; deleting the source platform.
    Cleanup,
    /// Terminal: transfer finished and source was cleaned up.
    Completed,
    /// Terminal: transfer failed (rejected import or failed validation).
    Failed,
    /// Terminal: transfer succeeded but the source delete failed.
    CleanupFailed,
    /// Terminal: an unexpected collaborator failure.
    Error,
}

/// Computed outcome projection for detailed summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum TransferResult {
    SUCCESS,
    FAILED,
    IN_PROGRESS,
}

/// Parse error for unknown status strings.
#[derive(Debug, thiserror::Error)]
#[error("unknown transfer status: {0}")]
pub struct UnknownStatus(String);

impl TransferStatus {
    /// Returns the canonical wire string for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transporting => "transporting",
            Self::AwaitingValidation => "awaiting_validation",
            Self::Cleanup => "cleanup",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::CleanupFailed => "cleanup_failed",
            Self::Error => "error",
        }
    }

    /// Whether the status is terminal. Terminal records are never
    /// reopened, though they may be reclassified between `failed`,
    /// `error`, and `cleanup_failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::CleanupFailed | Self::Error
        )
    }

    /// Outcome projection used by detailed summaries.
    #[must_use]
    pub fn result(self) -> TransferResult {
        match self {
            Self::Completed | Self::CleanupFailed => TransferResult::SUCCESS,
            Self::Failed | Self::Error => TransferResult::FAILED,
            Self::Transporting | Self::AwaitingValidation | Self::Cleanup => {
                TransferResult::IN_PROGRESS
            }
        }
    }
}

impl FromStr for TransferStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // Back-compat alias used by older instance plugins.
            "transporting" | "importing" => Ok(Self::Transporting),
            "awaiting_validation" => Ok(Self::AwaitingValidation),
            "cleanup" => Ok(Self::Cleanup),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cleanup_failed" => Ok(Self::CleanupFailed),
            "error" => Ok(Self::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransferStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransferStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalizes a raw status string for outward-facing projections.
///
/// Unknown strings pass through unchanged; only the legacy `"importing"`
/// alias is rewritten.
#[must_use]
pub fn normalize_status(raw: &str) -> &str {
    if raw == "importing" {
        "transporting"
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_strings_round_trip() {
        let all = [
            TransferStatus::Transporting,
            TransferStatus::AwaitingValidation,
            TransferStatus::Cleanup,
            TransferStatus::Completed,
            TransferStatus::Failed,
            TransferStatus::CleanupFailed,
            TransferStatus::Error,
        ];
        for status in all {
            let parsed: TransferStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn importing_normalizes_to_transporting() {
        assert_eq!(normalize_status("importing"), "transporting");
        assert_eq!(normalize_status("transporting"), "transporting");
        assert_eq!(normalize_status("cleanup_failed"), "cleanup_failed");

        let parsed: TransferStatus = "importing".parse().unwrap();
        assert_eq!(parsed, TransferStatus::Transporting);
        // The alias never survives serialization.
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"transporting\"");
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TransferStatus::Transporting.is_terminal());
        assert!(!TransferStatus::AwaitingValidation.is_terminal());
        assert!(!TransferStatus::Cleanup.is_terminal());
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
        assert!(TransferStatus::CleanupFailed.is_terminal());
        assert!(TransferStatus::Error.is_terminal());
    }

    #[test]
    fn result_projection() {
        assert_eq!(TransferStatus::Completed.result(), TransferResult::SUCCESS);
        assert_eq!(
            TransferStatus::CleanupFailed.result(),
            TransferResult::SUCCESS
        );
        assert_eq!(TransferStatus::Failed.result(), TransferResult::FAILED);
        assert_eq!(TransferStatus::Error.result(), TransferResult::FAILED);
        assert_eq!(
            TransferStatus::AwaitingValidation.result(),
            TransferResult::IN_PROGRESS
        );
    }

    #[test]
    fn unknown_status_is_an_error() {
        assert!("exploded".parse::<TransferStatus>().is_err());
    }

    #[test]
    fn operation_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&OperationType::Transfer).unwrap(),
            "\"transfer\""
        );
        assert_eq!(
            serde_json::to_string(&OperationType::Export).unwrap(),
            "\"export\""
        );
    }
}
