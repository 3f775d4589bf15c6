//! Transfer operation records and their wire projections.
//!
//! A [`TransferRecord`] is the in-memory state machine document for a
//! single transfer, export, or import operation. Two projections are
//! derived from it: the short summary attached to every transfer-update
//! broadcast, and the detailed summary embedded in persisted transaction
//! logs. Opaque metric blobs are preserved verbatim.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::{OperationType, TransferResult, TransferStatus};
use crate::timing::{format_duration_ms, iso_timestamp};

/// Timing bracket for a named orchestration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTiming {
    /// Epoch milliseconds when the phase started.
    pub start_ms: i64,
    /// Epoch milliseconds when the phase ended, if it has.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_ms: Option<i64>,
    /// `end_ms - start_ms` once the phase has ended.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_ms: Option<i64>,
}

/// One event in a transfer's transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// ISO-8601 UTC rendering of `timestamp_ms`.
    pub timestamp_iso: String,
    /// Epoch milliseconds when the event was recorded.
    pub timestamp_ms: i64,
    /// `timestamp_ms - transfer.started_at`.
    pub elapsed_ms: i64,
    /// Milliseconds since the previous event (0 for the first).
    pub delta_ms: i64,
    /// Stable machine-readable event kind (`transfer_created`, ...).
    pub event_type: String,
    /// Human-readable description.
    pub message: String,
    /// Caller-supplied structured extras, flattened onto the event.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl LogEvent {
    /// Builds an event at `timestamp_ms` for a transfer started at
    /// `started_at`, chained after an optional previous event timestamp.
    #[must_use]
    pub fn new(
        timestamp_ms: i64,
        started_at: i64,
        previous_ms: Option<i64>,
        event_type: impl Into<String>,
        message: impl Into<String>,
        extras: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp_iso: iso_timestamp(timestamp_ms),
            timestamp_ms,
            elapsed_ms: timestamp_ms - started_at,
            delta_ms: previous_ms.map_or(0, |prev| timestamp_ms - prev),
            event_type: event_type.into(),
            message: message.into(),
            extras,
        }
    }
}

/// In-memory record of a transfer, export, or import operation.
///
/// Mutated only by the orchestrator under the per-transfer lock. The
/// persisted and broadcast forms are the summary projections below, not
/// this struct itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub transfer_id: String,
    pub operation_type: OperationType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub export_id: Option<String>,
    pub platform_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub platform_index: Option<u32>,
    pub force_name: String,
    pub source_instance_id: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_instance_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_instance_name: Option<String>,
    pub status: TransferStatus,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub phases: BTreeMap<String, PhaseTiming>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payload_metrics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub import_metrics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub export_metrics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_verification: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub validation_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub artifact_size_bytes: Option<u64>,
}

impl TransferRecord {
    /// Creates a fresh record in the `transporting` state.
    #[must_use]
    pub fn new(
        transfer_id: String,
        operation_type: OperationType,
        platform_name: String,
        force_name: String,
        source_instance_id: u32,
        started_at: i64,
    ) -> Self {
        Self {
            transfer_id,
            operation_type,
            export_id: None,
            platform_name,
            platform_index: None,
            force_name,
            source_instance_id,
            source_instance_name: None,
            target_instance_id: None,
            target_instance_name: None,
            status: TransferStatus::Transporting,
            started_at,
            completed_at: None,
            failed_at: None,
            error: None,
            phases: BTreeMap::new(),
            payload_metrics: None,
            import_metrics: None,
            export_metrics: None,
            source_verification: None,
            validation_result: None,
            artifact_size_bytes: None,
        }
    }

    /// Opens a phase bracket at `now_ms`. Re-opening an existing phase
    /// resets its bracket.
    pub fn start_phase(&mut self, name: &str, now_ms: i64) {
        self.phases.insert(
            name.to_string(),
            PhaseTiming {
                start_ms: now_ms,
                end_ms: None,
                duration_ms: None,
            },
        );
    }

    /// Closes a phase bracket at `now_ms`. A phase that was never started
    /// is left untouched.
    pub fn end_phase(&mut self, name: &str, now_ms: i64) {
        if let Some(phase) = self.phases.get_mut(name) {
            phase.end_ms = Some(now_ms);
            phase.duration_ms = Some(now_ms - phase.start_ms);
        }
    }

    /// Short summary: identifiers, endpoints, status, and timings.
    #[must_use]
    pub fn short_summary(&self, last_event_ms: Option<i64>) -> TransferSummary {
        TransferSummary {
            transfer_id: self.transfer_id.clone(),
            operation_type: self.operation_type,
            export_id: self.export_id.clone(),
            platform_name: self.platform_name.clone(),
            source_instance_id: self.source_instance_id,
            source_instance_name: self.source_instance_name.clone(),
            target_instance_id: self.target_instance_id,
            target_instance_name: self.target_instance_name.clone(),
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            failed_at: self.failed_at,
            error: self.error.clone(),
            last_event_at: last_event_ms,
        }
    }

    /// Detailed summary: the short summary plus per-phase durations,
    /// preserved metric blobs, and the computed total duration.
    #[must_use]
    pub fn detailed_summary(
        &self,
        last_event_ms: Option<i64>,
        now_ms: i64,
    ) -> DetailedTransferSummary {
        let end_ms = self
            .completed_at
            .or(self.failed_at)
            .unwrap_or_else(|| last_event_ms.map_or(now_ms, |last| last.max(now_ms)));
        let total_duration_ms = (end_ms - self.started_at).max(0);

        let phase_durations = self
            .phases
            .iter()
            .map(|(name, timing)| {
                (
                    name.clone(),
                    PhaseSummary {
                        duration_ms: timing.duration_ms,
                        duration: timing.duration_ms.map(format_duration_ms),
                    },
                )
            })
            .collect();

        DetailedTransferSummary {
            summary: self.short_summary(last_event_ms),
            phases: phase_durations,
            payload_metrics: self.payload_metrics.clone(),
            import_metrics: self.import_metrics.clone(),
            export_metrics: self.export_metrics.clone(),
            source_verification: self.source_verification.clone(),
            validation_result: self.validation_result.clone(),
            artifact_size_bytes: self.artifact_size_bytes,
            total_duration_ms,
            total_duration: format_duration_ms(total_duration_ms),
            result: self.status.result(),
        }
    }
}

/// Short transfer projection attached to transfer-update broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub transfer_id: String,
    pub operation_type: OperationType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub export_id: Option<String>,
    pub platform_name: String,
    pub source_instance_id: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_instance_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_instance_name: Option<String>,
    pub status: TransferStatus,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_event_at: Option<i64>,
}

/// Per-phase duration projection inside detailed summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSummary {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_ms: Option<i64>,
    /// Human rendering of `duration_ms` (`"420ms"`, `"1.2s"`).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<String>,
}

/// Detailed transfer projection embedded in persisted transaction logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedTransferSummary {
    #[serde(flatten)]
    pub summary: TransferSummary,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub phases: BTreeMap<String, PhaseSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payload_metrics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub import_metrics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub export_metrics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_verification: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub validation_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub artifact_size_bytes: Option<u64>,
    pub total_duration_ms: i64,
    /// Human rendering of `total_duration_ms`.
    pub total_duration: String,
    pub result: TransferResult,
}
