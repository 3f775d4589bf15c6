//! Transfer domain payloads: control-plane requests, instance-side
//! events, and the outbound messages the orchestrator sends to source
//! and target instances.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to an instance in a control request.
///
/// Accepts a numeric instance ID or an instance name; name resolution
/// (including the assigned-host fallback) happens at the topology layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceSelector {
    Id(u32),
    Name(String),
}

/// Control → controller: transfer a pre-staged export to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPlatformRequest {
    pub export_id: String,
    pub target_instance_id: InstanceSelector,
}

/// Control → controller: export from source and transfer in one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPlatformTransferRequest {
    pub source_instance_id: u32,
    /// 1-based platform slot on the source instance.
    pub source_platform_index: u32,
    pub target_instance_id: InstanceSelector,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub force_name: Option<String>,
}

/// Structured response to transfer-initiating requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transfer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl TransferResponse {
    /// Accepted: the transfer is in flight under `transfer_id`.
    #[must_use]
    pub fn accepted(transfer_id: impl Into<String>) -> Self {
        Self {
            success: true,
            transfer_id: Some(transfer_id.into()),
            error: None,
        }
    }

    /// Rejected with an error string; `transfer_id` is attached when a
    /// record was already created before the failure.
    #[must_use]
    pub fn rejected(error: impl Into<String>, transfer_id: Option<String>) -> Self {
        Self {
            success: false,
            transfer_id,
            error: Some(error.into()),
        }
    }
}

/// Target-side inventory comparison attached to validation events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub item_count_match: bool,
    pub fluid_count_match: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mismatch_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expected_item_counts: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expected_fluid_counts: Option<Value>,
}

impl ValidationReport {
    /// Synthesized failure report (used when the watchdog fires).
    #[must_use]
    pub fn failure(details: impl Into<String>) -> Self {
        Self {
            item_count_match: false,
            fluid_count_match: false,
            mismatch_details: Some(details.into()),
            expected_item_counts: None,
            expected_fluid_counts: None,
        }
    }
}

/// Instance → controller: target finished validating an imported
/// platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferValidationEvent {
    pub transfer_id: String,
    pub platform_name: String,
    pub source_instance_id: u32,
    pub success: bool,
    pub validation: ValidationReport,
    /// Import timings in ticks; normalized to ms by the orchestrator.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metrics: Option<Value>,
}

/// Instance → controller: a local export or import operation finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOperationCompleteEvent {
    pub operation_id: String,
    pub platform_name: String,
    pub instance_id: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_ticks: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub entity_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metrics: Option<Value>,
}

// ---------------------------------------------------------------------------
// Outbound messages to instances
// ---------------------------------------------------------------------------

/// Controller → target instance: import the attached snapshot.
///
/// `export_data` is the stored payload augmented with `_transferId` and
/// `_sourceInstanceId` so the target can address its validation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPlatformRequest {
    pub export_id: String,
    pub export_data: Value,
    pub force_name: String,
}

/// Controller → source instance: serialize and upload a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPlatformRequest {
    pub platform_index: u32,
    pub force_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_instance_id: Option<u32>,
}

/// Source instance's reply to [`ExportPlatformRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPlatformResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub export_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Controller → source instance: delete the transferred platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSourcePlatformRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub platform_index: Option<u32>,
    pub platform_name: String,
    pub force_name: String,
}

/// Controller → source instance: unlock the platform after a failed
/// transfer (rollback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockSourcePlatformRequest {
    pub platform_name: String,
    pub force_name: String,
}

/// Generic instance acknowledgement for delete/unlock/import requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl BridgeAck {
    /// Successful acknowledgement.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Failed acknowledgement with a reason.
    #[must_use]
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Controller → source and target instances: user-visible progress line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatusUpdate {
    pub transfer_id: String,
    pub platform_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
}
