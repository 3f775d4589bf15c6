//! Export domain payloads: stored snapshot records, registry queries,
//! and the instance-side export announcement.
//!
//! All structs use `#[serde(rename_all = "camelCase")]`; the persisted
//! storage file is a JSON array of [`ExportRecord`] in exactly this
//! shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A completed platform snapshot registered at the controller.
///
/// Immutable once stored. `export_data` is opaque to the controller and
/// preserved bit-for-bit; only `size` (serialized byte length) and the
/// metadata fields are inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    /// Globally unique export identifier, generated upstream.
    pub export_id: String,
    /// Opaque identifier of the platform on its source instance.
    pub platform_name: String,
    /// Source instance ID.
    pub instance_id: u32,
    /// Opaque snapshot payload.
    pub export_data: Value,
    /// Epoch milliseconds when the export was stored.
    pub timestamp: i64,
    /// Byte length of the serialized `export_data`.
    ///
    /// Records loaded from older files may lack this; it is repaired on
    /// load by measuring the payload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>,
    /// Upstream export timings, carried verbatim.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub export_metrics: Option<Value>,
}

impl ExportRecord {
    /// Metadata projection without the payload.
    #[must_use]
    pub fn summary(&self) -> ExportSummary {
        ExportSummary {
            export_id: self.export_id.clone(),
            platform_name: self.platform_name.clone(),
            instance_id: self.instance_id,
            timestamp: self.timestamp,
            size: self.size.unwrap_or(0),
        }
    }

    /// Measures the serialized byte length of the payload.
    #[must_use]
    pub fn measure_size(&self) -> u64 {
        serde_json::to_vec(&self.export_data)
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0)
    }
}

/// Payload-free metadata projection of a stored export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub export_id: String,
    pub platform_name: String,
    pub instance_id: u32,
    pub timestamp: i64,
    pub size: u64,
}

/// Instance → controller: a platform export finished and its snapshot is
/// attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformExportEvent {
    pub export_id: String,
    pub platform_name: String,
    pub instance_id: u32,
    pub export_data: Value,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub export_metrics: Option<Value>,
}

impl PlatformExportEvent {
    /// Converts the announcement into a registry record.
    #[must_use]
    pub fn into_record(self) -> ExportRecord {
        ExportRecord {
            export_id: self.export_id,
            platform_name: self.platform_name,
            instance_id: self.instance_id,
            export_data: self.export_data,
            timestamp: self.timestamp,
            size: None,
            export_metrics: self.export_metrics,
        }
    }
}

/// Control → controller: list stored exports (metadata only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListExportsRequest {}

/// Control → controller: fetch one stored export including its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStoredExportRequest {
    pub export_id: String,
}

/// Response to [`GetStoredExportRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStoredExportResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub export_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub platform_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instance_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub export_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl GetStoredExportResponse {
    /// Successful response carrying the full record.
    #[must_use]
    pub fn found(record: &ExportRecord) -> Self {
        Self {
            success: true,
            export_id: Some(record.export_id.clone()),
            platform_name: Some(record.platform_name.clone()),
            instance_id: Some(record.instance_id),
            timestamp: Some(record.timestamp),
            size: record.size,
            export_data: Some(record.export_data.clone()),
            error: None,
        }
    }

    /// Failure response with an error string.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            export_id: None,
            platform_name: None,
            instance_id: None,
            timestamp: None,
            size: None,
            export_data: None,
            error: Some(error.into()),
        }
    }
}
