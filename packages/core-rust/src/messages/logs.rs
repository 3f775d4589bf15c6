//! Transaction-log payloads: the persisted log entry and the control
//! queries over it.

use serde::{Deserialize, Serialize};

use crate::transfer::{DetailedTransferSummary, LogEvent, TransferSummary};

/// One persisted transaction-log entry.
///
/// The on-disk log file is a JSON array of these, unique by
/// `transfer_id` and trimmed to the newest `maxPersistedLogs` by
/// `saved_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub transfer_id: String,
    pub transfer_info: TransferSummary,
    pub summary: DetailedTransferSummary,
    pub events: Vec<LogEvent>,
    /// Epoch milliseconds when this entry was (last) persisted.
    pub saved_at: i64,
}

/// Control → controller: list persisted log summaries, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionLogsRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<usize>,
}

/// Control → controller: fetch one transaction log.
///
/// `transfer_id` may be the literal `"latest"` to fetch the most
/// recently saved entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionLogRequest {
    pub transfer_id: String,
}

/// Response to [`GetTransactionLogRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionLogResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transfer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub events: Option<Vec<LogEvent>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transfer_info: Option<TransferSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub summary: Option<DetailedTransferSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl GetTransactionLogResponse {
    /// Successful response from a persisted or in-memory log.
    #[must_use]
    pub fn found(entry: &LogEntry) -> Self {
        Self {
            success: true,
            transfer_id: Some(entry.transfer_id.clone()),
            events: Some(entry.events.clone()),
            transfer_info: Some(entry.transfer_info.clone()),
            summary: Some(entry.summary.clone()),
            error: None,
        }
    }

    /// Failure response with an error string.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transfer_id: None,
            events: None,
            transfer_info: None,
            summary: None,
            error: Some(error.into()),
        }
    }
}
