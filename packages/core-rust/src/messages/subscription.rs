//! Subscription payloads: the per-connection filter and the revisioned
//! push events streamed to control clients.

use serde::{Deserialize, Serialize};

use crate::messages::tree::PlatformTree;
use crate::transfer::{DetailedTransferSummary, LogEvent, TransferSummary};

/// Per-connection subscription filter.
///
/// A filter with all flags false is equivalent to no subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    #[serde(default)]
    pub tree: bool,
    #[serde(default)]
    pub transfers: bool,
    #[serde(default)]
    pub logs: bool,
    /// Restricts log events to one transfer; `None` means all.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transfer_id: Option<String>,
}

impl SubscriptionFilter {
    /// Whether the filter subscribes to nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.tree && !self.transfers && !self.logs
    }

    /// Whether a log event for `transfer_id` passes this filter.
    #[must_use]
    pub fn matches_log(&self, transfer_id: &str) -> bool {
        self.logs
            && self
                .transfer_id
                .as_deref()
                .is_none_or(|wanted| wanted == transfer_id)
    }
}

/// Control → controller: replace this connection's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSubscriptionRequest {
    #[serde(flatten)]
    pub filter: SubscriptionFilter,
}

/// Revisioned tree snapshot pushed to `tree` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeUpdateEvent {
    pub revision: u64,
    pub generated_at: i64,
    pub force_name: String,
    pub tree: PlatformTree,
}

/// Revisioned short summary pushed to `transfers` subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferUpdateEvent {
    pub revision: u64,
    pub generated_at: i64,
    pub transfer: TransferSummary,
}

/// Revisioned log event pushed to matching `logs` subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogUpdateEvent {
    pub revision: u64,
    pub generated_at: i64,
    pub transfer_id: String,
    pub event: LogEvent,
    pub transfer_info: TransferSummary,
    pub summary: DetailedTransferSummary,
}

/// Envelope for events delivered to a control connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlEvent {
    TreeUpdate(TreeUpdateEvent),
    TransferUpdate(TransferUpdateEvent),
    LogUpdate(LogUpdateEvent),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_filter_is_absence() {
        assert!(SubscriptionFilter::default().is_empty());
        assert!(!SubscriptionFilter {
            tree: true,
            ..SubscriptionFilter::default()
        }
        .is_empty());
    }

    #[test]
    fn log_matching_honors_transfer_id() {
        let all_logs = SubscriptionFilter {
            logs: true,
            ..SubscriptionFilter::default()
        };
        assert!(all_logs.matches_log("T42"));
        assert!(all_logs.matches_log("T43"));

        let scoped = SubscriptionFilter {
            logs: true,
            transfer_id: Some("T42".to_string()),
            ..SubscriptionFilter::default()
        };
        assert!(scoped.matches_log("T42"));
        assert!(!scoped.matches_log("T43"));

        let no_logs = SubscriptionFilter {
            transfers: true,
            ..SubscriptionFilter::default()
        };
        assert!(!no_logs.matches_log("T42"));
    }

    #[test]
    fn set_subscription_request_flattens_filter() {
        let request: SetSubscriptionRequest = serde_json::from_value(json!({
            "tree": true,
            "logs": true,
            "transferId": "T42",
        }))
        .unwrap();
        assert!(request.filter.tree);
        assert!(!request.filter.transfers);
        assert_eq!(request.filter.transfer_id.as_deref(), Some("T42"));
    }

    #[test]
    fn missing_flags_default_to_false() {
        let filter: SubscriptionFilter = serde_json::from_value(json!({"tree": true})).unwrap();
        assert!(filter.tree);
        assert!(!filter.transfers);
        assert!(!filter.logs);
        assert!(filter.transfer_id.is_none());
    }

    #[test]
    fn control_event_envelope_is_tagged() {
        let event = ControlEvent::TransferUpdate(TransferUpdateEvent {
            revision: 3,
            generated_at: 1_700_000_000_000,
            transfer: crate::transfer::TransferRecord::new(
                "transfer-1".to_string(),
                crate::status::OperationType::Transfer,
                "P".to_string(),
                "player".to_string(),
                1,
                10_000,
            )
            .short_summary(None),
        });
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], json!("transferUpdate"));
        assert_eq!(wire["revision"], json!(3));
    }
}
