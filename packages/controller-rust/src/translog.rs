//! Per-transfer transaction logs: in-memory event journals, summary
//! composition, bounded persistence, and log-update broadcasting.
//!
//! Events carry monotonic timestamps with elapsed/delta times computed
//! against the transfer start and the previous event. Persisted entries
//! are unique by transfer ID, newest-first, and trimmed to
//! `max_persisted_logs`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use skylift_core::clock::MonotonicClock;
use skylift_core::messages::LogEntry;
use skylift_core::transfer::{LogEvent, TransferRecord};

use crate::store::JsonStore;
use crate::subscriptions::SubscriptionManager;

/// Transaction logger for all active transfers.
pub struct TransactionLogger {
    store: JsonStore,
    max_persisted_logs: usize,
    clock: Arc<MonotonicClock>,
    subscriptions: Arc<SubscriptionManager>,
    events: Mutex<HashMap<String, Vec<LogEvent>>>,
}

impl TransactionLogger {
    /// Creates a logger persisting to `store`.
    #[must_use]
    pub fn new(
        store: JsonStore,
        max_persisted_logs: usize,
        clock: Arc<MonotonicClock>,
        subscriptions: Arc<SubscriptionManager>,
    ) -> Self {
        Self {
            store,
            max_persisted_logs,
            clock,
            subscriptions,
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Appends an event to the transfer's journal and broadcasts a
    /// log-update to matching subscribers. Never fails.
    pub async fn log_event(
        &self,
        record: &TransferRecord,
        event_type: &str,
        message: impl Into<String>,
        extras: Map<String, Value>,
    ) -> LogEvent {
        let now = self.clock.now_ms();
        let event = {
            let mut journals = self.events.lock();
            let journal = journals.entry(record.transfer_id.clone()).or_default();
            let event = LogEvent::new(
                now,
                record.started_at,
                journal.last().map(|previous| previous.timestamp_ms),
                event_type,
                message,
                extras,
            );
            journal.push(event.clone());
            event
        };

        self.subscriptions
            .broadcast_log(
                &record.transfer_id,
                event.clone(),
                record.short_summary(Some(event.timestamp_ms)),
                record.detailed_summary(Some(event.timestamp_ms), now),
            )
            .await;
        event
    }

    /// The journal recorded so far for a transfer.
    #[must_use]
    pub fn events_for(&self, transfer_id: &str) -> Vec<LogEvent> {
        self.events
            .lock()
            .get(transfer_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Timestamp of the transfer's most recent event.
    #[must_use]
    pub fn last_event_ms(&self, transfer_id: &str) -> Option<i64> {
        self.events
            .lock()
            .get(transfer_id)
            .and_then(|journal| journal.last())
            .map(|event| event.timestamp_ms)
    }

    /// Drops a transfer's in-memory journal (retention pruning).
    pub fn drop_events(&self, transfer_id: &str) {
        self.events.lock().remove(transfer_id);
    }

    /// Composes a log entry from the live record and journal.
    #[must_use]
    pub fn compose_entry(&self, record: &TransferRecord) -> LogEntry {
        let now = self.clock.now_ms();
        let events = self.events_for(&record.transfer_id);
        let last_event_ms = events.last().map(|event| event.timestamp_ms);
        LogEntry {
            transfer_id: record.transfer_id.clone(),
            transfer_info: record.short_summary(last_event_ms),
            summary: record.detailed_summary(last_event_ms, now),
            events,
            saved_at: now,
        }
    }

    /// Persists the transfer's log entry.
    ///
    /// Loads the existing file (missing file starts empty), replaces or
    /// appends the entry by transfer ID, trims to the newest
    /// `max_persisted_logs` by `saved_at`, and atomically rewrites the
    /// file. Idempotent: persisting the same transfer again replaces its
    /// prior entry in place.
    pub async fn persist(&self, record: &TransferRecord) -> anyhow::Result<()> {
        let entry = self.compose_entry(record);

        let mut entries: Vec<LogEntry> = self.store.load().await?;
        entries.retain(|existing| existing.transfer_id != entry.transfer_id);
        entries.push(entry);
        entries.sort_by_key(|existing| std::cmp::Reverse(existing.saved_at));
        entries.truncate(self.max_persisted_logs);

        self.store.save(&entries).await?;
        debug!(
            transfer_id = %record.transfer_id,
            persisted = entries.len(),
            "transaction log persisted"
        );
        Ok(())
    }

    /// Persisted entries, newest first.
    pub async fn persisted_entries(&self) -> anyhow::Result<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self.store.load().await?;
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.saved_at));
        Ok(entries)
    }

    /// Looks up one persisted entry; `"latest"` selects the newest.
    pub async fn persisted_entry(&self, transfer_id: &str) -> anyhow::Result<Option<LogEntry>> {
        let entries = self.persisted_entries().await?;
        if transfer_id == "latest" {
            return Ok(entries.into_iter().next());
        }
        Ok(entries
            .into_iter()
            .find(|entry| entry.transfer_id == transfer_id))
    }
}

#[cfg(test)]
mod tests {
    use skylift_core::clock::ManualClock;
    use skylift_core::status::OperationType;

    use super::*;
    use crate::traits::AllowAll;

    struct Fixture {
        _dir: tempfile::TempDir,
        clock_handle: Arc<ManualClock>,
        logger: TransactionLogger,
    }

    fn fixture(max_persisted: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let clock_handle = Arc::new(ManualClock::new(10_000));
        let clock = Arc::new(MonotonicClock::new(Box::new(Arc::clone(&clock_handle))));
        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::new(AllowAll),
            Arc::clone(&clock),
        ));
        let logger = TransactionLogger::new(
            JsonStore::new(dir.path().join("surface_export_transaction_logs.json")),
            max_persisted,
            clock,
            subscriptions,
        );
        Fixture {
            _dir: dir,
            clock_handle,
            logger,
        }
    }

    fn record(transfer_id: &str) -> TransferRecord {
        TransferRecord::new(
            transfer_id.to_string(),
            OperationType::Transfer,
            "P".to_string(),
            "player".to_string(),
            1,
            10_000,
        )
    }

    #[tokio::test]
    async fn events_chain_elapsed_and_delta() {
        let fixture = fixture(10);
        let record = record("transfer-1");

        let first = fixture
            .logger
            .log_event(&record, "transfer_created", "created", Map::new())
            .await;
        assert_eq!(first.elapsed_ms, 0);
        assert_eq!(first.delta_ms, 0);

        fixture.clock_handle.advance(450);
        let second = fixture
            .logger
            .log_event(&record, "import_accepted", "accepted", Map::new())
            .await;
        assert_eq!(second.elapsed_ms, 450);
        assert_eq!(second.delta_ms, 450);

        fixture.clock_handle.advance(50);
        let third = fixture
            .logger
            .log_event(&record, "validation_received", "validated", Map::new())
            .await;
        assert_eq!(third.elapsed_ms, 500);
        assert_eq!(third.delta_ms, 50);
    }

    #[tokio::test]
    async fn event_timestamps_are_non_decreasing_under_clock_steps() {
        let fixture = fixture(10);
        let record = record("transfer-1");

        fixture
            .logger
            .log_event(&record, "a", "a", Map::new())
            .await;
        // Host clock steps backwards; the monotonic clamp holds.
        fixture.clock_handle.set(9_000);
        fixture
            .logger
            .log_event(&record, "b", "b", Map::new())
            .await;

        let events = fixture.logger.events_for("transfer-1");
        assert!(events[0].timestamp_ms <= events[1].timestamp_ms);
        assert!(events[1].delta_ms >= 0);
    }

    #[tokio::test]
    async fn persist_is_idempotent_per_transfer() {
        let fixture = fixture(10);
        let record = record("transfer-1");
        fixture
            .logger
            .log_event(&record, "transfer_created", "created", Map::new())
            .await;

        fixture.logger.persist(&record).await.unwrap();
        fixture.logger.persist(&record).await.unwrap();

        let entries = fixture.logger.persisted_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transfer_id, "transfer-1");
        assert_eq!(entries[0].events.len(), 1);
    }

    #[tokio::test]
    async fn persisted_entries_trim_to_newest() {
        let fixture = fixture(3);
        for index in 0..5 {
            let record = record(&format!("transfer-{index}"));
            fixture
                .logger
                .log_event(&record, "transfer_created", "created", Map::new())
                .await;
            fixture.clock_handle.advance(100);
            fixture.logger.persist(&record).await.unwrap();
        }

        let entries = fixture.logger.persisted_entries().await.unwrap();
        assert_eq!(entries.len(), 3);
        // Newest first; the oldest two were dropped.
        assert_eq!(entries[0].transfer_id, "transfer-4");
        assert_eq!(entries[2].transfer_id, "transfer-2");
    }

    #[tokio::test]
    async fn persisted_entries_are_unique_by_transfer() {
        let fixture = fixture(10);
        let record_a = record("transfer-a");
        let record_b = record("transfer-b");

        fixture.logger.persist(&record_a).await.unwrap();
        fixture.clock_handle.advance(10);
        fixture.logger.persist(&record_b).await.unwrap();
        fixture.clock_handle.advance(10);
        fixture.logger.persist(&record_a).await.unwrap();

        let entries = fixture.logger.persisted_entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        // Re-persisting moved transfer-a to the front.
        assert_eq!(entries[0].transfer_id, "transfer-a");
    }

    #[tokio::test]
    async fn latest_selects_newest_entry() {
        let fixture = fixture(10);
        fixture.logger.persist(&record("transfer-old")).await.unwrap();
        fixture.clock_handle.advance(100);
        fixture.logger.persist(&record("transfer-new")).await.unwrap();

        let latest = fixture.logger.persisted_entry("latest").await.unwrap();
        assert_eq!(latest.unwrap().transfer_id, "transfer-new");

        let by_id = fixture
            .logger
            .persisted_entry("transfer-old")
            .await
            .unwrap();
        assert!(by_id.is_some());

        let missing = fixture.logger.persisted_entry("transfer-x").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn drop_events_clears_journal() {
        let fixture = fixture(10);
        let record = record("transfer-1");
        fixture
            .logger
            .log_event(&record, "transfer_created", "created", Map::new())
            .await;

        fixture.logger.drop_events("transfer-1");
        assert!(fixture.logger.events_for("transfer-1").is_empty());
        assert!(fixture.logger.last_event_ms("transfer-1").is_none());
    }

    #[tokio::test]
    async fn compose_entry_reflects_journal_and_record() {
        let fixture = fixture(10);
        let mut record = record("transfer-1");
        record.start_phase("transmission", 10_000);
        record.end_phase("transmission", 10_200);

        fixture
            .logger
            .log_event(&record, "transfer_created", "created", Map::new())
            .await;
        let entry = fixture.logger.compose_entry(&record);

        assert_eq!(entry.transfer_id, "transfer-1");
        assert_eq!(entry.events.len(), 1);
        assert_eq!(
            entry.summary.phases["transmission"].duration_ms,
            Some(200)
        );
        assert_eq!(entry.transfer_info.last_event_at, entry.events.last().map(|e| e.timestamp_ms));
    }
}
