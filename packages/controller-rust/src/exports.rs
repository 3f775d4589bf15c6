//! Content-addressed registry of completed platform snapshots.
//!
//! Bounded by `max_storage_size` with strict oldest-timestamp-first
//! eviction (ties broken by insertion order). Every mutation is
//! persisted to the storage file; persistence failures are logged and
//! never surfaced to callers. Waiters blocked in [`ExportRegistry::
//! wait_for_export`] are woken the moment the export becomes visible.

use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use skylift_core::messages::{ExportRecord, ExportSummary};

use crate::error::ControllerError;
use crate::store::JsonStore;

/// In-memory export registry with bounded, persisted storage.
pub struct ExportRegistry {
    store: JsonStore,
    max_storage_size: usize,
    records: Mutex<Vec<ExportRecord>>,
    notify: Notify,
}

impl ExportRegistry {
    /// Creates an empty registry persisting to `store`.
    #[must_use]
    pub fn new(store: JsonStore, max_storage_size: usize) -> Self {
        Self {
            store,
            max_storage_size,
            records: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    /// Loads persisted records, repairing any missing `size` fields by
    /// measuring the payload. Returns the number of records loaded.
    pub async fn load(&self) -> anyhow::Result<usize> {
        let mut loaded: Vec<ExportRecord> = self.store.load().await?;
        let mut repaired = false;
        for record in &mut loaded {
            if record.size.is_none() {
                record.size = Some(record.measure_size());
                repaired = true;
            }
        }
        let count = loaded.len();
        *self.records.lock().await = loaded;
        if repaired {
            self.persist().await;
        }
        debug!(count, "export registry loaded");
        Ok(count)
    }

    /// Inserts or replaces a record by export ID, evicting the oldest
    /// records until the storage bound holds, then persists.
    ///
    /// Eviction runs synchronously inside the call so the bound is a
    /// post-condition; waiters on other exports are not blocked beyond
    /// the map update itself.
    pub async fn store_export(&self, mut record: ExportRecord) {
        if record.size.is_none() {
            record.size = Some(record.measure_size());
        }

        {
            let mut records = self.records.lock().await;
            if let Some(existing) = records
                .iter_mut()
                .find(|existing| existing.export_id == record.export_id)
            {
                *existing = record;
            } else {
                records.push(record);
            }

            while records.len() > self.max_storage_size {
                // First occurrence of the minimum timestamp is the
                // earliest-inserted among ties.
                let oldest = records
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, r)| r.timestamp)
                    .map(|(index, _)| index)
                    .expect("non-empty while over bound");
                let evicted = records.remove(oldest);
                metrics::counter!("skylift_exports_evicted_total").increment(1);
                debug!(
                    export_id = %evicted.export_id,
                    timestamp = evicted.timestamp,
                    "evicted oldest export over storage bound"
                );
            }
        }

        self.notify.notify_waiters();
        self.persist().await;
    }

    /// Returns the full record for an export ID.
    pub async fn get(&self, export_id: &str) -> Option<ExportRecord> {
        self.records
            .lock()
            .await
            .iter()
            .find(|record| record.export_id == export_id)
            .cloned()
    }

    /// Metadata projection of all stored exports, in insertion order.
    pub async fn list(&self) -> Vec<ExportSummary> {
        self.records
            .lock()
            .await
            .iter()
            .map(ExportRecord::summary)
            .collect()
    }

    /// Removes an export and persists. Returns whether it existed.
    pub async fn delete(&self, export_id: &str) -> bool {
        let removed = {
            let mut records = self.records.lock().await;
            let before = records.len();
            records.retain(|record| record.export_id != export_id);
            records.len() != before
        };
        if removed {
            self.persist().await;
        }
        removed
    }

    /// Number of stored exports.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Waits until the export is present, bounded by `timeout`.
    ///
    /// Returns the record exactly when it becomes visible; a miss fails
    /// with [`ControllerError::NotReady`].
    pub async fn wait_for_export(
        &self,
        export_id: &str,
        timeout: Duration,
    ) -> Result<ExportRecord, ControllerError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Arm the notification before checking so a store between
            // check and wait cannot be lost.
            let notified = self.notify.notified();
            if let Some(record) = self.get(export_id).await {
                return Ok(record);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(ControllerError::NotReady(format!(
                    "export {export_id} did not appear within {}ms",
                    timeout.as_millis()
                )));
            }
        }
    }

    /// Persists the current record set. Failures are logged, not
    /// surfaced; in-memory state remains authoritative.
    async fn persist(&self) {
        let snapshot = self.records.lock().await.clone();
        if let Err(err) = self.store.save(&snapshot).await {
            warn!(error = %err, "failed to persist export registry");
        }
    }
}
