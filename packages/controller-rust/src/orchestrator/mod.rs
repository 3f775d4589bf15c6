//! Transfer orchestration: the per-transfer state machine, phase timing,
//! the validation watchdog, rollback, source cleanup, and retention.
//!
//! Each transfer lives behind its own async mutex so state transitions
//! are linearizable per transfer ID while distinct transfers proceed
//! concurrently. The validation watchdog is a cancelable spawned task
//! whose callback takes the same per-transfer lock as inbound events.

pub mod inspect;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use skylift_core::clock::{IdGenerator, MonotonicClock};
use skylift_core::messages::{
    DeleteSourcePlatformRequest, ExportPlatformRequest, ImportOperationCompleteEvent,
    ImportPlatformRequest, InstanceSelector, LogEntry, PlatformExportEvent, TransferResponse,
    TransferStatusUpdate, TransferValidationEvent, UnlockSourcePlatformRequest, ValidationReport,
};
use skylift_core::status::{OperationType, TransferStatus};
use skylift_core::timing::normalize_tick_metrics;
use skylift_core::transfer::{TransferRecord, TransferSummary};

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::exports::ExportRegistry;
use crate::subscriptions::SubscriptionManager;
use crate::topology::TopologyView;
use crate::traits::InstanceBridge;
use crate::translog::TransactionLogger;
use crate::tree::TransferOverlay;

/// Synthesized failure reason when the validation watchdog fires.
const VALIDATION_TIMEOUT_REASON: &str =
    "Validation timeout — no response received within 2 minutes";

struct TransferState {
    record: TransferRecord,
    watchdog: Option<JoinHandle<()>>,
}

/// One active transfer: lock-free metadata plus the serialized state.
pub struct TransferHandle {
    started_at: i64,
    terminal: AtomicBool,
    state: Mutex<TransferState>,
}

/// Coordinator for all transfer, export, and import operations.
pub struct TransferOrchestrator {
    clock: Arc<MonotonicClock>,
    ids: IdGenerator,
    bridge: Arc<dyn InstanceBridge>,
    registry: Arc<ExportRegistry>,
    logger: Arc<TransactionLogger>,
    subscriptions: Arc<SubscriptionManager>,
    topology: Arc<TopologyView>,
    validation_timeout: Duration,
    wait_for_export: Duration,
    retention: usize,
    transfers: DashMap<String, Arc<TransferHandle>>,
}

impl TransferOrchestrator {
    /// Wires the orchestrator to its collaborators.
    #[must_use]
    pub fn new(
        config: &ControllerConfig,
        clock: Arc<MonotonicClock>,
        bridge: Arc<dyn InstanceBridge>,
        registry: Arc<ExportRegistry>,
        logger: Arc<TransactionLogger>,
        subscriptions: Arc<SubscriptionManager>,
        topology: Arc<TopologyView>,
    ) -> Arc<Self> {
        Arc::new(Self {
            clock,
            ids: IdGenerator,
            bridge,
            registry,
            logger,
            subscriptions,
            topology,
            validation_timeout: Duration::from_millis(config.validation_timeout_ms),
            wait_for_export: Duration::from_millis(config.wait_for_export_default_ms),
            retention: config.active_transfers_retention,
            transfers: DashMap::new(),
        })
    }

    /// Stores an announced export in the registry.
    pub async fn handle_export_event(&self, event: PlatformExportEvent) {
        info!(
            export_id = %event.export_id,
            instance_id = event.instance_id,
            platform = %event.platform_name,
            "platform export registered"
        );
        self.registry.store_export(event.into_record()).await;
    }

    /// Primary path: ship a stored export to a target instance.
    pub async fn transfer_platform(
        self: &Arc<Self>,
        export_id: &str,
        target: &InstanceSelector,
    ) -> TransferResponse {
        let Some(export) = self.registry.get(export_id).await else {
            return TransferResponse::rejected(
                ControllerError::NotFound(format!("export {export_id}")).response_message(),
                None,
            );
        };
        let topology = self.topology.snapshot();
        let Some(target_instance) = topology.resolve(target).cloned() else {
            return TransferResponse::rejected(
                ControllerError::NotFound(format!("target instance {}", selector_label(target)))
                    .response_message(),
                None,
            );
        };

        let transfer_id = self.ids.transfer_id();
        let now = self.clock.now_ms();
        let force_name = export_force_name(&export.export_data);

        let mut record = TransferRecord::new(
            transfer_id.clone(),
            OperationType::Transfer,
            export.platform_name.clone(),
            force_name,
            export.instance_id,
            now,
        );
        record.export_id = Some(export.export_id.clone());
        record.platform_index = export
            .export_data
            .get("platform_index")
            .and_then(Value::as_u64)
            .and_then(|index| u32::try_from(index).ok());
        record.source_instance_name = topology
            .instance(export.instance_id)
            .map(|instance| instance.name.clone());
        record.target_instance_id = Some(target_instance.instance_id);
        record.target_instance_name = Some(target_instance.name.clone());
        record.artifact_size_bytes = export.size;
        record.payload_metrics = Some(inspect::payload_metrics(
            &export.export_data,
            export.size.unwrap_or(0),
        ));
        record.source_verification = inspect::source_verification(&export.export_data);

        let handle = Arc::new(TransferHandle {
            started_at: now,
            terminal: AtomicBool::new(false),
            state: Mutex::new(TransferState {
                record,
                watchdog: None,
            }),
        });
        self.transfers.insert(transfer_id.clone(), Arc::clone(&handle));
        metrics::counter!("skylift_transfers_started_total").increment(1);

        let mut state = handle.state.lock().await;

        let mut extras = Map::new();
        extras.insert("exportId".to_string(), json!(export.export_id));
        extras.insert("sizeBytes".to_string(), json!(export.size));
        self.log_and_broadcast(
            &state.record,
            "transfer_created",
            format!(
                "Transfer of \"{}\" to {} created",
                state.record.platform_name, target_instance.name
            ),
            extras,
        )
        .await;
        self.send_status(
            &state.record,
            format!("⬆ Transferring \"{}\"...", state.record.platform_name),
            Some("yellow"),
        )
        .await;

        // Transmission phase: ship the payload to the target.
        let now = self.clock.now_ms();
        state.record.start_phase("transmission", now);
        let request = ImportPlatformRequest {
            export_id: export.export_id.clone(),
            export_data: augment_payload(
                export.export_data.clone(),
                &transfer_id,
                export.instance_id,
            ),
            force_name: state.record.force_name.clone(),
        };
        let outcome = self
            .bridge
            .import_platform(target_instance.instance_id, request)
            .await;
        let now = self.clock.now_ms();
        state.record.end_phase("transmission", now);

        let rejection = match outcome {
            Ok(ack) if ack.success => None,
            Ok(ack) => Some(ack.error.unwrap_or_else(|| "import rejected".to_string())),
            Err(err) => Some(err.to_string()),
        };
        if let Some(reason) = rejection {
            self.log_and_broadcast(
                &state.record,
                "import_rejected",
                format!("Target instance rejected the import: {reason}"),
                Map::new(),
            )
            .await;
            self.fail_transfer(&handle, &mut state, reason.clone(), true)
                .await;
            return TransferResponse::rejected(reason, Some(transfer_id));
        }

        // Import accepted: wait for the target's validation verdict.
        state.record.status = TransferStatus::AwaitingValidation;
        self.log_and_broadcast(
            &state.record,
            "import_accepted",
            "Target instance accepted the import",
            Map::new(),
        )
        .await;
        let now = self.clock.now_ms();
        state.record.start_phase("validation", now);
        state.watchdog = Some(self.spawn_watchdog(transfer_id.clone()));

        TransferResponse::accepted(transfer_id)
    }

    /// Combined path: export from the source, then transfer.
    pub async fn start_platform_transfer(
        self: &Arc<Self>,
        source_instance_id: u32,
        source_platform_index: u32,
        target: &InstanceSelector,
        force_name: Option<String>,
    ) -> TransferResponse {
        if source_platform_index < 1 {
            return TransferResponse::rejected(
                ControllerError::Invalid("platform index must be >= 1".to_string())
                    .response_message(),
                None,
            );
        }
        let topology = self.topology.snapshot();
        if topology.instance(source_instance_id).is_none() {
            return TransferResponse::rejected(
                ControllerError::NotFound(format!("source instance {source_instance_id}"))
                    .response_message(),
                None,
            );
        }
        let Some(target_instance) = topology.resolve(target).cloned() else {
            return TransferResponse::rejected(
                ControllerError::NotFound(format!("target instance {}", selector_label(target)))
                    .response_message(),
                None,
            );
        };
        if target_instance.instance_id == source_instance_id {
            return TransferResponse::rejected(
                ControllerError::Invalid("source and target instances must differ".to_string())
                    .response_message(),
                None,
            );
        }

        let force_name = force_name.unwrap_or_else(|| "player".to_string());
        let request = ExportPlatformRequest {
            platform_index: source_platform_index,
            force_name,
            target_instance_id: Some(target_instance.instance_id),
        };
        let response = match self
            .bridge
            .export_platform(source_instance_id, request)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return TransferResponse::rejected(format!("export failed: {err}"), None);
            }
        };
        if !response.success {
            return TransferResponse::rejected(
                response
                    .error
                    .unwrap_or_else(|| "export rejected by source instance".to_string()),
                None,
            );
        }
        let Some(export_id) = response.export_id else {
            return TransferResponse::rejected(
                "export did not return an export ID".to_string(),
                None,
            );
        };

        if let Err(err) = self
            .registry
            .wait_for_export(&export_id, self.wait_for_export)
            .await
        {
            return TransferResponse::rejected(err.response_message(), None);
        }

        let target_selector = InstanceSelector::Id(target_instance.instance_id);
        self.transfer_platform(&export_id, &target_selector).await
    }

    /// Inbound validation verdict (or the watchdog's synthesized one).
    pub async fn handle_validation_event(self: &Arc<Self>, event: TransferValidationEvent) {
        let Some(handle) = self.handle_for(&event.transfer_id) else {
            warn!(transfer_id = %event.transfer_id, "validation event for unknown transfer");
            return;
        };
        let mut state = handle.state.lock().await;
        if state.record.status != TransferStatus::AwaitingValidation {
            debug!(
                transfer_id = %event.transfer_id,
                status = %state.record.status,
                "ignoring validation event outside awaiting_validation"
            );
            return;
        }

        if let Some(watchdog) = state.watchdog.take() {
            watchdog.abort();
        }
        let now = self.clock.now_ms();
        state.record.end_phase("validation", now);
        state.record.validation_result = serde_json::to_value(&event.validation).ok();
        if let Some(metrics) = event.metrics {
            state.record.import_metrics = Some(normalize_tick_metrics(metrics));
        }

        if event.success {
            self.log_and_broadcast(
                &state.record,
                "validation_passed",
                "Target instance validated the imported platform",
                Map::new(),
            )
            .await;
            self.send_status(&state.record, "✓ Validation passed", Some("green"))
                .await;
            self.cleanup_source(&handle, &mut state).await;
        } else {
            let reason = event
                .validation
                .mismatch_details
                .clone()
                .unwrap_or_else(|| "validation failed on target instance".to_string());
            let mut extras = Map::new();
            extras.insert(
                "itemCountMatch".to_string(),
                json!(event.validation.item_count_match),
            );
            extras.insert(
                "fluidCountMatch".to_string(),
                json!(event.validation.fluid_count_match),
            );
            self.log_and_broadcast(
                &state.record,
                "validation_failed",
                format!("Validation failed: {reason}"),
                extras,
            )
            .await;
            self.fail_transfer(&handle, &mut state, reason, true).await;
        }
    }

    /// Inbound completion of a local export or import operation.
    pub async fn handle_import_complete(self: &Arc<Self>, event: ImportOperationCompleteEvent) {
        let Some(handle) = self.handle_for(&event.operation_id) else {
            debug!(operation_id = %event.operation_id, "completion for unknown operation");
            return;
        };
        let mut state = handle.state.lock().await;
        if state.record.status.is_terminal() {
            debug!(
                transfer_id = %event.operation_id,
                status = %state.record.status,
                "ignoring completion for terminal operation"
            );
            return;
        }

        let now = self.clock.now_ms();
        if let Some(metrics) = event.metrics {
            let normalized = normalize_tick_metrics(metrics);
            match state.record.operation_type {
                OperationType::Export => state.record.export_metrics = Some(normalized),
                OperationType::Transfer | OperationType::Import => {
                    state.record.import_metrics = Some(normalized);
                }
            }
        }

        let mut extras = Map::new();
        if let Some(ticks) = event.duration_ticks {
            extras.insert("durationTicks".to_string(), json!(ticks));
        }
        if let Some(entities) = event.entity_count {
            extras.insert("entityCount".to_string(), json!(entities));
        }

        if event.success {
            state.record.status = TransferStatus::Completed;
            state.record.completed_at = Some(now);
            handle.terminal.store(true, Ordering::Relaxed);
            metrics::counter!("skylift_transfers_completed_total").increment(1);
            self.log_and_broadcast(
                &state.record,
                "operation_complete",
                format!(
                    "{} operation completed",
                    operation_label(state.record.operation_type)
                ),
                extras,
            )
            .await;
        } else {
            let reason = event
                .error
                .unwrap_or_else(|| "operation failed on instance".to_string());
            state.record.status = TransferStatus::Failed;
            state.record.failed_at = Some(now);
            state.record.error = Some(reason.clone());
            handle.terminal.store(true, Ordering::Relaxed);
            metrics::counter!("skylift_transfers_failed_total").increment(1);
            self.log_and_broadcast(
                &state.record,
                "operation_failed",
                format!("Operation failed: {reason}"),
                extras,
            )
            .await;
        }
        self.finalize(&state.record).await;
        drop(state);
        self.prune_transfers();
    }

    /// Registers a local export or import operation so completion events
    /// can address it.
    pub async fn begin_local_operation(
        self: &Arc<Self>,
        operation_type: OperationType,
        platform_name: String,
        force_name: String,
        instance_id: u32,
        export_id: Option<String>,
        artifact_size_bytes: Option<u64>,
    ) -> String {
        let operation_id = self.ids.operation_id();
        let now = self.clock.now_ms();
        let mut record = TransferRecord::new(
            operation_id.clone(),
            operation_type,
            platform_name,
            force_name,
            instance_id,
            now,
        );
        record.export_id = export_id;
        record.artifact_size_bytes = artifact_size_bytes;
        record.source_instance_name = self
            .topology
            .snapshot()
            .instance(instance_id)
            .map(|instance| instance.name.clone());

        let handle = Arc::new(TransferHandle {
            started_at: now,
            terminal: AtomicBool::new(false),
            state: Mutex::new(TransferState {
                record,
                watchdog: None,
            }),
        });
        self.transfers.insert(operation_id.clone(), Arc::clone(&handle));

        let state = handle.state.lock().await;
        self.log_and_broadcast(
            &state.record,
            "transfer_created",
            format!(
                "{} operation created",
                operation_label(state.record.operation_type)
            ),
            Map::new(),
        )
        .await;
        operation_id
    }

    /// Overlay projections for every non-terminal transfer.
    pub async fn overlays(&self) -> Vec<TransferOverlay> {
        let handles: Vec<Arc<TransferHandle>> = self
            .transfers
            .iter()
            .filter(|entry| !entry.value().terminal.load(Ordering::Relaxed))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut overlays = Vec::with_capacity(handles.len());
        for handle in handles {
            let state = handle.state.lock().await;
            overlays.push(TransferOverlay {
                transfer_id: state.record.transfer_id.clone(),
                source_instance_id: state.record.source_instance_id,
                platform_index: state.record.platform_index,
                platform_name: state.record.platform_name.clone(),
                status: state.record.status,
            });
        }
        overlays
    }

    /// Short summaries of every in-flight transfer (initial replay).
    pub async fn active_summaries(&self) -> Vec<TransferSummary> {
        let handles: Vec<Arc<TransferHandle>> = self
            .transfers
            .iter()
            .filter(|entry| !entry.value().terminal.load(Ordering::Relaxed))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            let state = handle.state.lock().await;
            let last_event = self.logger.last_event_ms(&state.record.transfer_id);
            summaries.push(state.record.short_summary(last_event));
        }
        summaries
    }

    /// Live log entry for an active transfer, if it exists.
    pub async fn compose_log_entry(&self, transfer_id: &str) -> Option<LogEntry> {
        let handle = self.handle_for(transfer_id)?;
        let state = handle.state.lock().await;
        Some(self.logger.compose_entry(&state.record))
    }

    /// Number of tracked transfer records (including terminal ones).
    #[must_use]
    pub fn tracked_transfers(&self) -> usize {
        self.transfers.len()
    }

    /// Cancels every outstanding validation watchdog. Called on
    /// shutdown; in-flight transfers stay in their last persisted state.
    pub async fn cancel_timers(&self) {
        let handles: Vec<Arc<TransferHandle>> = self
            .transfers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for handle in handles {
            let mut state = handle.state.lock().await;
            if let Some(watchdog) = state.watchdog.take() {
                watchdog.abort();
            }
        }
    }

    // -- internals ----------------------------------------------------------

    fn handle_for(&self, transfer_id: &str) -> Option<Arc<TransferHandle>> {
        self.transfers
            .get(transfer_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn spawn_watchdog(self: &Arc<Self>, transfer_id: String) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let timeout = self.validation_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            orchestrator.validation_timed_out(&transfer_id).await;
        })
    }

    async fn validation_timed_out(self: &Arc<Self>, transfer_id: &str) {
        let Some(handle) = self.handle_for(transfer_id) else {
            return;
        };
        // Peek without mutating: only synthesize a failure if the
        // transfer is still awaiting validation.
        let (platform_name, source_instance_id) = {
            let state = handle.state.lock().await;
            if state.record.status != TransferStatus::AwaitingValidation {
                return;
            }
            (
                state.record.platform_name.clone(),
                state.record.source_instance_id,
            )
        };
        warn!(transfer_id, "validation watchdog fired");
        self.handle_validation_event(TransferValidationEvent {
            transfer_id: transfer_id.to_string(),
            platform_name,
            source_instance_id,
            success: false,
            validation: ValidationReport::failure(VALIDATION_TIMEOUT_REASON),
            metrics: None,
        })
        .await;
    }

    /// Success path tail: delete the source platform, then complete.
    async fn cleanup_source(self: &Arc<Self>, handle: &TransferHandle, state: &mut TransferState) {
        state.record.status = TransferStatus::Cleanup;
        self.broadcast_update(&state.record).await;
        let now = self.clock.now_ms();
        state.record.start_phase("cleanup", now);

        let request = DeleteSourcePlatformRequest {
            platform_index: state.record.platform_index,
            platform_name: state.record.platform_name.clone(),
            force_name: state.record.force_name.clone(),
        };
        let outcome = self
            .bridge
            .delete_source_platform(state.record.source_instance_id, request)
            .await;
        let now = self.clock.now_ms();
        state.record.end_phase("cleanup", now);

        let failure = match outcome {
            Ok(ack) if ack.success => None,
            Ok(ack) => Some(ack.error.unwrap_or_else(|| "delete rejected".to_string())),
            Err(err) => Some(err.to_string()),
        };
        match failure {
            None => {
                state.record.status = TransferStatus::Completed;
                state.record.completed_at = Some(now);
                handle.terminal.store(true, Ordering::Relaxed);
                metrics::counter!("skylift_transfers_completed_total").increment(1);
                self.log_and_broadcast(
                    &state.record,
                    "transfer_completed",
                    "Source platform deleted, transfer complete",
                    Map::new(),
                )
                .await;
                self.send_status(&state.record, "✓ Transfer complete", Some("green"))
                    .await;
                if let Some(export_id) = state.record.export_id.clone() {
                    self.registry.delete(&export_id).await;
                }
            }
            Some(reason) => {
                state.record.status = TransferStatus::CleanupFailed;
                state.record.completed_at = Some(now);
                state.record.error = Some(reason.clone());
                handle.terminal.store(true, Ordering::Relaxed);
                metrics::counter!("skylift_transfers_failed_total").increment(1);
                self.log_and_broadcast(
                    &state.record,
                    "cleanup_failed",
                    format!("Source platform delete failed: {reason}"),
                    Map::new(),
                )
                .await;
                self.send_status(
                    &state.record,
                    format!("⚠ Cleanup failed: {reason}"),
                    Some("orange"),
                )
                .await;
            }
        }
        self.finalize(&state.record).await;
        self.prune_transfers();
    }

    /// Failure path tail: mark failed, roll back when requested, persist.
    async fn fail_transfer(
        self: &Arc<Self>,
        handle: &TransferHandle,
        state: &mut TransferState,
        reason: String,
        rollback: bool,
    ) {
        if let Some(watchdog) = state.watchdog.take() {
            watchdog.abort();
        }
        let now = self.clock.now_ms();
        state.record.status = TransferStatus::Failed;
        state.record.failed_at = Some(now);
        state.record.error = Some(reason.clone());
        handle.terminal.store(true, Ordering::Relaxed);
        metrics::counter!("skylift_transfers_failed_total").increment(1);

        self.send_status(
            &state.record,
            format!("✗ Transfer failed: {reason}"),
            Some("red"),
        )
        .await;
        self.broadcast_update(&state.record).await;

        if rollback {
            self.rollback(&mut state.record).await;
        }
        self.finalize(&state.record).await;
        self.prune_transfers();
    }

    /// Unlocks the source platform after a failed transfer. A failed
    /// rollback is appended to the error but never masks the primary
    /// failure reason.
    async fn rollback(&self, record: &mut TransferRecord) {
        let request = UnlockSourcePlatformRequest {
            platform_name: record.platform_name.clone(),
            force_name: record.force_name.clone(),
        };
        let outcome = self
            .bridge
            .unlock_source_platform(record.source_instance_id, request)
            .await;
        let failure = match outcome {
            Ok(ack) if ack.success => None,
            Ok(ack) => Some(ack.error.unwrap_or_else(|| "unlock rejected".to_string())),
            Err(err) => Some(err.to_string()),
        };
        match failure {
            None => {
                self.logger
                    .log_event(record, "rollback_success", "Source platform unlocked", Map::new())
                    .await;
            }
            Some(reason) => {
                warn!(transfer_id = %record.transfer_id, error = %reason, "rollback failed");
                self.logger
                    .log_event(
                        record,
                        "rollback_failed",
                        format!("Failed to unlock source platform: {reason}"),
                        Map::new(),
                    )
                    .await;
                record.error = Some(match record.error.take() {
                    Some(prior) => format!("{prior}; rollback failed: {reason}"),
                    None => format!("rollback failed: {reason}"),
                });
            }
        }
    }

    /// Terminal tail shared by every outcome: persist the transaction
    /// log and emit the final transfer-update broadcast.
    async fn finalize(&self, record: &TransferRecord) {
        if let Err(err) = self.logger.persist(record).await {
            warn!(
                transfer_id = %record.transfer_id,
                error = %err,
                "failed to persist transaction log"
            );
        }
        self.broadcast_update(record).await;
    }

    async fn log_and_broadcast(
        &self,
        record: &TransferRecord,
        event_type: &str,
        message: impl Into<String>,
        extras: Map<String, Value>,
    ) {
        self.logger
            .log_event(record, event_type, message, extras)
            .await;
        self.broadcast_update(record).await;
    }

    async fn broadcast_update(&self, record: &TransferRecord) {
        let last_event = self.logger.last_event_ms(&record.transfer_id);
        self.subscriptions
            .broadcast_transfer(record.short_summary(last_event))
            .await;
    }

    /// Delivers a user-visible status line to the source and target.
    async fn send_status(
        &self,
        record: &TransferRecord,
        message: impl Into<String>,
        color: Option<&str>,
    ) {
        let update = TransferStatusUpdate {
            transfer_id: record.transfer_id.clone(),
            platform_name: record.platform_name.clone(),
            message: message.into(),
            color: color.map(str::to_string),
        };
        self.bridge
            .send_status_update(record.source_instance_id, update.clone())
            .await;
        if let Some(target) = record.target_instance_id {
            self.bridge.send_status_update(target, update).await;
        }
    }

    /// Prunes terminal transfers beyond the newest `retention` by start
    /// time. In-flight transfers are never pruned.
    fn prune_transfers(&self) {
        if self.transfers.len() <= self.retention {
            return;
        }
        let mut entries: Vec<(String, i64, bool)> = self
            .transfers
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().started_at,
                    entry.value().terminal.load(Ordering::Relaxed),
                )
            })
            .collect();
        entries.sort_by_key(|(_, started_at, _)| std::cmp::Reverse(*started_at));
        for (transfer_id, _, terminal) in entries.into_iter().skip(self.retention) {
            if terminal {
                self.transfers.remove(&transfer_id);
                self.logger.drop_events(&transfer_id);
                debug!(transfer_id = %transfer_id, "pruned terminal transfer");
            }
        }
    }
}

/// Display label for selector error messages.
fn selector_label(selector: &InstanceSelector) -> String {
    match selector {
        InstanceSelector::Id(id) => id.to_string(),
        InstanceSelector::Name(name) => format!("\"{name}\""),
    }
}

/// Force carried inside a snapshot, defaulting to the base game force.
fn export_force_name(export_data: &Value) -> String {
    export_data
        .get("force_name")
        .or_else(|| export_data.get("forceName"))
        .and_then(Value::as_str)
        .unwrap_or("player")
        .to_string()
}

/// Tags the payload with the transfer identity the target echoes back.
fn augment_payload(mut export_data: Value, transfer_id: &str, source_instance_id: u32) -> Value {
    if let Value::Object(map) = &mut export_data {
        map.insert("_transferId".to_string(), json!(transfer_id));
        map.insert("_sourceInstanceId".to_string(), json!(source_instance_id));
    }
    export_data
}

/// Display label for log messages about an operation.
fn operation_label(operation_type: OperationType) -> &'static str {
    match operation_type {
        OperationType::Transfer => "Transfer",
        OperationType::Export => "Export",
        OperationType::Import => "Import",
    }
}
