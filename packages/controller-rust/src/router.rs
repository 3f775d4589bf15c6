//! Typed request/event facade over the controller.
//!
//! The transport layer decodes wire messages and calls one handler per
//! message type; handlers stay thin and delegate to the owning
//! subsystem. Connection lifecycle callbacks arrive here too.

use std::sync::Arc;

use tracing::warn;

use skylift_core::messages::{
    GetPlatformTreeRequest, GetStoredExportRequest, GetStoredExportResponse,
    GetTransactionLogRequest, GetTransactionLogResponse, ImportOperationCompleteEvent,
    ListTransactionLogsRequest, PlatformExportEvent, PlatformTree, SetSubscriptionRequest,
    StartPlatformTransferRequest, TransferPlatformRequest, TransferResponse,
    TransferValidationEvent,
};
use skylift_core::messages::ExportSummary;
use skylift_core::transfer::TransferSummary;

use crate::controller::{Controller, DEFAULT_FORCE};
use crate::error::ControllerError;
use crate::traits::{ConnectionId, ControlSender};

/// Dispatches inbound typed messages to the controller subsystems.
#[derive(Clone)]
pub struct ControllerRouter {
    controller: Arc<Controller>,
}

impl ControllerRouter {
    /// Creates a router over the controller.
    #[must_use]
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    // -- instance events ----------------------------------------------------

    /// `PlatformExportEvent`: register a completed snapshot.
    pub async fn handle_platform_export_event(&self, event: PlatformExportEvent) {
        let _guard = self.controller.in_flight_guard();
        self.controller
            .orchestrator()
            .handle_export_event(event)
            .await;
    }

    /// `TransferValidationEvent`: the target's validation verdict.
    pub async fn handle_transfer_validation_event(&self, event: TransferValidationEvent) {
        let _guard = self.controller.in_flight_guard();
        self.controller
            .orchestrator()
            .handle_validation_event(event)
            .await;
        self.controller.queue_tree_broadcast();
    }

    /// `ImportOperationCompleteEvent`: a local export/import finished.
    pub async fn handle_import_operation_complete(&self, event: ImportOperationCompleteEvent) {
        let _guard = self.controller.in_flight_guard();
        self.controller
            .orchestrator()
            .handle_import_complete(event)
            .await;
        self.controller.queue_tree_broadcast();
    }

    // -- control requests ---------------------------------------------------

    /// `ListExportsRequest`: metadata of every stored export.
    pub async fn handle_list_exports(&self) -> Vec<ExportSummary> {
        let _guard = self.controller.in_flight_guard();
        self.controller.registry().list().await
    }

    /// `GetStoredExportRequest`: one stored export with its payload.
    pub async fn handle_get_stored_export(
        &self,
        request: GetStoredExportRequest,
    ) -> GetStoredExportResponse {
        let _guard = self.controller.in_flight_guard();
        match self.controller.registry().get(&request.export_id).await {
            Some(record) => GetStoredExportResponse::found(&record),
            None => GetStoredExportResponse::failure(
                ControllerError::NotFound(format!("export {}", request.export_id))
                    .response_message(),
            ),
        }
    }

    /// `TransferPlatformRequest`: primary transfer path.
    pub async fn handle_transfer_platform(
        &self,
        request: TransferPlatformRequest,
    ) -> TransferResponse {
        let _guard = self.controller.in_flight_guard();
        let response = self
            .controller
            .orchestrator()
            .transfer_platform(&request.export_id, &request.target_instance_id)
            .await;
        self.controller.queue_tree_broadcast();
        response
    }

    /// `StartPlatformTransferRequest`: combined export-then-transfer.
    pub async fn handle_start_platform_transfer(
        &self,
        request: StartPlatformTransferRequest,
    ) -> TransferResponse {
        let _guard = self.controller.in_flight_guard();
        let response = self
            .controller
            .orchestrator()
            .start_platform_transfer(
                request.source_instance_id,
                request.source_platform_index,
                &request.target_instance_id,
                request.force_name,
            )
            .await;
        self.controller.queue_tree_broadcast();
        response
    }

    /// `GetPlatformTreeRequest`: fresh cluster snapshot.
    pub async fn handle_get_platform_tree(&self, request: GetPlatformTreeRequest) -> PlatformTree {
        let _guard = self.controller.in_flight_guard();
        let force = request.force_name.as_deref().unwrap_or(DEFAULT_FORCE);
        self.controller.build_platform_tree(force).await
    }

    /// `ListTransactionLogsRequest`: persisted short summaries, newest
    /// first.
    pub async fn handle_list_transaction_logs(
        &self,
        request: ListTransactionLogsRequest,
    ) -> Vec<TransferSummary> {
        let _guard = self.controller.in_flight_guard();
        let entries = match self.controller.logger().persisted_entries().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "failed to read persisted transaction logs");
                return Vec::new();
            }
        };
        let limit = request.limit.unwrap_or(usize::MAX);
        entries
            .into_iter()
            .take(limit)
            .map(|entry| entry.transfer_info)
            .collect()
    }

    /// `GetTransactionLogRequest`: one log by transfer ID or `"latest"`.
    ///
    /// Active transfers serve their live journal; otherwise the
    /// persisted file is consulted.
    pub async fn handle_get_transaction_log(
        &self,
        request: GetTransactionLogRequest,
    ) -> GetTransactionLogResponse {
        let _guard = self.controller.in_flight_guard();

        if request.transfer_id != "latest" {
            if let Some(entry) = self
                .controller
                .orchestrator()
                .compose_log_entry(&request.transfer_id)
                .await
            {
                return GetTransactionLogResponse::found(&entry);
            }
        }
        match self
            .controller
            .logger()
            .persisted_entry(&request.transfer_id)
            .await
        {
            Ok(Some(entry)) => GetTransactionLogResponse::found(&entry),
            Ok(None) if request.transfer_id == "latest" => {
                GetTransactionLogResponse::failure("no transaction logs recorded")
            }
            Ok(None) => GetTransactionLogResponse::failure(
                ControllerError::NotFound(format!("transaction log {}", request.transfer_id))
                    .response_message(),
            ),
            Err(err) => GetTransactionLogResponse::failure(
                ControllerError::Io(err).response_message(),
            ),
        }
    }

    /// `SetSubscriptionRequest`: replace this connection's filter and
    /// send the initial snapshots for newly requested streams.
    pub async fn handle_set_subscription(
        &self,
        connection: ConnectionId,
        sender: Arc<dyn ControlSender>,
        request: SetSubscriptionRequest,
    ) -> Result<(), ControllerError> {
        let _guard = self.controller.in_flight_guard();
        let outcome = self
            .controller
            .subscriptions()
            .set_subscription(connection, sender, request.filter)?;

        if outcome.send_initial_tree {
            let tree = self.controller.build_platform_tree(DEFAULT_FORCE).await;
            self.controller
                .subscriptions()
                .send_tree_to(connection, tree)
                .await;
        }
        if outcome.replay_transfers {
            for summary in self.controller.orchestrator().active_summaries().await {
                self.controller
                    .subscriptions()
                    .replay_transfer_to(connection, summary)
                    .await;
            }
        }
        Ok(())
    }

    // -- connection and topology lifecycle ----------------------------------

    /// A control connection closed: drop its subscription.
    pub fn handle_connection_closed(&self, connection: ConnectionId) {
        self.controller.subscriptions().remove_connection(connection);
    }

    /// Host registered or updated.
    pub fn handle_host_updated(&self, host_id: u32, name: &str, connected: bool) {
        self.controller.topology().upsert_host(host_id, name, connected);
        self.controller.queue_tree_broadcast();
    }

    /// Instance registered or updated.
    pub fn handle_instance_updated(
        &self,
        instance_id: u32,
        name: &str,
        assigned_host: Option<u32>,
        status: &str,
        connected: bool,
    ) {
        self.controller
            .topology()
            .upsert_instance(instance_id, name, assigned_host, status, connected);
        self.controller.queue_tree_broadcast();
    }

    /// Instance connection state changed.
    pub fn handle_instance_connection(&self, instance_id: u32, connected: bool) {
        self.controller
            .topology()
            .set_instance_connected(instance_id, connected);
        self.controller.queue_tree_broadcast();
    }
}
