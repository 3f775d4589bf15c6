//! Abstract seams to the controller's external collaborators.
//!
//! The core never talks to a transport directly: instance RPC goes
//! through [`InstanceBridge`], pushes to control clients go through
//! [`ControlSender`], and the only access-control decision in the core
//! is delegated to [`PermissionChecker`]. Implementations are injected
//! at construction.

use async_trait::async_trait;

use skylift_core::messages::{
    BridgeAck, ControlEvent, DeleteSourcePlatformRequest, ExportPlatformRequest,
    ExportPlatformResponse, ImportPlatformRequest, PlatformInfo, TransferStatusUpdate,
    UnlockSourcePlatformRequest,
};

/// Identifier of a control connection, assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Typed RPC to a single game instance.
///
/// Implementations own transport timeouts; a call that returns `Err`
/// (transport failure, timeout, disconnected instance) is treated by
/// the orchestrator as failure of the current phase. A call that
/// returns an unsuccessful ack carries the instance's own reason.
#[async_trait]
pub trait InstanceBridge: Send + Sync {
    /// Ship a stored snapshot to the target instance for import.
    async fn import_platform(
        &self,
        instance_id: u32,
        request: ImportPlatformRequest,
    ) -> anyhow::Result<BridgeAck>;

    /// Ask the source instance to serialize and upload a platform.
    async fn export_platform(
        &self,
        instance_id: u32,
        request: ExportPlatformRequest,
    ) -> anyhow::Result<ExportPlatformResponse>;

    /// Delete the source platform after a validated transfer.
    async fn delete_source_platform(
        &self,
        instance_id: u32,
        request: DeleteSourcePlatformRequest,
    ) -> anyhow::Result<BridgeAck>;

    /// Unlock the source platform after a failed transfer (rollback).
    async fn unlock_source_platform(
        &self,
        instance_id: u32,
        request: UnlockSourcePlatformRequest,
    ) -> anyhow::Result<BridgeAck>;

    /// Deliver a user-visible progress line to an instance. Fire and
    /// forget; delivery failures are logged, never surfaced.
    async fn send_status_update(&self, instance_id: u32, update: TransferStatusUpdate);

    /// List the platforms of a force on one instance
    /// (`InstanceListPlatformsRequest` on the wire).
    async fn list_platforms(
        &self,
        instance_id: u32,
        force_name: &str,
    ) -> anyhow::Result<Vec<PlatformInfo>>;
}

/// Push channel to one control connection.
///
/// A failed send evicts the connection's subscription, so
/// implementations should fail fast rather than buffer indefinitely.
#[async_trait]
pub trait ControlSender: Send + Sync {
    /// Delivers one event to the connection.
    async fn send(&self, event: ControlEvent) -> anyhow::Result<()>;
}

/// Permission lookup for control connections.
///
/// Only the `logs` subscription flag is checked inside the core, against
/// the `view logs` permission.
pub trait PermissionChecker: Send + Sync {
    /// Whether the connection's principal holds the named permission.
    fn has_permission(&self, connection: ConnectionId, permission: &str) -> bool;
}

/// Checker that grants everything. Used where the deployment has no
/// permission system wired in, and by tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn has_permission(&self, _connection: ConnectionId, _permission: &str) -> bool {
        true
    }
}

/// Permission names recognized by the transfer service. The transport
/// layer gates the list/transfer requests; the core itself checks only
/// [`PERMISSION_VIEW_LOGS`](crate::subscriptions::PERMISSION_VIEW_LOGS)
/// on log subscriptions.
pub const PERMISSION_LIST_EXPORTS: &str = "list exports";

/// Permission gating transfer-initiating requests at the transport.
pub const PERMISSION_TRANSFER_EXPORTS: &str = "transfer exports";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_grants_everything() {
        let checker = AllowAll;
        assert!(checker.has_permission(ConnectionId(1), "view logs"));
        assert!(checker.has_permission(ConnectionId(2), "transfer exports"));
    }
}
