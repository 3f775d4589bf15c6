//! Typed payload schemas for the controller's RPC fabric.
//!
//! Each submodule corresponds to one message domain: export storage,
//! transfer orchestration, the platform tree, transaction logs, and
//! subscriptions. All types serialize as camelCase JSON; optional fields
//! are omitted when unset so payloads match the wire contract exactly.

pub mod export;
pub mod logs;
pub mod subscription;
pub mod transfer;
pub mod tree;

pub use export::{
    ExportRecord, ExportSummary, GetStoredExportRequest, GetStoredExportResponse,
    ListExportsRequest, PlatformExportEvent,
};
pub use logs::{
    GetTransactionLogRequest, GetTransactionLogResponse, ListTransactionLogsRequest, LogEntry,
};
pub use subscription::{
    ControlEvent, LogUpdateEvent, SetSubscriptionRequest, SubscriptionFilter, TransferUpdateEvent,
    TreeUpdateEvent,
};
pub use transfer::{
    BridgeAck, DeleteSourcePlatformRequest, ExportPlatformRequest, ExportPlatformResponse,
    ImportOperationCompleteEvent, ImportPlatformRequest, InstanceSelector,
    StartPlatformTransferRequest, TransferPlatformRequest, TransferResponse, TransferStatusUpdate,
    TransferValidationEvent, UnlockSourcePlatformRequest, ValidationReport,
};
pub use tree::{
    GetPlatformTreeRequest, HostNode, InstanceListPlatformsRequest, InstanceNode, PlatformInfo,
    PlatformNode, PlatformTree,
};
