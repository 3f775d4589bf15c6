//! Skylift Core -- clock and ID service, transfer data model, and message
//! schemas for the platform-transfer controller.
//!
//! - **Clock** ([`clock`]): monotonic wall-clock reads and unique
//!   transfer/operation ID generation
//! - **Status** ([`status`]): transfer status and operation-type enums,
//!   legacy-alias normalization
//! - **Timing** ([`timing`]): game-tick conversion, duration rendering,
//!   ISO timestamps
//! - **Transfer** ([`transfer`]): operation records, phase timings, log
//!   events, and summary projections
//! - **Messages** ([`messages`]): typed payload schemas for the RPC fabric

pub mod clock;
pub mod messages;
pub mod status;
pub mod timing;
pub mod transfer;

pub use clock::{ClockSource, IdGenerator, ManualClock, MonotonicClock, SystemClock};
pub use status::{normalize_status, OperationType, TransferResult, TransferStatus};
pub use timing::{format_duration_ms, iso_timestamp, normalize_tick_metrics, ticks_to_ms};
pub use transfer::{
    DetailedTransferSummary, LogEvent, PhaseSummary, PhaseTiming, TransferRecord, TransferSummary,
};
