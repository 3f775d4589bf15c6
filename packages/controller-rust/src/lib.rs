//! Skylift Controller -- transfer orchestration core for clustered
//! Factorio deployments.
//!
//! Moves space-platform snapshots between game instances: a
//! content-addressed export registry persisted to disk, a multi-phase
//! transfer orchestrator with validation watchdog and rollback, an
//! ordered per-transfer transaction log, and a revisioned subscription
//! layer streaming tree/transfer/log updates to control clients. The
//! game-embedded serializer and the host-side transport are external
//! collaborators behind the [`traits`] seams.

pub mod config;
pub mod controller;
pub mod error;
pub mod exports;
pub mod orchestrator;
pub mod router;
pub mod shutdown;
pub mod store;
pub mod subscriptions;
pub mod topology;
pub mod traits;
pub mod translog;
pub mod tree;

pub use config::ControllerConfig;
pub use controller::{Controller, DEFAULT_FORCE};
pub use error::ControllerError;
pub use router::ControllerRouter;
pub use traits::{AllowAll, ConnectionId, ControlSender, InstanceBridge, PermissionChecker};
