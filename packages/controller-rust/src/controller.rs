//! Controller assembly: owns every subsystem and their lifecycles.
//!
//! The in-memory stores (export registry, active transfers, transaction
//! logs, subscriptions) are singletons with a defined lifecycle: loaded
//! on startup, flushed on shutdown. Other modules reach them through
//! this owner; the cyclic controller/subsystem references of the
//! original message fabric become plain dependency injection here.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use skylift_core::clock::MonotonicClock;
use skylift_core::messages::PlatformTree;

use crate::config::ControllerConfig;
use crate::exports::ExportRegistry;
use crate::orchestrator::TransferOrchestrator;
use crate::shutdown::{InFlightGuard, LifecycleState, ShutdownController};
use crate::store::JsonStore;
use crate::subscriptions::{BroadcastLimiter, SubscriptionManager};
use crate::topology::TopologyView;
use crate::traits::{InstanceBridge, PermissionChecker};
use crate::translog::TransactionLogger;
use crate::tree::build_tree;

/// Force queried when a request does not name one.
pub const DEFAULT_FORCE: &str = "player";

/// The transfer-controller core.
pub struct Controller {
    clock: Arc<MonotonicClock>,
    bridge: Arc<dyn InstanceBridge>,
    registry: Arc<ExportRegistry>,
    logger: Arc<TransactionLogger>,
    subscriptions: Arc<SubscriptionManager>,
    topology: Arc<TopologyView>,
    orchestrator: Arc<TransferOrchestrator>,
    tree_limiter: BroadcastLimiter,
    shutdown: ShutdownController,
}

impl Controller {
    /// Assembles the controller with the system clock.
    #[must_use]
    pub fn new(
        config: ControllerConfig,
        bridge: Arc<dyn InstanceBridge>,
        permissions: Arc<dyn PermissionChecker>,
    ) -> Arc<Self> {
        Self::with_clock(config, bridge, permissions, MonotonicClock::system())
    }

    /// Assembles the controller with an injected clock (tests).
    #[must_use]
    pub fn with_clock(
        config: ControllerConfig,
        bridge: Arc<dyn InstanceBridge>,
        permissions: Arc<dyn PermissionChecker>,
        clock: MonotonicClock,
    ) -> Arc<Self> {
        let clock = Arc::new(clock);
        let registry = Arc::new(ExportRegistry::new(
            JsonStore::new(config.storage_path()),
            config.max_storage_size,
        ));
        let subscriptions = Arc::new(SubscriptionManager::new(permissions, Arc::clone(&clock)));
        let logger = Arc::new(TransactionLogger::new(
            JsonStore::new(config.transaction_log_path()),
            config.max_persisted_logs,
            Arc::clone(&clock),
            Arc::clone(&subscriptions),
        ));
        let topology = Arc::new(TopologyView::new());
        let orchestrator = TransferOrchestrator::new(
            &config,
            Arc::clone(&clock),
            Arc::clone(&bridge),
            Arc::clone(&registry),
            Arc::clone(&logger),
            Arc::clone(&subscriptions),
            Arc::clone(&topology),
        );

        let window_ms = 1000 / u64::from(config.tree_broadcast_max_rate_per_sec.max(1));
        let tree_limiter = {
            let subscriptions = Arc::clone(&subscriptions);
            let orchestrator = Arc::clone(&orchestrator);
            let topology = Arc::clone(&topology);
            let bridge = Arc::clone(&bridge);
            let clock = Arc::clone(&clock);
            BroadcastLimiter::spawn(Duration::from_millis(window_ms), move || {
                let subscriptions = Arc::clone(&subscriptions);
                let orchestrator = Arc::clone(&orchestrator);
                let topology = Arc::clone(&topology);
                let bridge = Arc::clone(&bridge);
                let clock = Arc::clone(&clock);
                async move {
                    // A snapshot is only worth building when someone is
                    // listening for it.
                    if !subscriptions.wants_tree() {
                        return;
                    }
                    let revision = subscriptions.next_tree_revision();
                    let overlays = orchestrator.overlays().await;
                    let tree = build_tree(
                        &topology.snapshot(),
                        bridge.as_ref(),
                        &overlays,
                        DEFAULT_FORCE,
                        revision,
                        clock.now_ms(),
                    )
                    .await;
                    subscriptions.broadcast_tree(tree).await;
                }
            })
        };

        Arc::new(Self {
            clock,
            bridge,
            registry,
            logger,
            subscriptions,
            topology,
            orchestrator,
            tree_limiter,
            shutdown: ShutdownController::new(),
        })
    }

    /// Loads persisted state and marks the controller ready.
    pub async fn startup(&self) -> anyhow::Result<()> {
        let exports = self.registry.load().await?;
        info!(exports, "controller started");
        self.shutdown.set_ready();
        Ok(())
    }

    /// Signals shutdown: cancels watchdog timers and the tree limiter,
    /// then waits briefly for in-flight handling to drain. In-flight
    /// transfers stay in their last persisted state; connections are not
    /// notified.
    pub async fn shutdown(&self) {
        self.shutdown.trigger_shutdown();
        self.orchestrator.cancel_timers().await;
        self.tree_limiter.shutdown();
        self.shutdown.wait_for_drain(Duration::from_secs(5)).await;
        info!("controller stopped");
    }

    /// Builds a platform tree at the next tree revision.
    pub async fn build_platform_tree(&self, force_name: &str) -> PlatformTree {
        let revision = self.subscriptions.next_tree_revision();
        let overlays = self.orchestrator.overlays().await;
        build_tree(
            &self.topology.snapshot(),
            self.bridge.as_ref(),
            &overlays,
            force_name,
            revision,
            self.clock.now_ms(),
        )
        .await
    }

    /// Requests a coalesced tree broadcast.
    pub fn queue_tree_broadcast(&self) {
        self.tree_limiter.queue();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.shutdown.state()
    }

    /// Guard tracking one in-flight request.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.shutdown.in_flight_guard()
    }

    /// The export registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ExportRegistry> {
        &self.registry
    }

    /// The transaction logger.
    #[must_use]
    pub fn logger(&self) -> &Arc<TransactionLogger> {
        &self.logger
    }

    /// The subscription manager.
    #[must_use]
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// The cluster topology view.
    #[must_use]
    pub fn topology(&self) -> &Arc<TopologyView> {
        &self.topology
    }

    /// The transfer orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<TransferOrchestrator> {
        &self.orchestrator
    }
}
