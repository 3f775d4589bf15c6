//! Subscription registry and revisioned broadcast fan-out.
//!
//! Control connections register a filter; tree, transfer, and log
//! updates are pushed to matching subscribers with strictly monotonic
//! per-stream revisions. Broadcast iteration works over a snapshot of
//! the registry so a send failure can evict the offending connection
//! mid-broadcast without invalidating the iteration.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use skylift_core::clock::MonotonicClock;
use skylift_core::messages::{
    ControlEvent, LogUpdateEvent, PlatformTree, SubscriptionFilter, TransferUpdateEvent,
    TreeUpdateEvent,
};
use skylift_core::transfer::{DetailedTransferSummary, LogEvent, TransferSummary};

use crate::error::ControllerError;
use crate::traits::{ConnectionId, ControlSender, PermissionChecker};

/// Permission required to subscribe to log updates.
pub const PERMISSION_VIEW_LOGS: &str = "view logs";

/// What a subscription change obliges the caller to send immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscribeOutcome {
    /// `tree` was newly requested: send the current tree now.
    pub send_initial_tree: bool,
    /// `transfers` was newly requested: replay in-flight transfers now.
    pub replay_transfers: bool,
}

struct SubscriptionEntry {
    sender: Arc<dyn ControlSender>,
    filter: SubscriptionFilter,
}

/// Connection → filter registry with revisioned broadcast delivery.
pub struct SubscriptionManager {
    subscriptions: DashMap<ConnectionId, SubscriptionEntry>,
    permissions: Arc<dyn PermissionChecker>,
    clock: Arc<MonotonicClock>,
    tree_revision: AtomicU64,
    transfer_revision: AtomicU64,
    log_revision: AtomicU64,
}

impl SubscriptionManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(permissions: Arc<dyn PermissionChecker>, clock: Arc<MonotonicClock>) -> Self {
        Self {
            subscriptions: DashMap::new(),
            permissions,
            clock,
            tree_revision: AtomicU64::new(0),
            transfer_revision: AtomicU64::new(0),
            log_revision: AtomicU64::new(0),
        }
    }

    /// Replaces (or removes) a connection's subscription.
    ///
    /// A filter with all flags false removes the subscription. The
    /// `logs` flag requires the `view logs` permission; this is the only
    /// access-control check in the core.
    pub fn set_subscription(
        &self,
        connection: ConnectionId,
        sender: Arc<dyn ControlSender>,
        filter: SubscriptionFilter,
    ) -> Result<SubscribeOutcome, ControllerError> {
        if filter.logs && !self.permissions.has_permission(connection, PERMISSION_VIEW_LOGS) {
            return Err(ControllerError::PermissionDenied(format!(
                "log subscription requires the \"{PERMISSION_VIEW_LOGS}\" permission"
            )));
        }

        if filter.is_empty() {
            self.subscriptions.remove(&connection);
            debug!(connection = connection.0, "subscription removed");
            return Ok(SubscribeOutcome::default());
        }

        let previous = self
            .subscriptions
            .get(&connection)
            .map(|entry| entry.filter.clone())
            .unwrap_or_default();
        let outcome = SubscribeOutcome {
            send_initial_tree: filter.tree && !previous.tree,
            replay_transfers: filter.transfers && !previous.transfers,
        };

        self.subscriptions
            .insert(connection, SubscriptionEntry { sender, filter });
        Ok(outcome)
    }

    /// Drops a connection's subscription (connection closed).
    pub fn remove_connection(&self, connection: ConnectionId) {
        self.subscriptions.remove(&connection);
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no subscriptions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Whether any subscriber currently wants tree updates.
    #[must_use]
    pub fn wants_tree(&self) -> bool {
        self.subscriptions.iter().any(|entry| entry.filter.tree)
    }

    /// Allocates the next tree revision.
    ///
    /// Incremented for every generated tree (broadcast or direct query)
    /// so subscribers can detect gaps across both paths.
    pub fn next_tree_revision(&self) -> u64 {
        self.tree_revision.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Broadcasts a tree snapshot to all `tree` subscribers.
    pub async fn broadcast_tree(&self, tree: PlatformTree) {
        let event = TreeUpdateEvent {
            revision: tree.revision,
            generated_at: tree.generated_at,
            force_name: tree.force_name.clone(),
            tree,
        };
        let targets = self.snapshot(|filter| filter.tree);
        self.deliver(targets, &ControlEvent::TreeUpdate(event)).await;
    }

    /// Broadcasts a transfer short summary to all `transfers`
    /// subscribers, allocating the next transfer revision.
    pub async fn broadcast_transfer(&self, transfer: TransferSummary) {
        let event = TransferUpdateEvent {
            revision: self.transfer_revision.fetch_add(1, Ordering::Relaxed) + 1,
            generated_at: self.clock.now_ms(),
            transfer,
        };
        let targets = self.snapshot(|filter| filter.transfers);
        self.deliver(targets, &ControlEvent::TransferUpdate(event))
            .await;
    }

    /// Replays one transfer summary to a single connection (initial
    /// snapshot on subscribe). Allocates a revision like any broadcast.
    pub async fn replay_transfer_to(&self, connection: ConnectionId, transfer: TransferSummary) {
        let event = ControlEvent::TransferUpdate(TransferUpdateEvent {
            revision: self.transfer_revision.fetch_add(1, Ordering::Relaxed) + 1,
            generated_at: self.clock.now_ms(),
            transfer,
        });
        let Some(sender) = self
            .subscriptions
            .get(&connection)
            .map(|entry| Arc::clone(&entry.sender))
        else {
            return;
        };
        self.deliver(vec![(connection, sender)], &event).await;
    }

    /// Sends a tree snapshot to a single connection.
    pub async fn send_tree_to(&self, connection: ConnectionId, tree: PlatformTree) {
        let event = ControlEvent::TreeUpdate(TreeUpdateEvent {
            revision: tree.revision,
            generated_at: tree.generated_at,
            force_name: tree.force_name.clone(),
            tree,
        });
        let Some(sender) = self
            .subscriptions
            .get(&connection)
            .map(|entry| Arc::clone(&entry.sender))
        else {
            return;
        };
        self.deliver(vec![(connection, sender)], &event).await;
    }

    /// Broadcasts a log event to `logs` subscribers whose filter matches
    /// the event's transfer, allocating the next log revision.
    pub async fn broadcast_log(
        &self,
        transfer_id: &str,
        event: LogEvent,
        transfer_info: TransferSummary,
        summary: DetailedTransferSummary,
    ) {
        let update = LogUpdateEvent {
            revision: self.log_revision.fetch_add(1, Ordering::Relaxed) + 1,
            generated_at: self.clock.now_ms(),
            transfer_id: transfer_id.to_string(),
            event,
            transfer_info,
            summary,
        };
        let targets = self.snapshot(|filter| filter.matches_log(transfer_id));
        self.deliver(targets, &ControlEvent::LogUpdate(update)).await;
    }

    /// Collects matching subscribers into an owned snapshot so eviction
    /// during delivery cannot invalidate iteration.
    fn snapshot(
        &self,
        matches: impl Fn(&SubscriptionFilter) -> bool,
    ) -> Vec<(ConnectionId, Arc<dyn ControlSender>)> {
        self.subscriptions
            .iter()
            .filter(|entry| matches(&entry.filter))
            .map(|entry| (*entry.key(), Arc::clone(&entry.sender)))
            .collect()
    }

    /// Delivers one event to each target, evicting subscriptions whose
    /// send fails.
    async fn deliver(
        &self,
        targets: Vec<(ConnectionId, Arc<dyn ControlSender>)>,
        event: &ControlEvent,
    ) {
        for (connection, sender) in targets {
            if let Err(err) = sender.send(event.clone()).await {
                warn!(
                    connection = connection.0,
                    error = %err,
                    "send failed, evicting subscription"
                );
                self.subscriptions.remove(&connection);
                metrics::counter!("skylift_subscriptions_evicted_total").increment(1);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Coalescing broadcast limiter
// ---------------------------------------------------------------------------

/// Rate limiter that coalesces queued requests into bounded emissions.
///
/// Any number of [`BroadcastLimiter::queue`] calls within one emission
/// window produce a single run of the action; the window length caps the
/// emission rate.
pub struct BroadcastLimiter {
    pending: Arc<Notify>,
    worker: JoinHandle<()>,
}

impl BroadcastLimiter {
    /// Spawns the limiter worker with a minimum interval between runs.
    pub fn spawn<F, Fut>(min_interval: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let pending = Arc::new(Notify::new());
        let trigger = Arc::clone(&pending);
        let worker = tokio::spawn(async move {
            loop {
                // One stored permit absorbs every queue() since the last
                // run, so a burst collapses to a single emission.
                trigger.notified().await;
                action().await;
                tokio::time::sleep(min_interval).await;
            }
        });
        Self { pending, worker }
    }

    /// Requests an emission. Coalesced with any other pending requests.
    pub fn queue(&self) {
        self.pending.notify_one();
    }

    /// Stops the worker task.
    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

impl Drop for BroadcastLimiter {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Map;

    use skylift_core::clock::{ManualClock, MonotonicClock};
    use skylift_core::status::OperationType;
    use skylift_core::transfer::TransferRecord;

    use super::*;
    use crate::traits::AllowAll;

    /// Sender that records every delivered event.
    #[derive(Default)]
    struct RecordingSender {
        events: Mutex<Vec<ControlEvent>>,
    }

    #[async_trait]
    impl ControlSender for RecordingSender {
        async fn send(&self, event: ControlEvent) -> anyhow::Result<()> {
            self.events.lock().push(event);
            Ok(())
        }
    }

    /// Sender whose sends always fail.
    struct FailingSender;

    #[async_trait]
    impl ControlSender for FailingSender {
        async fn send(&self, _event: ControlEvent) -> anyhow::Result<()> {
            anyhow::bail!("connection reset")
        }
    }

    /// Checker that denies everything.
    struct DenyAll;

    impl PermissionChecker for DenyAll {
        fn has_permission(&self, _connection: ConnectionId, _permission: &str) -> bool {
            false
        }
    }

    fn manager() -> SubscriptionManager {
        SubscriptionManager::new(
            Arc::new(AllowAll),
            Arc::new(MonotonicClock::new(Box::new(ManualClock::new(10_000)))),
        )
    }

    fn summary(transfer_id: &str) -> TransferSummary {
        TransferRecord::new(
            transfer_id.to_string(),
            OperationType::Transfer,
            "P".to_string(),
            "player".to_string(),
            1,
            10_000,
        )
        .short_summary(None)
    }

    fn log_parts(transfer_id: &str) -> (LogEvent, TransferSummary, DetailedTransferSummary) {
        let record = TransferRecord::new(
            transfer_id.to_string(),
            OperationType::Transfer,
            "P".to_string(),
            "player".to_string(),
            1,
            10_000,
        );
        (
            LogEvent::new(10_100, 10_000, None, "transfer_created", "created", Map::new()),
            record.short_summary(None),
            record.detailed_summary(None, 10_100),
        )
    }

    fn filter(tree: bool, transfers: bool, logs: bool, transfer_id: Option<&str>) -> SubscriptionFilter {
        SubscriptionFilter {
            tree,
            transfers,
            logs,
            transfer_id: transfer_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn empty_filter_removes_subscription() {
        let manager = manager();
        let sender = Arc::new(RecordingSender::default());

        manager
            .set_subscription(ConnectionId(1), sender.clone(), filter(true, false, false, None))
            .unwrap();
        assert_eq!(manager.len(), 1);

        manager
            .set_subscription(ConnectionId(1), sender, SubscriptionFilter::default())
            .unwrap();
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn logs_flag_requires_permission() {
        let manager = SubscriptionManager::new(
            Arc::new(DenyAll),
            Arc::new(MonotonicClock::new(Box::new(ManualClock::new(10_000)))),
        );
        let result = manager.set_subscription(
            ConnectionId(1),
            Arc::new(RecordingSender::default()),
            filter(false, false, true, None),
        );
        assert!(matches!(result, Err(ControllerError::PermissionDenied(_))));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn outcome_flags_newly_requested_streams() {
        let manager = manager();
        let sender = Arc::new(RecordingSender::default());

        let first = manager
            .set_subscription(ConnectionId(1), sender.clone(), filter(true, false, false, None))
            .unwrap();
        assert!(first.send_initial_tree);
        assert!(!first.replay_transfers);

        let second = manager
            .set_subscription(ConnectionId(1), sender, filter(true, true, false, None))
            .unwrap();
        assert!(!second.send_initial_tree);
        assert!(second.replay_transfers);
    }

    #[tokio::test]
    async fn transfer_broadcast_reaches_only_transfer_subscribers() {
        let manager = manager();
        let tree_only = Arc::new(RecordingSender::default());
        let transfers_only = Arc::new(RecordingSender::default());

        manager
            .set_subscription(ConnectionId(1), tree_only.clone(), filter(true, false, false, None))
            .unwrap();
        manager
            .set_subscription(
                ConnectionId(2),
                transfers_only.clone(),
                filter(false, true, false, None),
            )
            .unwrap();

        manager.broadcast_transfer(summary("T1")).await;

        assert!(tree_only.events.lock().is_empty());
        assert_eq!(transfers_only.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn log_broadcast_honors_transfer_id_filter() {
        let manager = manager();
        let scoped = Arc::new(RecordingSender::default());
        let unscoped = Arc::new(RecordingSender::default());

        manager
            .set_subscription(
                ConnectionId(1),
                scoped.clone(),
                filter(false, false, true, Some("T42")),
            )
            .unwrap();
        manager
            .set_subscription(ConnectionId(2), unscoped.clone(), filter(false, false, true, None))
            .unwrap();

        let (event, info, detailed) = log_parts("T42");
        manager.broadcast_log("T42", event, info, detailed).await;
        assert_eq!(scoped.events.lock().len(), 1);
        assert_eq!(unscoped.events.lock().len(), 1);

        let (event, info, detailed) = log_parts("T43");
        manager.broadcast_log("T43", event, info, detailed).await;
        assert_eq!(scoped.events.lock().len(), 1);
        assert_eq!(unscoped.events.lock().len(), 2);
    }

    #[tokio::test]
    async fn revisions_strictly_increase_per_stream() {
        let manager = manager();
        let sender = Arc::new(RecordingSender::default());
        manager
            .set_subscription(ConnectionId(1), sender.clone(), filter(false, true, true, None))
            .unwrap();

        manager.broadcast_transfer(summary("T1")).await;
        manager.broadcast_transfer(summary("T1")).await;
        let (event, info, detailed) = log_parts("T1");
        manager.broadcast_log("T1", event, info, detailed).await;

        let events = sender.events.lock();
        let mut transfer_revisions = Vec::new();
        let mut log_revisions = Vec::new();
        for event in events.iter() {
            match event {
                ControlEvent::TransferUpdate(update) => transfer_revisions.push(update.revision),
                ControlEvent::LogUpdate(update) => log_revisions.push(update.revision),
                ControlEvent::TreeUpdate(_) => {}
            }
        }
        assert_eq!(transfer_revisions, vec![1, 2]);
        assert_eq!(log_revisions, vec![1]);
    }

    #[tokio::test]
    async fn failed_send_evicts_the_subscription() {
        let manager = manager();
        let healthy = Arc::new(RecordingSender::default());

        manager
            .set_subscription(ConnectionId(1), Arc::new(FailingSender), filter(false, true, false, None))
            .unwrap();
        manager
            .set_subscription(ConnectionId(2), healthy.clone(), filter(false, true, false, None))
            .unwrap();

        manager.broadcast_transfer(summary("T1")).await;

        // The failing connection is gone; the healthy one still receives.
        assert_eq!(manager.len(), 1);
        assert_eq!(healthy.events.lock().len(), 1);

        manager.broadcast_transfer(summary("T1")).await;
        assert_eq!(healthy.events.lock().len(), 2);
    }

    #[tokio::test]
    async fn remove_connection_drops_subscription() {
        let manager = manager();
        manager
            .set_subscription(
                ConnectionId(1),
                Arc::new(RecordingSender::default()),
                filter(true, false, false, None),
            )
            .unwrap();
        manager.remove_connection(ConnectionId(1));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn wants_tree_tracks_filters() {
        let manager = manager();
        assert!(!manager.wants_tree());

        manager
            .set_subscription(
                ConnectionId(1),
                Arc::new(RecordingSender::default()),
                filter(false, true, false, None),
            )
            .unwrap();
        assert!(!manager.wants_tree());

        manager
            .set_subscription(
                ConnectionId(2),
                Arc::new(RecordingSender::default()),
                filter(true, false, false, None),
            )
            .unwrap();
        assert!(manager.wants_tree());
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_coalesces_bursts_into_two_emissions_per_second() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let limiter = BroadcastLimiter::spawn(Duration::from_millis(500), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Five queue calls within 500 ms.
        for _ in 0..3 {
            limiter.queue();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        for _ in 0..2 {
            limiter.queue();
        }
        tokio::time::sleep(Duration::from_millis(900)).await;

        let emissions = count.load(Ordering::SeqCst);
        assert!(
            (1..=2).contains(&emissions),
            "expected <= 2 emissions, got {emissions}"
        );

        limiter.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_emits_again_after_the_window() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let limiter = BroadcastLimiter::spawn(Duration::from_millis(500), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        limiter.queue();
        tokio::time::sleep(Duration::from_millis(600)).await;
        limiter.queue();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        limiter.shutdown();
    }
}
