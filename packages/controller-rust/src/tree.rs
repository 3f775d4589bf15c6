//! Platform-tree builder: hosts → instances → platforms.
//!
//! Fans out the per-instance platform query concurrently across every
//! reachable instance, composes the tree from the topology snapshot,
//! and overlays in-flight transfer state onto matching platforms. Query
//! failures are captured per instance as `platform_error` and never fail
//! the tree as a whole.

use futures_util::future::join_all;
use tracing::debug;

use skylift_core::messages::{HostNode, InstanceNode, PlatformNode, PlatformTree};
use skylift_core::status::TransferStatus;

use crate::topology::{ClusterTopology, InstanceEntry};
use crate::traits::InstanceBridge;

/// In-flight transfer state projected onto the tree.
#[derive(Debug, Clone)]
pub struct TransferOverlay {
    pub transfer_id: String,
    pub source_instance_id: u32,
    pub platform_index: Option<u32>,
    pub platform_name: String,
    pub status: TransferStatus,
}

/// Builds a tree snapshot at the given revision.
pub async fn build_tree(
    topology: &ClusterTopology,
    bridge: &dyn InstanceBridge,
    overlays: &[TransferOverlay],
    force_name: &str,
    revision: u64,
    generated_at: i64,
) -> PlatformTree {
    // Fan the platform query out to every queryable instance at once.
    let queryable: Vec<&InstanceEntry> = topology
        .active_instances()
        .filter(|instance| is_queryable(topology, instance))
        .collect();
    let queries = queryable.iter().map(|instance| {
        let instance_id = instance.instance_id;
        async move { (instance_id, bridge.list_platforms(instance_id, force_name).await) }
    });
    let mut results: std::collections::HashMap<u32, anyhow::Result<Vec<_>>> =
        join_all(queries).await.into_iter().collect();

    let mut instance_nodes: Vec<InstanceNode> = topology
        .active_instances()
        .map(|instance| {
            let mut node = InstanceNode {
                instance_id: instance.instance_id,
                name: instance.name.clone(),
                host_id: instance.assigned_host,
                status: instance.status.clone(),
                connected: instance.connected,
                platforms: Vec::new(),
                platform_error: None,
            };
            match results.remove(&instance.instance_id) {
                Some(Ok(platforms)) => {
                    node.platforms = platforms
                        .into_iter()
                        .map(|info| overlay_platform(instance.instance_id, info, overlays))
                        .collect();
                    node.platforms.sort_by(|a, b| a.name.cmp(&b.name));
                }
                Some(Err(err)) => {
                    debug!(
                        instance_id = instance.instance_id,
                        error = %err,
                        "platform query failed"
                    );
                    node.platform_error = Some(err.to_string());
                }
                // Not queried: disconnected, or its host is unreachable.
                None => {}
            }
            node
        })
        .collect();
    instance_nodes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hosts: Vec<HostNode> = topology
        .active_hosts()
        .map(|host| HostNode {
            host_id: host.host_id,
            name: host.name.clone(),
            connected: host.connected,
            instances: Vec::new(),
        })
        .collect();
    hosts.sort_by(|a, b| a.name.cmp(&b.name));

    let mut unassigned_instances = Vec::new();
    for node in instance_nodes {
        let attached = node
            .host_id
            .and_then(|host_id| hosts.iter_mut().find(|host| host.host_id == host_id));
        match attached {
            Some(host) => host.instances.push(node),
            None => unassigned_instances.push(node),
        }
    }

    PlatformTree {
        revision,
        generated_at,
        force_name: force_name.to_string(),
        hosts,
        unassigned_instances,
    }
}

/// Whether the instance should receive a platform query: it must be
/// connected and attached to a connected host.
fn is_queryable(topology: &ClusterTopology, instance: &InstanceEntry) -> bool {
    instance.connected
        && instance
            .assigned_host
            .and_then(|host_id| topology.host(host_id))
            .is_some_and(|host| host.connected)
}

/// Tags a platform with its in-flight transfer, if one matches.
fn overlay_platform(
    instance_id: u32,
    info: skylift_core::messages::PlatformInfo,
    overlays: &[TransferOverlay],
) -> PlatformNode {
    let matched = overlays.iter().find(|overlay| {
        overlay.source_instance_id == instance_id
            && (overlay.platform_index == Some(info.platform_index)
                || overlay.platform_name == info.name)
    });
    match matched {
        Some(overlay) => PlatformNode {
            platform_index: info.platform_index,
            name: info.name,
            transfer_id: Some(overlay.transfer_id.clone()),
            transfer_status: overlay.status.as_str().to_string(),
        },
        None => PlatformNode::idle(info),
    }
}
