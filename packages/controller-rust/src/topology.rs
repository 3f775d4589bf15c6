//! Cluster topology view: hosts and instances known to the controller.
//!
//! Reads are lock-free via `ArcSwap` snapshots; mutations come from
//! connection lifecycle callbacks and host/instance registration events
//! and are serialized by a writer lock. Deleted entries stay in the view
//! flagged as deleted so late events about them remain attributable,
//! but every enumeration skips them.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use skylift_core::messages::InstanceSelector;

/// One worker node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub host_id: u32,
    pub name: String,
    pub connected: bool,
    pub deleted: bool,
}

/// One managed game instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceEntry {
    pub instance_id: u32,
    pub name: String,
    /// Host this instance is assigned to, when known.
    pub assigned_host: Option<u32>,
    /// Lifecycle status string (`"running"`, `"stopped"`, ...).
    pub status: String,
    pub connected: bool,
    pub deleted: bool,
}

/// Immutable snapshot of the cluster membership.
#[derive(Debug, Clone, Default)]
pub struct ClusterTopology {
    pub hosts: Vec<HostEntry>,
    pub instances: Vec<InstanceEntry>,
}

impl ClusterTopology {
    /// Non-deleted hosts.
    pub fn active_hosts(&self) -> impl Iterator<Item = &HostEntry> {
        self.hosts.iter().filter(|host| !host.deleted)
    }

    /// Non-deleted instances.
    pub fn active_instances(&self) -> impl Iterator<Item = &InstanceEntry> {
        self.instances.iter().filter(|instance| !instance.deleted)
    }

    /// Looks up a non-deleted instance by ID.
    #[must_use]
    pub fn instance(&self, instance_id: u32) -> Option<&InstanceEntry> {
        self.active_instances()
            .find(|instance| instance.instance_id == instance_id)
    }

    /// Looks up a non-deleted host by ID.
    #[must_use]
    pub fn host(&self, host_id: u32) -> Option<&HostEntry> {
        self.active_hosts().find(|host| host.host_id == host_id)
    }

    /// Resolves an instance reference.
    ///
    /// A numeric selector matches an instance ID first; when no instance
    /// has that ID it falls back to treating it as an assigned-host ID
    /// and resolves to that host's first connected instance. A string
    /// selector matches by instance name.
    #[must_use]
    pub fn resolve(&self, selector: &InstanceSelector) -> Option<&InstanceEntry> {
        match selector {
            InstanceSelector::Id(id) => self.instance(*id).or_else(|| {
                self.active_instances()
                    .find(|instance| instance.assigned_host == Some(*id) && instance.connected)
            }),
            InstanceSelector::Name(name) => self
                .active_instances()
                .find(|instance| instance.name == *name),
        }
    }
}

/// Shared topology handle: lock-free snapshot reads, serialized writes.
pub struct TopologyView {
    view: ArcSwap<ClusterTopology>,
    write_lock: Mutex<()>,
}

impl TopologyView {
    /// Creates an empty topology.
    #[must_use]
    pub fn new() -> Self {
        Self {
            view: ArcSwap::from_pointee(ClusterTopology::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ClusterTopology> {
        self.view.load_full()
    }

    /// Inserts or updates a host.
    pub fn upsert_host(&self, host_id: u32, name: impl Into<String>, connected: bool) {
        let name = name.into();
        self.mutate(|topology| {
            match topology.hosts.iter_mut().find(|host| host.host_id == host_id) {
                Some(host) => {
                    host.name = name;
                    host.connected = connected;
                    host.deleted = false;
                }
                None => topology.hosts.push(HostEntry {
                    host_id,
                    name,
                    connected,
                    deleted: false,
                }),
            }
        });
    }

    /// Inserts or updates an instance.
    pub fn upsert_instance(
        &self,
        instance_id: u32,
        name: impl Into<String>,
        assigned_host: Option<u32>,
        status: impl Into<String>,
        connected: bool,
    ) {
        let name = name.into();
        let status = status.into();
        self.mutate(|topology| {
            match topology
                .instances
                .iter_mut()
                .find(|instance| instance.instance_id == instance_id)
            {
                Some(instance) => {
                    instance.name = name;
                    instance.assigned_host = assigned_host;
                    instance.status = status;
                    instance.connected = connected;
                    instance.deleted = false;
                }
                None => topology.instances.push(InstanceEntry {
                    instance_id,
                    name,
                    assigned_host,
                    status,
                    connected,
                    deleted: false,
                }),
            }
        });
    }

    /// Connection lifecycle callback for an instance.
    pub fn set_instance_connected(&self, instance_id: u32, connected: bool) {
        self.mutate(|topology| {
            if let Some(instance) = topology
                .instances
                .iter_mut()
                .find(|instance| instance.instance_id == instance_id)
            {
                instance.connected = connected;
            }
        });
    }

    /// Connection lifecycle callback for a host.
    pub fn set_host_connected(&self, host_id: u32, connected: bool) {
        self.mutate(|topology| {
            if let Some(host) = topology.hosts.iter_mut().find(|host| host.host_id == host_id) {
                host.connected = connected;
            }
        });
    }

    /// Flags an instance as deleted. It disappears from enumerations.
    pub fn mark_instance_deleted(&self, instance_id: u32) {
        self.mutate(|topology| {
            if let Some(instance) = topology
                .instances
                .iter_mut()
                .find(|instance| instance.instance_id == instance_id)
            {
                instance.deleted = true;
                instance.connected = false;
            }
        });
    }

    /// Flags a host as deleted. Its instances become unassigned at tree
    /// level; they keep their `assigned_host` for late attribution.
    pub fn mark_host_deleted(&self, host_id: u32) {
        self.mutate(|topology| {
            if let Some(host) = topology.hosts.iter_mut().find(|host| host.host_id == host_id) {
                host.deleted = true;
                host.connected = false;
            }
        });
    }

    fn mutate(&self, apply: impl FnOnce(&mut ClusterTopology)) {
        let _guard = self.write_lock.lock();
        let mut next = (**self.view.load()).clone();
        apply(&mut next);
        self.view.store(Arc::new(next));
    }
}

impl Default for TopologyView {
    fn default() -> Self {
        Self::new()
    }
}
