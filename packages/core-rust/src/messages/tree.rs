//! Platform-tree payloads: the host → instance → platform snapshot
//! served to control clients and the per-instance platform query.

use serde::{Deserialize, Serialize};

/// Control → controller: build and return the current platform tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPlatformTreeRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub force_name: Option<String>,
}

/// Controller → instance: list the platforms of a force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceListPlatformsRequest {
    pub force_name: String,
}

/// One platform as reported by an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    /// 1-based platform slot on the instance.
    pub platform_index: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub force_name: Option<String>,
}

/// One platform in the tree, tagged with its transfer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformNode {
    pub platform_index: u32,
    pub name: String,
    /// In-flight transfer touching this platform, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transfer_id: Option<String>,
    /// Normalized transfer status, or `"idle"`.
    pub transfer_status: String,
}

impl PlatformNode {
    /// A platform with no transfer activity.
    #[must_use]
    pub fn idle(info: PlatformInfo) -> Self {
        Self {
            platform_index: info.platform_index,
            name: info.name,
            transfer_id: None,
            transfer_status: "idle".to_string(),
        }
    }
}

/// One instance in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceNode {
    pub instance_id: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub host_id: Option<u32>,
    /// Instance lifecycle status string (opaque to the tree).
    pub status: String,
    pub connected: bool,
    pub platforms: Vec<PlatformNode>,
    /// Set when the platform query failed for this instance; `platforms`
    /// is empty in that case.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub platform_error: Option<String>,
}

/// One host in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostNode {
    pub host_id: u32,
    pub name: String,
    pub connected: bool,
    pub instances: Vec<InstanceNode>,
}

/// Full cluster snapshot: hosts, their instances, and their platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTree {
    /// Tree revision at generation time.
    pub revision: u64,
    /// Epoch milliseconds when the tree was generated.
    pub generated_at: i64,
    pub force_name: String,
    pub hosts: Vec<HostNode>,
    /// Instances whose host is unknown or unset.
    pub unassigned_instances: Vec<InstanceNode>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn idle_platform_node() {
        let node = PlatformNode::idle(PlatformInfo {
            platform_index: 1,
            name: "Aquilo Base".to_string(),
            force_name: Some("player".to_string()),
        });
        assert_eq!(node.transfer_status, "idle");
        assert!(node.transfer_id.is_none());
    }

    #[test]
    fn tree_serializes_camel_case() {
        let tree = PlatformTree {
            revision: 7,
            generated_at: 1_700_000_000_000,
            force_name: "player".to_string(),
            hosts: vec![HostNode {
                host_id: 1,
                name: "rack-a".to_string(),
                connected: true,
                instances: vec![InstanceNode {
                    instance_id: 10,
                    name: "nauvis-main".to_string(),
                    host_id: Some(1),
                    status: "running".to_string(),
                    connected: true,
                    platforms: vec![],
                    platform_error: Some("query timed out".to_string()),
                }],
            }],
            unassigned_instances: vec![],
        };
        let wire = serde_json::to_value(&tree).unwrap();
        assert_eq!(wire["generatedAt"], json!(1_700_000_000_000_i64));
        assert_eq!(wire["forceName"], json!("player"));
        assert_eq!(wire["hosts"][0]["hostId"], json!(1));
        assert_eq!(
            wire["hosts"][0]["instances"][0]["platformError"],
            json!("query timed out")
        );
        assert_eq!(wire["unassignedInstances"], json!([]));
    }

    #[test]
    fn platform_info_round_trips() {
        let info = PlatformInfo {
            platform_index: 3,
            name: "Vulcanus Forward".to_string(),
            force_name: None,
        };
        let text = serde_json::to_string(&info).unwrap();
        let decoded: PlatformInfo = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, info);
    }
}
