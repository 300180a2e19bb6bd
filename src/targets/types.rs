//! Capture target data model, as exchanged with the capture services in JSON.

use serde::{Deserialize, Serialize};

/// Target type of Kubernetes pods; the only type guaranteed to be unique by
/// name across a whole cluster.
pub const POD_TYPE: &str = "pod";
/// Process-less network stacks bind-mounted into the file system.
pub const BINDMOUNT_TYPE: &str = "bindmount";
/// Processes with their own network stack, but not part of any container.
pub const PROC_TYPE: &str = "proc";

/// A capturable entity: a pod, a container, a process or a process-less
/// network stack.
///
/// Within a single node a target is identified by its `prefix` and `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Container name, `namespace/podname`, process description, or the file
    /// name of a network namespace.
    pub name: String,
    /// Type of target: "pod", a container engine name such as "docker",
    /// "proc", "bindmount", ...
    #[serde(rename = "type")]
    pub target_type: String,
    /// Inode number of the network namespace.
    #[serde(default)]
    pub netns: u64,
    #[serde(rename = "network-interfaces", default)]
    pub network_interfaces: Vec<String>,
    /// Optional node-local name prefix, such as for Docker-in-Docker setups.
    #[serde(default)]
    pub prefix: String,
    /// Start time of the target's "root" process in clock ticks after boot;
    /// together with `pid` this detects stale network namespace identifiers.
    #[serde(rename = "starttime", default, skip_serializing_if = "is_zero_i64")]
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub pid: u32,
    #[serde(rename = "node-name", default, skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Cluster>,
    /// Name of the capture service instance responsible for this target.
    #[serde(
        rename = "capture-service",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub capture_service: String,
    #[serde(rename = "captureport", default, skip_serializing_if = "is_zero_u16")]
    pub capture_port: u16,
}

impl Target {
    /// A pod target, with the pod name in `namespace/name` form.
    pub fn pod(name: &str) -> Self {
        Self {
            name: name.to_string(),
            target_type: POD_TYPE.to_string(),
            ..Default::default()
        }
    }

    pub fn is_pod(&self) -> bool {
        self.target_type == POD_TYPE
    }

    /// True if the target already tells which capture service to contact.
    pub fn has_routing(&self) -> bool {
        !self.capture_service.is_empty()
    }
}

/// Cluster identity of a target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Client-local kubeconfig context name; not unique across clients.
    #[serde(default)]
    pub context: String,
    /// UID of the cluster's "kube-system" namespace.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

/// Response of a standalone host's "mobyshark" discovery endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct HostTargetList {
    #[serde(rename = "containers", default)]
    pub targets: Vec<Target>,
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_u16(v: &u16) -> bool {
    *v == 0
}
