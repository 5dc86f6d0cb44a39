//! Core data models for the dashboard
//!
//! `Raw*` types carry the strings exactly as the cluster reported them.
//! The parsed types hold canonical quantities and are what the renderer
//! consumes.

use crate::quantity::Quantity;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CPU/memory usage as reported by the metrics API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUsage {
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub memory: String,
}

impl RawUsage {
    pub fn new(cpu: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            cpu: cpu.into(),
            memory: memory.into(),
        }
    }
}

/// A node condition (only `type` and `status` matter here)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
}

/// Node description from the core API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNode {
    pub name: String,
    /// Allocatable resources keyed by resource name (`cpu`, `memory`, `pods`)
    #[serde(default)]
    pub allocatable: BTreeMap<String, String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<RawCondition>,
}

/// Node usage record from the metrics API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNodeUsage {
    pub name: String,
    pub usage: RawUsage,
}

/// Identifying pod metadata from the core API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPodInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub host_ip: Option<String>,
}

/// Container usage record nested in a pod usage record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContainerUsage {
    pub name: String,
    pub usage: RawUsage,
}

/// Pod usage record from the metrics API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPodUsage {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub containers: Vec<RawContainerUsage>,
}

/// Everything the data source knows about nodes for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub info: Vec<RawNode>,
    pub usage: Vec<RawNodeUsage>,
}

/// Everything the data source knows about pods for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodSnapshot {
    pub info: Vec<RawPodInfo>,
    pub usage: Vec<RawPodUsage>,
}

/// One container's instantaneous usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUsage {
    pub name: String,
    pub cpu: Quantity,
    pub memory: Quantity,
}

/// One pod's usage, with the host address used to locate its node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSample {
    pub name: String,
    pub namespace: String,
    pub host_ip: Option<String>,
    pub containers: Vec<ContainerUsage>,
}

impl PodSample {
    /// `namespace/name`, unique within a frame
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Resources a node makes available for scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocatable {
    pub cpu: Option<Quantity>,
    pub memory: Option<Quantity>,
    pub pods: Option<u64>,
}

/// Node description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub allocatable: Allocatable,
    pub addresses: Vec<String>,
    pub ready: bool,
}

/// One node's instantaneous usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUsage {
    pub name: String,
    pub cpu: Quantity,
    pub memory: Quantity,
}

/// The complete input to one render pass
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp: DateTime<FixedOffset>,
    pub nodes: Vec<NodeInfo>,
    pub node_usage: Vec<NodeUsage>,
    pub pods: Vec<PodSample>,
    /// Host address of every scheduled pod, with or without usage
    pub pod_hosts: Vec<String>,
}

impl Frame {
    pub fn usage_for(&self, node: &NodeInfo) -> Option<&NodeUsage> {
        self.node_usage.iter().find(|u| u.name == node.name)
    }
}

/// Size of the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: u16,
    pub columns: u16,
}

impl Geometry {
    pub fn new(rows: u16, columns: u16) -> Self {
        Self { rows, columns }
    }
}
