//! Aggregation of raw usage records into a render-ready frame
//!
//! Container usage is summed per pod, pods are matched to nodes by host
//! address, and node usage is expressed against allocatable capacity.

use crate::error::{Error, Result};
use crate::models::{
    Allocatable, ContainerUsage, Frame, NodeInfo, NodeSnapshot, NodeUsage, PodSample,
    PodSnapshot, RawCondition, RawNode, RawUsage,
};
use crate::quantity::{parse_quantity, Quantity, ResourceKind};
use chrono::{DateTime, FixedOffset};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Sum every container's CPU and memory
pub fn aggregate_pod(pod: &PodSample) -> (Quantity, Quantity) {
    pod.containers.iter().fold(
        (
            Quantity::zero(ResourceKind::Cpu),
            Quantity::zero(ResourceKind::Memory),
        ),
        |(cpu, memory), container| (cpu + container.cpu, memory + container.memory),
    )
}

/// `used / allocatable * 100`, or `None` when nothing is allocatable
pub fn node_percent(used: Quantity, allocatable: Quantity) -> Option<f64> {
    if allocatable.is_zero() {
        return None;
    }
    Some(used.amount() as f64 / allocatable.amount() as f64 * 100.0)
}

/// Find the node whose address list contains the pod's host address
pub fn node_for_pod<'a>(pod: &PodSample, nodes: &'a [NodeInfo]) -> Result<&'a NodeInfo> {
    pod.host_ip
        .as_deref()
        .and_then(|ip| nodes.iter().find(|node| node.addresses.iter().any(|a| a == ip)))
        .ok_or_else(|| Error::UnknownAllocation { pod: pod.key() })
}

/// A node is ready only if its `Ready` condition has status `True`
pub fn is_ready(conditions: &[RawCondition]) -> bool {
    conditions
        .iter()
        .find(|c| c.type_ == "Ready")
        .is_some_and(|c| c.status.eq_ignore_ascii_case("true"))
}

/// Number of scheduled pods bound to each node, in node order
///
/// Counts pod descriptions rather than usage records, so pods that have
/// no metrics yet still take up a slot.
pub fn pods_per_node(frame: &Frame) -> Vec<usize> {
    let mut counts = vec![0; frame.nodes.len()];
    for host in &frame.pod_hosts {
        if let Some(index) = frame
            .nodes
            .iter()
            .position(|node| node.addresses.iter().any(|a| a == host))
        {
            counts[index] += 1;
        }
    }
    counts
}

fn parse_usage(usage: &RawUsage) -> Result<(Quantity, Quantity)> {
    Ok((
        parse_quantity(&usage.cpu, ResourceKind::Cpu)?,
        parse_quantity(&usage.memory, ResourceKind::Memory)?,
    ))
}

fn parse_node(raw: &RawNode) -> Result<NodeInfo> {
    let cpu = raw
        .allocatable
        .get("cpu")
        .map(|q| parse_quantity(q, ResourceKind::Cpu))
        .transpose()?;
    let memory = raw
        .allocatable
        .get("memory")
        .map(|q| parse_quantity(q, ResourceKind::Memory))
        .transpose()?;
    let pods = raw
        .allocatable
        .get("pods")
        .map(|q| {
            q.trim().parse::<u64>().map_err(|_| Error::MalformedQuantity {
                raw: q.to_string(),
            })
        })
        .transpose()?;

    Ok(NodeInfo {
        name: raw.name.clone(),
        allocatable: Allocatable { cpu, memory, pods },
        addresses: raw.addresses.clone(),
        ready: is_ready(&raw.conditions),
    })
}

/// Parse and join one cycle's snapshots into a frame
///
/// Records keep their fetch order. A repeated key keeps its first
/// occurrence. Pod usage is joined with pod info on namespace and name to
/// pick up the host address.
pub fn build_frame(
    timestamp: DateTime<FixedOffset>,
    nodes: &NodeSnapshot,
    pods: &PodSnapshot,
) -> Result<Frame> {
    let mut seen = HashSet::new();
    let mut node_infos = Vec::with_capacity(nodes.info.len());
    for raw in &nodes.info {
        if !seen.insert(raw.name.as_str()) {
            debug!(node = %raw.name, "Dropping duplicate node record");
            continue;
        }
        node_infos.push(parse_node(raw)?);
    }

    let mut seen = HashSet::new();
    let mut node_usage = Vec::with_capacity(nodes.usage.len());
    for raw in &nodes.usage {
        if !seen.insert(raw.name.as_str()) {
            debug!(node = %raw.name, "Dropping duplicate node usage record");
            continue;
        }
        let (cpu, memory) = parse_usage(&raw.usage)?;
        node_usage.push(NodeUsage {
            name: raw.name.clone(),
            cpu,
            memory,
        });
    }

    let mut host_ips: HashMap<(&str, &str), Option<&str>> = HashMap::new();
    let mut pod_hosts = Vec::with_capacity(pods.info.len());
    for raw in &pods.info {
        let key = (raw.namespace.as_str(), raw.name.as_str());
        if host_ips.contains_key(&key) {
            debug!(namespace = %raw.namespace, pod = %raw.name, "Dropping duplicate pod record");
            continue;
        }
        host_ips.insert(key, raw.host_ip.as_deref());
        pod_hosts.extend(raw.host_ip.clone());
    }

    let mut seen = HashSet::new();
    let mut samples = Vec::with_capacity(pods.usage.len());
    for raw in &pods.usage {
        let key = (raw.namespace.as_str(), raw.name.as_str());
        if !seen.insert(key) {
            debug!(namespace = %raw.namespace, pod = %raw.name, "Dropping duplicate pod usage record");
            continue;
        }
        let containers = raw
            .containers
            .iter()
            .map(|c| {
                let (cpu, memory) = parse_usage(&c.usage)?;
                Ok(ContainerUsage {
                    name: c.name.clone(),
                    cpu,
                    memory,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        samples.push(PodSample {
            name: raw.name.clone(),
            namespace: raw.namespace.clone(),
            host_ip: host_ips.get(&key).copied().flatten().map(str::to_string),
            containers,
        });
    }

    Ok(Frame {
        timestamp,
        nodes: node_infos,
        node_usage,
        pods: samples,
        pod_hosts,
    })
}
