//! Text rendering of a frame
//!
//! A rendered frame is, in order: a screen clear, the clock line, one line
//! per node, the pod table header and the pod/container rows. Clipping to
//! the terminal height keeps the first lines, so the summary always wins
//! over pod rows.

mod layout;

pub use layout::{
    clip_lines, render_header, render_limited_width, render_row, Column, COLUMNS,
    MIN_RENDER_WIDTH,
};

use crate::aggregate::{aggregate_pod, node_for_pod, node_percent, pods_per_node};
use crate::models::{ContainerUsage, Frame, NodeInfo, NodeUsage, PodSample};
use crate::quantity::{format_memory, MemoryFormat, Quantity};
use std::cmp::Reverse;

/// Rendered in place of a value that cannot be computed
pub const UNKNOWN: &str = "?";

/// Memory column format in the pod table
pub const POD_MEMORY: MemoryFormat = MemoryFormat::new(8, 2);

/// Memory format in node summary lines
pub const NODE_MEMORY: MemoryFormat = MemoryFormat::new(4, 0);

const CLEAR: &str = "\x1b[2J\x1b[1;1H";

/// Render a complete frame
pub fn render(frame: &Frame) -> String {
    let mut text = String::from(CLEAR);
    text.push_str(&render_clock_line(frame));
    text.push_str(&render_nodes(frame));
    text.push_str(&render_header(&COLUMNS));
    text.push_str(&render_pods(frame));
    text
}

fn render_clock_line(frame: &Frame) -> String {
    format!("kubetop - {}\n", frame.timestamp.format("%H:%M:%S"))
}

fn format_percent(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Percent of one core, the way `top` reports CPU
fn format_cpu(cpu: Quantity) -> String {
    format!("{:.1}", cpu.amount() as f64 / 10.0)
}

/// Summary lines, one per node in fetch order
pub fn render_nodes(frame: &Frame) -> String {
    let counts = pods_per_node(frame);
    frame
        .nodes
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(index, (node, count))| render_node(index, node, frame.usage_for(node), count))
        .collect()
}

fn render_node(index: usize, node: &NodeInfo, usage: Option<&NodeUsage>, pod_count: usize) -> String {
    let allocatable = &node.allocatable;

    let cpu = usage
        .zip(allocatable.cpu)
        .and_then(|(u, alloc)| node_percent(u.cpu, alloc));
    let memory = usage
        .zip(allocatable.memory)
        .and_then(|(u, alloc)| node_percent(u.memory, alloc));
    let pods = allocatable
        .pods
        .filter(|&alloc| alloc > 0)
        .map(|alloc| pod_count as f64 / alloc as f64 * 100.0);

    let memory_used = usage
        .map(|u| format_memory(u.memory, NODE_MEMORY))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let memory_allocatable = allocatable
        .memory
        .map(|m| format_memory(m, NODE_MEMORY))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let pods_allocatable = allocatable
        .pods
        .map(|p| p.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    format!(
        "Node {index} CPU% {:>6} MEM% {:>5} ({memory_used}/{memory_allocatable})  POD% {:>5} ({pod_count:>3}/{pods_allocatable:>3}) {}\n",
        format_percent(cpu, 2),
        format_percent(memory, 2),
        format_percent(pods, 2),
        if node.ready { "Ready" } else { "NotReady" },
    )
}

/// Pod rows, highest usage first, each followed by its containers
pub fn render_pods(frame: &Frame) -> String {
    let mut ranked: Vec<(&PodSample, (Quantity, Quantity))> =
        frame.pods.iter().map(|pod| (pod, aggregate_pod(pod))).collect();
    // Stable, so equal usage keeps fetch order
    ranked.sort_by_key(|(_, stats)| Reverse(*stats));

    let mut text = String::new();
    for (pod, stats) in ranked {
        let node_memory = node_for_pod(pod, &frame.nodes)
            .ok()
            .and_then(|node| node.allocatable.memory);
        text.push_str(&render_pod(pod, stats, node_memory));
        text.push_str(&render_containers(&pod.containers));
    }
    text
}

/// One pod row; `%MEM` is relative to the allocatable memory of the pod's node
pub fn render_pod(pod: &PodSample, stats: (Quantity, Quantity), node_memory: Option<Quantity>) -> String {
    let (cpu, memory) = stats;
    let name = render_limited_width(&pod.name, COLUMNS[0].width)
        .unwrap_or_else(|_| pod.name.clone());
    let memory_percent = node_memory.and_then(|alloc| node_percent(memory, alloc));

    render_row(
        &COLUMNS,
        &[
            name,
            String::new(),
            format_cpu(cpu),
            format_memory(memory, POD_MEMORY),
            format_percent(memory_percent, 2),
        ],
    )
}

/// Container rows, highest CPU first
pub fn render_containers(containers: &[ContainerUsage]) -> String {
    let mut sorted: Vec<&ContainerUsage> = containers.iter().collect();
    sorted.sort_by_key(|c| Reverse(c.cpu));
    sorted.into_iter().map(render_container).collect()
}

fn render_container(container: &ContainerUsage) -> String {
    let inner = COLUMNS[1].width.saturating_sub(2);
    let name = render_limited_width(&container.name, inner)
        .unwrap_or_else(|_| container.name.clone());

    render_row(
        &COLUMNS,
        &[
            String::new(),
            format!("({name})"),
            format_cpu(container.cpu),
            format_memory(container.memory, POD_MEMORY),
            String::new(),
        ],
    )
}
