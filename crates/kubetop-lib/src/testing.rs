//! In-memory sources and displays for unit tests

use crate::display::{Display, Readiness};
use crate::error::{Error, Result};
use crate::models::{
    Geometry, NodeSnapshot, PodSnapshot, RawCondition, RawContainerUsage, RawNode, RawPodInfo,
    RawPodUsage, RawUsage,
};
use crate::render::clip_lines;
use crate::source::ClusterSource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub(crate) const NODE_IP: &str = "10.0.0.1";

/// A ready node with 1 CPU, 1Gi and 110 pod slots
pub(crate) fn node_snapshot() -> NodeSnapshot {
    NodeSnapshot {
        info: vec![RawNode {
            name: "node-a".to_string(),
            allocatable: [("cpu", "1"), ("memory", "1Gi"), ("pods", "110")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            addresses: vec![NODE_IP.to_string()],
            conditions: vec![RawCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
            }],
        }],
        usage: vec![],
    }
}

/// One single-container pod per name, all on the test node
pub(crate) fn pod_snapshot(names: &[&str]) -> PodSnapshot {
    PodSnapshot {
        info: names
            .iter()
            .map(|name| RawPodInfo {
                name: name.to_string(),
                namespace: "default".to_string(),
                host_ip: Some(NODE_IP.to_string()),
            })
            .collect(),
        usage: names
            .iter()
            .map(|name| RawPodUsage {
                name: name.to_string(),
                namespace: "default".to_string(),
                containers: vec![RawContainerUsage {
                    name: "main".to_string(),
                    usage: RawUsage::new("100m", "64Mi"),
                }],
            })
            .collect(),
    }
}

/// Source that replays scripted pod lists, one per cycle
///
/// Once the script runs out every cycle sees an empty pod list.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    pods: Mutex<VecDeque<Result<PodSnapshot>>>,
    delay: Duration,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cycle(self, pods: &[&str]) -> Self {
        self.push(Ok(pod_snapshot(pods)))
    }

    pub(crate) fn failing_cycle(self) -> Self {
        self.push(Err(Error::retrieval(
            "pods",
            anyhow::anyhow!("the server is currently unable to handle the request"),
        )))
    }

    /// Every pod fetch takes `delay`
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn push(self, cycle: Result<PodSnapshot>) -> Self {
        self.pods.lock().unwrap().push_back(cycle);
        self
    }
}

#[async_trait]
impl ClusterSource for ScriptedSource {
    async fn nodes(&self) -> Result<NodeSnapshot> {
        Ok(node_snapshot())
    }

    async fn pods(&self) -> Result<PodSnapshot> {
        tokio::time::sleep(self.delay).await;
        let next = self.pods.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(PodSnapshot::default()))
    }
}

#[derive(Debug, Default)]
pub(crate) struct DisplayLog {
    pub(crate) writes: Vec<String>,
    pub(crate) flushes: usize,
    pub(crate) closes: usize,
}

/// Display that records what reaches it
pub(crate) struct MemoryDisplay {
    log: Arc<Mutex<DisplayLog>>,
    rows: u16,
    readiness: Readiness,
    drained: Arc<Notify>,
    closed: bool,
    close_fails: bool,
}

impl MemoryDisplay {
    pub(crate) fn new(rows: u16) -> (Self, Arc<Mutex<DisplayLog>>) {
        let log = Arc::new(Mutex::new(DisplayLog::default()));
        let display = Self {
            log: log.clone(),
            rows,
            readiness: Readiness::Ready,
            drained: Arc::new(Notify::new()),
            closed: false,
            close_fails: false,
        };
        (display, log)
    }

    /// Report `NotReady` after every write until notified
    pub(crate) fn slow(mut self) -> (Self, Arc<Notify>) {
        self.readiness = Readiness::NotReady;
        let drained = self.drained.clone();
        (self, drained)
    }

    /// Fail the final flush on close, like a stdout whose reader went away
    pub(crate) fn failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }
}

#[async_trait]
impl Display for MemoryDisplay {
    fn write(&mut self, text: &str) -> Result<Readiness> {
        if self.closed {
            return Err(Error::Output(io::Error::new(io::ErrorKind::BrokenPipe, "closed")));
        }
        let clipped = clip_lines(text, self.rows as usize);
        self.log.lock().unwrap().writes.push(clipped.to_string());
        Ok(self.readiness)
    }

    fn flush(&mut self) -> Result<()> {
        self.log.lock().unwrap().flushes += 1;
        Ok(())
    }

    fn geometry(&self) -> Result<Geometry> {
        Ok(Geometry::new(self.rows, 80))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.log.lock().unwrap().closes += 1;
        if self.close_fails {
            return Err(Error::Output(io::Error::new(io::ErrorKind::BrokenPipe, "flush on close")));
        }
        Ok(())
    }

    async fn drained(&mut self) {
        self.drained.notified().await;
    }
}
