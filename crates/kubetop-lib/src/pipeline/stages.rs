//! Dashboard stages
//!
//! Each stage owns the next one and forwards backpressure, readiness waits
//! and the close signal down the chain.

use super::{Backpressure, ClockSource, Consumer, Flow, Producer, StopReason};
use crate::aggregate::build_frame;
use crate::clock::Clock;
use crate::display::{present, Display, Readiness};
use crate::error::{Error, Result};
use crate::models::{NodeSnapshot, PodSnapshot};
use crate::render::render;
use crate::source::{fetch_all, ClusterSource};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Everything fetched for one tick
#[derive(Debug, Clone)]
pub struct Sample {
    pub when: DateTime<FixedOffset>,
    pub nodes: NodeSnapshot,
    pub pods: PodSnapshot,
}

/// Fetches nodes and pods for each tick
pub struct Retrieve<S, C> {
    source: S,
    next: C,
}

impl<S, C> Retrieve<S, C> {
    pub fn new(source: S, next: C) -> Self {
        Self { source, next }
    }
}

#[async_trait]
impl<S, C> Consumer<DateTime<FixedOffset>> for Retrieve<S, C>
where
    S: ClusterSource,
    C: Consumer<Sample>,
{
    async fn on_item(&mut self, when: DateTime<FixedOffset>) -> Result<Backpressure> {
        let (nodes, pods) = fetch_all(&self.source).await?;
        self.next.on_item(Sample { when, nodes, pods }).await
    }

    async fn wait_ready(&mut self) {
        self.next.wait_ready().await
    }

    fn on_close(&mut self, reason: &StopReason) -> Result<()> {
        self.next.on_close(reason)
    }
}

/// Turns a sample into frame text
pub struct Render<C> {
    next: C,
}

impl<C> Render<C> {
    pub fn new(next: C) -> Self {
        Self { next }
    }
}

#[async_trait]
impl<C: Consumer<String>> Consumer<Sample> for Render<C> {
    async fn on_item(&mut self, sample: Sample) -> Result<Backpressure> {
        let frame = build_frame(sample.when, &sample.nodes, &sample.pods)?;
        let text = render(&frame);
        debug!(nodes = frame.nodes.len(), pods = frame.pods.len(), "Rendered frame");
        self.next.on_item(text).await
    }

    async fn wait_ready(&mut self) {
        self.next.wait_ready().await
    }

    fn on_close(&mut self, reason: &StopReason) -> Result<()> {
        self.next.on_close(reason)
    }
}

/// Writes frames to a display and closes it when the flow ends
pub struct Output<D> {
    display: Option<D>,
}

impl<D: Display> Output<D> {
    pub fn new(display: D) -> Self {
        Self {
            display: Some(display),
        }
    }

    fn display(&mut self) -> Result<&mut D> {
        self.display
            .as_mut()
            .ok_or_else(|| Error::Output(io::Error::new(io::ErrorKind::BrokenPipe, "display is closed")))
    }
}

#[async_trait]
impl<D: Display> Consumer<String> for Output<D> {
    async fn on_item(&mut self, text: String) -> Result<Backpressure> {
        let readiness = present(self.display()?, &text)?;
        Ok(match readiness {
            Readiness::Ready => Backpressure::Ready,
            Readiness::NotReady => Backpressure::NotReady,
        })
    }

    async fn wait_ready(&mut self) {
        if let Some(display) = self.display.as_mut() {
            display.drained().await;
        }
    }

    fn on_close(&mut self, reason: &StopReason) -> Result<()> {
        let Some(mut display) = self.display.take() else {
            return Ok(());
        };
        debug!(reason = ?reason, "Closing display");
        display.close().map_err(|e| {
            warn!(error = %e, "Failed to close display");
            e
        })
    }
}

/// The whole dashboard as a flow: ticks, fetch, render, display
pub fn dashboard_flow<S, D>(
    source: S,
    display: D,
    clock: Arc<dyn Clock>,
    interval: Duration,
    ticks: Option<u64>,
) -> Flow
where
    S: ClusterSource + 'static,
    D: Display + 'static,
{
    ClockSource::new(interval, clock)
        .with_ticks(ticks)
        .flow_to(Retrieve::new(source, Render::new(Output::new(display))))
}
