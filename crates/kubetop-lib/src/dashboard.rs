//! One refresh cycle: fetch, aggregate, render, present

use crate::aggregate::build_frame;
use crate::clock::Clock;
use crate::display::{present, Display};
use crate::error::Result;
use crate::observability::StructuredLogger;
use crate::render::render;
use crate::scheduler::RefreshUnit;
use crate::source::{fetch_all, ClusterSource};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// The dashboard as a refresh unit for `RefreshScheduler`
pub struct Dashboard<S: ClusterSource, D: Display> {
    source: S,
    display: D,
    clock: Arc<dyn Clock>,
    logger: StructuredLogger,
}

impl<S: ClusterSource, D: Display> Dashboard<S, D> {
    pub fn new(source: S, display: D, clock: Arc<dyn Clock>, logger: StructuredLogger) -> Self {
        Self {
            source,
            display,
            clock,
            logger,
        }
    }
}

#[async_trait]
impl<S: ClusterSource, D: Display> RefreshUnit for Dashboard<S, D> {
    /// Both fetches run concurrently; either failing fails the cycle
    /// before anything is written
    async fn refresh(&mut self) -> Result<()> {
        let start = Instant::now();
        let timestamp = self.clock.now();

        let (nodes, pods) = fetch_all(&self.source).await?;
        let frame = build_frame(timestamp, &nodes, &pods)?;
        let text = render(&frame);
        present(&mut self.display, &text)?;

        self.logger
            .log_cycle(frame.nodes.len(), frame.pods.len(), text.len(), start.elapsed());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.display.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::Error;
    use crate::scheduler::{Intervals, RefreshScheduler, SchedulerState, StopKind};
    use crate::testing::{MemoryDisplay, ScriptedSource};
    use chrono::{FixedOffset, TimeZone};
    use std::time::Duration;
    use tokio::sync::{broadcast, oneshot};

    fn clock() -> Arc<dyn Clock> {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2017, 4, 11, 14, 41, 7)
            .unwrap();
        Arc::new(FixedClock(at))
    }

    #[tokio::test]
    async fn test_refresh_writes_one_frame() {
        let (display, log) = MemoryDisplay::new(50);
        let source = ScriptedSource::new().cycle(&["api", "worker"]);
        let mut dashboard = Dashboard::new(source, display, clock(), StructuredLogger::new("test"));

        dashboard.refresh().await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.writes.len(), 1);
        assert_eq!(log.flushes, 1);
        let frame = &log.writes[0];
        assert!(frame.starts_with("\x1b[2J\x1b[1;1Hkubetop - 14:41:07\nNode 0 "));
        assert!(frame.contains(" api "));
        assert!(frame.contains(" worker "));
    }

    #[tokio::test]
    async fn test_refresh_failure_writes_nothing() {
        let (display, log) = MemoryDisplay::new(50);
        let source = ScriptedSource::new().failing_cycle();
        let mut dashboard = Dashboard::new(source, display, clock(), StructuredLogger::new("test"));

        let err = dashboard.refresh().await.unwrap_err();

        assert!(matches!(err, Error::RetrievalFailure { what: "pods", .. }));
        assert!(log.lock().unwrap().writes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_dashboard_closes_display_once() {
        let (display, log) = MemoryDisplay::new(4);
        let source = ScriptedSource::new().cycle(&["first"]).cycle(&["second"]);
        let dashboard = Dashboard::new(source, display, clock(), StructuredLogger::new("test"));
        let (scheduler, state) =
            RefreshScheduler::new(dashboard, Intervals::new(Duration::from_secs(3), Some(2)));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        ready_tx.send(()).unwrap();
        scheduler.run(ready_rx, shutdown_rx).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.writes.len(), 2);
        assert_eq!(log.closes, 1);
        // Four rows: clock, node, header, then the pod without its container
        let rows: Vec<&str> = log.writes[0].lines().collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[3].trim_start().starts_with("first "));
        assert!(log.writes[1].contains(" second "));
        assert_eq!(*state.borrow(), SchedulerState::Stopped(StopKind::Normal));
    }
}
