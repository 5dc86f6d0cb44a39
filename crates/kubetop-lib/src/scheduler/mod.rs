//! Refresh scheduler
//!
//! Drives a refresh unit at a fixed cadence. The delay after each iteration
//! is the interval minus the time the iteration took, so a slow cluster
//! does not push the dashboard further and further behind. Iterations never
//! overlap.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{oneshot, watch};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};


/// One unit of periodic work
#[async_trait]
pub trait RefreshUnit: Send {
    async fn refresh(&mut self) -> Result<()>;

    /// Release whatever the unit holds; called once when the scheduler stops
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// How the scheduler stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    Normal,
    Error,
}

/// Lifecycle of a scheduler, published on a watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped(StopKind),
}

/// Target durations for successive iterations
#[derive(Debug, Clone)]
pub struct Intervals {
    interval: Duration,
    remaining: Option<u64>,
}

impl Intervals {
    /// `count` of `None` repeats forever
    pub fn new(interval: Duration, count: Option<u64>) -> Self {
        Self {
            interval,
            remaining: count,
        }
    }
}

impl Iterator for Intervals {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        match &mut self.remaining {
            None => Some(self.interval),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(self.interval)
            }
        }
    }
}

/// Runs a `RefreshUnit` once per interval until the intervals run out,
/// the unit fails, or shutdown is signalled
pub struct RefreshScheduler<U: RefreshUnit> {
    unit: U,
    intervals: Intervals,
    state: watch::Sender<SchedulerState>,
}

impl<U: RefreshUnit> RefreshScheduler<U> {
    /// Create a new scheduler in the `Idle` state
    pub fn new(unit: U, intervals: Intervals) -> (Self, watch::Receiver<SchedulerState>) {
        let (state, state_rx) = watch::channel(SchedulerState::Idle);

        let scheduler = Self {
            unit,
            intervals,
            state,
        };

        (scheduler, state_rx)
    }

    /// Run to completion
    ///
    /// Nothing happens before `ready` fires. A dropped `ready` sender stops
    /// the scheduler normally without a single iteration. The unit is
    /// closed exactly once on every exit path.
    pub async fn run(
        mut self,
        ready: oneshot::Receiver<()>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let started = tokio::select! {
            biased;
            _ = shutdown_signal(&mut shutdown) => false,
            signal = ready => signal.is_ok(),
        };

        let outcome = if started {
            self.state.send_replace(SchedulerState::Running);
            info!(interval_secs = self.intervals.interval.as_secs(), "Starting refresh scheduler");
            self.drive(&mut shutdown).await
        } else {
            debug!("Scheduler stopped before it was started");
            Ok(())
        };

        let closed = self.unit.close();
        let kind = match (&outcome, &closed) {
            (Ok(()), Ok(())) => StopKind::Normal,
            _ => StopKind::Error,
        };
        if let Err(e) = outcome.as_ref().and(closed.as_ref()) {
            warn!(error = %e, "Refresh scheduler failed");
        }
        self.state.send_replace(SchedulerState::Stopped(kind));

        outcome.and(closed)
    }

    async fn drive(&mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<()> {
        let mut iteration = 0u64;

        while let Some(target) = self.intervals.next() {
            let start = Instant::now();

            // A refresh cut short by shutdown writes nothing
            tokio::select! {
                biased;
                result = self.unit.refresh() => result?,
                _ = shutdown_signal(shutdown) => {
                    info!(iteration, "Shutdown during refresh");
                    return Ok(());
                }
            }

            let elapsed = start.elapsed();
            let delay = target.saturating_sub(elapsed);
            iteration += 1;
            debug!(
                iteration,
                elapsed_ms = elapsed.as_millis() as u64,
                delay_ms = delay.as_millis() as u64,
                "Iteration complete"
            );

            tokio::select! {
                biased;
                _ = shutdown_signal(shutdown) => {
                    info!(iteration, "Shutting down refresh scheduler");
                    return Ok(());
                }
                _ = sleep(delay) => {}
            }
        }

        info!(iteration, "Refresh intervals exhausted");
        Ok(())
    }
}

/// Resolves on a shutdown broadcast; never resolves once all senders are gone
pub(crate) async fn shutdown_signal(shutdown: &mut broadcast::Receiver<()>) {
    match shutdown.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending().await,
    }
}
