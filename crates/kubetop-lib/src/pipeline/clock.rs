//! Tick producer

use super::{running, stopped, Backpressure, Consumer, Flow, FlowControl, Producer, StopReason};
use crate::clock::Clock;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Emits the current time once per interval, the first tick immediately
pub struct ClockSource {
    interval: Duration,
    clock: Arc<dyn Clock>,
    ticks: Option<u64>,
}

impl ClockSource {
    pub fn new(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            interval,
            clock,
            ticks: None,
        }
    }

    /// Stop with `StopReason::Exhausted` after `ticks` items; `None` runs forever
    pub fn with_ticks(mut self, ticks: Option<u64>) -> Self {
        self.ticks = ticks;
        self
    }

    async fn drive<C>(self, mut consumer: C, mut control: watch::Receiver<FlowControl>) -> StopReason
    where
        C: Consumer<DateTime<FixedOffset>>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut emitted = 0u64;

        info!(
            interval_secs = self.interval.as_secs(),
            ticks = ?self.ticks,
            "Starting flow"
        );

        let reason = loop {
            if running(&mut control).await == FlowControl::Stopped {
                break StopReason::Stopped;
            }
            if self.ticks.is_some_and(|limit| emitted >= limit) {
                break StopReason::Exhausted;
            }

            let ticked = tokio::select! {
                biased;
                _ = stopped(&mut control) => false,
                _ = ticker.tick() => true,
            };
            if !ticked {
                break StopReason::Stopped;
            }
            // Paused while waiting for the tick
            if *control.borrow() != FlowControl::Running {
                continue;
            }

            emitted += 1;
            let timestamp = self.clock.now();
            debug!(tick = emitted, "Emitting tick");

            // An item that already failed wins over a stop
            let outcome = tokio::select! {
                biased;
                result = consumer.on_item(timestamp) => Some(result),
                _ = stopped(&mut control) => None,
            };

            match outcome {
                None => break StopReason::Stopped,
                Some(Err(e)) => break StopReason::Failed(e),
                Some(Ok(Backpressure::Ready)) => {}
                Some(Ok(Backpressure::NotReady)) => {
                    debug!(tick = emitted, "Consumer not ready, holding ticks");
                    let drained = tokio::select! {
                        biased;
                        _ = consumer.wait_ready() => true,
                        _ = stopped(&mut control) => false,
                    };
                    if !drained {
                        break StopReason::Stopped;
                    }
                }
            }
        };

        info!(reason = ?reason, items = emitted, "Flow ended");
        let closed = consumer.on_close(&reason);
        reason.after_close(closed)
    }
}

impl Producer<DateTime<FixedOffset>> for ClockSource {
    fn flow_to<C>(self, consumer: C) -> Flow
    where
        C: Consumer<DateTime<FixedOffset>> + 'static,
    {
        Flow::spawn(move |control| self.drive(consumer, control))
    }
}
