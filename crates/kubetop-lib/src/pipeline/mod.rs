//! Flow pipeline
//!
//! An alternative driver to the refresh scheduler, built from explicit
//! producer and consumer stages:
//!
//! ```text
//! ClockSource -> Retrieve -> Render -> Output
//! ```
//!
//! Each item is carried end to end before the next tick is drawn, so at
//! most one item is ever in flight. A consumer that reports
//! `Backpressure::NotReady` holds the clock until it is ready again.

mod clock;
mod stages;

pub use clock::ClockSource;
pub use stages::{dashboard_flow, Output, Render, Retrieve, Sample};

use crate::error::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Whether a consumer can take the next item right away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    Ready,
    NotReady,
}

/// Why a flow ended
#[derive(Debug)]
pub enum StopReason {
    /// `stop()` was called
    Stopped,
    /// The producer ran out of items
    Exhausted,
    /// An item failed somewhere downstream
    Failed(Error),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed(_))
    }

    pub fn into_result(self) -> crate::Result<()> {
        match self {
            StopReason::Failed(e) => Err(e),
            StopReason::Stopped | StopReason::Exhausted => Ok(()),
        }
    }

    /// Fold the consumer's close outcome into the reason
    ///
    /// A failed close turns a clean stop into `Failed`. An earlier failure
    /// wins over the close error.
    pub fn after_close(self, closed: crate::Result<()>) -> StopReason {
        match (self, closed) {
            (reason, Ok(())) => reason,
            (StopReason::Failed(e), Err(close_error)) => {
                warn!(error = %close_error, "Close failed after flow failure");
                StopReason::Failed(e)
            }
            (_, Err(e)) => StopReason::Failed(e),
        }
    }
}

/// Receiving end of a flow
#[async_trait]
pub trait Consumer<T: Send + 'static>: Send {
    /// Handle one item; only one call is outstanding at a time
    async fn on_item(&mut self, item: T) -> crate::Result<Backpressure>;

    /// Resolves once a consumer that answered `NotReady` can take more
    async fn wait_ready(&mut self) {}

    /// Called exactly once when the flow ends
    fn on_close(&mut self, reason: &StopReason) -> crate::Result<()>;
}

/// Sending end of a flow
pub trait Producer<T: Send + 'static> {
    /// Connect to `consumer` and start producing
    ///
    /// Must be called from within a tokio runtime.
    fn flow_to<C: Consumer<T> + 'static>(self, consumer: C) -> Flow;
}

/// Requested state of a running flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    Running,
    Paused,
    Stopped,
}

/// Cloneable handle for pausing, resuming and stopping a flow
#[derive(Debug, Clone)]
pub struct FlowController {
    control: Arc<watch::Sender<FlowControl>>,
}

impl FlowController {
    fn new() -> (Self, watch::Receiver<FlowControl>) {
        let (tx, rx) = watch::channel(FlowControl::Running);
        (
            Self {
                control: Arc::new(tx),
            },
            rx,
        )
    }

    pub fn pause(&self) {
        self.transition(FlowControl::Paused);
    }

    pub fn resume(&self) {
        self.transition(FlowControl::Running);
    }

    /// Stop the flow at its next suspension point. Stopping is final.
    pub fn stop(&self) {
        self.transition(FlowControl::Stopped);
    }

    pub fn state(&self) -> FlowControl {
        *self.control.borrow()
    }

    fn transition(&self, next: FlowControl) {
        self.control.send_if_modified(|current| {
            if *current == FlowControl::Stopped || *current == next {
                return false;
            }
            debug!(from = ?*current, to = ?next, "Flow control change");
            *current = next;
            true
        });
    }
}

/// A running flow
pub struct Flow {
    controller: FlowController,
    handle: JoinHandle<StopReason>,
}

impl Flow {
    pub(crate) fn spawn<F>(drive: impl FnOnce(watch::Receiver<FlowControl>) -> F) -> Self
    where
        F: std::future::Future<Output = StopReason> + Send + 'static,
    {
        let (controller, control) = FlowController::new();
        let handle = tokio::spawn(drive(control));
        Self { controller, handle }
    }

    pub fn pause(&self) {
        self.controller.pause();
    }

    pub fn resume(&self) {
        self.controller.resume();
    }

    pub fn stop(&self) {
        self.controller.stop();
    }

    pub fn controller(&self) -> FlowController {
        self.controller.clone()
    }

    /// Wait for the flow to end
    pub async fn join(self) -> StopReason {
        // Keep the controller alive so the flow is not stopped by this drop
        let Self { controller, handle } = self;
        let reason = match handle.await {
            Ok(reason) => reason,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => StopReason::Stopped,
        };
        drop(controller);
        reason
    }
}

/// Resolves once the flow is stopped or every controller is gone
pub(crate) async fn stopped(control: &mut watch::Receiver<FlowControl>) {
    loop {
        if *control.borrow_and_update() == FlowControl::Stopped {
            return;
        }
        if control.changed().await.is_err() {
            return;
        }
    }
}

/// Waits out a pause; returns `Running` or `Stopped`
pub(crate) async fn running(control: &mut watch::Receiver<FlowControl>) -> FlowControl {
    loop {
        let state = *control.borrow_and_update();
        if state != FlowControl::Paused {
            return state;
        }
        if control.changed().await.is_err() {
            return FlowControl::Stopped;
        }
    }
}
