//! Observability infrastructure for kubetop
//!
//! Provides:
//! - Structured JSON logging with tracing, written to a file so it never
//!   lands on the dashboard
//! - `StructuredLogger` for lifecycle and refresh events

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber, appending JSON records to `path`
///
/// `RUST_LOG` overrides `default_filter` when set.
pub fn init_logging(path: &Path, default_filter: &str) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(fmt::layer().json().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Structured logger for dashboard events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context: String,
}

impl StructuredLogger {
    /// `context` names the cluster context being watched
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Log startup
    pub fn log_startup(&self, version: &str, interval: Duration, iterations: Option<u64>) {
        info!(
            event = "kubetop_started",
            context = %self.context,
            version = %version,
            interval_secs = interval.as_secs(),
            iterations = ?iterations,
            "kubetop started"
        );
    }

    /// Log a completed refresh cycle
    pub fn log_cycle(&self, nodes: usize, pods: usize, bytes: usize, elapsed: Duration) {
        info!(
            event = "refresh_completed",
            context = %self.context,
            nodes = nodes,
            pods = pods,
            bytes = bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            "Refresh cycle complete"
        );
    }

    /// Log shutdown; failures are logged at warn
    pub fn log_shutdown(&self, reason: &str, failed: bool) {
        if failed {
            warn!(
                event = "kubetop_shutdown",
                context = %self.context,
                reason = %reason,
                "kubetop stopping after failure"
            );
        } else {
            info!(
                event = "kubetop_shutdown",
                context = %self.context,
                reason = %reason,
                "kubetop stopping"
            );
        }
    }
}
