//! kubetop - a `top`-like dashboard for Kubernetes
//!
//! Refreshes node and pod resource usage in the terminal at a fixed
//! interval until the requested number of refreshes is done or the user
//! interrupts it.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use config::{AppConfig, EnvConfig};
use kubetop_lib::observability::init_logging;
use kubetop_lib::{
    dashboard_flow, Clock, Dashboard, Intervals, KubeSource, RefreshScheduler, StopReason,
    StructuredLogger, SystemClock, TerminalDisplay,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tracing::info;

const KUBETOP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Node and pod resource usage for a Kubernetes cluster, refreshed like top
#[derive(Debug, Parser)]
#[command(name = "kubetop")]
#[command(author, version, about = "Continuously refreshing resource usage dashboard for Kubernetes", long_about = None)]
pub struct Cli {
    /// Seconds between refreshes [default: 3]
    #[arg(long, short = 'd')]
    pub interval: Option<u64>,

    /// Stop after this many refreshes (runs until interrupted if not specified)
    #[arg(long, short = 'n')]
    pub iterations: Option<u64>,

    /// Kubeconfig context to use (uses the current context if not specified)
    #[arg(long)]
    pub context: Option<String>,

    /// Path to kubeconfig file (uses KUBECONFIG or ~/.kube/config if not specified)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Only show pods in this namespace (shows all namespaces if not specified)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Write logs to this file [default: ~/.kubetop.log]
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Drive refreshes through the flow pipeline instead of the scheduler
    #[arg(long)]
    pub pipeline: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let env = EnvConfig::load()?;
    let config = AppConfig::resolve(&cli, env, dirs_next::home_dir())?;

    init_logging(&config.log_file, "info")?;
    let logger = StructuredLogger::new(config.context_label());
    logger.log_startup(KUBETOP_VERSION, config.interval, config.iterations);

    let source = KubeSource::connect(&config.source)
        .await
        .context("Failed to connect to the cluster")?;

    let (shutdown_tx, _) = broadcast::channel(1);
    spawn_interrupt_handler(shutdown_tx.clone());

    let outcome = if config.pipeline {
        run_pipeline(&config, source, &shutdown_tx).await
    } else {
        run_scheduler(&config, source, &shutdown_tx, logger.clone()).await
    };

    match &outcome {
        Ok(()) => logger.log_shutdown("finished", false),
        Err(e) => logger.log_shutdown(&format!("{e:#}"), true),
    }
    outcome
}

async fn run_scheduler(
    config: &AppConfig,
    source: KubeSource,
    shutdown: &broadcast::Sender<()>,
    logger: StructuredLogger,
) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let dashboard = Dashboard::new(source, TerminalDisplay::stdout(), clock, logger);
    let (scheduler, state) =
        RefreshScheduler::new(dashboard, Intervals::new(config.interval, config.iterations));

    let (ready_tx, ready_rx) = oneshot::channel();
    let shutdown_rx = shutdown.subscribe();
    // Setup is complete; the first refresh can start
    let _ = ready_tx.send(());

    let outcome = scheduler.run(ready_rx, shutdown_rx).await;
    info!(state = ?*state.borrow(), "Refresh scheduler finished");
    outcome.context("Dashboard refresh failed")
}

async fn run_pipeline(
    config: &AppConfig,
    source: KubeSource,
    shutdown: &broadcast::Sender<()>,
) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let flow = dashboard_flow(
        source,
        TerminalDisplay::stdout(),
        clock,
        config.interval,
        config.iterations,
    );

    let controller = flow.controller();
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        if shutdown_rx.recv().await.is_ok() {
            controller.stop();
        }
    });

    let reason = flow.join().await;
    info!(reason = ?reason, "Flow finished");
    match reason {
        StopReason::Stopped | StopReason::Exhausted => Ok(()),
        StopReason::Failed(e) => Err(e).context("Dashboard refresh failed"),
    }
}

/// Broadcast shutdown on Ctrl-C
fn spawn_interrupt_handler(shutdown: broadcast::Sender<()>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            let _ = shutdown.send(());
        }
    });
}
