//! Configuration for the dashboard
//!
//! Command-line flags win over `KUBETOP_*` environment variables, which win
//! over built-in defaults.

use crate::Cli;
use anyhow::{bail, Context, Result};
use kubetop_lib::SourceConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_INTERVAL_SECS: u64 = 3;
const LOG_FILE_NAME: &str = ".kubetop.log";

/// Settings read from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvConfig {
    /// `KUBETOP_INTERVAL_SECS`
    pub interval_secs: Option<u64>,
    /// `KUBETOP_ITERATIONS`
    pub iterations: Option<u64>,
    /// `KUBETOP_NAMESPACE`
    pub namespace: Option<String>,
}

impl EnvConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("KUBETOP"))
    }

    fn from_source(environment: config::Environment) -> Result<Self> {
        config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()
            .context("Failed to read KUBETOP_* environment")?
            .try_deserialize()
            .context("Invalid KUBETOP_* environment")
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub interval: Duration,
    /// `None` refreshes until interrupted
    pub iterations: Option<u64>,
    pub source: SourceConfig,
    pub log_file: PathBuf,
    pub pipeline: bool,
}

impl AppConfig {
    /// Merge flags over environment over defaults
    ///
    /// `home` locates the default log file; without it the log goes to the
    /// working directory.
    pub fn resolve(cli: &Cli, env: EnvConfig, home: Option<PathBuf>) -> Result<Self> {
        let interval_secs = cli
            .interval
            .or(env.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            bail!("Refresh interval must be at least one second");
        }

        let log_file = match &cli.log_file {
            Some(path) => path.clone(),
            None => home.unwrap_or_default().join(LOG_FILE_NAME),
        };

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            iterations: cli.iterations.or(env.iterations),
            source: SourceConfig {
                context: cli.context.clone(),
                kubeconfig: cli.kubeconfig.clone(),
                namespace: cli.namespace.clone().or(env.namespace),
            },
            log_file,
            pipeline: cli.pipeline,
        })
    }

    /// Name of the cluster context for log records
    pub fn context_label(&self) -> &str {
        self.source.context.as_deref().unwrap_or("current-context")
    }
}
