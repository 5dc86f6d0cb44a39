//! Library behind the `kubetop` dashboard
//!
//! This crate provides the core functionality for:
//! - Parsing Kubernetes resource quantities
//! - Joining node and pod metrics into frames
//! - Rendering frames as fixed-width text
//! - Retrieving cluster state through the Kubernetes API
//! - Driving refreshes, either with the refresh scheduler or the flow pipeline

pub mod aggregate;
pub mod clock;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod quantity;
pub mod render;
pub mod scheduler;
pub mod source;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use dashboard::Dashboard;
pub use display::{Display, TerminalDisplay};
pub use error::{Error, Result};
pub use models::*;
pub use observability::StructuredLogger;
pub use pipeline::{dashboard_flow, Flow, StopReason};
pub use quantity::{parse_quantity, Quantity, ResourceKind};
pub use scheduler::{Intervals, RefreshScheduler, SchedulerState, StopKind};
pub use source::{ClusterSource, KubeSource, SourceConfig};
