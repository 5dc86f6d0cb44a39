//! Cluster data sources
//!
//! A source answers two questions per cycle: what nodes exist and what
//! they use, and what pods exist and what they use. Any failure is a
//! `RetrievalFailure` and ends the run.

mod kube;

pub use self::kube::{KubeSource, SourceConfig};

use crate::error::Result;
use crate::models::{NodeSnapshot, PodSnapshot};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for cluster state retrieval
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Node descriptions and node usage
    async fn nodes(&self) -> Result<NodeSnapshot>;

    /// Pod metadata and per-container pod usage
    async fn pods(&self) -> Result<PodSnapshot>;
}

#[async_trait]
impl<S: ClusterSource + ?Sized> ClusterSource for Arc<S> {
    async fn nodes(&self) -> Result<NodeSnapshot> {
        (**self).nodes().await
    }

    async fn pods(&self) -> Result<PodSnapshot> {
        (**self).pods().await
    }
}

/// Fetch nodes and pods concurrently, failing if either fails
pub async fn fetch_all<S: ClusterSource + ?Sized>(source: &S) -> Result<(NodeSnapshot, PodSnapshot)> {
    tokio::try_join!(source.nodes(), source.pods())
}
