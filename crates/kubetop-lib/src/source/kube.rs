//! Kubernetes API backed source
//!
//! Node and pod descriptions come from the core `v1` API. Usage comes from
//! the `metrics.k8s.io/v1beta1` aggregated API, read as dynamic objects.

use super::ClusterSource;
use crate::error::{Error, Result};
use crate::models::{
    NodeSnapshot, PodSnapshot, RawCondition, RawNode, RawNodeUsage, RawPodInfo,
    RawPodUsage,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tracing::{debug, info};

const METRICS_GROUP: &str = "metrics.k8s.io";
const METRICS_VERSION: &str = "v1beta1";

/// Where and what to read from the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceConfig {
    /// Kubeconfig context; the file's current context when unset
    pub context: Option<String>,
    /// Kubeconfig file; the default lookup when unset
    pub kubeconfig: Option<PathBuf>,
    /// Restrict pods to one namespace; all namespaces when unset
    pub namespace: Option<String>,
}

/// Source reading nodes, pods and their metrics from the API server
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
    namespace: Option<String>,
}

impl KubeSource {
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    /// Build a client from kubeconfig, falling back to in-cluster config
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let kubeconfig = match &config.kubeconfig {
            Some(path) => Some(
                Kubeconfig::read_from(path)
                    .map_err(|e| Error::retrieval("kubeconfig", e))?,
            ),
            None => Kubeconfig::read().ok(),
        };

        let client_config = match kubeconfig {
            Some(kubeconfig) => {
                let options = KubeConfigOptions {
                    context: config.context.clone(),
                    cluster: None,
                    user: None,
                };
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| Error::retrieval("kubeconfig", e))?
            }
            None if config.context.is_some() => {
                return Err(Error::retrieval(
                    "kubeconfig",
                    anyhow::anyhow!("no kubeconfig found to select a context from"),
                ));
            }
            None => Config::infer()
                .await
                .map_err(|e| Error::retrieval("in-cluster configuration", e))?,
        };

        info!(
            cluster_url = %client_config.cluster_url,
            context = ?config.context,
            namespace = ?config.namespace,
            "Connecting to cluster"
        );

        let client =
            Client::try_from(client_config).map_err(|e| Error::retrieval("API client", e))?;
        Ok(Self::new(client, config.namespace.clone()))
    }

    fn metrics_api(&self, kind: &str, plural: &str, namespaced: bool) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(METRICS_GROUP, METRICS_VERSION, kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, plural);
        match (&self.namespace, namespaced) {
            (Some(namespace), true) => {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    async fn node_info(&self) -> Result<Vec<RawNode>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::retrieval("nodes", e))?;
        Ok(list.items.into_iter().map(raw_node).collect())
    }

    async fn node_usage(&self) -> Result<Vec<RawNodeUsage>> {
        let list = self
            .metrics_api("NodeMetrics", "nodes", false)
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::retrieval("node metrics", e))?;

        list.items
            .into_iter()
            .map(|metrics| {
                Ok(RawNodeUsage {
                    name: metrics.name_any(),
                    usage: field(&metrics, "usage", "node metrics")?,
                })
            })
            .collect()
    }

    async fn pod_info(&self) -> Result<Vec<RawPodInfo>> {
        let pods: Api<Pod> = match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };
        let list = pods
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::retrieval("pods", e))?;
        Ok(list.items.into_iter().map(raw_pod_info).collect())
    }

    async fn pod_usage(&self) -> Result<Vec<RawPodUsage>> {
        let list = self
            .metrics_api("PodMetrics", "pods", true)
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::retrieval("pod metrics", e))?;

        list.items
            .into_iter()
            .map(|metrics| {
                Ok(RawPodUsage {
                    name: metrics.name_any(),
                    namespace: metrics.namespace().unwrap_or_default(),
                    containers: field(&metrics, "containers", "pod metrics")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ClusterSource for KubeSource {
    async fn nodes(&self) -> Result<NodeSnapshot> {
        let (info, usage) = tokio::try_join!(self.node_info(), self.node_usage())?;
        debug!(nodes = info.len(), usage = usage.len(), "Fetched nodes");
        Ok(NodeSnapshot { info, usage })
    }

    async fn pods(&self) -> Result<PodSnapshot> {
        let (info, usage) = tokio::try_join!(self.pod_info(), self.pod_usage())?;
        debug!(pods = info.len(), usage = usage.len(), "Fetched pods");
        Ok(PodSnapshot { info, usage })
    }
}

/// Decode one top-level field of a metrics object
fn field<T: DeserializeOwned>(object: &DynamicObject, name: &str, what: &'static str) -> Result<T> {
    let value = object.data.get(name).cloned().unwrap_or_default();
    serde_json::from_value(value).map_err(|e| Error::retrieval(what, e))
}

fn raw_node(node: Node) -> RawNode {
    let name = node.name_any();
    let status = node.status.unwrap_or_default();

    RawNode {
        name,
        allocatable: status
            .allocatable
            .unwrap_or_default()
            .into_iter()
            .map(|(resource, quantity)| (resource, quantity.0))
            .collect(),
        addresses: status
            .addresses
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.address)
            .collect(),
        conditions: status
            .conditions
            .unwrap_or_default()
            .into_iter()
            .map(|c| RawCondition {
                type_: c.type_,
                status: c.status,
            })
            .collect(),
    }
}

fn raw_pod_info(pod: Pod) -> RawPodInfo {
    RawPodInfo {
        name: pod.name_any(),
        namespace: pod.namespace().unwrap_or_default(),
        host_ip: pod.status.and_then(|s| s.host_ip),
    }
}
