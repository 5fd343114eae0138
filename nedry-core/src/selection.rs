//! Node and pod selection
//!
//! Picks worker nodes by their action annotation and maps them to the pods
//! scheduled on them. The worker node listing is cached; pod listings are
//! always fresh.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::TtlCache;
use crate::cluster::ClusterClient;
use crate::model::{
    AnnotationKeys, NodeSnapshot, PodSnapshot, ACTION_DRAIN, DEFAULT_WORKER_ROLE_LABEL,
    DEFAULT_WORKER_ROLE_VALUE,
};

const WORKER_NODES_KEY: &str = "worker-nodes";

/// Selection configuration
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub annotations: AnnotationKeys,
    /// Label identifying worker nodes
    pub worker_role_label: String,
    /// Required value of the worker label
    pub worker_role_value: String,
    /// Expiry of the cached worker node listing
    pub cache_ttl: Duration,
    /// Capacity of the listing cache
    pub cache_capacity: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            annotations: AnnotationKeys::default(),
            worker_role_label: DEFAULT_WORKER_ROLE_LABEL.to_string(),
            worker_role_value: DEFAULT_WORKER_ROLE_VALUE.to_string(),
            cache_ttl: Duration::from_secs(60),
            cache_capacity: 1024,
        }
    }
}

/// Selects nodes and the pods running on them
pub struct NodeSelector {
    client: Arc<dyn ClusterClient>,
    config: SelectionConfig,
    cache: Mutex<TtlCache<&'static str, Vec<NodeSnapshot>>>,
}

impl NodeSelector {
    pub fn new(client: Arc<dyn ClusterClient>, config: SelectionConfig) -> Self {
        let cache = TtlCache::new(config.cache_capacity, config.cache_ttl);
        Self {
            client,
            config,
            cache: Mutex::new(cache),
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Worker nodes, served from cache while the listing is fresh
    pub async fn worker_nodes(&self) -> Result<Vec<NodeSnapshot>> {
        let mut cache = self.cache.lock().await;
        if let Some(nodes) = cache.get(&WORKER_NODES_KEY) {
            return Ok(nodes.clone());
        }

        let nodes: Vec<NodeSnapshot> = self
            .client
            .list_nodes()
            .await
            .context("Failed to list nodes")?
            .into_iter()
            .filter(|n| self.is_worker(n))
            .collect();

        debug!(count = nodes.len(), "Listed worker nodes");
        cache.insert(WORKER_NODES_KEY, nodes.clone());
        Ok(nodes)
    }

    /// Drop the cached node listing so the next read hits the API
    pub async fn refresh(&self) {
        self.cache.lock().await.invalidate(&WORKER_NODES_KEY);
    }

    /// Worker nodes whose action annotation equals `action`
    ///
    /// `None` is the explicit "no match" query and returns the worker nodes
    /// that carry no action annotation at all.
    pub async fn filter_nodes_by_action(&self, action: Option<&str>) -> Result<Vec<NodeSnapshot>> {
        let key = &self.config.annotations.action;
        let nodes = self.worker_nodes().await?;
        Ok(nodes
            .into_iter()
            .filter(|n| n.annotations.get(key).map(String::as_str) == action)
            .collect())
    }

    /// Nodes annotated for draining that have already been cordoned
    ///
    /// Nodes annotated for draining but still schedulable are skipped.
    pub async fn nodes_to_drain(&self) -> Result<Vec<NodeSnapshot>> {
        let nodes = self.filter_nodes_by_action(Some(ACTION_DRAIN)).await?;
        Ok(nodes.into_iter().filter(|n| n.unschedulable).collect())
    }

    /// Every pod in the cluster
    pub async fn all_pods(&self) -> Result<Vec<PodSnapshot>> {
        self.client.list_pods().await.context("Failed to list pods")
    }

    /// Pods scheduled on any of the given nodes, in listing order
    pub async fn pods_on_nodes(&self, nodes: &[NodeSnapshot]) -> Result<Vec<PodSnapshot>> {
        let names: HashSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let pods = self.all_pods().await?;
        Ok(pods
            .into_iter()
            .filter(|p| {
                p.node_name
                    .as_deref()
                    .map_or(false, |node| names.contains(node))
            })
            .collect())
    }

    fn is_worker(&self, node: &NodeSnapshot) -> bool {
        node.labels.get(&self.config.worker_role_label) == Some(&self.config.worker_role_value)
    }
}
