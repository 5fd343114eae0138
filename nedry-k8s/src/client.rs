//! Kubernetes Client wrapper
//!
//! One explicit handle to the API server, created at startup and shared by
//! every component that needs cluster access.

use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::{DaemonSet, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams};
use kube::config::KubeConfigOptions;
use kube::{Client, Config};
use tracing::info;

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Create a new K8s client from the default config chain
    pub async fn new() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;

        info!("Connected to Kubernetes API server");
        Ok(Self { client })
    }

    /// Create a new K8s client for a named kubeconfig context
    pub async fn with_context(context: &str) -> Result<Self> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };
        let config = Config::from_kubeconfig(&options)
            .await
            .with_context(|| format!("Failed to load kubeconfig context: {}", context))?;

        info!(context, "Using kubeconfig context");
        Self::with_config(config)
    }

    /// Create a new K8s client with custom config
    pub fn with_config(config: Config) -> Result<Self> {
        let client = Client::try_from(config)
            .context("Failed to create Kubernetes client from config")?;

        Ok(Self { client })
    }

    /// Get node API
    pub fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    /// Get pods API for a namespace
    pub fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Get all pods API
    pub fn pods_all(&self) -> Api<Pod> {
        Api::all(self.client.clone())
    }

    pub fn replica_sets(&self, namespace: &str) -> Api<ReplicaSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    pub fn stateful_sets(&self, namespace: &str) -> Api<StatefulSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    pub fn daemon_sets(&self, namespace: &str) -> Api<DaemonSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Get the cluster-wide `metrics.k8s.io` PodMetrics API
    pub fn pod_metrics(&self) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "pods");
        Api::all_with(self.client.clone(), &resource)
    }

    /// List every node
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self
            .nodes()
            .list(&ListParams::default())
            .await
            .context("Failed to list nodes")?;
        Ok(nodes.items)
    }

    /// List pods in every namespace
    pub async fn list_all_pods(&self) -> Result<Vec<Pod>> {
        let pods = self
            .pods_all()
            .list(&ListParams::default())
            .await
            .context("Failed to list pods")?;
        Ok(pods.items)
    }

    /// Read a ReplicaSet including its status
    pub async fn replica_set_status(&self, namespace: &str, name: &str) -> Result<ReplicaSet> {
        self.replica_sets(namespace)
            .get_status(name)
            .await
            .with_context(|| format!("Failed to read ReplicaSet status: {}/{}", namespace, name))
    }

    /// Read a StatefulSet including its status
    pub async fn stateful_set_status(&self, namespace: &str, name: &str) -> Result<StatefulSet> {
        self.stateful_sets(namespace)
            .get_status(name)
            .await
            .with_context(|| format!("Failed to read StatefulSet status: {}/{}", namespace, name))
    }

    /// Read a DaemonSet including its status
    pub async fn daemon_set_status(&self, namespace: &str, name: &str) -> Result<DaemonSet> {
        self.daemon_sets(namespace)
            .get_status(name)
            .await
            .with_context(|| format!("Failed to read DaemonSet status: {}/{}", namespace, name))
    }

    /// Delete a pod, honouring its own termination grace period
    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .with_context(|| format!("Failed to delete pod: {}/{}", namespace, name))?;

        info!(namespace, pod = name, "Pod deleted");
        Ok(())
    }

    /// List PodMetrics objects from the metrics API
    pub async fn list_pod_metrics(&self) -> Result<Vec<DynamicObject>> {
        let metrics = self
            .pod_metrics()
            .list(&ListParams::default())
            .await
            .context("Failed to list pod metrics")?;
        Ok(metrics.items)
    }
}

