//! Cluster Operator
//!
//! Implements the core cluster interface on top of the Kubernetes API.

use async_trait::async_trait;
use nedry_core::cluster::{ClusterClient, ClusterError};
use nedry_core::model::{ControllerKind, ControllerObservation, NodeSnapshot, PodSnapshot};
use tracing::{debug, info};

use crate::client::K8sClient;
use crate::convert;

/// Map an API failure into a cluster error, keeping 404s distinct
pub(crate) fn map_error(operation: String, err: anyhow::Error) -> ClusterError {
    if let Some(kube::Error::Api(response)) = err.downcast_ref::<kube::Error>() {
        if response.code == 404 {
            return ClusterError::NotFound(operation);
        }
    }
    ClusterError::request(operation, format!("{:#}", err))
}

/// Cluster access backed by a live API server
pub struct ClusterOperator {
    client: K8sClient,
    dry_run: bool,
}

impl ClusterOperator {
    pub fn new(client: K8sClient, dry_run: bool) -> Self {
        Self { client, dry_run }
    }
}

#[async_trait]
impl ClusterClient for ClusterOperator {
    async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>, ClusterError> {
        let nodes = self
            .client
            .list_nodes()
            .await
            .map_err(|e| map_error("list nodes".to_string(), e))?;
        debug!(count = nodes.len(), "Listed nodes");
        Ok(nodes.iter().map(convert::node_snapshot).collect())
    }

    async fn list_pods(&self) -> Result<Vec<PodSnapshot>, ClusterError> {
        let pods = self
            .client
            .list_all_pods()
            .await
            .map_err(|e| map_error("list pods".to_string(), e))?;
        debug!(count = pods.len(), "Listed pods");
        Ok(pods.iter().map(convert::pod_snapshot).collect())
    }

    async fn read_controller(
        &self,
        namespace: &str,
        name: &str,
        kind: &ControllerKind,
    ) -> Result<ControllerObservation, ClusterError> {
        let operation = || format!("read {} {}/{}", kind, namespace, name);
        match kind {
            ControllerKind::ReplicaSet => self
                .client
                .replica_set_status(namespace, name)
                .await
                .map(|rs| convert::replica_set_observation(&rs))
                .map_err(|e| map_error(operation(), e)),
            ControllerKind::StatefulSet => self
                .client
                .stateful_set_status(namespace, name)
                .await
                .map(|ss| convert::stateful_set_observation(&ss))
                .map_err(|e| map_error(operation(), e)),
            ControllerKind::DaemonSet => self
                .client
                .daemon_set_status(namespace, name)
                .await
                .map(|ds| convert::daemon_set_observation(&ds))
                .map_err(|e| map_error(operation(), e)),
            ControllerKind::Job | ControllerKind::Unknown(_) => {
                Err(ClusterError::Unsupported(kind.to_string()))
            }
        }
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        if self.dry_run {
            info!(namespace, pod = name, "[DRY-RUN] Would delete pod");
            return Ok(());
        }

        self.client
            .delete_pod(namespace, name)
            .await
            .map_err(|e| map_error(format!("delete pod {}/{}", namespace, name), e))
    }
}
