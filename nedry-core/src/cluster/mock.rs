//! Mock cluster implementation for testing

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ClusterClient, ClusterError, MetricsSource, PodMemoryUsage};
use crate::model::{ControllerKind, ControllerObservation, NodeSnapshot, PodSnapshot};

/// A call made against the mock, in order of arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    ListNodes,
    ListPods,
    ReadController {
        namespace: String,
        name: String,
        kind: ControllerKind,
    },
    DeletePod {
        namespace: String,
        name: String,
    },
    PodMemory,
}

/// In-memory cluster for testing
///
/// Controller observations are scripted per controller: each read pops the
/// next observation and the last one repeats forever.
pub struct MockCluster {
    nodes: RwLock<Vec<NodeSnapshot>>,
    pods: RwLock<Vec<PodSnapshot>>,
    controllers: RwLock<HashMap<(String, String), VecDeque<ControllerObservation>>>,
    memory: RwLock<PodMemoryUsage>,
    calls: RwLock<Vec<ClusterCall>>,
    /// Configurable failure simulation for deletions
    pub fail_deletes: AtomicBool,
    /// Configurable failure simulation for controller reads
    pub fail_reads: AtomicBool,
}

impl MockCluster {
    /// Create an empty mock cluster
    pub fn new() -> Self {
        Self::with_objects(Vec::new(), Vec::new())
    }

    /// Create a mock cluster holding the given nodes and pods
    pub fn with_objects(nodes: Vec<NodeSnapshot>, pods: Vec<PodSnapshot>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
            pods: RwLock::new(pods),
            controllers: RwLock::new(HashMap::new()),
            memory: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            fail_deletes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Replace the node list
    pub async fn set_nodes(&self, nodes: Vec<NodeSnapshot>) {
        *self.nodes.write().await = nodes;
    }

    /// Set a controller observation that never changes
    pub async fn set_controller(&self, namespace: &str, name: &str, obs: ControllerObservation) {
        self.script_controller(namespace, name, vec![obs]).await;
    }

    /// Script successive observations for a controller
    pub async fn script_controller(
        &self,
        namespace: &str,
        name: &str,
        observations: Vec<ControllerObservation>,
    ) {
        let mut controllers = self.controllers.write().await;
        controllers.insert(
            (namespace.to_string(), name.to_string()),
            observations.into_iter().collect(),
        );
    }

    /// Set observed memory for a pod
    pub async fn set_pod_memory(&self, namespace: &str, pod: &str, bytes: u64) {
        let mut memory = self.memory.write().await;
        memory
            .entry(namespace.to_string())
            .or_default()
            .insert(pod.to_string(), bytes);
    }

    /// Set whether deletions should fail
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Set whether controller reads should fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// All calls made so far
    pub async fn calls(&self) -> Vec<ClusterCall> {
        self.calls.read().await.clone()
    }

    /// Pods deleted so far, in order
    pub async fn deleted_pods(&self) -> Vec<(String, String)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                ClusterCall::DeletePod { namespace, name } => {
                    Some((namespace.clone(), name.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of controller reads made against one controller
    pub async fn controller_reads(&self, namespace: &str, name: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| {
                matches!(call, ClusterCall::ReadController { namespace: ns, name: n, .. }
                    if ns == namespace && n == name)
            })
            .count()
    }

    async fn record(&self, call: ClusterCall) {
        self.calls.write().await.push(call);
    }
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>, ClusterError> {
        self.record(ClusterCall::ListNodes).await;
        Ok(self.nodes.read().await.clone())
    }

    async fn list_pods(&self) -> Result<Vec<PodSnapshot>, ClusterError> {
        self.record(ClusterCall::ListPods).await;
        Ok(self.pods.read().await.clone())
    }

    async fn read_controller(
        &self,
        namespace: &str,
        name: &str,
        kind: &ControllerKind,
    ) -> Result<ControllerObservation, ClusterError> {
        self.record(ClusterCall::ReadController {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: kind.clone(),
        })
        .await;

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ClusterError::request(
                format!("read {} {}/{}", kind, namespace, name),
                "mock read failure",
            ));
        }
        if !kind.is_supported() {
            return Err(ClusterError::Unsupported(kind.to_string()));
        }

        let mut controllers = self.controllers.write().await;
        let script = controllers
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| ClusterError::NotFound(format!("{} {}/{}", kind, namespace, name)))?;

        let obs = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        obs.ok_or_else(|| ClusterError::NotFound(format!("{} {}/{}", kind, namespace, name)))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.record(ClusterCall::DeletePod {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
        .await;

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ClusterError::request(
                format!("delete pod {}/{}", namespace, name),
                "mock delete failure",
            ));
        }

        let mut pods = self.pods.write().await;
        pods.retain(|p| !(p.namespace == namespace && p.name == name));
        Ok(())
    }
}

#[async_trait]
impl MetricsSource for MockCluster {
    async fn pod_memory(&self) -> Result<PodMemoryUsage, ClusterError> {
        self.record(ClusterCall::PodMemory).await;
        Ok(self.memory.read().await.clone())
    }
}
