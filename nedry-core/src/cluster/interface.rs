//! Cluster interface traits and errors

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ControllerKind, ControllerObservation, NodeSnapshot, PodSnapshot};

/// Observed memory per pod: namespace -> pod name -> bytes
pub type PodMemoryUsage = HashMap<String, HashMap<String, u64>>;

/// Errors surfaced by cluster and metrics collaborators
#[derive(Debug, Error)]
pub enum ClusterError {
    /// API or transport failure
    #[error("{operation} failed: {message}")]
    Request { operation: String, message: String },

    /// Named object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Controller kind cannot be read
    #[error("Unsupported controller kind: {0}")]
    Unsupported(String),
}

impl ClusterError {
    pub fn request(operation: impl Into<String>, message: impl ToString) -> Self {
        ClusterError::Request {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Control-plane operations used by selection and eviction
///
/// Implementations must surface transport and API errors instead of
/// swallowing them.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List every node with labels, annotations and schedulability
    async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>, ClusterError>;

    /// List every pod in every namespace
    async fn list_pods(&self) -> Result<Vec<PodSnapshot>, ClusterError>;

    /// Read the current status and pod template of a controller
    async fn read_controller(
        &self,
        namespace: &str,
        name: &str,
        kind: &ControllerKind,
    ) -> Result<ControllerObservation, ClusterError>;

    /// Delete a single pod
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}

/// Source of observed pod memory usage
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn pod_memory(&self) -> Result<PodMemoryUsage, ClusterError>;
}
