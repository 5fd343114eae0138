//! Cluster snapshots
//!
//! Immutable value types fetched fresh from the cluster for each operation.
//! Nothing in here talks to the API server; conversion from API objects
//! lives in the Kubernetes integration crate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default prefix for every annotation Nedry reads
pub const DEFAULT_ANNOTATION_PREFIX: &str = "nedry-v1/";

/// Action annotation value that marks a node for draining
pub const ACTION_DRAIN: &str = "drain";

/// Default label used to recognise worker nodes
pub const DEFAULT_WORKER_ROLE_LABEL: &str = "kubernetes.io/role";

/// Default value of the worker role label
pub const DEFAULT_WORKER_ROLE_VALUE: &str = "node";

/// Annotation keys derived from a common prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationKeys {
    /// Node annotation selecting an action (`<prefix>action`)
    pub action: String,
    /// Pod annotation carrying a soft memory limit (`<prefix>limit`)
    pub soft_limit: String,
}

impl AnnotationKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            action: format!("{}action", prefix),
            soft_limit: format!("{}limit", prefix),
        }
    }
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_ANNOTATION_PREFIX)
    }
}

/// Health-check parameters of a single probe, in seconds / counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub initial_delay_seconds: u32,
    pub timeout_seconds: u32,
    pub period_seconds: u32,
    pub success_threshold: u32,
}

/// Probes declared by one container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerProbes {
    pub name: String,
    pub liveness: Option<ProbeSpec>,
    pub readiness: Option<ProbeSpec>,
}

/// The parts of a pod spec that bound recovery time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplate {
    pub termination_grace_period_seconds: u64,
    pub containers: Vec<ContainerProbes>,
}

/// Kind of the controller owning a pod
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerKind {
    ReplicaSet,
    StatefulSet,
    DaemonSet,
    /// Recognised but not supported
    Job,
    /// Anything else, with the kind string as reported by the API
    Unknown(String),
}

impl ControllerKind {
    /// Parse an owner-reference kind string
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "ReplicaSet" => ControllerKind::ReplicaSet,
            "StatefulSet" => ControllerKind::StatefulSet,
            "DaemonSet" => ControllerKind::DaemonSet,
            "Job" => ControllerKind::Job,
            other => ControllerKind::Unknown(other.to_string()),
        }
    }

    /// Whether convergence can be observed for this kind
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            ControllerKind::ReplicaSet | ControllerKind::StatefulSet | ControllerKind::DaemonSet
        )
    }

    /// Stable label value for metrics
    pub fn as_str(&self) -> &str {
        match self {
            ControllerKind::ReplicaSet => "ReplicaSet",
            ControllerKind::StatefulSet => "StatefulSet",
            ControllerKind::DaemonSet => "DaemonSet",
            ControllerKind::Job => "Job",
            ControllerKind::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerKind::Unknown(kind) => write!(f, "{}", kind),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// First owner reference of a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: ControllerKind,
    pub name: String,
}

/// Namespaced pod identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Worker node as seen at listing time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// Set when the node has been cordoned
    pub unschedulable: bool,
}

/// Pod as seen at listing time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub namespace: String,
    pub name: String,
    pub node_name: Option<String>,
    pub owner: Option<OwnerRef>,
    pub template: PodTemplate,
    pub annotations: BTreeMap<String, String>,
}

impl PodSnapshot {
    pub fn pod_ref(&self) -> PodRef {
        PodRef::new(&self.namespace, &self.name)
    }
}

/// Raw controller state as read from the API, one variant per supported kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerObservation {
    ReplicaSet {
        desired_replicas: i32,
        ready_replicas: i32,
        available_replicas: i32,
        template: PodTemplate,
    },
    /// StatefulSets expose no separate "available" signal
    StatefulSet {
        desired_replicas: i32,
        ready_replicas: i32,
        template: PodTemplate,
    },
    DaemonSet {
        desired_number_scheduled: i32,
        number_ready: i32,
        number_available: i32,
        template: PodTemplate,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_kind_parsing() {
        assert_eq!(ControllerKind::from_kind("ReplicaSet"), ControllerKind::ReplicaSet);
        assert_eq!(ControllerKind::from_kind("DaemonSet"), ControllerKind::DaemonSet);
        assert_eq!(ControllerKind::from_kind("Job"), ControllerKind::Job);
        assert_eq!(
            ControllerKind::from_kind("CronJob"),
            ControllerKind::Unknown("CronJob".to_string())
        );
        assert!(!ControllerKind::Job.is_supported());
        assert!(ControllerKind::StatefulSet.is_supported());
        assert_eq!(ControllerKind::Unknown("Foo".into()).to_string(), "Foo");
    }

    #[test]
    fn test_annotation_keys() {
        let keys = AnnotationKeys::default();
        assert_eq!(keys.action, "nedry-v1/action");
        assert_eq!(keys.soft_limit, "nedry-v1/limit");
    }

    #[test]
    fn test_pod_ref_display() {
        assert_eq!(PodRef::new("web", "frontend-abc").to_string(), "web/frontend-abc");
    }
}
