//! Conversion from Kubernetes API objects to core snapshots
//!
//! Absent optional fields take the API server's documented defaults.

use k8s_openapi::api::apps::v1::{DaemonSet, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Container, Node, Pod, PodSpec, PodTemplateSpec, Probe};
use kube::api::DynamicObject;
use nedry_core::cluster::PodMemoryUsage;
use nedry_core::model::{
    ContainerProbes, ControllerKind, ControllerObservation, NodeSnapshot, OwnerRef, PodSnapshot,
    PodTemplate, ProbeSpec,
};
use nedry_core::quantity::parse_bytes;
use tracing::{debug, warn};

const DEFAULT_PROBE_INITIAL_DELAY: i32 = 0;
const DEFAULT_PROBE_TIMEOUT: i32 = 1;
const DEFAULT_PROBE_PERIOD: i32 = 10;
const DEFAULT_PROBE_SUCCESS_THRESHOLD: i32 = 1;
const DEFAULT_TERMINATION_GRACE_PERIOD: i64 = 30;
const DEFAULT_REPLICAS: i32 = 1;

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

pub fn probe_spec(probe: &Probe) -> ProbeSpec {
    ProbeSpec {
        initial_delay_seconds: non_negative(
            probe.initial_delay_seconds.unwrap_or(DEFAULT_PROBE_INITIAL_DELAY),
        ),
        timeout_seconds: non_negative(probe.timeout_seconds.unwrap_or(DEFAULT_PROBE_TIMEOUT)),
        period_seconds: non_negative(probe.period_seconds.unwrap_or(DEFAULT_PROBE_PERIOD)),
        success_threshold: non_negative(
            probe
                .success_threshold
                .unwrap_or(DEFAULT_PROBE_SUCCESS_THRESHOLD),
        ),
    }
}

fn container_probes(container: &Container) -> ContainerProbes {
    ContainerProbes {
        name: container.name.clone(),
        liveness: container.liveness_probe.as_ref().map(probe_spec),
        readiness: container.readiness_probe.as_ref().map(probe_spec),
    }
}

pub fn pod_template(spec: Option<&PodSpec>) -> PodTemplate {
    let Some(spec) = spec else {
        return PodTemplate {
            termination_grace_period_seconds: DEFAULT_TERMINATION_GRACE_PERIOD as u64,
            containers: Vec::new(),
        };
    };

    let grace = spec
        .termination_grace_period_seconds
        .unwrap_or(DEFAULT_TERMINATION_GRACE_PERIOD);
    PodTemplate {
        termination_grace_period_seconds: u64::try_from(grace).unwrap_or(0),
        containers: spec.containers.iter().map(container_probes).collect(),
    }
}

fn template_of(template: Option<&PodTemplateSpec>) -> PodTemplate {
    pod_template(template.and_then(|t| t.spec.as_ref()))
}

pub fn node_snapshot(node: &Node) -> NodeSnapshot {
    NodeSnapshot {
        name: node.metadata.name.clone().unwrap_or_default(),
        labels: node.metadata.labels.clone().unwrap_or_default(),
        annotations: node.metadata.annotations.clone().unwrap_or_default(),
        unschedulable: node
            .spec
            .as_ref()
            .and_then(|s| s.unschedulable)
            .unwrap_or(false),
    }
}

pub fn pod_snapshot(pod: &Pod) -> PodSnapshot {
    let metadata = &pod.metadata;
    let owner = metadata
        .owner_references
        .as_ref()
        .and_then(|refs| refs.first())
        .map(|r| OwnerRef {
            kind: ControllerKind::from_kind(&r.kind),
            name: r.name.clone(),
        });

    PodSnapshot {
        namespace: metadata.namespace.clone().unwrap_or_else(|| "default".to_string()),
        name: metadata.name.clone().unwrap_or_default(),
        node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        owner,
        template: pod_template(pod.spec.as_ref()),
        annotations: metadata.annotations.clone().unwrap_or_default(),
    }
}

pub fn replica_set_observation(rs: &ReplicaSet) -> ControllerObservation {
    let spec = rs.spec.as_ref();
    let status = rs.status.as_ref();
    ControllerObservation::ReplicaSet {
        desired_replicas: spec.and_then(|s| s.replicas).unwrap_or(DEFAULT_REPLICAS),
        ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        available_replicas: status.and_then(|s| s.available_replicas).unwrap_or(0),
        template: template_of(spec.and_then(|s| s.template.as_ref())),
    }
}

pub fn stateful_set_observation(ss: &StatefulSet) -> ControllerObservation {
    let spec = ss.spec.as_ref();
    ControllerObservation::StatefulSet {
        desired_replicas: spec.and_then(|s| s.replicas).unwrap_or(DEFAULT_REPLICAS),
        ready_replicas: ss
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0),
        template: template_of(spec.map(|s| &s.template)),
    }
}

pub fn daemon_set_observation(ds: &DaemonSet) -> ControllerObservation {
    let status = ds.status.as_ref();
    ControllerObservation::DaemonSet {
        desired_number_scheduled: status.map(|s| s.desired_number_scheduled).unwrap_or(0),
        number_ready: status.map(|s| s.number_ready).unwrap_or(0),
        number_available: status.and_then(|s| s.number_available).unwrap_or(0),
        template: template_of(ds.spec.as_ref().map(|s| &s.template)),
    }
}

/// Fold PodMetrics objects into per-pod memory totals
///
/// Container usage is summed per pod. Unparseable quantities are logged and
/// skipped rather than failing the whole listing. A pod with no parseable
/// container memory is left out, so it gets no soft-limit verdict.
pub fn pod_memory_usage(objects: &[DynamicObject]) -> PodMemoryUsage {
    let mut usage = PodMemoryUsage::new();

    for obj in objects {
        let (Some(namespace), Some(name)) = (&obj.metadata.namespace, &obj.metadata.name) else {
            continue;
        };
        let Some(containers) = obj.data.get("containers").and_then(|c| c.as_array()) else {
            continue;
        };

        let mut total: u64 = 0;
        let mut observed = false;
        for container in containers {
            let Some(memory) = container.pointer("/usage/memory").and_then(|m| m.as_str())
            else {
                continue;
            };
            match parse_bytes(memory) {
                Ok(bytes) => {
                    total = total.saturating_add(bytes);
                    observed = true;
                }
                Err(e) => warn!(
                    namespace = %namespace,
                    pod = %name,
                    value = memory,
                    error = %e,
                    "Ignoring unparseable memory usage"
                ),
            }
        }

        if !observed {
            debug!(namespace = %namespace, pod = %name, "No memory usage reported");
            continue;
        }

        usage
            .entry(namespace.clone())
            .or_default()
            .insert(name.clone(), total);
    }

    usage
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_probe_defaults() {
        let probe: Probe = serde_json::from_value(json!({
            "httpGet": { "path": "/healthz", "port": 8080 }
        }))
        .unwrap();
        let spec = probe_spec(&probe);
        assert_eq!(spec.initial_delay_seconds, 0);
        assert_eq!(spec.timeout_seconds, 1);
        assert_eq!(spec.period_seconds, 10);
        assert_eq!(spec.success_threshold, 1);
    }

    #[test]
    fn test_pod_snapshot() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": {
                "name": "frontend-7d9f-abc",
                "namespace": "web",
                "annotations": { "nedry-v1/limit": "512Mi" },
                "ownerReferences": [
                    { "apiVersion": "apps/v1", "kind": "ReplicaSet", "name": "frontend-7d9f", "uid": "1" },
                    { "apiVersion": "v1", "kind": "Other", "name": "ignored", "uid": "2" }
                ]
            },
            "spec": {
                "nodeName": "node-1",
                "terminationGracePeriodSeconds": 45,
                "containers": [{
                    "name": "app",
                    "readinessProbe": {
                        "tcpSocket": { "port": 80 },
                        "initialDelaySeconds": 5,
                        "periodSeconds": 3
                    }
                }]
            }
        }))
        .unwrap();

        let snapshot = pod_snapshot(&pod);
        assert_eq!(snapshot.pod_ref().to_string(), "web/frontend-7d9f-abc");
        assert_eq!(snapshot.node_name.as_deref(), Some("node-1"));
        assert_eq!(
            snapshot.owner,
            Some(OwnerRef {
                kind: ControllerKind::ReplicaSet,
                name: "frontend-7d9f".to_string()
            })
        );
        assert_eq!(snapshot.template.termination_grace_period_seconds, 45);
        let readiness = snapshot.template.containers[0].readiness.unwrap();
        assert_eq!(readiness.initial_delay_seconds, 5);
        assert_eq!(readiness.period_seconds, 3);
        assert!(snapshot.template.containers[0].liveness.is_none());
        assert_eq!(snapshot.annotations.get("nedry-v1/limit").unwrap(), "512Mi");
    }

    #[test]
    fn test_orphan_pod_has_no_owner() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": { "name": "debug", "namespace": "default" },
            "spec": { "containers": [{ "name": "shell" }] }
        }))
        .unwrap();

        let snapshot = pod_snapshot(&pod);
        assert!(snapshot.owner.is_none());
        assert_eq!(snapshot.template.termination_grace_period_seconds, 30);
    }

    #[test]
    fn test_node_snapshot() {
        let node: Node = serde_json::from_value(json!({
            "metadata": {
                "name": "node-1",
                "labels": { "kubernetes.io/role": "node" },
                "annotations": { "nedry-v1/action": "drain" }
            },
            "spec": { "unschedulable": true }
        }))
        .unwrap();

        let snapshot = node_snapshot(&node);
        assert!(snapshot.unschedulable);
        assert_eq!(snapshot.annotations.get("nedry-v1/action").unwrap(), "drain");

        let bare: Node = serde_json::from_value(json!({ "metadata": { "name": "node-2" } })).unwrap();
        let snapshot = node_snapshot(&bare);
        assert!(!snapshot.unschedulable);
        assert!(snapshot.labels.is_empty());
    }

    #[test]
    fn test_replica_set_observation() {
        let rs: ReplicaSet = serde_json::from_value(json!({
            "metadata": { "name": "frontend", "namespace": "web" },
            "spec": {
                "replicas": 3,
                "selector": { "matchLabels": { "app": "frontend" } },
                "template": {
                    "spec": {
                        "terminationGracePeriodSeconds": 10,
                        "containers": [{ "name": "app" }]
                    }
                }
            },
            "status": { "replicas": 3, "readyReplicas": 2, "availableReplicas": 1 }
        }))
        .unwrap();

        match replica_set_observation(&rs) {
            ControllerObservation::ReplicaSet {
                desired_replicas,
                ready_replicas,
                available_replicas,
                template,
            } => {
                assert_eq!((desired_replicas, ready_replicas, available_replicas), (3, 2, 1));
                assert_eq!(template.termination_grace_period_seconds, 10);
            }
            other => panic!("unexpected observation {:?}", other),
        }
    }

    #[test]
    fn test_stateful_set_observation_without_status() {
        let ss: StatefulSet = serde_json::from_value(json!({
            "metadata": { "name": "db", "namespace": "data" },
            "spec": {
                "serviceName": "db",
                "selector": { "matchLabels": { "app": "db" } },
                "template": { "spec": { "containers": [{ "name": "postgres" }] } }
            }
        }))
        .unwrap();

        assert_eq!(
            stateful_set_observation(&ss),
            ControllerObservation::StatefulSet {
                desired_replicas: 1,
                ready_replicas: 0,
                template: PodTemplate {
                    termination_grace_period_seconds: 30,
                    containers: vec![ContainerProbes {
                        name: "postgres".to_string(),
                        liveness: None,
                        readiness: None,
                    }],
                },
            }
        );
    }

    #[test]
    fn test_daemon_set_observation() {
        let ds: DaemonSet = serde_json::from_value(json!({
            "metadata": { "name": "agent", "namespace": "kube-system" },
            "spec": {
                "selector": { "matchLabels": { "app": "agent" } },
                "template": { "spec": { "containers": [{ "name": "agent" }] } }
            },
            "status": {
                "currentNumberScheduled": 3,
                "desiredNumberScheduled": 3,
                "numberMisscheduled": 0,
                "numberReady": 3
            }
        }))
        .unwrap();

        match daemon_set_observation(&ds) {
            ControllerObservation::DaemonSet {
                desired_number_scheduled,
                number_ready,
                number_available,
                ..
            } => assert_eq!((desired_number_scheduled, number_ready, number_available), (3, 3, 0)),
            other => panic!("unexpected observation {:?}", other),
        }
    }

    #[test]
    fn test_pod_memory_usage() {
        let objects: Vec<DynamicObject> = serde_json::from_value(json!([
            {
                "apiVersion": "metrics.k8s.io/v1beta1",
                "kind": "PodMetrics",
                "metadata": { "name": "frontend-abc", "namespace": "web" },
                "timestamp": "2024-01-01T00:00:00Z",
                "window": "30s",
                "containers": [
                    { "name": "app", "usage": { "cpu": "10m", "memory": "500Mi" } },
                    { "name": "proxy", "usage": { "cpu": "1m", "memory": "100Mi" } }
                ]
            },
            {
                "apiVersion": "metrics.k8s.io/v1beta1",
                "kind": "PodMetrics",
                "metadata": { "name": "broken", "namespace": "web" },
                "containers": [
                    { "name": "app", "usage": { "memory": "??" } }
                ]
            },
            {
                "apiVersion": "metrics.k8s.io/v1beta1",
                "kind": "PodMetrics",
                "metadata": { "name": "starting", "namespace": "web" },
                "containers": []
            },
            {
                "apiVersion": "metrics.k8s.io/v1beta1",
                "kind": "PodMetrics",
                "metadata": { "name": "partial", "namespace": "web" },
                "containers": [
                    { "name": "app", "usage": { "memory": "256Mi" } },
                    { "name": "sidecar", "usage": { "memory": "??" } }
                ]
            }
        ]))
        .unwrap();

        let usage = pod_memory_usage(&objects);
        let web = usage.get("web").unwrap();
        assert_eq!(web.get("frontend-abc"), Some(&(600 * 1024 * 1024)));
        assert_eq!(web.get("partial"), Some(&(256 * 1024 * 1024)));
        assert!(web.get("broken").is_none());
        assert!(web.get("starting").is_none());
        assert_eq!(web.len(), 2);
    }
}
