//! Controller status resolution
//!
//! Maps a controller of any kind onto desired / ready / available counts
//! plus the wait timeout derived from its current pod template.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cluster::{ClusterClient, ClusterError};
use crate::model::{ControllerKind, ControllerObservation};
use crate::timeout::controller_timeout;

/// Wait timeout reported for kinds whose status cannot be read
const UNSUPPORTED_WAIT_TIMEOUT: u64 = 1;

/// Point-in-time availability of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub desired: i32,
    pub ready: i32,
    pub available: i32,
    /// Seconds the controller may take to recover from one disruption
    pub wait_timeout: u64,
    /// False for the sentinel returned for Job and unknown kinds
    pub supported: bool,
}

impl ControllerStatus {
    /// Sentinel status for kinds Nedry cannot observe
    pub fn unsupported() -> Self {
        Self {
            desired: 0,
            ready: 0,
            available: 0,
            wait_timeout: UNSUPPORTED_WAIT_TIMEOUT,
            supported: false,
        }
    }

    /// Whether desired, ready and available counts agree
    pub fn is_converged(&self) -> bool {
        self.supported && self.desired == self.ready && self.ready == self.available
    }
}

impl From<&ControllerObservation> for ControllerStatus {
    fn from(obs: &ControllerObservation) -> Self {
        match obs {
            ControllerObservation::ReplicaSet {
                desired_replicas,
                ready_replicas,
                available_replicas,
                template,
            } => Self {
                desired: *desired_replicas,
                ready: *ready_replicas,
                available: *available_replicas,
                wait_timeout: controller_timeout(template),
                supported: true,
            },
            ControllerObservation::StatefulSet {
                desired_replicas,
                ready_replicas,
                template,
            } => Self {
                desired: *desired_replicas,
                ready: *ready_replicas,
                available: *ready_replicas,
                wait_timeout: controller_timeout(template),
                supported: true,
            },
            ControllerObservation::DaemonSet {
                desired_number_scheduled,
                number_ready,
                number_available,
                template,
            } => Self {
                desired: *desired_number_scheduled,
                ready: *number_ready,
                available: *number_available,
                wait_timeout: controller_timeout(template),
                supported: true,
            },
        }
    }
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "want: {}, ready: {}, available: {}",
            self.desired, self.ready, self.available
        )
    }
}

/// Fetches fresh controller status on every call
#[derive(Clone)]
pub struct StatusResolver {
    client: Arc<dyn ClusterClient>,
}

impl StatusResolver {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Resolve the status of a controller
    ///
    /// Job and unknown kinds yield the unsupported sentinel without touching
    /// the API. API errors propagate.
    pub async fn resolve(
        &self,
        namespace: &str,
        name: &str,
        kind: &ControllerKind,
    ) -> Result<ControllerStatus, ClusterError> {
        debug!(namespace, controller = name, kind = %kind, "Looking up controller status");

        match kind {
            ControllerKind::ReplicaSet | ControllerKind::StatefulSet | ControllerKind::DaemonSet => {
                let obs = self.client.read_controller(namespace, name, kind).await?;
                Ok(ControllerStatus::from(&obs))
            }
            ControllerKind::Job => {
                warn!(namespace, controller = name, "Job controllers are not supported yet");
                Ok(ControllerStatus::unsupported())
            }
            ControllerKind::Unknown(raw) => {
                warn!(
                    namespace,
                    controller = name,
                    kind = %raw,
                    "Unknown controller kind"
                );
                Ok(ControllerStatus::unsupported())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockCluster;
    use crate::model::{ContainerProbes, PodTemplate, ProbeSpec};

    fn template() -> PodTemplate {
        PodTemplate {
            termination_grace_period_seconds: 30,
            containers: vec![ContainerProbes {
                name: "app".to_string(),
                liveness: None,
                readiness: Some(ProbeSpec {
                    initial_delay_seconds: 5,
                    timeout_seconds: 1,
                    period_seconds: 10,
                    success_threshold: 1,
                }),
            }],
        }
    }

    #[test]
    fn test_replica_set_mapping() {
        let status = ControllerStatus::from(&ControllerObservation::ReplicaSet {
            desired_replicas: 3,
            ready_replicas: 3,
            available_replicas: 2,
            template: template(),
        });
        assert_eq!((status.desired, status.ready, status.available), (3, 3, 2));
        assert_eq!(status.wait_timeout, 46);
        assert!(!status.is_converged());
    }

    #[test]
    fn test_stateful_set_uses_ready_as_available() {
        let status = ControllerStatus::from(&ControllerObservation::StatefulSet {
            desired_replicas: 2,
            ready_replicas: 2,
            template: template(),
        });
        assert_eq!(status.available, 2);
        assert!(status.is_converged());
    }

    #[test]
    fn test_daemon_set_mapping() {
        let status = ControllerStatus::from(&ControllerObservation::DaemonSet {
            desired_number_scheduled: 5,
            number_ready: 5,
            number_available: 5,
            template: PodTemplate::default(),
        });
        assert!(status.is_converged());
        assert_eq!(status.wait_timeout, 0);
    }

    #[test]
    fn test_unsupported_never_converges() {
        let status = ControllerStatus::unsupported();
        assert_eq!((status.desired, status.ready, status.available), (0, 0, 0));
        assert!(!status.is_converged());
    }

    #[tokio::test]
    async fn test_resolver_skips_api_for_job() {
        let mock = Arc::new(MockCluster::new());
        let resolver = StatusResolver::new(mock.clone());

        let status = resolver
            .resolve("batch", "nightly", &ControllerKind::Job)
            .await
            .unwrap();
        assert!(!status.supported);

        let status = resolver
            .resolve("batch", "x", &ControllerKind::Unknown("CronJob".into()))
            .await
            .unwrap();
        assert!(!status.supported);
        assert!(mock.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_resolver_propagates_api_errors() {
        let mock = Arc::new(MockCluster::new());
        mock.set_fail_reads(true);
        let resolver = StatusResolver::new(mock);

        let result = resolver
            .resolve("web", "frontend", &ControllerKind::ReplicaSet)
            .await;
        assert!(matches!(result, Err(ClusterError::Request { .. })));
    }
}
