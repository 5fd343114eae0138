//! Safe Eviction Protocol
//!
//! Deletes one pod at a time, bracketed by convergence checks against its
//! owning controller:
//!
//! ```text
//! start -> pre-check -> delete -> post-check -> succeeded
//!   |          |                      |
//!   v          v                      v
//! orphan   pre-check-timeout   deleted-post-check-timeout
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::cluster::{ClusterClient, ClusterError};
use crate::metrics::MetricsRegistry;
use crate::model::PodSnapshot;
use crate::poller::ConvergencePoller;

/// Terminal result of one eviction attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionOutcome {
    /// Pod has no owner, nothing would recreate it
    SkippedOrphan,
    /// Owner was not healthy before deletion, pod left alone
    PreCheckTimeout,
    /// Pod was deleted but the owner did not recover within budget
    DeletedPostCheckTimeout,
    /// Pod was deleted and the owner recovered
    Succeeded,
}

impl EvictionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionOutcome::SkippedOrphan => "skipped-orphan",
            EvictionOutcome::PreCheckTimeout => "pre-check-timeout",
            EvictionOutcome::DeletedPostCheckTimeout => "deleted-post-check-timeout",
            EvictionOutcome::Succeeded => "succeeded",
        }
    }

    /// Whether the pod was deleted
    pub fn deleted(&self) -> bool {
        matches!(
            self,
            EvictionOutcome::DeletedPostCheckTimeout | EvictionOutcome::Succeeded
        )
    }
}

impl fmt::Display for EvictionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evicts single pods without disrupting an unhealthy controller
#[derive(Clone)]
pub struct SafeEvictor {
    client: Arc<dyn ClusterClient>,
    poller: ConvergencePoller,
    metrics: Arc<MetricsRegistry>,
}

impl SafeEvictor {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        poller: ConvergencePoller,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            client,
            poller,
            metrics,
        }
    }

    /// Run the protocol for one pod
    ///
    /// API failures abort the attempt and propagate; timeouts do not.
    pub async fn evict(&self, pod: &PodSnapshot) -> Result<EvictionOutcome, ClusterError> {
        let outcome = self.run(pod).await?;
        self.metrics.inc_eviction(outcome.as_str());
        Ok(outcome)
    }

    async fn run(&self, pod: &PodSnapshot) -> Result<EvictionOutcome, ClusterError> {
        let namespace = pod.namespace.as_str();
        let pod_name = pod.name.as_str();

        let Some(owner) = pod.owner.as_ref() else {
            warn!(
                namespace,
                pod = pod_name,
                "Pod has no owner, refusing to delete it"
            );
            return Ok(EvictionOutcome::SkippedOrphan);
        };

        let healthy = self
            .poller
            .wait_for_convergence(namespace, &owner.name, &owner.kind)
            .await?;
        if !healthy {
            warn!(
                namespace,
                pod = pod_name,
                kind = %owner.kind,
                controller = %owner.name,
                "Timed out waiting for controller to go healthy, not deleting"
            );
            return Ok(EvictionOutcome::PreCheckTimeout);
        }

        info!(namespace, pod = pod_name, "Controller is healthy, deleting pod");
        self.client.delete_pod(namespace, pod_name).await?;

        let settle = Duration::from_secs(pod.template.termination_grace_period_seconds)
            + self.poller.config().deletion_margin;
        tokio::time::sleep(settle).await;

        let recovered = self
            .poller
            .wait_for_convergence(namespace, &owner.name, &owner.kind)
            .await?;
        if !recovered {
            warn!(
                namespace,
                pod = pod_name,
                kind = %owner.kind,
                controller = %owner.name,
                "Timed out waiting for controller to come back up healthy"
            );
            return Ok(EvictionOutcome::DeletedPostCheckTimeout);
        }

        info!(namespace, pod = pod_name, controller = %owner.name, "Controller recovered");
        Ok(EvictionOutcome::Succeeded)
    }
}
