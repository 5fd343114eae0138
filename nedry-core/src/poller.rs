//! Convergence Poller
//!
//! Polls a controller until desired == ready == available or a budget
//! derived from its probe configuration runs out. Timing out is an expected
//! outcome and is reported as `false`, never as an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::cluster::ClusterError;
use crate::metrics::MetricsRegistry;
use crate::model::ControllerKind;
use crate::status::{ControllerStatus, StatusResolver};

/// Timing knobs for convergence checks
#[derive(Debug, Clone)]
pub struct ConvergenceConfig {
    /// Multiple of the derived wait timeout allowed for recovery
    pub timeout_multiplier: u64,
    /// Delay between two status polls
    pub poll_interval: Duration,
    /// Extra wait after a deletion on top of the pod's grace period
    pub deletion_margin: Duration,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            timeout_multiplier: 2,
            poll_interval: Duration::from_secs(1),
            deletion_margin: Duration::from_secs(1),
        }
    }
}

/// Bounded-wait poller over a [`StatusResolver`]
#[derive(Clone)]
pub struct ConvergencePoller {
    resolver: StatusResolver,
    config: ConvergenceConfig,
    metrics: Arc<MetricsRegistry>,
}

impl ConvergencePoller {
    pub fn new(
        resolver: StatusResolver,
        config: ConvergenceConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            resolver,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    /// Wait until the controller converges or its budget is exhausted
    ///
    /// Returns `Ok(true)` on convergence, `Ok(false)` on timeout or for
    /// kinds whose status cannot be observed.
    pub async fn wait_for_convergence(
        &self,
        namespace: &str,
        name: &str,
        kind: &ControllerKind,
    ) -> Result<bool, ClusterError> {
        let start = Instant::now();

        let status = self.fetch(namespace, name, kind).await?;
        info!(
            namespace,
            controller = name,
            kind = %kind,
            want = status.desired,
            ready = status.ready,
            available = status.available,
            "Current controller state"
        );

        if !status.supported {
            self.metrics
                .observe_convergence_wait(false, start.elapsed().as_secs_f64());
            return Ok(false);
        }

        let budget = status.wait_timeout.saturating_mul(self.config.timeout_multiplier);
        let max_wait = self
            .config
            .poll_interval
            .saturating_mul(u32::try_from(budget).unwrap_or(u32::MAX));
        debug!(
            namespace,
            controller = name,
            polls = budget,
            max_wait = %humantime::format_duration(max_wait),
            "Waiting for controller to stabilize"
        );

        let converged = if budget == 0 {
            status.is_converged()
        } else {
            self.poll(namespace, name, kind, budget).await?
        };

        self.metrics
            .observe_convergence_wait(converged, start.elapsed().as_secs_f64());
        Ok(converged)
    }

    async fn poll(
        &self,
        namespace: &str,
        name: &str,
        kind: &ControllerKind,
        budget: u64,
    ) -> Result<bool, ClusterError> {
        let mut remaining = budget;
        while remaining > 0 {
            let status = self.fetch(namespace, name, kind).await?;
            if status.is_converged() {
                return Ok(true);
            }
            debug!(namespace, controller = name, remaining, %status, "Controller not converged");
            tokio::time::sleep(self.config.poll_interval).await;
            remaining -= 1;
        }
        Ok(false)
    }

    async fn fetch(
        &self,
        namespace: &str,
        name: &str,
        kind: &ControllerKind,
    ) -> Result<ControllerStatus, ClusterError> {
        self.metrics.inc_poll(kind.as_str());
        self.resolver.resolve(namespace, name, kind).await
    }
}
