//! Pod memory usage from the `metrics.k8s.io` API

use async_trait::async_trait;
use nedry_core::cluster::{ClusterError, MetricsSource, PodMemoryUsage};
use tracing::debug;

use crate::client::K8sClient;
use crate::convert;
use crate::operator::map_error;

/// Reads PodMetrics published by metrics-server
pub struct PodMetricsSource {
    client: K8sClient,
}

impl PodMetricsSource {
    pub fn new(client: K8sClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricsSource for PodMetricsSource {
    async fn pod_memory(&self) -> Result<PodMemoryUsage, ClusterError> {
        let objects = self
            .client
            .list_pod_metrics()
            .await
            .map_err(|e| map_error("list pod metrics".to_string(), e))?;
        debug!(count = objects.len(), "Fetched pod metrics");
        Ok(convert::pod_memory_usage(&objects))
    }
}
