//! Drain campaign
//!
//! One batch pass: collect every pod on cordoned nodes annotated for
//! draining, shuffle them, and run the safe eviction protocol on each in
//! turn. Evictions never overlap.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{error, info};

use crate::eviction::{EvictionOutcome, SafeEvictor};
use crate::model::PodRef;
use crate::selection::NodeSelector;

/// Drain behaviour knobs
#[derive(Debug, Clone, Default)]
pub struct DrainConfig {
    /// Record API failures per pod and keep going instead of aborting
    pub continue_on_error: bool,
}

/// Result for one pod of a drain pass
#[derive(Debug, Clone, Serialize)]
pub struct PodResult {
    pub pod: PodRef,
    /// `Err` holds the API failure message when `continue_on_error` is set
    pub outcome: Result<EvictionOutcome, String>,
}

/// Summary of a drain pass
#[derive(Debug, Clone, Serialize)]
pub struct DrainReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub nodes: Vec<String>,
    /// Results in eviction order
    pub results: Vec<PodResult>,
}

impl DrainReport {
    /// Number of pods per outcome label, failures under `failed`
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            let label = match &result.outcome {
                Ok(outcome) => outcome.as_str(),
                Err(_) => "failed",
            };
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }
}

/// Node-annotation-driven batch eviction
pub struct DrainCampaign {
    selector: Arc<NodeSelector>,
    evictor: SafeEvictor,
    config: DrainConfig,
}

impl DrainCampaign {
    pub fn new(selector: Arc<NodeSelector>, evictor: SafeEvictor, config: DrainConfig) -> Self {
        Self {
            selector,
            evictor,
            config,
        }
    }

    /// Run one drain pass with the given source of randomness
    pub async fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<DrainReport> {
        let started_at = Utc::now();

        let nodes = self.selector.nodes_to_drain().await?;
        let node_names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
        info!(nodes = ?node_names, "Selected nodes to drain");

        let mut pods = self.selector.pods_on_nodes(&nodes).await?;
        pods.shuffle(rng);
        info!(count = pods.len(), "Rescheduling pods");

        let mut results = Vec::with_capacity(pods.len());
        for pod in &pods {
            let pod_ref = pod.pod_ref();
            let outcome = match self.evictor.evict(pod).await {
                Ok(outcome) => {
                    info!(pod = %pod_ref, outcome = %outcome, "Eviction finished");
                    Ok(outcome)
                }
                Err(e) if self.config.continue_on_error => {
                    error!(pod = %pod_ref, error = %e, "Eviction failed, continuing");
                    Err(e.to_string())
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to evict pod {}", pod_ref));
                }
            };
            results.push(PodResult {
                pod: pod_ref,
                outcome,
            });
        }

        info!("Drain pass done");
        Ok(DrainReport {
            started_at,
            finished_at: Utc::now(),
            nodes: node_names,
            results,
        })
    }
}
