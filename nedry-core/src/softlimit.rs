//! Soft memory limit enforcement
//!
//! Pods may declare a soft memory ceiling through an annotation. Pods
//! observed above their ceiling are evicted with the same safe protocol used
//! for draining; pods without metrics are left alone.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cluster::{MetricsSource, PodMemoryUsage};
use crate::eviction::{EvictionOutcome, SafeEvictor};
use crate::metrics::MetricsRegistry;
use crate::model::{PodRef, PodSnapshot};
use crate::quantity::parse_bytes;
use crate::selection::NodeSelector;

/// Verdict for one pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoftLimitVerdict {
    WithinLimit,
    OverLimitEvict,
}

impl SoftLimitVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoftLimitVerdict::WithinLimit => "within-limit",
            SoftLimitVerdict::OverLimitEvict => "over-limit-evict",
        }
    }
}

/// Observed memory compared against the annotated limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftLimitDecision {
    pub pod: PodRef,
    pub observed_bytes: u64,
    pub limit_bytes: u64,
    pub verdict: SoftLimitVerdict,
}

/// Pure comparison of pods against their soft limits
#[derive(Debug, Clone)]
pub struct SoftLimitEvaluator {
    annotation: String,
}

impl SoftLimitEvaluator {
    pub fn new(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
        }
    }

    /// Decide for a single pod
    ///
    /// `None` when the pod has no soft limit, the limit cannot be parsed, or
    /// no metrics were reported for it.
    pub fn evaluate(&self, pod: &PodSnapshot, usage: &PodMemoryUsage) -> Option<SoftLimitDecision> {
        let raw = pod.annotations.get(&self.annotation)?;
        let limit_bytes = match parse_bytes(raw) {
            Ok(limit) => limit,
            Err(e) => {
                warn!(
                    namespace = %pod.namespace,
                    pod = %pod.name,
                    value = %raw,
                    error = %e,
                    "Ignoring unparseable soft limit"
                );
                return None;
            }
        };

        let observed_bytes = *usage.get(&pod.namespace)?.get(&pod.name)?;
        let verdict = if observed_bytes > limit_bytes {
            SoftLimitVerdict::OverLimitEvict
        } else {
            SoftLimitVerdict::WithinLimit
        };

        Some(SoftLimitDecision {
            pod: pod.pod_ref(),
            observed_bytes,
            limit_bytes,
            verdict,
        })
    }
}

/// A decision together with the eviction it triggered
#[derive(Debug, Clone, Serialize)]
pub struct SoftLimitResult {
    pub decision: SoftLimitDecision,
    pub eviction: Option<EvictionOutcome>,
}

/// Summary of one soft-limit pass
#[derive(Debug, Clone, Serialize)]
pub struct SoftLimitReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<SoftLimitResult>,
}

impl SoftLimitReport {
    pub fn over_limit(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.decision.verdict == SoftLimitVerdict::OverLimitEvict)
            .count()
    }
}

/// Runs the soft-limit policy over every pod in the cluster
pub struct SoftLimitEnforcer {
    selector: Arc<NodeSelector>,
    metrics_source: Arc<dyn MetricsSource>,
    evictor: SafeEvictor,
    evaluator: SoftLimitEvaluator,
    metrics: Arc<MetricsRegistry>,
}

impl SoftLimitEnforcer {
    pub fn new(
        selector: Arc<NodeSelector>,
        metrics_source: Arc<dyn MetricsSource>,
        evictor: SafeEvictor,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let evaluator = SoftLimitEvaluator::new(&selector.config().annotations.soft_limit);
        Self {
            selector,
            metrics_source,
            evictor,
            evaluator,
            metrics,
        }
    }

    /// Run one pass, evicting pods over their soft limit
    pub async fn run(&self) -> Result<SoftLimitReport> {
        let started_at = Utc::now();

        debug!("Fetching pods");
        let pods = self.selector.all_pods().await?;
        debug!("Fetching metrics");
        let usage = self
            .metrics_source
            .pod_memory()
            .await
            .context("Failed to fetch pod memory metrics")?;

        let mut results = Vec::new();
        for pod in &pods {
            let Some(decision) = self.evaluator.evaluate(pod, &usage) else {
                continue;
            };
            self.metrics.inc_softlimit_decision(decision.verdict.as_str());

            let eviction = match decision.verdict {
                SoftLimitVerdict::OverLimitEvict => {
                    warn!(
                        pod = %decision.pod,
                        observed = decision.observed_bytes,
                        limit = decision.limit_bytes,
                        "Over soft limit, soft kill"
                    );
                    let outcome = self
                        .evictor
                        .evict(pod)
                        .await
                        .with_context(|| format!("Failed to evict pod {}", decision.pod))?;
                    Some(outcome)
                }
                SoftLimitVerdict::WithinLimit => {
                    info!(
                        pod = %decision.pod,
                        observed = decision.observed_bytes,
                        limit = decision.limit_bytes,
                        "Within soft limit, no action"
                    );
                    None
                }
            };

            results.push(SoftLimitResult { decision, eviction });
        }

        Ok(SoftLimitReport {
            started_at,
            finished_at: Utc::now(),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::cluster::MockCluster;
    use crate::model::{ControllerKind, ControllerObservation, OwnerRef, PodTemplate};
    use crate::poller::{ConvergenceConfig, ConvergencePoller};
    use crate::selection::SelectionConfig;
    use crate::status::StatusResolver;

    const MI: u64 = 1024 * 1024;

    fn pod(name: &str, limit: Option<&str>) -> PodSnapshot {
        let mut annotations = BTreeMap::new();
        if let Some(limit) = limit {
            annotations.insert("nedry-v1/limit".to_string(), limit.to_string());
        }
        PodSnapshot {
            namespace: "web".to_string(),
            name: name.to_string(),
            node_name: Some("node-1".to_string()),
            owner: Some(OwnerRef {
                kind: ControllerKind::ReplicaSet,
                name: "frontend".to_string(),
            }),
            template: PodTemplate::default(),
            annotations,
        }
    }

    fn usage(entries: &[(&str, u64)]) -> PodMemoryUsage {
        let mut usage = PodMemoryUsage::new();
        for (name, bytes) in entries {
            usage
                .entry("web".to_string())
                .or_default()
                .insert(name.to_string(), *bytes);
        }
        usage
    }

    #[test]
    fn test_evaluate_verdicts() {
        let evaluator = SoftLimitEvaluator::new("nedry-v1/limit");
        let usage = usage(&[("hungry", 600 * MI), ("modest", 400 * MI), ("exact", 512 * MI)]);

        let over = evaluator.evaluate(&pod("hungry", Some("512Mi")), &usage).unwrap();
        assert_eq!(over.verdict, SoftLimitVerdict::OverLimitEvict);
        assert_eq!(over.limit_bytes, 512 * MI);

        let within = evaluator.evaluate(&pod("modest", Some("512Mi")), &usage).unwrap();
        assert_eq!(within.verdict, SoftLimitVerdict::WithinLimit);

        let exact = evaluator.evaluate(&pod("exact", Some("512Mi")), &usage).unwrap();
        assert_eq!(exact.verdict, SoftLimitVerdict::WithinLimit);
    }

    #[test]
    fn test_evaluate_without_verdict() {
        let evaluator = SoftLimitEvaluator::new("nedry-v1/limit");
        let usage = usage(&[("unlimited", 900 * MI), ("garbled", 900 * MI)]);

        assert!(evaluator.evaluate(&pod("no-metrics", Some("512Mi")), &usage).is_none());
        assert!(evaluator.evaluate(&pod("unlimited", None), &usage).is_none());
        assert!(evaluator.evaluate(&pod("garbled", Some("lots")), &usage).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enforcer_evicts_only_over_limit_pods() {
        let mock = Arc::new(MockCluster::with_objects(
            Vec::new(),
            vec![
                pod("hungry", Some("512Mi")),
                pod("modest", Some("512Mi")),
                pod("no-metrics", Some("512Mi")),
                pod("unlimited", None),
            ],
        ));
        mock.set_controller(
            "web",
            "frontend",
            ControllerObservation::ReplicaSet {
                desired_replicas: 4,
                ready_replicas: 4,
                available_replicas: 4,
                template: PodTemplate::default(),
            },
        )
        .await;
        mock.set_pod_memory("web", "hungry", 600 * MI).await;
        mock.set_pod_memory("web", "modest", 400 * MI).await;
        mock.set_pod_memory("web", "unlimited", 4096 * MI).await;

        let metrics = Arc::new(MetricsRegistry::new());
        let poller = ConvergencePoller::new(
            StatusResolver::new(mock.clone()),
            ConvergenceConfig::default(),
            metrics.clone(),
        );
        let evictor = SafeEvictor::new(mock.clone(), poller, metrics.clone());
        let selector = Arc::new(NodeSelector::new(mock.clone(), SelectionConfig::default()));
        let enforcer = SoftLimitEnforcer::new(selector, mock.clone(), evictor, metrics);

        let report = enforcer.run().await.unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.over_limit(), 1);
        assert_eq!(
            mock.deleted_pods().await,
            vec![("web".to_string(), "hungry".to_string())]
        );
        let hungry = &report.results[0];
        assert_eq!(hungry.decision.pod.name, "hungry");
        assert_eq!(hungry.eviction, Some(EvictionOutcome::Succeeded));
        assert!(report.results[1].eviction.is_none());
    }
}
