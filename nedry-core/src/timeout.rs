//! Recovery time estimation
//!
//! Bounds how long a controller may legitimately take to restore full
//! availability after losing one pod, derived from probe configuration.

use crate::model::{PodTemplate, ProbeSpec};

/// Worst-case seconds until a probe can first report success
///
/// `initial_delay + success_threshold * (timeout + period)`
pub fn probe_timeout(probe: &ProbeSpec) -> u64 {
    let per_attempt = u64::from(probe.timeout_seconds) + u64::from(probe.period_seconds);
    u64::from(probe.initial_delay_seconds) + u64::from(probe.success_threshold) * per_attempt
}

/// Worst-case seconds for a controller to become fully available again
///
/// Termination grace period plus the slowest probe of any container. A
/// template without probes contributes no probe-based wait.
pub fn controller_timeout(template: &PodTemplate) -> u64 {
    let slowest_probe = template
        .containers
        .iter()
        .flat_map(|c| [c.liveness.as_ref(), c.readiness.as_ref()])
        .flatten()
        .map(probe_timeout)
        .max()
        .unwrap_or(0);

    template.termination_grace_period_seconds + slowest_probe
}
