//! Prometheus metrics for Nedry

use once_cell::sync::Lazy;
use prometheus::{
    opts, register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

/// Eviction outcomes per pod
static EVICTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("nedry_evictions_total", "Total number of eviction attempts by outcome"),
        &["outcome"]
    )
    .expect("Failed to create evictions metric")
});

/// Controller status polls
static CONVERGENCE_POLLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "nedry_convergence_polls_total",
            "Total number of controller status polls"
        ),
        &["kind"]
    )
    .expect("Failed to create convergence_polls metric")
});

/// Time spent waiting for controllers to converge
static CONVERGENCE_WAIT: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "nedry_convergence_wait_seconds",
        "Time spent waiting for a controller to converge",
        &["result"],
        vec![0.0, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]
    )
    .expect("Failed to create convergence_wait metric")
});

/// Soft-limit verdicts
static SOFTLIMIT_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "nedry_softlimit_decisions_total",
            "Total number of soft memory limit verdicts"
        ),
        &["verdict"]
    )
    .expect("Failed to create softlimit_decisions metric")
});

/// Metrics registry wrapper
pub struct MetricsRegistry;

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        // Force initialization of lazy statics
        let _ = &*EVICTIONS;
        let _ = &*CONVERGENCE_POLLS;
        let _ = &*CONVERGENCE_WAIT;
        let _ = &*SOFTLIMIT_DECISIONS;
        Self
    }

    /// Increment the eviction outcome counter
    pub fn inc_eviction(&self, outcome: &str) {
        EVICTIONS.with_label_values(&[outcome]).inc();
    }

    /// Increment the status poll counter
    pub fn inc_poll(&self, kind: &str) {
        CONVERGENCE_POLLS.with_label_values(&[kind]).inc();
    }

    /// Record how long a convergence wait took
    pub fn observe_convergence_wait(&self, converged: bool, duration_secs: f64) {
        let result = if converged { "converged" } else { "timeout" };
        CONVERGENCE_WAIT
            .with_label_values(&[result])
            .observe(duration_secs);
    }

    /// Increment the soft-limit verdict counter
    pub fn inc_softlimit_decision(&self, verdict: &str) {
        SOFTLIMIT_DECISIONS.with_label_values(&[verdict]).inc();
    }

    /// Render all registered metrics in the text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        prometheus::TextEncoder::new().encode_to_string(&prometheus::gather())
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
