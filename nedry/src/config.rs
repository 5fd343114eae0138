//! Configuration module for Nedry
//!
//! Handles loading and validating configuration from YAML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use nedry_core::drain::DrainConfig;
use nedry_core::model::{
    AnnotationKeys, DEFAULT_ANNOTATION_PREFIX, DEFAULT_WORKER_ROLE_LABEL, DEFAULT_WORKER_ROLE_VALUE,
};
use nedry_core::poller::ConvergenceConfig;
use nedry_core::selection::SelectionConfig;
use serde::{Deserialize, Serialize};

/// Node listing cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCacheConfig {
    /// How long a node listing stays fresh
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub ttl: Duration,

    /// Maximum number of cached listings
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for NodeCacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

/// Convergence polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceSettings {
    /// Poll budget is the derived wait timeout times this factor
    #[serde(default = "default_timeout_multiplier")]
    pub timeout_multiplier: u64,

    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Extra wait after the grace period before the post-check
    #[serde(with = "humantime_serde", default = "default_deletion_margin")]
    pub deletion_margin: Duration,
}

impl Default for ConvergenceSettings {
    fn default() -> Self {
        Self {
            timeout_multiplier: default_timeout_multiplier(),
            poll_interval: default_poll_interval(),
            deletion_margin: default_deletion_margin(),
        }
    }
}

/// Drain campaign configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrainSettings {
    /// Keep draining after a pod fails with an API error
    #[serde(default)]
    pub continue_on_error: bool,

    /// Fixed shuffle seed, random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Metrics export configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Write the text exposition here after each command
    #[serde(default)]
    pub textfile_path: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Prefix shared by the action and soft-limit annotations
    #[serde(default = "default_annotation_prefix")]
    pub annotation_prefix: String,

    #[serde(default = "default_worker_role_label")]
    pub worker_role_label: String,

    #[serde(default = "default_worker_role_value")]
    pub worker_role_value: String,

    #[serde(default)]
    pub node_cache: NodeCacheConfig,

    #[serde(default)]
    pub convergence: ConvergenceSettings,

    #[serde(default)]
    pub drain: DrainSettings,

    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Kubeconfig context, default chain when absent
    #[serde(default)]
    pub kube_context: Option<String>,

    /// Dry run mode - log deletions but don't execute
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            annotation_prefix: default_annotation_prefix(),
            worker_role_label: default_worker_role_label(),
            worker_role_value: default_worker_role_value(),
            node_cache: NodeCacheConfig::default(),
            convergence: ConvergenceSettings::default(),
            drain: DrainSettings::default(),
            metrics: MetricsConfig::default(),
            kube_context: None,
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.annotation_prefix.is_empty() {
            anyhow::bail!("annotation_prefix must not be empty");
        }
        if self.convergence.timeout_multiplier == 0 {
            anyhow::bail!("convergence.timeout_multiplier must be > 0");
        }
        if self.convergence.poll_interval.is_zero() {
            anyhow::bail!("convergence.poll_interval must be > 0");
        }
        if self.node_cache.capacity == 0 {
            anyhow::bail!("node_cache.capacity must be > 0");
        }
        if self.node_cache.ttl.is_zero() {
            anyhow::bail!("node_cache.ttl must be > 0");
        }
        Ok(())
    }

    pub fn selection(&self) -> SelectionConfig {
        SelectionConfig {
            annotations: AnnotationKeys::with_prefix(&self.annotation_prefix),
            worker_role_label: self.worker_role_label.clone(),
            worker_role_value: self.worker_role_value.clone(),
            cache_ttl: self.node_cache.ttl,
            cache_capacity: self.node_cache.capacity,
        }
    }

    pub fn convergence(&self) -> ConvergenceConfig {
        ConvergenceConfig {
            timeout_multiplier: self.convergence.timeout_multiplier,
            poll_interval: self.convergence.poll_interval,
            deletion_margin: self.convergence.deletion_margin,
        }
    }

    pub fn drain(&self) -> DrainConfig {
        DrainConfig {
            continue_on_error: self.drain.continue_on_error,
        }
    }
}

// Default value functions
fn default_annotation_prefix() -> String {
    DEFAULT_ANNOTATION_PREFIX.to_string()
}

fn default_worker_role_label() -> String {
    DEFAULT_WORKER_ROLE_LABEL.to_string()
}

fn default_worker_role_value() -> String {
    DEFAULT_WORKER_ROLE_VALUE.to_string()
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_timeout_multiplier() -> u64 {
    2
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_deletion_margin() -> Duration {
    Duration::from_secs(1)
}
