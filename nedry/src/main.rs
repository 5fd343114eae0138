//! Nedry
//!
//! Convergence-aware pod eviction for Kubernetes. Drains cordoned nodes
//! annotated for draining and soft-kills pods over their annotated memory
//! limit, one pod at a time, never deleting a pod whose controller is not
//! fully available.

mod cli;
mod config;
mod output;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Command};
use config::Config;
use nedry_core::cluster::ClusterClient;
use nedry_core::drain::DrainCampaign;
use nedry_core::eviction::SafeEvictor;
use nedry_core::metrics::MetricsRegistry;
use nedry_core::poller::ConvergencePoller;
use nedry_core::selection::NodeSelector;
use nedry_core::softlimit::SoftLimitEnforcer;
use nedry_core::status::StatusResolver;
use nedry_k8s::{ClusterOperator, K8sClient, PodMetricsSource};

/// Initialize the tracing/logging subsystem
fn init_logging(log_level: &str, json_format: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

/// Load the config file if present and apply CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)
            .with_context(|| format!("Failed to load config from {:?}", cli.config))?
    } else {
        warn!(path = ?cli.config, "Config file not found, using defaults");
        Config::default()
    };

    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.context.is_some() {
        config.kube_context = cli.context.clone();
    }
    if let Command::Drain {
        seed,
        continue_on_error,
    } = &cli.command
    {
        if seed.is_some() {
            config.drain.seed = *seed;
        }
        if *continue_on_error {
            config.drain.continue_on_error = true;
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Components shared by both commands
struct Components {
    client: K8sClient,
    selector: Arc<NodeSelector>,
    evictor: SafeEvictor,
    metrics: Arc<MetricsRegistry>,
}

async fn build(config: &Config) -> Result<Components> {
    let client = match &config.kube_context {
        Some(context) => K8sClient::with_context(context).await?,
        None => K8sClient::new().await?,
    };

    let cluster: Arc<dyn ClusterClient> =
        Arc::new(ClusterOperator::new(client.clone(), config.dry_run));
    let metrics = Arc::new(MetricsRegistry::new());

    let selector = Arc::new(NodeSelector::new(cluster.clone(), config.selection()));
    let poller = ConvergencePoller::new(
        StatusResolver::new(cluster.clone()),
        config.convergence(),
        metrics.clone(),
    );
    let evictor = SafeEvictor::new(cluster, poller, metrics.clone());

    Ok(Components {
        client,
        selector,
        evictor,
        metrics,
    })
}

/// Write the metrics text exposition, replacing the file atomically
fn write_metrics_textfile(metrics: &MetricsRegistry, path: &Path) -> Result<()> {
    let body = metrics.render().context("Failed to encode metrics")?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, body)
        .with_context(|| format!("Failed to write metrics file: {:?}", tmp))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move metrics file into place: {:?}", path))?;
    info!(path = ?path, "Metrics written");
    Ok(())
}

async fn run_drain(config: &Config, components: &Components) -> Result<()> {
    let seed = config.drain.seed.unwrap_or_else(rand::random);
    info!(
        seed,
        continue_on_error = config.drain.continue_on_error,
        "Starting drain pass"
    );

    let campaign = DrainCampaign::new(
        components.selector.clone(),
        components.evictor.clone(),
        config.drain(),
    );
    let mut rng = StdRng::seed_from_u64(seed);
    let report = campaign.run(&mut rng).await?;

    info!(counts = ?report.counts(), "Drain pass complete");
    output::print_drain_summary(&report);
    Ok(())
}

async fn run_softlimit(components: &Components) -> Result<()> {
    info!("Starting soft-limit pass");

    let metrics_source = Arc::new(PodMetricsSource::new(components.client.clone()));
    let enforcer = SoftLimitEnforcer::new(
        components.selector.clone(),
        metrics_source,
        components.evictor.clone(),
        components.metrics.clone(),
    );
    let report = enforcer.run().await?;

    info!(
        checked = report.results.len(),
        over_limit = report.over_limit(),
        "Soft-limit pass complete"
    );
    output::print_softlimit_summary(&report);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(&cli.log_level, cli.log_json);

    info!(version = env!("CARGO_PKG_VERSION"), "Nedry starting");

    let config = load_config(&cli)?;
    info!(
        dry_run = config.dry_run,
        context = ?config.kube_context,
        "Configuration loaded"
    );

    let components = build(&config).await?;

    let result = match cli.command {
        Command::Drain { .. } => run_drain(&config, &components).await,
        Command::Softlimit => run_softlimit(&components).await,
    };

    if let Some(path) = &config.metrics.textfile_path {
        if let Err(e) = write_metrics_textfile(&components.metrics, path) {
            warn!(error = %e, "Failed to export metrics");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "nedry",
            "-c",
            "/nonexistent/nedry.yaml",
            "--dry-run",
            "--context",
            "staging",
            "drain",
            "--seed",
            "9",
            "--continue-on-error",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.kube_context.as_deref(), Some("staging"));
        assert_eq!(config.drain.seed, Some(9));
        assert!(config.drain().continue_on_error);
    }

    #[test]
    fn test_metrics_textfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nedry.prom");
        let metrics = MetricsRegistry::new();
        metrics.inc_eviction("succeeded");

        write_metrics_textfile(&metrics, &path).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("nedry_evictions_total"));
        assert!(!path.with_extension("prom.tmp").exists());
    }
}
