//! CLI argument parsing for Nedry

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Convergence-aware pod eviction for Kubernetes
#[derive(Debug, Parser)]
#[command(name = "nedry")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "/etc/nedry/config.yaml")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "NEDRY_LOG_LEVEL")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long, global = true, default_value = "false", env = "NEDRY_LOG_JSON")]
    pub log_json: bool,

    /// Dry run mode - log deletions but don't execute
    #[arg(long, global = true, default_value = "false")]
    pub dry_run: bool,

    /// Kubeconfig context to use
    #[arg(long, global = true, env = "NEDRY_KUBE_CONTEXT")]
    pub context: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evict pods from cordoned nodes annotated for draining
    Drain {
        /// Seed for the eviction order shuffle
        #[arg(long)]
        seed: Option<u64>,

        /// Keep going when a pod fails with an API error
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Evict pods whose memory usage exceeds their soft limit
    Softlimit,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["nedry", "softlimit"]).unwrap();
        assert_eq!(cli.config.to_str().unwrap(), "/etc/nedry/config.yaml");
        assert_eq!(cli.log_level, "info");
        assert!(!cli.log_json);
        assert!(!cli.dry_run);
        assert!(matches!(cli.command, Command::Softlimit));
    }

    #[test]
    fn test_drain_flags() {
        let cli = Cli::try_parse_from([
            "nedry",
            "drain",
            "--seed",
            "42",
            "--continue-on-error",
            "--dry-run",
        ])
        .unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Command::Drain {
                seed,
                continue_on_error,
            } => {
                assert_eq!(seed, Some(42));
                assert!(continue_on_error);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_custom_config() {
        let cli = Cli::try_parse_from(["nedry", "-c", "/custom/config.yaml", "drain"]).unwrap();
        assert_eq!(cli.config.to_str().unwrap(), "/custom/config.yaml");
        assert!(matches!(cli.command, Command::Drain { seed: None, .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["nedry"]).is_err());
        assert!(Cli::try_parse_from(["nedry", "rebalance"]).is_err());
    }
}
