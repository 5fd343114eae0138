//! Console summaries printed after each command

use std::time::Duration;

use chrono::{DateTime, Utc};
use colored::Colorize;
use nedry_core::drain::DrainReport;
use nedry_core::softlimit::{SoftLimitReport, SoftLimitVerdict};

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Wall-clock span of a pass, whole seconds
pub fn format_elapsed(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> String {
    let secs = (finished_at - started_at).num_seconds().max(0) as u64;
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

/// Color an eviction outcome label
pub fn color_outcome(outcome: &str) -> String {
    match outcome {
        "succeeded" => outcome.green().to_string(),
        "skipped-orphan" => outcome.blue().to_string(),
        "pre-check-timeout" | "deleted-post-check-timeout" => outcome.yellow().to_string(),
        "failed" => outcome.red().to_string(),
        _ => outcome.to_string(),
    }
}

pub fn print_drain_summary(report: &DrainReport) {
    if report.nodes.is_empty() {
        print_info("No cordoned nodes annotated for draining");
        return;
    }

    println!(
        "{} {} node(s), {} pod(s) in {}",
        "Drain:".bold(),
        report.nodes.len(),
        report.results.len(),
        format_elapsed(report.started_at, report.finished_at)
    );
    for result in &report.results {
        match &result.outcome {
            Ok(outcome) => println!(
                "  {:<48} {}",
                result.pod.to_string(),
                color_outcome(outcome.as_str())
            ),
            Err(message) => println!(
                "  {:<48} {} ({})",
                result.pod.to_string(),
                color_outcome("failed"),
                message
            ),
        }
    }

    let counts = report.counts();
    let line = counts
        .iter()
        .map(|(label, count)| format!("{}={}", color_outcome(label), count))
        .collect::<Vec<_>>()
        .join(" ");
    let clean = counts
        .keys()
        .all(|label| *label == "succeeded" || *label == "skipped-orphan");
    if clean {
        print_success(&line);
    } else {
        print_warning(&line);
    }
}

pub fn print_softlimit_summary(report: &SoftLimitReport) {
    if report.results.is_empty() {
        print_info("No pods with a soft limit and reported metrics");
        return;
    }

    println!(
        "{} {} pod(s) checked, {} over limit in {}",
        "Soft limit:".bold(),
        report.results.len(),
        report.over_limit(),
        format_elapsed(report.started_at, report.finished_at)
    );
    for result in &report.results {
        let decision = &result.decision;
        let usage = format!(
            "{} / {}",
            format_bytes(decision.observed_bytes),
            format_bytes(decision.limit_bytes)
        );
        let status = match (decision.verdict, &result.eviction) {
            (SoftLimitVerdict::WithinLimit, _) => "within-limit".green().to_string(),
            (SoftLimitVerdict::OverLimitEvict, Some(outcome)) => color_outcome(outcome.as_str()),
            (SoftLimitVerdict::OverLimitEvict, None) => "over-limit".red().to_string(),
        };
        println!("  {:<48} {:<22} {}", decision.pod.to_string(), usage, status);
    }
}
