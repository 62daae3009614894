//! Plain-text output for run summaries and listings.

use console::style;
use std::time::Duration;
use sveltebench_core::catalog::Model;
use sveltebench_core::progress::{Eta, RunOutcome, RunSnapshot, TestState, TestStatus};
use sveltebench_core::providers::Provider;

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

pub fn format_eta(eta: Eta) -> String {
    match eta {
        Eta::Starting => "calculating...".to_string(),
        Eta::Remaining(d) => format!("~{}", format_duration(d)),
        Eta::Done => "done".to_string(),
    }
}

pub fn format_pass_rate(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

pub fn status_label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Queued => "queued",
        TestStatus::Running => "running",
        TestStatus::RateLimited => "rate limited",
        TestStatus::Completed => "completed",
        TestStatus::Failed => "failed",
    }
}

// Run summary

pub fn print_summary(snapshot: &RunSnapshot, dropped: u64) {
    let status = match &snapshot.outcome {
        RunOutcome::Succeeded => style("COMPLETED").green().bold(),
        RunOutcome::Incomplete => style("INCOMPLETE").yellow().bold(),
        RunOutcome::Cancelled => style("CANCELLED").yellow().bold(),
        RunOutcome::Failed(_) => style("FAILED").red().bold(),
        RunOutcome::Running => style("RUNNING").cyan().bold(),
    };

    println!();
    println!("Run {status}");
    println!();

    if let Some(tests) = summary_table(snapshot) {
        print_test_table(tests);
        println!();
    }

    println!(
        "  {} {}/{} samples",
        style("Progress:").dim(),
        snapshot.completed_samples,
        snapshot.total_samples
    );
    let tests = &snapshot.tests;
    let passed = tests.iter().filter(|t| t.passed).count();
    let finished = tests.iter().filter(|t| t.status.is_finished()).count();
    println!(
        "  {} {}/{} tests",
        style("Passed:").dim(),
        style(passed).green(),
        finished
    );
    println!(
        "  {} {}",
        style("Duration:").dim(),
        format_duration(snapshot.elapsed)
    );
    if let Some(path) = &snapshot.results_saved {
        println!("  {} {}", style("Results:").dim(), path);
    }
    if dropped > 0 {
        println!(
            "  {} {} progress event(s) dropped, counts may lag",
            style("⚠").yellow(),
            dropped
        );
    }
    if !snapshot.is_authoritative() {
        println!(
            "  {} worker exited without confirming completion, results may be partial",
            style("⚠").yellow()
        );
    }
    if let Some(error) = &snapshot.error {
        println!("  {} {}", style("Error:").red().bold(), error);
    }
    println!();
}

/// Rows for the per-test table. A cancelled run reports counts only; its bars
/// already showed the per-test state.
fn summary_table(snapshot: &RunSnapshot) -> Option<&[TestState]> {
    match (&snapshot.results, &snapshot.outcome) {
        (Some(results), _) => Some(results.as_slice()),
        (None, RunOutcome::Failed(_)) => Some(snapshot.tests.as_slice()),
        _ => None,
    }
}

fn print_test_table(tests: &[TestState]) {
    let width = tests.iter().map(|t| t.name.len()).max().unwrap_or(4).max(4);
    println!(
        "  {:<width$}  {:<12} {:>9} {:>8} {:>8}",
        "test", "status", "samples", "pass@1", "pass@10"
    );
    for t in tests {
        println!(
            "  {:<width$}  {:<12} {:>9} {:>8} {:>8}",
            t.name,
            status_label(t.status),
            format!("{}/{}", t.current, t.total),
            format_pass_rate(t.pass_at_one),
            format_pass_rate(t.pass_at_ten),
        );
    }
}

// Listings

pub fn print_tests(tests: &[String], discovered: bool) {
    if discovered {
        println!("Tests ({}):", tests.len());
    } else {
        println!("Tests ({}, built-in list):", tests.len());
    }
    for name in tests {
        println!("  {name}");
    }
}

pub fn print_providers(providers: &[(&Provider, bool)]) {
    println!("{:<12} {:<22} {:<20} {}", "provider", "name", "key", "models");
    for (p, has_key) in providers {
        let key = if *has_key {
            style(format!("✓ {}", p.env_key)).green()
        } else {
            style(format!("✗ {}", p.env_key)).dim()
        };
        let listing = if p.models_url.is_some() { "yes" } else { "-" };
        println!("{:<12} {:<22} {:<20} {}", p.id, p.display_name, key, listing);
    }
}

pub fn print_models(provider: &Provider, models: &[&Model], total: usize) {
    if models.is_empty() {
        println!("No models found for {}.", provider.display_name);
        return;
    }
    println!(
        "{} models ({} of {}):",
        provider.display_name,
        models.len(),
        total
    );
    let width = models.iter().map(|m| m.id.len()).max().unwrap_or(0);
    for m in models {
        if m.name != m.id {
            println!("  {:<width$}  {}", m.id, style(&m.name).dim());
        } else {
            println!("  {}", m.id);
        }
    }
}
