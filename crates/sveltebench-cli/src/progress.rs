//! Indicatif-based progress display for the CLI.
//!
//! One bar per test plus an overall bar carrying the ETA. Every event goes
//! through the [`ProgressAggregator`] first; bars only mirror its state.

use crate::formatting::{format_duration, format_eta, format_pass_rate, print_summary};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;
use sveltebench_core::config::RunConfig;
use sveltebench_core::progress::{RunSnapshot, TestState, TestStatus};
use sveltebench_core::{BenchmarkEvent, ProgressAggregator};

const TICK: Duration = Duration::from_millis(100);

pub struct ProgressDisplay {
    multi: MultiProgress,
    overall: ProgressBar,
    bars: HashMap<String, ProgressBar>,
    aggregator: ProgressAggregator,
    dropped: u64,
}

impl ProgressDisplay {
    pub fn new(run: &RunConfig, tests: &[String]) -> Self {
        let aggregator = ProgressAggregator::new(tests.iter().cloned(), run.samples);

        println!(
            "{} Running {} on {} ({} tests x {} samples{})",
            style("→").cyan().bold(),
            style(&run.model).bold(),
            run.provider,
            tests.len(),
            run.samples,
            if run.parallel { ", parallel" } else { "" }
        );

        let multi = MultiProgress::new();
        let name_width = tests.iter().map(|t| t.len()).max().unwrap_or(10).max(7);

        let overall = multi.add(ProgressBar::new(aggregator.total_samples()));
        overall.set_style(bar_style(name_width, "green/white"));
        overall.set_prefix("overall");
        overall.enable_steady_tick(TICK);

        let mut bars = HashMap::new();
        for test in aggregator.tests_in_order() {
            let bar = multi.add(ProgressBar::new(u64::from(test.total)));
            bar.set_style(bar_style(name_width, "cyan/blue"));
            bar.set_prefix(test.name.clone());
            bar.set_message(test_message(test));
            bars.insert(test.name.clone(), bar);
        }

        let mut display = Self {
            multi,
            overall,
            bars,
            aggregator,
            dropped: 0,
        };
        display.aggregator.start();
        display.refresh(0);
        display
    }

    pub fn handle_event(&mut self, event: BenchmarkEvent) {
        if let BenchmarkEvent::RateLimit { retry_after } = &event {
            self.note(format!(
                "{} Rate limited, retrying in {retry_after}s",
                style("⚠").yellow().bold()
            ));
        }

        let test = event.test().map(String::from);
        if !self.aggregator.apply(event) {
            return;
        }
        match test {
            Some(name) => self.sync_test(&name),
            None => {
                let names: Vec<String> = self.bars.keys().cloned().collect();
                for name in names {
                    self.sync_test(&name);
                }
            }
        }
        self.overall.set_position(self.aggregator.completed_samples());
    }

    /// Periodic update of the overall line with elapsed time and ETA.
    pub fn refresh(&mut self, dropped: u64) {
        if dropped > self.dropped {
            self.note(format!(
                "{} Event queue full, {} progress event(s) dropped",
                style("⚠").yellow(),
                dropped - self.dropped
            ));
            self.dropped = dropped;
        }
        self.overall.set_position(self.aggregator.completed_samples());
        self.overall.set_message(format!(
            "{} {} {}",
            style(format_duration(self.aggregator.elapsed())).dim(),
            style("ETA").dim(),
            format_eta(self.aggregator.eta())
        ));
    }

    /// The event stream closed.
    pub fn finish(mut self, dropped: u64) -> RunSnapshot {
        self.aggregator.finish();
        self.close(dropped)
    }

    /// The user interrupted the run.
    pub fn cancel(mut self, dropped: u64) -> RunSnapshot {
        self.aggregator.cancel();
        self.close(dropped)
    }

    fn close(self, dropped: u64) -> RunSnapshot {
        for bar in self.bars.values() {
            bar.finish_and_clear();
        }
        self.overall.finish_and_clear();
        let snapshot = self.aggregator.snapshot();
        print_summary(&snapshot, dropped);
        snapshot
    }

    fn sync_test(&self, name: &str) {
        let (Some(bar), Some(state)) = (self.bars.get(name), self.aggregator.test(name)) else {
            return;
        };
        bar.set_length(u64::from(state.total));
        bar.set_position(u64::from(state.current.min(state.total)));
        bar.set_message(test_message(state));
        match state.status {
            TestStatus::Running | TestStatus::RateLimited => bar.enable_steady_tick(TICK),
            TestStatus::Completed | TestStatus::Failed => bar.disable_steady_tick(),
            TestStatus::Queued => {}
        }
    }

    /// Print above the bars. Also works when the bars are hidden.
    fn note(&self, line: String) {
        self.multi.suspend(|| println!("{line}"));
    }
}

fn bar_style(name_width: usize, colors: &str) -> ProgressStyle {
    ProgressStyle::with_template(&format!(
        "{{spinner:.green}} {{prefix:<{name_width}}} [{{bar:30.{colors}}}] {{pos}}/{{len}} {{msg}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▓▒░  ")
}

fn test_message(state: &TestState) -> String {
    match state.status {
        TestStatus::Queued => style("queued").dim().to_string(),
        TestStatus::Running => style("running").cyan().to_string(),
        TestStatus::RateLimited => match state.retry_after {
            Some(secs) => style(format!("rate limited ({secs}s)")).yellow().to_string(),
            None => style("rate limited").yellow().to_string(),
        },
        TestStatus::Completed => format!(
            "{} pass@1 {}",
            if state.passed {
                style("✓").green()
            } else {
                style("✗").red()
            },
            format_pass_rate(state.pass_at_one)
        ),
        TestStatus::Failed => style("✗ failed").red().to_string(),
    }
}
