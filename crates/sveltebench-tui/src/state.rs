//! Application state management
//!
//! Single-owner state, updated from bridge events and rendered immutably.

use std::collections::VecDeque;
use sveltebench_core::progress::{RunOutcome, RunSnapshot};
use sveltebench_core::{BenchmarkEvent, ProgressAggregator};

/// Maximum events to keep in the log
const MAX_EVENTS: usize = 500;

/// Event log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: LogLevel,
    pub test: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warning,
}

/// Current view mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Results,
}

/// Main application state
pub struct AppState {
    pub provider: String,
    pub model: String,
    pub progress: ProgressAggregator,

    // Event log
    pub events: VecDeque<LogEntry>,
    /// Progress events the bridge discarded because the queue was full.
    pub dropped_events: u64,

    // UI state
    pub view: View,
    pub selected_index: usize,
    pub exit_requested: bool,
}

impl AppState {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        tests: &[String],
        samples: u32,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            progress: ProgressAggregator::new(tests.iter().cloned(), samples),
            events: VecDeque::with_capacity(MAX_EVENTS),
            dropped_events: 0,
            view: View::Dashboard,
            selected_index: 0,
            exit_requested: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.progress.is_running()
    }

    pub fn outcome(&self) -> &RunOutcome {
        self.progress.outcome()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.progress.snapshot()
    }

    pub fn test_count(&self) -> usize {
        self.progress.tests_in_order().count()
    }

    pub fn add_event(&mut self, level: LogLevel, test: Option<&str>, message: String) {
        let time = chrono::Local::now().format("%H:%M:%S").to_string();
        self.events.push_front(LogEntry {
            time,
            level,
            test: test.map(String::from),
            message,
        });
        while self.events.len() > MAX_EVENTS {
            self.events.pop_back();
        }
    }

    /// Process a bridge event. Events after the run ended are neither logged
    /// nor applied.
    pub fn handle_event(&mut self, event: BenchmarkEvent) {
        if !self.is_running() {
            return;
        }
        match &event {
            BenchmarkEvent::TestStart { test, .. } => {
                if self.progress.test(test).is_some() {
                    self.add_event(LogLevel::Info, Some(test), "started".to_string());
                }
            }
            BenchmarkEvent::SampleProgress { .. } => {}
            BenchmarkEvent::TestComplete {
                test,
                passed,
                pass_at_one,
                ..
            } => {
                let rate = pass_at_one
                    .map(|r| format!(" · pass@1 {:.1}%", r * 100.0))
                    .unwrap_or_default();
                let (level, status) = if *passed {
                    (LogLevel::Success, "passed")
                } else {
                    (LogLevel::Error, "failed")
                };
                self.add_event(level, Some(test), format!("{status}{rate}"));
            }
            BenchmarkEvent::RateLimit { retry_after } => {
                self.add_event(
                    LogLevel::Warning,
                    None,
                    format!("Rate limited, retrying in {retry_after}s"),
                );
            }
            BenchmarkEvent::Error { test, error } => {
                self.add_event(LogLevel::Error, test.as_deref(), error.clone());
            }
            BenchmarkEvent::Complete { results_saved } => {
                let msg = match results_saved {
                    Some(path) => format!("Run completed · results saved to {path}"),
                    None => "Run completed".to_string(),
                };
                self.add_event(LogLevel::Info, None, msg);
            }
        }

        self.progress.apply(event);
        if !self.is_running() {
            self.view = View::Results;
        }
    }

    /// The bridge queue closed: no more events will arrive.
    pub fn on_stream_closed(&mut self) {
        if !self.is_running() {
            return;
        }
        self.progress.finish();
        self.add_event(
            LogLevel::Warning,
            None,
            "Worker exited without reporting completion".to_string(),
        );
        self.view = View::Results;
    }

    pub fn cancel(&mut self) {
        if !self.is_running() {
            return;
        }
        self.progress.cancel();
        self.add_event(LogLevel::Warning, None, "Run cancelled".to_string());
    }

    /// Record the bridge's dropped-event counter, logging any increase.
    pub fn set_dropped(&mut self, dropped: u64) {
        if dropped > self.dropped_events {
            let missed = dropped - self.dropped_events;
            self.dropped_events = dropped;
            self.add_event(
                LogLevel::Warning,
                None,
                format!("Missed {missed} events (queue full)"),
            );
        }
    }
}
