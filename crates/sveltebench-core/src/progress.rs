//! Progress aggregation for a benchmark run.
//!
//! Single-owner state fed one [`BenchmarkEvent`] at a time by the UI loop.
//! Nothing here is shared with the bridge tasks.

use crate::protocol::BenchmarkEvent;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

// ============================================================================
// PER-TEST STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestStatus {
    #[default]
    Queued,
    Running,
    RateLimited,
    Completed,
    Failed,
}

impl TestStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestState {
    pub name: String,
    /// Highest sample index seen. Never decreases within a run of the test.
    pub current: u32,
    pub total: u32,
    pub status: TestStatus,
    pub passed: bool,
    pub pass_at_one: Option<f64>,
    pub pass_at_ten: Option<f64>,
    /// Seconds the provider asked us to wait, while rate limited.
    pub retry_after: Option<u64>,
    /// `None` until the first sample after the test started.
    highest_sample: Option<u32>,
}

impl TestState {
    pub fn new(name: impl Into<String>, total: u32) -> Self {
        Self {
            name: name.into(),
            current: 0,
            total,
            status: TestStatus::Queued,
            passed: false,
            pass_at_one: None,
            pass_at_ten: None,
            retry_after: None,
            highest_sample: None,
        }
    }

    fn start(&mut self) -> bool {
        if self.status != TestStatus::Queued {
            return false;
        }
        self.status = TestStatus::Running;
        self.current = 0;
        self.highest_sample = None;
        true
    }

    /// Record a sample. Returns true only for a sample index not seen before;
    /// a replayed index leaves the test untouched.
    fn record_sample(&mut self, sample: u32) -> bool {
        if self.status.is_finished() {
            return false;
        }
        if self.highest_sample.is_some_and(|highest| sample <= highest) {
            return false;
        }

        // Queued means its test_start was dropped under backpressure.
        self.status = TestStatus::Running;
        self.retry_after = None;
        self.highest_sample = Some(sample);
        self.current = self.current.max(sample);
        true
    }

    fn rate_limit(&mut self, retry_after: u64) -> bool {
        if self.status != TestStatus::Running {
            return false;
        }
        self.status = TestStatus::RateLimited;
        self.retry_after = Some(retry_after);
        true
    }

    fn complete(
        &mut self,
        passed: bool,
        total: Option<u32>,
        pass_at_one: Option<f64>,
        pass_at_ten: Option<f64>,
    ) -> bool {
        if self.status.is_finished() {
            return false;
        }
        self.status = if passed {
            TestStatus::Completed
        } else {
            TestStatus::Failed
        };
        self.passed = passed;
        self.pass_at_one = pass_at_one;
        self.pass_at_ten = pass_at_ten;
        self.retry_after = None;
        if let Some(total) = total {
            self.current = self.current.max(total);
        }
        true
    }

    pub fn progress_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64 / self.total as f64).min(1.0)
        }
    }
}

// ============================================================================
// RUN STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunOutcome {
    #[default]
    Running,
    /// The worker sent `complete`.
    Succeeded,
    /// An `error` event ended the run.
    Failed(String),
    /// The worker's output ended without `complete` or `error`. Treated as
    /// success, but the numbers may be partial.
    Incomplete,
    Cancelled,
}

impl RunOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Incomplete)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Remaining time estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eta {
    /// No sample has finished yet.
    Starting,
    Remaining(Duration),
    Done,
}

/// Externally visible result of a run, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub elapsed: Duration,
    pub completed_samples: u64,
    pub total_samples: u64,
    /// Live per-test state, in run order.
    pub tests: Vec<TestState>,
    /// Final per-test state. Only set when the run completed or the worker
    /// exited cleanly; failed and cancelled runs leave it empty.
    pub results: Option<Vec<TestState>>,
    pub results_saved: Option<String>,
    pub error: Option<String>,
    pub outcome: RunOutcome,
}

impl RunSnapshot {
    /// False when the run ended without the worker confirming it.
    pub fn is_authoritative(&self) -> bool {
        !matches!(self.outcome, RunOutcome::Incomplete)
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct ProgressAggregator {
    tests: HashMap<String, TestState>,
    order: Vec<String>,
    completed_samples: u64,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    outcome: RunOutcome,
    results: Option<Vec<TestState>>,
    results_saved: Option<String>,
}

impl ProgressAggregator {
    /// Seed every known test as queued with `samples_per_test` samples.
    pub fn new<I, S>(tests: I, samples_per_test: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for name in tests {
            let name = name.into();
            if map.contains_key(&name) {
                continue;
            }
            map.insert(name.clone(), TestState::new(name.clone(), samples_per_test));
            order.push(name);
        }

        Self {
            tests: map,
            order,
            completed_samples: 0,
            started_at: None,
            finished_at: None,
            outcome: RunOutcome::Running,
            results: None,
            results_saved: None,
        }
    }

    /// Start the elapsed clock. Otherwise it starts with the first event.
    pub fn start(&mut self) {
        self.started_at.get_or_insert_with(Instant::now);
    }

    /// Apply one event. Returns whether any state changed.
    pub fn apply(&mut self, event: BenchmarkEvent) -> bool {
        if self.outcome.is_terminal() {
            debug!(kind = event.kind(), "ignoring event after run ended");
            return false;
        }
        self.start();

        match event {
            BenchmarkEvent::TestStart { test, .. } => {
                self.with_test(&test, TestState::start).unwrap_or(false)
            }

            BenchmarkEvent::SampleProgress { test, sample, .. } => {
                let is_new = self
                    .with_test(&test, |t| t.record_sample(sample))
                    .unwrap_or(false);
                if is_new {
                    self.completed_samples += 1;
                }
                is_new
            }

            BenchmarkEvent::TestComplete {
                test,
                total,
                passed,
                pass_at_one,
                pass_at_ten,
            } => self
                .with_test(&test, |t| t.complete(passed, total, pass_at_one, pass_at_ten))
                .unwrap_or(false),

            BenchmarkEvent::RateLimit { retry_after } => {
                let mut changed = false;
                for state in self.tests.values_mut() {
                    changed |= state.rate_limit(retry_after);
                }
                changed
            }

            BenchmarkEvent::Error { error, .. } => {
                self.finish_with(RunOutcome::Failed(error));
                true
            }

            BenchmarkEvent::Complete { results_saved } => {
                self.results_saved = results_saved;
                self.finish_with(RunOutcome::Succeeded);
                true
            }
        }
    }

    /// The event stream closed. Marks the run incomplete if no terminal
    /// event was seen.
    pub fn finish(&mut self) {
        if !self.outcome.is_terminal() {
            self.finish_with(RunOutcome::Incomplete);
        }
    }

    /// The user tore the run down.
    pub fn cancel(&mut self) {
        if !self.outcome.is_terminal() {
            self.finish_with(RunOutcome::Cancelled);
        }
    }

    /// Results are only captured for runs that ended normally.
    fn finish_with(&mut self, outcome: RunOutcome) {
        if outcome.is_success() {
            self.results = Some(self.tests_in_order().cloned().collect());
        }
        self.outcome = outcome;
        self.finished_at = Some(Instant::now());
    }

    fn with_test<T>(&mut self, name: &str, f: impl FnOnce(&mut TestState) -> T) -> Option<T> {
        match self.tests.get_mut(name) {
            Some(state) => Some(f(state)),
            None => {
                debug!(test = name, "ignoring event for unknown test");
                None
            }
        }
    }

    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    pub fn is_running(&self) -> bool {
        !self.outcome.is_terminal()
    }

    pub fn test(&self, name: &str) -> Option<&TestState> {
        self.tests.get(name)
    }

    pub fn tests_in_order(&self) -> impl Iterator<Item = &TestState> {
        self.order.iter().filter_map(|name| self.tests.get(name))
    }

    pub fn completed_samples(&self) -> u64 {
        self.completed_samples
    }

    pub fn total_samples(&self) -> u64 {
        self.tests.values().map(|t| u64::from(t.total)).sum()
    }

    pub fn progress_pct(&self) -> f64 {
        let total = self.total_samples();
        if total == 0 {
            0.0
        } else {
            (self.completed_samples as f64 / total as f64).min(1.0)
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(start) => self
                .finished_at
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }

    pub fn eta(&self) -> Eta {
        if self.outcome.is_terminal() {
            return Eta::Done;
        }
        self.eta_at(self.elapsed())
    }

    /// Estimate remaining time from the average time per finished sample.
    pub fn eta_at(&self, elapsed: Duration) -> Eta {
        let completed = self.completed_samples;
        let total = self.total_samples();
        if completed == 0 {
            return Eta::Starting;
        }
        if completed >= total {
            return Eta::Done;
        }
        let per_sample = elapsed.as_secs_f64() / completed as f64;
        let remaining = (per_sample * (total - completed) as f64).floor();
        Eta::Remaining(Duration::from_secs(remaining as u64))
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            elapsed: self.elapsed(),
            completed_samples: self.completed_samples,
            total_samples: self.total_samples(),
            tests: self.tests_in_order().cloned().collect(),
            results: self.results.clone(),
            results_saved: self.results_saved.clone(),
            error: self.outcome.error().map(String::from),
            outcome: self.outcome.clone(),
        }
    }
}
