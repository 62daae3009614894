//! Worker process management: spawn the benchmark worker with the run's
//! environment and hand out its output streams.
//!
//! The worker is a shell command (by default `pnpm run-tests`) that prints
//! protocol events on stdout and free-form diagnostics on stderr. Both pipes
//! must be drained by the caller, otherwise a chatty worker blocks on a full
//! pipe buffer and the run stalls.

use crate::config::{RunConfig, WorkerConfig};
use crate::error::{BenchError, Result};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info};

/// Mode flag that switches the worker to event output.
pub const TUI_MODE_VAR: &str = "TUI_MODE";
pub const DEBUG_MODE_VAR: &str = "DEBUG_MODE";
pub const DEBUG_PROVIDER_VAR: &str = "DEBUG_PROVIDER";
pub const DEBUG_MODEL_VAR: &str = "DEBUG_MODEL";
pub const DEBUG_SAMPLES_VAR: &str = "DEBUG_SAMPLES";
pub const PARALLEL_VAR: &str = "PARALLEL_EXECUTION";

const REDACTED: &str = "***";

/// How the worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Success,
    Failed { status: ExitStatus },
}

impl WorkerExit {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<ExitStatus> for WorkerExit {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            Self::Success
        } else {
            Self::Failed { status }
        }
    }
}

/// A running benchmark worker.
///
/// Killed on drop. Stdout and stderr can each be taken exactly once.
pub struct WorkerProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl WorkerProcess {
    /// Start the worker for `run`.
    ///
    /// Fails immediately with [`BenchError::Launch`] if the command cannot be
    /// spawned; no events are produced in that case.
    pub fn spawn(config: &WorkerConfig, run: &RunConfig) -> Result<Self> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&config.command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &config.working_dir {
            if !dir.as_os_str().is_empty() {
                cmd.current_dir(dir);
            }
        }

        let env = Self::environment(run);
        cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        for (key, value) in Self::redacted_env(run) {
            debug!("worker env {key}={value}");
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| BenchError::launch(config.command.clone(), e))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        info!(
            command = %config.command,
            provider = %run.provider,
            model = %run.model,
            samples = run.samples,
            parallel = run.parallel,
            pid = child.id(),
            "worker started"
        );

        Ok(Self {
            child,
            stdout,
            stderr,
        })
    }

    /// Variables added on top of the inherited environment, secrets included.
    pub fn environment(run: &RunConfig) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = run
            .secrets
            .iter()
            .map(|(key, value)| (key.clone(), value.expose().to_string()))
            .collect();

        env.push((TUI_MODE_VAR.into(), "true".into()));
        env.push((DEBUG_MODE_VAR.into(), "true".into()));
        env.push((DEBUG_PROVIDER_VAR.into(), run.provider.clone()));
        env.push((DEBUG_MODEL_VAR.into(), run.model.clone()));
        env.push((DEBUG_SAMPLES_VAR.into(), run.samples.to_string()));
        if run.parallel {
            env.push((PARALLEL_VAR.into(), "true".into()));
        }
        env
    }

    /// Same as [`environment`](Self::environment) with secret values masked.
    /// This is the only form that may be logged or written anywhere.
    pub fn redacted_env(run: &RunConfig) -> Vec<(String, String)> {
        Self::environment(run)
            .into_iter()
            .map(|(key, value)| {
                if run.secrets.contains_key(&key) {
                    (key, REDACTED.to_string())
                } else {
                    (key, value)
                }
            })
            .collect()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> Result<WorkerExit> {
        let status = self.child.wait().await?;
        Ok(status.into())
    }

    /// Ask the process to terminate. Does not wait.
    pub fn start_kill(&mut self) {
        // Fails only when the child already exited.
        let _ = self.child.start_kill();
    }
}
