//! Configuration loading and models for SvelteBench.
//!
//! Configuration is loaded via figment from multiple layers:
//! 1. Built-in defaults
//! 2. YAML file (optional, `${VAR}` interpolation applied first)
//! 3. Environment variables (SVELTEBENCH_ prefix, __ as nested separator)
//! 4. CLI overrides (passed programmatically)
//!
//! API keys are deliberately not part of [`AppConfig`]. They are collected
//! from the process environment into a [`RunConfig`] at run time.

use crate::providers::{Provider, PROVIDERS};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Figment(#[from] figment::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tests shipped with the benchmark, used when none are configured or found.
pub const DEFAULT_TESTS: &[&str] = &[
    "hello-world",
    "counter",
    "derived",
    "derived-by",
    "each",
    "effect",
    "props",
    "snippets",
    "inspect",
];

// ============================================================================
// DEFAULTS (all in one place)
// ============================================================================

fn default_command() -> String {
    "pnpm run-tests".to_string()
}

fn default_queue_capacity() -> usize {
    100
}

fn default_samples() -> u32 {
    10
}

fn default_model_cache_ttl_seconds() -> u64 {
    300
}

// ============================================================================
// WORKER CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Shell command that runs the benchmark worker.
    #[serde(default = "default_command")]
    pub command: String,
    /// Directory the worker runs in. Inherits the current one when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            working_dir: None,
        }
    }
}

// ============================================================================
// BRIDGE CONFIG
// ============================================================================

/// What the bridge does with a decoded event when the queue is full.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the event and keep reading so the worker never stalls.
    #[default]
    Drop,
    /// Wait for the consumer. The worker may block on a full stdout pipe.
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

// ============================================================================
// APP CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Samples generated per test.
    #[serde(default = "default_samples")]
    pub samples: u32,
    #[serde(default)]
    pub parallel: bool,
    /// Tests to track. Empty means discover them from the project.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<String>,
    #[serde(default = "default_model_cache_ttl_seconds")]
    pub model_cache_ttl_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            bridge: BridgeConfig::default(),
            samples: default_samples(),
            parallel: false,
            tests: Vec::new(),
            model_cache_ttl_seconds: default_model_cache_ttl_seconds(),
        }
    }
}

impl AppConfig {
    pub fn model_cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.model_cache_ttl_seconds)
    }
}

// ============================================================================
// CLI OVERRIDES
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub command: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub samples: Option<u32>,
    pub parallel: Option<bool>,
    pub queue_capacity: Option<usize>,
    pub overflow: Option<OverflowPolicy>,
    pub tests: Option<Vec<String>>,
}

impl ConfigOverrides {
    fn to_value(&self) -> Value {
        let mut root = Map::new();

        let mut worker = Map::new();
        if let Some(command) = &self.command {
            worker.insert("command".into(), Value::from(command.clone()));
        }
        if let Some(dir) = &self.working_dir {
            worker.insert(
                "working_dir".into(),
                Value::from(dir.to_string_lossy().into_owned()),
            );
        }
        if !worker.is_empty() {
            root.insert("worker".into(), Value::Object(worker));
        }

        let mut bridge = Map::new();
        if let Some(capacity) = self.queue_capacity {
            bridge.insert("queue_capacity".into(), Value::from(capacity));
        }
        if let Some(policy) = self.overflow {
            bridge.insert(
                "overflow".into(),
                serde_json::to_value(policy).unwrap_or(Value::Null),
            );
        }
        if !bridge.is_empty() {
            root.insert("bridge".into(), Value::Object(bridge));
        }

        if let Some(samples) = self.samples {
            root.insert("samples".into(), Value::from(samples));
        }
        if let Some(parallel) = self.parallel {
            root.insert("parallel".into(), Value::from(parallel));
        }
        if let Some(tests) = &self.tests {
            root.insert("tests".into(), Value::from(tests.clone()));
        }

        Value::Object(root)
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load configuration. A missing file at `path` is not an error; the
/// remaining layers still apply.
pub fn load_config(
    path: impl AsRef<Path>,
    overrides: ConfigOverrides,
) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

    let path = path.as_ref();
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let interpolated = interpolate_env_vars(&contents);
        figment = figment.merge(Yaml::string(&interpolated));
    }

    figment = figment
        .merge(Env::prefixed("SVELTEBENCH_").split("__"))
        .merge(Serialized::defaults(overrides.to_value()));

    let cfg: AppConfig = figment.extract()?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn interpolate_env_vars(input: &str) -> String {
    use once_cell::sync::Lazy;
    use regex::Regex;
    use std::env;

    static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid regex")
    });

    ENV_VAR_RE
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_val = caps.get(2).map(|m| m.as_str());
            match env::var(var_name) {
                Ok(val) => val,
                Err(_) => default_val.unwrap_or("").to_string(),
            }
        })
        .to_string()
}

fn validate_config(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.worker.command.trim().is_empty() {
        return Err(ConfigError::Invalid("worker command must not be empty".into()));
    }
    if cfg.bridge.queue_capacity == 0 {
        return Err(ConfigError::Invalid("bridge.queue_capacity must be at least 1".into()));
    }
    if cfg.samples == 0 {
        return Err(ConfigError::Invalid("samples must be at least 1".into()));
    }
    if cfg.tests.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::Invalid("test names must not be empty".into()));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = cfg.tests.iter().find(|t| !seen.insert(t.as_str())) {
        return Err(ConfigError::Invalid(format!("duplicate test name: {dup}")));
    }
    Ok(())
}

// ============================================================================
// RUN CONFIG
// ============================================================================

/// An API key. Never printed in cleartext.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for handing to the worker.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Everything the worker needs for one run. Fixed once the run starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Provider id, e.g. `openai`.
    pub provider: String,
    pub model: String,
    /// API keys keyed by their environment variable name.
    pub secrets: BTreeMap<String, ApiKey>,
    pub samples: u32,
    pub parallel: bool,
}

impl RunConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, app: &AppConfig) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            secrets: BTreeMap::new(),
            samples: app.samples,
            parallel: app.parallel,
        }
    }

    pub fn with_secrets(mut self, secrets: BTreeMap<String, ApiKey>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Key for `provider`, if one was collected.
    pub fn key_for(&self, provider: &Provider) -> Option<&ApiKey> {
        self.secrets.get(provider.env_key)
    }
}

/// Collect every known provider key present in the process environment.
pub fn secrets_from_env() -> BTreeMap<String, ApiKey> {
    secrets_from(|name| std::env::var(name).ok())
}

/// Collect provider keys through `lookup`. Blank values are skipped.
pub fn secrets_from(lookup: impl Fn(&str) -> Option<String>) -> BTreeMap<String, ApiKey> {
    PROVIDERS
        .iter()
        .filter_map(|p| {
            lookup(p.env_key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (p.env_key.to_string(), ApiKey::new(v.trim())))
        })
        .collect()
}
