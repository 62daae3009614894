//! CLI for SvelteBench - run the Svelte code generation benchmark against an
//! LLM provider from the terminal.

mod formatting;
mod progress;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use progress::ProgressDisplay;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use sveltebench_core::catalog::{filter_models, HttpModelSource, ModelCatalog};
use sveltebench_core::config::{
    load_config, secrets_from_env, AppConfig, ConfigOverrides, OverflowPolicy, RunConfig,
};
use sveltebench_core::discovery::{discover_tests, find_project_root, resolve_tests};
use sveltebench_core::progress::{RunOutcome, RunSnapshot};
use sveltebench_core::providers::{lookup, Provider, PROVIDERS};
use sveltebench_core::{BenchError, EventBridge};
use tracing_subscriber::EnvFilter;

const REFRESH: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(
    name = "sveltebench",
    about = "Benchmark LLM-generated Svelte components from the terminal"
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "sveltebench.yaml")]
    config: String,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and print the merged configuration.
    ShowConfig,

    /// Run the benchmark for one provider and model.
    Run {
        /// Provider id, e.g. openai or anthropic.
        #[arg(long, short = 'p')]
        provider: String,
        #[arg(long, short = 'm')]
        model: String,
        /// Samples per test.
        #[arg(long)]
        samples: Option<u32>,
        /// Let the worker run tests in parallel.
        #[arg(long)]
        parallel: bool,
        /// Override the worker command.
        #[arg(long)]
        command: Option<String>,
        /// Directory the worker runs in. Defaults to the project root.
        #[arg(long)]
        working_dir: Option<PathBuf>,
        /// Comma-separated list of tests to track.
        #[arg(long, short = 't')]
        tests: Option<String>,
        /// Override the event queue capacity.
        #[arg(long)]
        queue_capacity: Option<usize>,
        /// Wait for the display instead of dropping progress events.
        #[arg(long)]
        no_drop: bool,
    },

    /// List models available from a provider.
    Models {
        #[arg(long, short = 'p')]
        provider: String,
        /// Case-insensitive substring to match model ids and names.
        #[arg(long, short = 'f')]
        filter: Option<String>,
    },

    /// List the tests the benchmark would track.
    Tests,

    /// List known providers and whether their API key is set.
    Providers,
}

/// A failed or cancelled run exits non-zero once its summary is printed.
fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config_path = PathBuf::from(&cli.config);

    let overrides = match &cli.command {
        Some(Command::Run {
            samples,
            parallel,
            command,
            working_dir,
            tests,
            queue_capacity,
            no_drop,
            ..
        }) => ConfigOverrides {
            command: command.clone(),
            working_dir: working_dir.clone(),
            samples: *samples,
            parallel: parallel.then_some(true),
            queue_capacity: *queue_capacity,
            overflow: no_drop.then_some(OverflowPolicy::Block),
            tests: tests.as_deref().map(split_list),
        },
        _ => ConfigOverrides::default(),
    };

    let mut config = load_config(&config_path, overrides)?;
    let root = project_root(&config)?;
    if config.worker.working_dir.is_none() {
        config.worker.working_dir = Some(root.clone());
    }

    match cli.command {
        Some(Command::ShowConfig) => {
            let yaml = serde_yaml::to_string(&config)?;
            println!("{yaml}");
        }
        Some(Command::Run {
            provider, model, ..
        }) => {
            let provider = resolve_provider(&provider)?;
            let run = RunConfig::new(provider.id, model, &config).with_secrets(secrets_from_env());
            if run.key_for(provider).is_none() {
                return Err(BenchError::MissingApiKey(provider.env_key.to_string()).into());
            }
            let tests = resolve_tests(&config.tests, &root);
            tracing::debug!(tests = tests.len(), root = %root.display(), "resolved tests");

            let rt = tokio::runtime::Runtime::new()?;
            let snapshot = rt.block_on(run_benchmark(&config, run, &tests))?;

            if matches!(snapshot.outcome, RunOutcome::Failed(_) | RunOutcome::Cancelled) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Some(Command::Models { provider, filter }) => {
            let provider = resolve_provider(&provider)?;
            let secrets = secrets_from_env();
            let key = secrets
                .get(provider.env_key)
                .ok_or_else(|| BenchError::MissingApiKey(provider.env_key.to_string()))?;

            let mut catalog = ModelCatalog::new(HttpModelSource::new()?, config.model_cache_ttl());
            let rt = tokio::runtime::Runtime::new()?;
            let models = rt.block_on(catalog.models(provider, key))?;
            let shown = filter_models(&models, filter.as_deref().unwrap_or(""));
            formatting::print_models(provider, &shown, models.len());
        }
        Some(Command::Tests) => {
            let discovered = !config.tests.is_empty() || !discover_tests(&root)?.is_empty();
            let tests = resolve_tests(&config.tests, &root);
            formatting::print_tests(&tests, discovered);
        }
        Some(Command::Providers) => {
            let secrets = secrets_from_env();
            let rows: Vec<(&Provider, bool)> = PROVIDERS
                .iter()
                .map(|p| (p, secrets.contains_key(p.env_key)))
                .collect();
            formatting::print_providers(&rows);
        }
        None => {
            println!(
                "Worker `{}` in {}",
                config.worker.command,
                root.display()
            );
            println!("\nUse --help to see available commands.");
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_benchmark(
    config: &AppConfig,
    run: RunConfig,
    tests: &[String],
) -> Result<RunSnapshot> {
    let mut handle = EventBridge::start(&config.bridge, &config.worker, run.clone())?;
    let mut display = ProgressDisplay::new(&run, tests);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut refresh = tokio::time::interval(REFRESH);

    let cancelled = loop {
        tokio::select! {
            event = handle.next() => match event {
                Some(event) => display.handle_event(event),
                None => break false,
            },
            _ = &mut ctrl_c => break true,
            _ = refresh.tick() => display.refresh(handle.dropped_events()),
        }
    };

    let dropped = handle.dropped_events();
    if dropped > 0 {
        tracing::warn!(dropped, "progress events dropped while the queue was full");
    }
    if cancelled {
        tracing::info!("cancelled by user");
        handle.shutdown().await;
        Ok(display.cancel(dropped))
    } else {
        Ok(display.finish(dropped))
    }
}

fn resolve_provider(name: &str) -> Result<&'static Provider> {
    lookup(name).ok_or_else(|| {
        let known: Vec<&str> = PROVIDERS.iter().map(|p| p.id).collect();
        anyhow!("unknown provider: {name}. Known: {}", known.join(", "))
    })
}

fn project_root(config: &AppConfig) -> Result<PathBuf> {
    match &config.worker.working_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(find_project_root(&std::env::current_dir()?)),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sveltebench_core=debug,sveltebench=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
