//! SvelteBench TUI - live dashboard for a benchmark run
//!
//! Starts the worker through the event bridge and renders per-test progress
//! until the run ends or the user cancels it.

mod state;
mod theme;
mod views;

use anyhow::{anyhow, Result};
use clap::Parser;
use crossterm::{
    event::{Event as CrosstermEvent, EventStream, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::prelude::*;
use state::{AppState, LogLevel, View};
use std::fs::File;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use sveltebench_core::config::{load_config, secrets_from_env, ConfigOverrides, RunConfig};
use sveltebench_core::discovery::{find_project_root, resolve_tests};
use sveltebench_core::providers::{lookup, PROVIDERS};
use sveltebench_core::{BenchError, BridgeHandle, EventBridge, TryNext};
use theme::{Animation, Theme};
use tokio::time::{interval, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sveltebench-tui")]
#[command(about = "Terminal dashboard for SvelteBench runs")]
#[command(version)]
struct Args {
    /// Path to sveltebench.yaml config file
    #[arg(short, long, default_value = "sveltebench.yaml")]
    config: PathBuf,

    /// Provider id, e.g. openai or anthropic
    #[arg(short, long)]
    provider: String,

    /// Model id as the provider names it
    #[arg(short, long)]
    model: String,

    /// Samples per test
    #[arg(short, long)]
    samples: Option<u32>,

    /// Let the worker run tests in parallel
    #[arg(long)]
    parallel: bool,

    /// Override the worker command
    #[arg(long)]
    command: Option<String>,

    /// Comma-separated list of tests to track
    #[arg(short, long)]
    tests: Option<String>,

    /// Where to write logs while the dashboard owns the terminal
    #[arg(long, default_value = "sveltebench-tui.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_file)?;

    let overrides = ConfigOverrides {
        command: args.command.clone(),
        samples: args.samples,
        parallel: args.parallel.then_some(true),
        tests: args.tests.as_deref().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        }),
        ..Default::default()
    };
    let mut config = load_config(&args.config, overrides)?;

    let provider = lookup(&args.provider).ok_or_else(|| {
        let known: Vec<&str> = PROVIDERS.iter().map(|p| p.id).collect();
        anyhow!("unknown provider: {}. Known: {}", args.provider, known.join(", "))
    })?;
    let run = RunConfig::new(provider.id, &args.model, &config).with_secrets(secrets_from_env());
    if run.key_for(provider).is_none() {
        return Err(BenchError::MissingApiKey(provider.env_key.to_string()).into());
    }

    let root = match &config.worker.working_dir {
        Some(dir) => dir.clone(),
        None => find_project_root(&std::env::current_dir()?),
    };
    config.worker.working_dir = Some(root.clone());
    let tests = resolve_tests(&config.tests, &root);

    let mut state = AppState::new(provider.id, &args.model, &tests, run.samples);
    // Launch failures surface here, before the terminal is taken over.
    let mut handle = EventBridge::start(&config.bridge, &config.worker, run)?;
    tracing::info!(provider = provider.id, model = %args.model, tests = tests.len(), "run started");
    state.progress.start();
    state.add_event(
        LogLevel::Info,
        None,
        format!("Running {} tests x {} samples", tests.len(), config.samples),
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &Theme::default(), &mut state, &mut handle).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    handle.shutdown().await;
    tracing::info!(
        outcome = ?state.outcome(),
        dropped = state.dropped_events,
        "dashboard closed"
    );
    result
}

fn init_tracing(path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

/// Apply every event already queued without waiting, so rendering never lags
/// behind a burst of progress.
fn drain_bridge_events(handle: &mut BridgeHandle, state: &mut AppState, open: &mut bool) -> bool {
    let mut updated = false;
    while *open {
        match handle.try_next() {
            TryNext::Event(event) => {
                state.handle_event(event);
                updated = true;
            }
            TryNext::Empty => break,
            TryNext::Closed => {
                *open = false;
                state.on_stream_closed();
                updated = true;
            }
        }
    }
    updated
}

/// Main event loop
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    theme: &Theme,
    state: &mut AppState,
    handle: &mut BridgeHandle,
) -> Result<()> {
    let mut tick = interval(Duration::from_millis(50));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frame_count: u64 = 0;
    let mut input = EventStream::new();
    let mut bridge_open = true;

    loop {
        let mut should_render = false;
        tokio::select! {
            maybe_input = input.next() => {
                match maybe_input {
                    Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                        match handle_key(key.code, key.modifiers, state) {
                            KeyAction::Quit => break,
                            KeyAction::Cancel => {
                                handle.cancel();
                                bridge_open = false;
                                state.cancel();
                                state.exit_requested = true;
                            }
                            KeyAction::Continue => {}
                        }
                        should_render = true;
                    }
                    Some(Err(err)) => {
                        state.add_event(LogLevel::Error, None, format!("Input error: {err}"));
                        state.exit_requested = true;
                    }
                    _ => {}
                }
            }
            bench_event = handle.next(), if bridge_open => {
                match bench_event {
                    Some(event) => {
                        state.handle_event(event);
                        should_render = true;
                        should_render |= drain_bridge_events(handle, state, &mut bridge_open);
                    }
                    None => {
                        bridge_open = false;
                        state.on_stream_closed();
                        should_render = true;
                    }
                }
            }
            _ = tick.tick() => {
                frame_count = frame_count.wrapping_add(1);
                should_render = true;
            }
        }

        state.set_dropped(handle.dropped_events());

        if should_render {
            let anim = Animation::new(frame_count);
            terminal.draw(|f| views::render(f, state, theme, anim))?;
        }

        if state.exit_requested && !state.is_running() {
            break;
        }
    }

    Ok(())
}

enum KeyAction {
    Quit,
    Cancel,
    Continue,
}

fn handle_key(code: KeyCode, modifiers: KeyModifiers, state: &mut AppState) -> KeyAction {
    let ctrl_c = code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL);
    if ctrl_c || matches!(code, KeyCode::Char('q' | 'Q')) {
        return if state.is_running() {
            KeyAction::Cancel
        } else {
            KeyAction::Quit
        };
    }

    match code {
        KeyCode::Tab => {
            state.view = match state.view {
                View::Dashboard => View::Results,
                View::Results => View::Dashboard,
            };
        }
        KeyCode::Esc => {
            state.view = View::Dashboard;
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.selected_index = state.selected_index.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let max = state.test_count().saturating_sub(1);
            if state.selected_index < max {
                state.selected_index += 1;
            }
        }
        _ => {}
    }

    KeyAction::Continue
}
