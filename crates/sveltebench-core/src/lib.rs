//! Core library for SvelteBench runs.
//!
//! This crate drives an external benchmark worker and turns its output into
//! live progress:
//!
//! - [`protocol`]: Line-delimited JSON events printed by the worker
//! - [`worker`]: Spawning the worker with the run's environment
//! - [`bridge`]: Bounded event queue between the worker and a UI loop
//! - [`progress`]: Per-test and whole-run progress aggregation, ETA
//! - [`config`]: Configuration loading, run settings and API keys
//! - [`providers`]: Known LLM providers and their key variables
//! - [`catalog`]: Cached model listings per provider
//! - [`discovery`]: Project root and test discovery
//! - [`error`]: Unified error types
//!
//! # Architecture
//!
//! The bridge spawns the worker, decodes its stdout on a background task and
//! pushes events into a bounded queue. The front-end owns a
//! [`ProgressAggregator`] and feeds it every event it pulls from the
//! [`BridgeHandle`]. When the worker exits without reporting a terminal
//! event, the bridge synthesizes one from the exit status and stderr.

// Foundation modules (no internal dependencies)
pub mod error;
pub mod protocol;
pub mod providers;

// Configuration
pub mod config;
pub mod discovery;

// Execution
pub mod bridge;
pub mod catalog;
pub mod progress;
pub mod worker;

pub use bridge::{BridgeHandle, EventBridge, TryNext};
pub use config::{AppConfig, RunConfig};
pub use error::BenchError;
pub use progress::{ProgressAggregator, RunSnapshot};
pub use protocol::BenchmarkEvent;
