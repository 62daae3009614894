//! Line protocol spoken by the benchmark worker on stdout.
//!
//! The worker prints one JSON object per line when `TUI_MODE=true`. Human
//! readable diagnostics may be interleaved on the same stream, so every line
//! that is not a well-formed event is skipped without complaint.
//!
//! Public API:
//! - [`BenchmarkEvent`]: one decoded event, a sum type keyed by `"type"`
//! - [`decode_line`]: decode a single record
//! - [`EventDecoder`]: decode a whole stream lazily

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

// ============================================================================
// EVENTS
// ============================================================================

/// Events emitted by the worker, one per stdout line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BenchmarkEvent {
    /// A test began executing.
    TestStart {
        test: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sample: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<u32>,
    },

    /// A sample of a test finished generating.
    SampleProgress {
        test: String,
        #[serde(default)]
        sample: u32,
        #[serde(default)]
        total: u32,
    },

    /// All samples of a test are scored.
    TestComplete {
        test: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<u32>,
        #[serde(default)]
        passed: bool,
        #[serde(
            rename = "passAtOne",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        pass_at_one: Option<f64>,
        #[serde(
            rename = "passAtTen",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        pass_at_ten: Option<f64>,
    },

    /// The provider throttled the running test.
    RateLimit {
        #[serde(rename = "retryAfter", default)]
        retry_after: u64,
    },

    /// The run failed. Always terminal.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        test: Option<String>,
        #[serde(default)]
        error: String,
    },

    /// The run finished normally. Always terminal.
    Complete {
        #[serde(
            rename = "resultsSaved",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        results_saved: Option<String>,
    },
}

impl BenchmarkEvent {
    /// Build the error event the bridge synthesizes when the worker dies.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            test: None,
            error: message.into(),
        }
    }

    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Complete { .. })
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TestStart { .. } => "test_start",
            Self::SampleProgress { .. } => "sample_progress",
            Self::TestComplete { .. } => "test_complete",
            Self::RateLimit { .. } => "rate_limit",
            Self::Error { .. } => "error",
            Self::Complete { .. } => "complete",
        }
    }

    /// Test the event refers to, if its kind carries one.
    pub fn test(&self) -> Option<&str> {
        match self {
            Self::TestStart { test, .. }
            | Self::SampleProgress { test, .. }
            | Self::TestComplete { test, .. } => Some(test),
            Self::Error { test, .. } => test.as_deref(),
            Self::RateLimit { .. } | Self::Complete { .. } => None,
        }
    }

    /// Serialize as a single protocol line (no trailing newline).
    pub fn to_line(&self) -> String {
        // Serializing a plain enum of strings and numbers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode one record. Returns `None` for anything that is not an event.
pub fn decode_line(line: &[u8]) -> Option<BenchmarkEvent> {
    let trimmed = line.trim_ascii();
    if trimmed.first() != Some(&b'{') {
        return None;
    }
    serde_json::from_slice(trimmed).ok()
}

/// Lazily decodes newline-delimited events from a byte stream.
pub struct EventDecoder<R> {
    reader: R,
    buf: Vec<u8>,
    skipped: u64,
}

impl<R: AsyncBufRead + Unpin> EventDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
            skipped: 0,
        }
    }

    /// Read until the next decodable event.
    ///
    /// Returns `Ok(None)` once the underlying stream is closed. Undecodable
    /// records are counted in [`skipped`](Self::skipped) and never returned.
    pub async fn next_event(&mut self) -> std::io::Result<Option<BenchmarkEvent>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_until(b'\n', &mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
            match decode_line(&self.buf) {
                Some(event) => return Ok(Some(event)),
                None => {
                    if !self.buf.trim_ascii().is_empty() {
                        self.skipped += 1;
                    }
                }
            }
        }
    }

    /// Number of non-blank records that did not decode.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
