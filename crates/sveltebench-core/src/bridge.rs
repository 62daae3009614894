//! Event bridge between the worker process and a single-threaded UI loop.
//!
//! [`EventBridge::start`] spawns the worker and two tasks:
//!
//! - the forwarder decodes stdout and pushes events into a bounded queue,
//!   then reconciles the exit status once stdout closes
//! - the stderr drain reads stderr to the end so the worker never blocks
//!
//! The UI pulls from the returned [`BridgeHandle`], either with the
//! non-blocking [`BridgeHandle::try_next`] or by awaiting
//! [`BridgeHandle::next`] inside its own `select!` loop.
//!
//! With [`OverflowPolicy::Drop`] a full queue discards progress events so the
//! worker keeps running. Terminal events (`error`, `complete`) always wait for
//! room: the consumer must see how the run ended.

use crate::config::{BridgeConfig, OverflowPolicy, RunConfig, WorkerConfig};
use crate::error::Result;
use crate::protocol::{BenchmarkEvent, EventDecoder};
use crate::worker::{WorkerExit, WorkerProcess};
use anyhow::anyhow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

// ============================================================================
// PULL API
// ============================================================================

/// Result of a non-blocking pull.
#[derive(Debug, Clone, PartialEq)]
pub enum TryNext {
    /// The next event in worker order.
    Event(BenchmarkEvent),
    /// Nothing buffered right now; the run is still going.
    Empty,
    /// The worker's output ended and every buffered event has been read.
    Closed,
}

/// Consumer side of a running bridge.
///
/// Dropping the handle tears the run down.
pub struct BridgeHandle {
    rx: mpsc::Receiver<BenchmarkEvent>,
    dropped: Arc<AtomicU64>,
    cancel_tx: Option<oneshot::Sender<()>>,
    forwarder: Option<JoinHandle<()>>,
    stderr_drain: AbortHandle,
}

impl BridgeHandle {
    /// Pull the next event without waiting.
    pub fn try_next(&mut self) -> TryNext {
        match self.rx.try_recv() {
            Ok(event) => TryNext::Event(event),
            Err(TryRecvError::Empty) => TryNext::Empty,
            Err(TryRecvError::Disconnected) => TryNext::Closed,
        }
    }

    /// Wait for the next event. `None` once the queue is closed.
    ///
    /// Cancel safe, so it can be used as a `tokio::select!` branch.
    pub async fn next(&mut self) -> Option<BenchmarkEvent> {
        self.rx.recv().await
    }

    /// Events discarded by the overflow policy so far.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Request teardown: the worker is killed, both tasks stop and any
    /// unread events are discarded. Returns immediately.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
            info!("run cancellation requested");
        }
        // Closing also fails a forwarder blocked on a full queue.
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        self.stderr_drain.abort();
    }

    /// Cancel and wait until the worker has been reaped.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.await;
        }
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        if let Some(forwarder) = self.forwarder.take() {
            // The worker is kill_on_drop, so aborting also terminates it.
            forwarder.abort();
        }
        self.stderr_drain.abort();
    }
}

// ============================================================================
// BRIDGE
// ============================================================================

pub struct EventBridge;

impl EventBridge {
    /// Launch the worker for `run` and start forwarding its events.
    ///
    /// Must be called inside a tokio runtime. A launch failure is returned
    /// here and no tasks are started.
    pub fn start(
        bridge: &BridgeConfig,
        worker: &WorkerConfig,
        run: RunConfig,
    ) -> Result<BridgeHandle> {
        let mut process = WorkerProcess::spawn(worker, &run)?;
        let stdout = process
            .take_stdout()
            .ok_or_else(|| anyhow!("worker stdout unavailable"))?;
        let stderr = process.take_stderr();

        let (tx, rx) = mpsc::channel(bridge.queue_capacity.max(1));
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let dropped = Arc::new(AtomicU64::new(0));

        let stderr_task = tokio::spawn(drain_stderr(stderr));
        let stderr_drain = stderr_task.abort_handle();

        let queue = QueueSender::new(tx, bridge.overflow, dropped.clone());
        let forwarder = tokio::spawn(forward_events(
            process,
            stdout,
            stderr_task,
            queue,
            cancel_rx,
        ));

        info!(
            provider = %run.provider,
            model = %run.model,
            capacity = bridge.queue_capacity,
            overflow = ?bridge.overflow,
            "bridge started"
        );

        Ok(BridgeHandle {
            rx,
            dropped,
            cancel_tx: Some(cancel_tx),
            forwarder: Some(forwarder),
            stderr_drain,
        })
    }
}

// ============================================================================
// QUEUE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forwarded {
    Queued,
    Dropped,
}

/// The consumer closed the queue.
#[derive(Debug)]
struct ConsumerGone;

/// Producer side of the bounded queue, applying the overflow policy.
struct QueueSender {
    tx: mpsc::Sender<BenchmarkEvent>,
    policy: OverflowPolicy,
    dropped: Arc<AtomicU64>,
    queued: u64,
}

impl QueueSender {
    fn new(
        tx: mpsc::Sender<BenchmarkEvent>,
        policy: OverflowPolicy,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            tx,
            policy,
            dropped,
            queued: 0,
        }
    }

    async fn forward(
        &mut self,
        event: BenchmarkEvent,
    ) -> std::result::Result<Forwarded, ConsumerGone> {
        if self.policy == OverflowPolicy::Drop && !event.is_terminal() {
            return match self.tx.try_send(event) {
                Ok(()) => {
                    self.queued += 1;
                    Ok(Forwarded::Queued)
                }
                Err(TrySendError::Full(event)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(kind = event.kind(), "event queue full, dropping event");
                    Ok(Forwarded::Dropped)
                }
                Err(TrySendError::Closed(_)) => Err(ConsumerGone),
            };
        }

        self.tx.send(event).await.map_err(|_| ConsumerGone)?;
        self.queued += 1;
        Ok(Forwarded::Queued)
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ============================================================================
// TASKS
// ============================================================================

async fn forward_events(
    mut worker: WorkerProcess,
    stdout: ChildStdout,
    stderr_task: JoinHandle<String>,
    mut queue: QueueSender,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let mut decoder = EventDecoder::new(BufReader::new(stdout));
    let mut saw_error = false;
    let mut saw_complete = false;

    loop {
        let next = tokio::select! {
            _ = &mut cancel_rx => {
                terminate(&mut worker, &stderr_task).await;
                return;
            }
            next = decoder.next_event() => next,
        };

        match next {
            Ok(Some(event)) => {
                match &event {
                    BenchmarkEvent::Error { .. } => saw_error = true,
                    BenchmarkEvent::Complete { .. } => saw_complete = true,
                    _ => {}
                }
                if queue.forward(event).await.is_err() {
                    debug!("event consumer went away");
                    terminate(&mut worker, &stderr_task).await;
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "reading worker stdout failed");
                break;
            }
        }
    }

    info!(
        forwarded = queue.queued,
        dropped = queue.dropped(),
        skipped = decoder.skipped(),
        "worker output closed"
    );
    if queue.dropped() > 0 {
        warn!(dropped = queue.dropped(), "events dropped because the queue was full");
    }

    let exit = tokio::select! {
        _ = &mut cancel_rx => {
            terminate(&mut worker, &stderr_task).await;
            return;
        }
        exit = worker.wait() => exit,
    };
    let stderr = match stderr_task.await {
        Ok(text) => text,
        Err(_) => String::new(),
    };

    let failure = match exit {
        Ok(WorkerExit::Success) => {
            if !stderr.trim().is_empty() {
                warn!(stderr = %stderr.trim_end(), "worker wrote to stderr");
            }
            if !saw_complete && !saw_error {
                warn!("worker exited cleanly without a complete event");
            }
            info!("worker finished");
            None
        }
        Ok(WorkerExit::Failed { status }) => Some(exit_message(&status.to_string(), &stderr)),
        Err(e) => Some(exit_message(&format!("unknown status ({e})"), &stderr)),
    };

    if let Some(message) = failure {
        if saw_error {
            // The worker's own error already reached the consumer.
            warn!(%message, "worker failed after reporting an error");
        } else {
            warn!(%message, "worker failed");
            let _ = queue.forward(BenchmarkEvent::error(message)).await;
        }
    }
}

fn exit_message(status: &str, stderr: &str) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        format!("worker exited with {status}")
    } else {
        format!("worker exited with {status}\nstderr: {stderr}")
    }
}

async fn terminate(worker: &mut WorkerProcess, stderr_task: &JoinHandle<String>) {
    worker.start_kill();
    if let Err(e) = worker.wait().await {
        warn!(error = %e, "failed to reap cancelled worker");
    }
    stderr_task.abort();
    info!("worker terminated");
}

async fn drain_stderr(stderr: Option<ChildStderr>) -> String {
    let Some(stderr) = stderr else {
        return String::new();
    };
    let mut reader = BufReader::new(stderr);
    let mut captured = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                if !text.trim().is_empty() {
                    debug!("[worker stderr] {}", text.trim_end());
                }
                captured.extend_from_slice(&line);
            }
            Err(e) => {
                warn!(error = %e, "reading worker stderr failed");
                break;
            }
        }
    }
    String::from_utf8_lossy(&captured).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(sample: u32) -> BenchmarkEvent {
        BenchmarkEvent::SampleProgress {
            test: "counter".into(),
            sample,
            total: 150,
        }
    }

    #[tokio::test]
    async fn drop_policy_discards_when_full() {
        let (tx, mut rx) = mpsc::channel(100);
        let dropped = Arc::new(AtomicU64::new(0));
        let mut queue = QueueSender::new(tx, OverflowPolicy::Drop, dropped.clone());

        let mut outcomes = Vec::new();
        for i in 0..150 {
            outcomes.push(queue.forward(progress(i)).await.unwrap());
        }
        assert_eq!(outcomes.iter().filter(|o| **o == Forwarded::Queued).count(), 100);
        assert_eq!(dropped.load(Ordering::Relaxed), 50);

        // The oldest events survive, in order.
        for i in 0..100 {
            assert_eq!(rx.try_recv().unwrap(), progress(i));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminal_events_wait_for_room() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut queue = QueueSender::new(tx, OverflowPolicy::Drop, Arc::new(AtomicU64::new(0)));
        queue.forward(progress(0)).await.unwrap();

        let sender = tokio::spawn(async move {
            queue
                .forward(BenchmarkEvent::Complete { results_saved: None })
                .await
                .unwrap()
        });
        assert_eq!(rx.recv().await, Some(progress(0)));
        assert_eq!(sender.await.unwrap(), Forwarded::Queued);
        assert!(rx.recv().await.unwrap().is_terminal());
    }

    #[tokio::test]
    async fn block_policy_never_drops() {
        let (tx, mut rx) = mpsc::channel(2);
        let dropped = Arc::new(AtomicU64::new(0));
        let mut queue = QueueSender::new(tx, OverflowPolicy::Block, dropped.clone());

        let producer = tokio::spawn(async move {
            for i in 0..10 {
                queue.forward(progress(i)).await.unwrap();
            }
        });
        for i in 0..10 {
            assert_eq!(rx.recv().await, Some(progress(i)));
        }
        producer.await.unwrap();
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn closed_consumer_is_reported() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut queue = QueueSender::new(tx, OverflowPolicy::Drop, Arc::new(AtomicU64::new(0)));
        assert!(queue.forward(progress(1)).await.is_err());
    }

    #[test]
    fn exit_message_keeps_stderr_verbatim() {
        assert_eq!(
            exit_message("exit status: 1", "rate limit exceeded\n"),
            "worker exited with exit status: 1\nstderr: rate limit exceeded"
        );
        assert_eq!(exit_message("exit status: 2", "  \n"), "worker exited with exit status: 2");
    }
}
