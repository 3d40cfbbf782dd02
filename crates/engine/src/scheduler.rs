//! Low-priority task scheduler.
//!
//! Prefetches are deferred work: they must never delay a render or a save.
//! [`IdleQueue`] runs them one at a time on a single background task,
//! yielding to the runtime before each one so higher-priority work that is
//! ready gets polled first.

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A unit of deferred work.
pub type Task = BoxFuture<'static, ()>;

/// Accepts low-priority work to run when nothing more urgent is pending.
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, task: Task);
}

/// FIFO queue drained by one worker loop.
#[derive(Clone)]
pub struct IdleQueue {
    tx: mpsc::UnboundedSender<Task>,
}

impl IdleQueue {
    /// Spawn the worker loop. It stops when `cancel` fires; queued tasks
    /// that have not started are dropped.
    pub fn start(cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, cancel));
        (Self { tx }, handle)
    }
}

impl TaskScheduler for IdleQueue {
    fn schedule(&self, task: Task) {
        if self.tx.send(task).is_err() {
            tracing::debug!("Idle queue stopped, dropping task");
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Task>, cancel: CancellationToken) {
    tracing::debug!("Idle queue started");
    loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };
        tokio::task::yield_now().await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = task => {}
        }
    }
    tracing::debug!("Idle queue shutting down");
}
