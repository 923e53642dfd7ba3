//! Per-operation context: progress channel and cancellation flag.
//!
//! Operations run on a blocking worker and report after every unit of work
//! (one file, one page). The controller owns the receiving end of the
//! progress channel and the other handle of the cancellation flag.

use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// A single progress update emitted by an operation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Percentage complete in `[0, 100]`
    pub percent: f32,
    /// Units of work finished so far
    pub completed: usize,
    /// Units of work in the operation (0 for coarse steps)
    pub total: usize,
}

/// Monotonic progress reporter.
///
/// Values never decrease within one operation and are clamped to 100.
#[derive(Debug, Default)]
pub struct Progress {
    sender: Option<UnboundedSender<ProgressEvent>>,
    last: f32,
}

impl Progress {
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
            last: 0.0,
        }
    }

    /// A reporter that drops every event
    pub fn silent() -> Self {
        Self::default()
    }

    /// Report `completed` of `total` units done.
    pub fn step(&mut self, completed: usize, total: usize) {
        let percent = if total == 0 {
            100.0
        } else {
            completed as f32 / total as f32 * 100.0
        };
        self.emit(percent, completed, total);
    }

    /// Report a coarse percentage for operations without countable units.
    pub fn set(&mut self, percent: f32) {
        self.emit(percent, 0, 0);
    }

    /// Report completion
    pub fn finish(&mut self) {
        if self.last < 100.0 {
            self.emit(100.0, 0, 0);
        }
    }

    /// Last value reported
    pub fn last(&self) -> f32 {
        self.last
    }

    fn emit(&mut self, percent: f32, completed: usize, total: usize) {
        let percent = percent.clamp(0.0, 100.0).max(self.last);
        self.last = percent;

        if let Some(sender) = &self.sender {
            // Receiver gone means nobody is watching; the operation carries on.
            let _ = sender.send(ProgressEvent {
                percent,
                completed,
                total,
            });
        }
    }
}

/// Shared cancellation flag, checked between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything an operation needs besides its inputs
#[derive(Debug, Default)]
pub struct TaskContext {
    pub progress: Progress,
    cancel: CancelFlag,
}

impl TaskContext {
    pub fn new(progress: Progress, cancel: CancelFlag) -> Self {
        Self { progress, cancel }
    }

    /// Context with no observer and a flag nobody else holds
    pub fn detached() -> Self {
        Self::default()
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested.
    ///
    /// Call before starting unit `completed` of `total`.
    pub fn checkpoint(&self, completed: usize, total: usize) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::info!(completed, total, "operation cancelled");
            return Err(Error::Cancelled { completed, total });
        }
        Ok(())
    }

    /// Mark unit `completed` of `total` as done.
    pub fn unit_done(&mut self, completed: usize, total: usize) {
        self.progress.step(completed, total);
    }
}
