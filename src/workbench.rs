//! Session controller
//!
//! Owns the session's [`AppState`], admits one operation at a time, runs it
//! on a blocking worker, feeds its progress into the state and always
//! returns the state to idle afterwards.

use crate::error::{Error, Result};
use crate::ops::{OpOutput, OpSettings, Operation};
use crate::state::{AppState, SelectedFile, ToolKind};
use crate::task::{CancelFlag, Progress, ProgressEvent, TaskContext};
use parking_lot::Mutex;
use std::sync::Arc;

/// Message shown to clients for any failed operation
pub fn failure_message(operation: impl std::fmt::Display) -> String {
    format!("Intelligence failure during {} operation", operation)
}

/// How an admitted request ended
#[derive(Debug)]
pub enum RunOutcome {
    /// The operation ran to completion
    Completed(OpOutput),
    /// Preconditions were not met; nothing ran
    Skipped { reason: &'static str },
}

/// Resets the processing fields however the operation ends
struct ProcessingGuard {
    state: Arc<Mutex<AppState>>,
    running: Arc<Mutex<Option<ToolKind>>>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.set_is_processing(false);
        state.set_progress(0.0);
        *self.running.lock() = None;
    }
}

/// One session: state store plus the single execution slot
#[derive(Clone)]
pub struct Workbench {
    state: Arc<Mutex<AppState>>,
    slot: Arc<tokio::sync::Mutex<()>>,
    running: Arc<Mutex<Option<ToolKind>>>,
    cancel: CancelFlag,
    settings: OpSettings,
}

impl Workbench {
    pub fn new(settings: OpSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState::new())),
            slot: Arc::new(tokio::sync::Mutex::new(())),
            running: Arc::new(Mutex::new(None)),
            cancel: CancelFlag::new(),
            settings,
        }
    }

    /// Snapshot of the current state
    pub fn snapshot(&self) -> AppState {
        self.state.lock().clone()
    }

    /// Apply a state transition
    pub fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Files currently queued, in order
    pub fn queued_files(&self) -> Vec<SelectedFile> {
        self.state.lock().files().to_vec()
    }

    /// Tool occupying the slot, if any
    pub fn running(&self) -> Option<ToolKind> {
        *self.running.lock()
    }

    /// Request cancellation of the running operation.
    ///
    /// Returns the tool that was asked to stop, or `None` if idle.
    pub fn cancel(&self) -> Option<ToolKind> {
        let running = self.running();
        if running.is_some() {
            self.cancel.cancel();
            tracing::info!(tool = ?running, "cancellation requested");
        }
        running
    }

    /// Run `op` over `inputs` in the session's single slot.
    ///
    /// A request that fails its preconditions is skipped before taking the
    /// slot. A request arriving while another runs fails with [`Error::Busy`].
    pub async fn execute(&self, op: &Operation, inputs: Vec<SelectedFile>) -> Result<RunOutcome> {
        let tool = op.tool();

        if let Some(reason) = op.skip_reason(&inputs) {
            tracing::info!(%tool, reason, "operation skipped");
            return Ok(RunOutcome::Skipped { reason });
        }

        let _slot = self.slot.try_lock().map_err(|_| Error::Busy {
            running: self
                .running()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })?;

        self.cancel.reset();
        {
            let mut state = self.state.lock();
            state.set_is_processing(true);
            state.set_progress(0.0);
        }
        *self.running.lock() = Some(tool);
        let _guard = ProcessingGuard {
            state: Arc::clone(&self.state),
            running: Arc::clone(&self.running),
        };

        tracing::info!(%tool, files = inputs.len(), "operation started");

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
        let state = Arc::clone(&self.state);
        let consumer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                tracing::debug!(
                    percent = event.percent,
                    completed = event.completed,
                    total = event.total,
                    "progress"
                );
                state.lock().set_progress(event.percent);
            }
        });

        let mut ctx = TaskContext::new(Progress::new(tx), self.cancel.clone());
        let settings = self.settings;
        let job = op.clone();

        // Move CPU-heavy PDF work to blocking thread pool
        let result = tokio::task::spawn_blocking(move || job.run(&inputs, &settings, &mut ctx))
            .await
            .map_err(|e| Error::Worker {
                reason: format!("Task join error: {}", e),
            })
            .and_then(|r| r);

        // The sender is gone once the worker returns, so this ends promptly.
        if let Err(e) = consumer.await {
            tracing::debug!(error = %e, "progress consumer ended abnormally");
        }

        match result {
            Ok(output) => {
                tracing::info!(%tool, outputs = output.parts.len(), "operation finished");
                Ok(RunOutcome::Completed(output))
            }
            Err(e) => {
                tracing::debug!(%tool, error = %e, "operation ended with error");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::QpdfWrapper;
    use crate::testing::blank_pdf;

    fn workbench() -> Workbench {
        Workbench::new(OpSettings::default())
    }

    #[test]
    fn test_failure_message() {
        assert_eq!(
            failure_message(ToolKind::DeletePages),
            "Intelligence failure during deletePages operation"
        );
    }

    #[tokio::test]
    async fn test_execute_merge() {
        let bench = workbench();
        let inputs = vec![
            SelectedFile::new("a.pdf", blank_pdf(2)),
            SelectedFile::new("b.pdf", blank_pdf(3)),
        ];

        let outcome = bench.execute(&Operation::Merge, inputs).await.unwrap();

        let RunOutcome::Completed(output) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(
            QpdfWrapper::get_page_count(&output.parts[0], None).unwrap(),
            5
        );
        let state = bench.snapshot();
        assert!(!state.is_processing());
        assert_eq!(state.progress(), 0.0);
        assert_eq!(bench.running(), None);
    }

    #[tokio::test]
    async fn test_empty_input_is_skipped() {
        let bench = workbench();
        let outcome = bench.execute(&Operation::Merge, vec![]).await.unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Skipped {
                reason: "no files selected"
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_watermark_skipped_before_work() {
        let bench = workbench();
        let op = Operation::Watermark {
            text: String::new(),
        };
        // Garbage input would fail if the operation ran
        let outcome = bench
            .execute(&op, vec![SelectedFile::new("a.pdf", b"junk".to_vec())])
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_failure_resets_state() {
        let bench = workbench();
        let result = bench
            .execute(
                &Operation::Split,
                vec![SelectedFile::new("a.pdf", b"%PDF-broken".to_vec())],
            )
            .await;

        assert!(result.is_err());
        let state = bench.snapshot();
        assert!(!state.is_processing());
        assert_eq!(state.progress(), 0.0);
    }

    #[tokio::test]
    async fn test_second_request_is_busy() {
        let bench = workbench();
        let _held = bench.slot.try_lock().unwrap();

        let result = bench
            .execute(
                &Operation::Split,
                vec![SelectedFile::new("a.pdf", blank_pdf(1))],
            )
            .await;

        assert!(matches!(result, Err(Error::Busy { .. })));
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_noop() {
        let bench = workbench();
        assert_eq!(bench.cancel(), None);

        // A stale request must not leak into the next run
        bench.cancel.cancel();
        let outcome = bench
            .execute(
                &Operation::Split,
                vec![SelectedFile::new("a.pdf", blank_pdf(2))],
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
    }
}
