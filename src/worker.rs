// src/worker.rs
// Sequential batch execution on a background task. One batch owns one
// CancelHandle; stopping the batch kills the in-flight process and skips
// everything still queued.

use crate::command::DownloadJob;
use crate::events::EventSink;
use crate::runner::{run_job, CancelHandle};
use crate::tool::ToolConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Handle to a running batch: cancel it, or wait for it to finish.
pub struct BatchHandle {
    cancel: Arc<CancelHandle>,
    join: JoinHandle<()>,
}

impl BatchHandle {
    /// Request cancellation. Returns immediately; the batch task emits the
    /// cancellation terminator once it has wound down.
    pub fn stop(&self) {
        self.cancel.request_stop();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the batch task to exit.
    pub async fn wait(self) {
        let _ = self.join.await;
    }
}

/// Spawn a batch of jobs, run strictly one at a time in submission order.
/// Every job gets a "Finished" line whatever its outcome, and the batch
/// closes with exactly one terminator: ALL DONE normally, CANCELLED when
/// stopped early.
pub fn spawn_batch(
    tool: Arc<ToolConfig>,
    jobs: Vec<DownloadJob>,
    sink: Arc<dyn EventSink>,
) -> BatchHandle {
    let cancel = CancelHandle::new();
    let task_cancel = Arc::clone(&cancel);

    let join = tokio::spawn(async move {
        let batch_tag = jobs
            .first()
            .map(|j| j.tag.clone())
            .unwrap_or_else(|| "VIDEO".to_string());

        for job in &jobs {
            if task_cancel.is_stopped() {
                sink.log(&batch_tag, "\n=== CANCELLED ===\n");
                return;
            }

            let ok = run_job(&tool, job, sink.as_ref(), &task_cancel).await;
            // a job that ran to completion before the stop flag was seen
            // still gets its verdict line; only a job the stop actually
            // interrupted is folded into the cancellation terminator
            if ok || !task_cancel.is_stopped() {
                let verdict = if ok { "[OK]" } else { "[FAILED]" };
                sink.log(&job.tag, &format!("{} Finished: {}", verdict, job.url));
            }
            if task_cancel.is_stopped() {
                sink.log(&batch_tag, "\n=== CANCELLED ===\n");
                return;
            }
        }

        sink.log(&batch_tag, "\n=== ALL DONE ===\n");
    });

    BatchHandle { cancel, join }
}
