// src/runner.rs
// Per-job process supervision: launch the primary command, stream combined
// output as log + derived progress events, honor cooperative cancellation,
// and walk the fallback ladder on failure. Nothing in here propagates an
// error past the job boundary; a job resolves to a bool plus its log trail.

use crate::command::{build_command, fallback_ladder, CommandSpec, DownloadJob};
use crate::error::AppError;
use crate::events::EventSink;
use crate::tool::ToolConfig;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

static PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9][0-9.]*)%").expect("progress pattern"));

/// Shared state between a batch's cancellation caller and its runner task.
/// The child slot holds at most the one in-flight process; it is swapped
/// before each ladder attempt so a stop request always reaches the process
/// actually running.
pub struct CancelHandle {
    stop: AtomicBool,
    current: Mutex<Option<Child>>,
}

impl CancelHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(CancelHandle {
            stop: AtomicBool::new(false),
            current: Mutex::new(None),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Set the stop flag and request termination of the in-flight child,
    /// if any. Does not block waiting for the process to die.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.kill_current();
    }

    fn kill_current(&self) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(child) = guard.as_mut() {
            if let Err(e) = child.start_kill() {
                warn!("Failed to signal child process: {}", e);
            }
        }
    }

    fn attach(&self, child: Child) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(child);
    }

    fn detach(&self) -> Option<Child> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

/// Percent immediately preceding the `%` sign of a download-progress line.
fn parse_progress(line: &str) -> Option<f64> {
    PROGRESS_RE
        .captures(line)
        .and_then(|c| c[1].parse::<f64>().ok())
}

async fn pump_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

/// Run one command to completion, streaming its output to the sink.
/// Returns `Ok(true)` only for a clean zero exit that was not cancelled.
async fn run_attempt(
    spec: &CommandSpec,
    sink: &dyn EventSink,
    cancel: &CancelHandle,
    tag: &str,
) -> Result<bool, AppError> {
    let mut command = spec.to_async_command();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    cancel.attach(child);
    if cancel.is_stopped() {
        // stop() may have run between spawn and attach
        cancel.kill_current();
    }

    let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
    let mut readers = Vec::new();
    if let Some(out) = stdout {
        readers.push(tokio::spawn(pump_lines(out, line_tx.clone())));
    }
    if let Some(err) = stderr {
        readers.push(tokio::spawn(pump_lines(err, line_tx.clone())));
    }
    drop(line_tx);

    let mut cancelled = false;
    while let Some(line) = line_rx.recv().await {
        if line.contains("[download]") && line.contains('%') {
            if let Some(percent) = parse_progress(&line) {
                sink.progress(percent);
            }
        }
        sink.log(tag, &line);

        if cancel.is_stopped() {
            cancelled = true;
            cancel.kill_current();
            break;
        }
    }
    drop(line_rx);
    for reader in readers {
        let _ = reader.await;
    }

    // Always reap the child, cancelled or not; no zombies.
    let status = match cancel.detach() {
        Some(mut child) => {
            if cancel.is_stopped() {
                let _ = child.start_kill();
            }
            child.wait().await?
        }
        None => return Ok(false),
    };

    Ok(!cancelled && status.success())
}

/// Run one job: primary command, then the fallback ladder on nonzero exit.
/// Returns overall success. Launch and streaming errors are logged to the
/// sink and count as a failed attempt; they never escape.
pub async fn run_job(
    tool: &ToolConfig,
    job: &DownloadJob,
    sink: &dyn EventSink,
    cancel: &CancelHandle,
) -> bool {
    let primary = build_command(tool, job);
    sink.log(
        &job.tag,
        &format!("Running command:\n{}", primary.display_line()),
    );

    match run_attempt(&primary, sink, cancel, &job.tag).await {
        Ok(true) => return true,
        Ok(false) => {}
        Err(e) => sink.log(&job.tag, &format!("[ERROR] {}", e)),
    }
    if cancel.is_stopped() {
        return false;
    }
    sink.log(&job.tag, "Primary download failed, attempting fallbacks...");

    for spec in fallback_ladder(&primary) {
        if cancel.is_stopped() {
            return false;
        }
        sink.log(
            &job.tag,
            &format!("Running fallback: {}", spec.display_line()),
        );
        match run_attempt(&spec, sink, cancel, &job.tag).await {
            Ok(true) => {
                sink.log(&job.tag, "Fallback succeeded");
                return true;
            }
            Ok(false) => {}
            Err(e) => sink.log(&job.tag, &format!("[FALLBACK ERROR] {}", e)),
        }
    }

    sink.log(&job.tag, "All fallbacks failed");
    false
}
