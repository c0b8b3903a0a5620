// tests/runner_test.rs
// Job execution against scripted stand-ins for yt-dlp: success, fallback
// walking, progress events, batch terminators, and cancellation.

#![cfg(unix)]

use rustgrab::command::DownloadJob;
use rustgrab::events::{channel_sink, Event};
use rustgrab::runner::{run_job, CancelHandle};
use rustgrab::tool::ToolConfig;
use rustgrab::worker::spawn_batch;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

fn write_script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fake-yt-dlp");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

fn drain_logs(rx: &mut UnboundedReceiver<Event>) -> Vec<String> {
    let mut logs = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::Log { text, .. } = event {
            logs.push(text);
        }
    }
    logs
}

#[tokio::test]
async fn test_successful_job_skips_fallbacks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "echo done; exit 0");
    let tool = ToolConfig::new(&script, false);
    let job = DownloadJob::video("https://www.tiktok.com/@u/video/1", dir.path());

    let (sink, mut rx) = channel_sink();
    let cancel = CancelHandle::new();
    let ok = run_job(&tool, &job, &sink, &cancel).await;
    assert!(ok);

    let logs = drain_logs(&mut rx);
    assert!(logs.iter().any(|l| l.starts_with("Running command:")));
    assert!(logs.iter().any(|l| l == "done"));
    assert!(!logs.iter().any(|l| l.starts_with("Running fallback:")));
}

#[tokio::test]
async fn test_failing_job_walks_all_four_fallbacks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "exit 1");
    let tool = ToolConfig::new(&script, true);
    let job = DownloadJob::video("https://www.tiktok.com/@u/video/1", dir.path());

    let (sink, mut rx) = channel_sink();
    let cancel = CancelHandle::new();
    let ok = run_job(&tool, &job, &sink, &cancel).await;
    assert!(!ok);

    let logs = drain_logs(&mut rx);
    let fallbacks = logs
        .iter()
        .filter(|l| l.starts_with("Running fallback:"))
        .count();
    assert_eq!(fallbacks, 4);
    assert_eq!(logs.last().map(|s| s.as_str()), Some("All fallbacks failed"));
}

#[tokio::test]
async fn test_first_passing_rung_ends_the_ladder() {
    let dir = tempfile::tempdir().expect("tempdir");
    // fail until the retry marker file exists, created on the first run
    let marker = dir.path().join("ran-once");
    let script = write_script(
        &dir,
        &format!(
            "if [ -f {m} ]; then exit 0; fi\ntouch {m}\nexit 1",
            m = marker.display()
        ),
    );
    let tool = ToolConfig::new(&script, false);
    let job = DownloadJob::video("https://www.tiktok.com/@u/video/1", dir.path());

    let (sink, mut rx) = channel_sink();
    let cancel = CancelHandle::new();
    let ok = run_job(&tool, &job, &sink, &cancel).await;
    assert!(ok);

    let logs = drain_logs(&mut rx);
    let fallbacks = logs
        .iter()
        .filter(|l| l.starts_with("Running fallback:"))
        .count();
    assert_eq!(fallbacks, 1);
    assert!(logs.iter().any(|l| l == "Fallback succeeded"));
}

#[tokio::test]
async fn test_missing_tool_is_reported_not_propagated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tool = ToolConfig::new("/nonexistent/yt-dlp", false);
    let job = DownloadJob::video("https://www.tiktok.com/@u/video/1", dir.path());

    let (sink, mut rx) = channel_sink();
    let cancel = CancelHandle::new();
    let ok = run_job(&tool, &job, &sink, &cancel).await;
    assert!(!ok);

    let logs = drain_logs(&mut rx);
    assert!(logs.iter().any(|l| l.starts_with("[ERROR]")));
    assert_eq!(logs.last().map(|s| s.as_str()), Some("All fallbacks failed"));
}

#[tokio::test]
async fn test_progress_parsed_from_download_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(
        &dir,
        "echo '[download]  42.5% of ~10.00MiB at 2.00MiB/s'\n\
         echo '[download] 100% of 10.00MiB in 00:05'\n\
         echo '[info] not a progress 99% line without the marker' 1>&2\n\
         exit 0",
    );
    let tool = ToolConfig::new(&script, false);
    let job = DownloadJob::video("https://www.tiktok.com/@u/video/1", dir.path());

    let (sink, mut rx) = channel_sink();
    let cancel = CancelHandle::new();
    assert!(run_job(&tool, &job, &sink, &cancel).await);

    let mut percents = Vec::new();
    let mut saw_stderr_line = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::Progress { percent } => percents.push(percent),
            Event::Log { text, .. } => {
                if text.contains("not a progress") {
                    saw_stderr_line = true;
                }
            }
        }
    }
    percents.sort_by(|a, b| a.partial_cmp(b).expect("ordered"));
    assert_eq!(percents, vec![42.5, 100.0]);
    // stderr is streamed as log lines but never as progress
    assert!(saw_stderr_line);
}

#[tokio::test]
async fn test_batch_runs_sequentially_and_closes_with_all_done() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "echo handled $2; exit 0");
    let tool = Arc::new(ToolConfig::new(&script, false));
    let jobs = vec![
        DownloadJob::video("https://www.tiktok.com/@u/video/1", dir.path()),
        DownloadJob::video("https://www.tiktok.com/@u/video/2", dir.path()),
    ];

    let (sink, mut rx) = channel_sink();
    let handle = spawn_batch(tool, jobs, Arc::new(sink));
    handle.wait().await;

    let logs = drain_logs(&mut rx);
    let finished: Vec<&String> = logs.iter().filter(|l| l.contains("Finished:")).collect();
    assert_eq!(finished.len(), 2);
    assert!(finished[0].contains("video/1"));
    assert!(finished[1].contains("video/2"));
    assert!(logs.last().is_some_and(|l| l.contains("=== ALL DONE ===")));
    assert!(!logs.iter().any(|l| l.contains("=== CANCELLED ===")));
}

#[tokio::test]
async fn test_failed_jobs_do_not_stop_the_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "exit 1");
    let tool = Arc::new(ToolConfig::new(&script, false));
    let jobs = vec![
        DownloadJob::video("https://www.tiktok.com/@u/video/1", dir.path()),
        DownloadJob::video("https://www.tiktok.com/@u/video/2", dir.path()),
    ];

    let (sink, mut rx) = channel_sink();
    let handle = spawn_batch(tool, jobs, Arc::new(sink));
    handle.wait().await;

    let logs = drain_logs(&mut rx);
    let failed = logs
        .iter()
        .filter(|l| l.starts_with("[FAILED] Finished:"))
        .count();
    assert_eq!(failed, 2);
    assert!(logs.last().is_some_and(|l| l.contains("=== ALL DONE ===")));
}

#[tokio::test]
async fn test_cancellation_kills_current_and_skips_rest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "echo started\nexec sleep 30");
    let tool = Arc::new(ToolConfig::new(&script, false));
    let jobs = vec![
        DownloadJob::video("https://www.tiktok.com/@u/video/1", dir.path()),
        DownloadJob::video("https://www.tiktok.com/@u/video/2", dir.path()),
    ];

    let (sink, mut rx) = channel_sink();
    let handle = spawn_batch(tool, jobs, Arc::new(sink));

    let mut logs = Vec::new();
    let mut stopped = false;
    while let Some(event) = rx.recv().await {
        if let Event::Log { text, .. } = event {
            if text == "started" && !stopped {
                stopped = true;
                handle.stop();
            }
            logs.push(text);
        }
    }
    handle.wait().await;

    assert!(logs.last().is_some_and(|l| l.contains("=== CANCELLED ===")));
    assert!(!logs.iter().any(|l| l.contains("=== ALL DONE ===")));
    // the second job never launched
    let launches = logs
        .iter()
        .filter(|l| l.starts_with("Running command:"))
        .count();
    assert_eq!(launches, 1);
    assert!(!logs.iter().any(|l| l.starts_with("Running fallback:")));
}

#[tokio::test]
async fn test_stop_after_last_output_still_reports_finished() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "echo last-line; exit 0");
    let tool = Arc::new(ToolConfig::new(&script, false));
    let jobs = vec![DownloadJob::video(
        "https://www.tiktok.com/@u/video/1",
        dir.path(),
    )];

    let (sink, mut rx) = channel_sink();
    let handle = spawn_batch(tool, jobs, Arc::new(sink));

    // stop lands after the job's final output line; the verdict line must
    // still be reported before any terminator
    let mut logs = Vec::new();
    let mut stopped = false;
    while let Some(event) = rx.recv().await {
        if let Event::Log { text, .. } = event {
            if text == "last-line" && !stopped {
                stopped = true;
                handle.stop();
            }
            logs.push(text);
        }
    }
    handle.wait().await;

    assert!(logs.iter().any(|l| l.starts_with("[OK] Finished:")));
    assert!(logs.last().is_some_and(|l| l.contains("===")));
}

#[tokio::test]
async fn test_stop_before_start_emits_cancelled_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(&dir, "exit 0");
    let tool = Arc::new(ToolConfig::new(&script, false));
    let jobs = vec![DownloadJob::video(
        "https://www.tiktok.com/@u/video/1",
        dir.path(),
    )];

    let (sink, mut rx) = channel_sink();
    let handle = spawn_batch(tool, jobs, Arc::new(sink));
    handle.stop();
    handle.wait().await;

    let logs = drain_logs(&mut rx);
    // either the stop landed before the job (CANCELLED alone) or just after
    // it finished; both end in a cancellation terminator, never ALL DONE
    assert!(logs.last().is_some_and(|l| l.contains("=== CANCELLED ===")));
    assert!(!logs.iter().any(|l| l.contains("=== ALL DONE ===")));
}
