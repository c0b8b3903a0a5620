// src/tool.rs
// Startup resolution of the external download tool and related probes.
// Everything here runs once; the resulting ToolConfig is threaded through
// the builders and runners as plain configuration.

use crate::error::AppError;
use log::{debug, info};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Resolved external-tool configuration.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Absolute or PATH-relative invocation for yt-dlp.
    pub ytdlp: PathBuf,
    /// Whether a JavaScript runtime (node or deno) is available. Gates the
    /// remote challenge-solver flag, which yt-dlp cannot use without one.
    pub has_js_runtime: bool,
}

impl ToolConfig {
    /// Resolve yt-dlp and probe the environment. Fatal at startup when the
    /// tool cannot be found.
    pub fn detect() -> Result<Self, AppError> {
        let ytdlp = resolve_ytdlp()?;
        let has_js_runtime = detect_js_runtime();
        info!(
            "yt-dlp resolved to {:?} (js runtime: {})",
            ytdlp, has_js_runtime
        );
        Ok(ToolConfig {
            ytdlp,
            has_js_runtime,
        })
    }

    /// Explicit constructor for tests and embedders.
    pub fn new(ytdlp: impl Into<PathBuf>, has_js_runtime: bool) -> Self {
        ToolConfig {
            ytdlp: ytdlp.into(),
            has_js_runtime,
        }
    }
}

/// Locate the yt-dlp executable, in order: next to our own executable
/// (bundled layout), on PATH, in a local virtual environment.
pub fn resolve_ytdlp() -> Result<PathBuf, AppError> {
    let bin_name = if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    };

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let bundled = dir.join("bin").join(bin_name);
            if bundled.is_file() {
                debug!("Using bundled yt-dlp at {:?}", bundled);
                return Ok(bundled);
            }
        }
    }

    if let Some(path) = find_in_path(bin_name) {
        return Ok(path);
    }

    let venv = PathBuf::from("venv").join("bin").join(bin_name);
    if venv.is_file() {
        debug!("Using virtualenv yt-dlp at {:?}", venv);
        return Ok(venv);
    }

    Err(AppError::ToolNotFound(
        "install it with `pip install yt-dlp` or place it on your PATH".to_string(),
    ))
}

/// Search PATH for an executable using the platform lookup command, falling
/// back to invoking it directly.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let lookup = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    if let Ok(output) = Command::new(lookup).arg(name).output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout);
            let first = path.lines().next().unwrap_or("").trim();
            if !first.is_empty() {
                debug!("Found {} at {}", name, first);
                return Some(PathBuf::from(first));
            }
        }
    }

    // The lookup tool itself may be missing; try the program directly.
    let probe = Command::new(name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if matches!(probe, Ok(status) if status.success()) {
        return Some(PathBuf::from(name));
    }

    None
}

/// yt-dlp needs node or deno for certain challenge-solving paths; without
/// one the remote-solver flag must be left off.
pub fn detect_js_runtime() -> bool {
    find_in_path("node").is_some() || find_in_path("deno").is_some()
}

/// Look for a Netscape-format cookies.txt in the usual drop spots.
pub fn find_cookies_file() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(downloads) = dirs_next::download_dir() {
        candidates.push(downloads.join("cookies.txt"));
    }
    candidates.push(PathBuf::from("cookies.txt"));
    if let Some(home) = home::home_dir() {
        candidates.push(home.join("cookies.txt"));
    }

    candidates.into_iter().find(|p| p.is_file())
}
