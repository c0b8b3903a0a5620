// src/command.rs
// Structured construction of yt-dlp invocations: the primary command for a
// job and the fixed fallback ladder tried when it fails. Fallbacks are pure
// transforms of the primary spec, so every rung is deterministic.

use crate::platform::detect_platform;
use crate::tool::ToolConfig;
use serde::Serialize;
use std::path::PathBuf;

/// Target audio codecs accepted for extraction.
pub const AUDIO_CODECS: [&str; 7] = ["mp3", "flac", "alac", "wav", "m4a", "opus", "ogg"];

/// Browser whose cookie store is used when no cookies file is available.
pub const COOKIE_BROWSER: &str = "chrome";

/// Number of rungs in the fallback ladder.
pub const FALLBACK_LADDER_LEN: usize = 4;

const REMOTE_COMPONENTS_FLAG: &str = "--remote-components";
const REMOTE_COMPONENTS_SPEC: &str = "ejs:github";

/// Best-quality composite used when the user picked no explicit selector.
const BEST_COMPOSITE: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best";
/// Conservative selector forced by the third fallback rung.
const CONSERVATIVE_MP4: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best";

/// Whether a job downloads the full video or extracts audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Video,
    Audio,
}

/// Everything needed to run one download. Created per submitted URL and
/// consumed exactly once by the runner; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadJob {
    pub url: String,
    pub output_dir: PathBuf,
    pub mode: Mode,
    /// Explicit format selector from a chosen pairing, video mode only.
    pub selector: Option<String>,
    /// Target codec for audio extraction; defaults to mp3.
    pub audio_codec: Option<String>,
    /// Candidate cookies file; only used if it exists on disk at build time.
    pub cookie_file: Option<PathBuf>,
    /// Batch tag, e.g. "VIDEO" or "AUDIO".
    pub tag: String,
}

impl DownloadJob {
    pub fn video(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        DownloadJob {
            url: url.into(),
            output_dir: output_dir.into(),
            mode: Mode::Video,
            selector: None,
            audio_codec: None,
            cookie_file: None,
            tag: "VIDEO".to_string(),
        }
    }

    pub fn audio(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        DownloadJob {
            url: url.into(),
            output_dir: output_dir.into(),
            mode: Mode::Audio,
            selector: None,
            audio_codec: None,
            cookie_file: None,
            tag: "AUDIO".to_string(),
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = Some(codec.into());
        self
    }

    pub fn with_cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(path.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

/// A fully specified tool invocation: program plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Human-readable single-line rendering, for the log trail.
    pub fn display_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    pub fn to_async_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

fn output_template(dir: &PathBuf) -> String {
    dir.join("%(title)s.%(ext)s").to_string_lossy().into_owned()
}

/// Cookie precedence: an existing cookies file wins; otherwise YouTube URLs
/// fall back to the browser cookie store; anything else runs cookie-less.
fn cookie_args(job: &DownloadJob) -> Vec<String> {
    if let Some(path) = &job.cookie_file {
        if path.is_file() {
            return vec![
                "--cookies".to_string(),
                path.to_string_lossy().into_owned(),
            ];
        }
    }
    if detect_platform(&job.url).is_youtube() {
        return vec![
            "--cookies-from-browser".to_string(),
            COOKIE_BROWSER.to_string(),
        ];
    }
    Vec::new()
}

fn selector_chain(selector: Option<&str>) -> String {
    match selector {
        // Exact pair, then mp4-preferring pair, then anything, then best.
        Some(sel) => format!("{}/{}", sel, BEST_COMPOSITE),
        None => BEST_COMPOSITE.to_string(),
    }
}

/// Build the primary invocation for a job.
pub fn build_command(tool: &ToolConfig, job: &DownloadJob) -> CommandSpec {
    let mut args: Vec<String> = Vec::new();

    if tool.has_js_runtime {
        args.push(REMOTE_COMPONENTS_FLAG.to_string());
        args.push(REMOTE_COMPONENTS_SPEC.to_string());
    }

    match job.mode {
        Mode::Audio => {
            args.push("--extract-audio".to_string());
            args.push("--audio-format".to_string());
            args.push(job.audio_codec.clone().unwrap_or_else(|| "mp3".to_string()));
            args.push("--audio-quality".to_string());
            args.push("0".to_string());
        }
        Mode::Video => {
            args.push("-f".to_string());
            args.push(selector_chain(job.selector.as_deref()));
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
        }
    }

    args.push("--newline".to_string());
    args.push("-o".to_string());
    args.push(output_template(&job.output_dir));
    args.extend(cookie_args(job));
    args.push(job.url.clone());

    CommandSpec {
        program: tool.ytdlp.clone(),
        args,
    }
}

/// Build the format-listing invocation (`-F`).
pub fn build_list_command(tool: &ToolConfig, url: &str, browser: Option<&str>) -> CommandSpec {
    let mut args: Vec<String> = Vec::new();
    if tool.has_js_runtime {
        args.push(REMOTE_COMPONENTS_FLAG.to_string());
        args.push(REMOTE_COMPONENTS_SPEC.to_string());
    }
    if let Some(browser) = browser {
        args.push("--cookies-from-browser".to_string());
        args.push(browser.to_string());
    }
    args.push("-F".to_string());
    args.push(url.to_string());

    CommandSpec {
        program: tool.ytdlp.clone(),
        args,
    }
}

fn strip_value_flag(args: &mut Vec<String>, flag: &str) {
    if let Some(i) = args.iter().position(|a| a == flag) {
        args.remove(i);
        if i < args.len() {
            args.remove(i);
        }
    }
}

fn ensure_flag_front(args: &mut Vec<String>, flag: &str) {
    if !args.iter().any(|a| a == flag) {
        args.insert(0, flag.to_string());
    }
}

fn ensure_value_flag_front(args: &mut Vec<String>, flag: &str, value: &str) {
    if !args.iter().any(|a| a == flag) {
        args.insert(0, value.to_string());
        args.insert(0, flag.to_string());
    }
}

fn set_format_selector(args: &mut Vec<String>, value: &str) {
    if let Some(i) = args.iter().position(|a| a == "-f") {
        if i + 1 < args.len() {
            args[i + 1] = value.to_string();
        } else {
            args.push(value.to_string());
        }
    } else {
        args.insert(0, "-f".to_string());
        args.insert(1, value.to_string());
    }
}

/// Derive one fallback rung from the primary spec. Variants, in the order
/// they are tried:
///
/// 1. drop the remote challenge-solver components
/// 2. (1) plus native segmented-stream handling
/// 3. (1) plus a conservative fixed mp4 selector
/// 4. (3) plus mpegts segment container and a raised fragment-retry ceiling
///
/// Indices above the ladder length behave like the last rung.
pub fn build_fallback(base: &CommandSpec, variant: usize) -> CommandSpec {
    let mut args = base.args.clone();
    strip_value_flag(&mut args, REMOTE_COMPONENTS_FLAG);

    match variant {
        1 => {}
        2 => {
            ensure_flag_front(&mut args, "--hls-prefer-native");
        }
        3 => {
            set_format_selector(&mut args, CONSERVATIVE_MP4);
        }
        _ => {
            set_format_selector(&mut args, CONSERVATIVE_MP4);
            ensure_flag_front(&mut args, "--hls-use-mpegts");
            ensure_value_flag_front(&mut args, "--fragment-retries", "20");
        }
    }

    CommandSpec {
        program: base.program.clone(),
        args,
    }
}

/// The full ordered ladder for a primary spec.
pub fn fallback_ladder(base: &CommandSpec) -> Vec<CommandSpec> {
    (1..=FALLBACK_LADDER_LEN)
        .map(|variant| build_fallback(base, variant))
        .collect()
}
