// src/platform.rs
// URL classification and multi-line paste scrubbing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Source platforms we know how to label. Anything else downloads fine
/// through yt-dlp but is reported generically as "Video".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    YouTube,
    TikTok,
    Facebook,
    Instagram,
    SoundCloud,
    Other,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::YouTube => "YouTube",
            Platform::TikTok => "TikTok",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::SoundCloud => "SoundCloud",
            Platform::Other => "Video",
        };
        f.write_str(name)
    }
}

impl Platform {
    pub fn is_youtube(self) -> bool {
        self == Platform::YouTube
    }
}

/// Detect the source platform from a URL. Pure function of the lowercased
/// URL; unknown domains map to `Platform::Other`.
pub fn detect_platform(url: &str) -> Platform {
    let low = url.to_lowercase();
    if low.contains("youtube.com") || low.contains("youtu.be") {
        Platform::YouTube
    } else if low.contains("tiktok.com") {
        Platform::TikTok
    } else if low.contains("facebook.com") || low.contains("fb.watch") || low.contains("fb.com") {
        Platform::Facebook
    } else if low.contains("instagram.com") {
        Platform::Instagram
    } else if low.contains("soundcloud.com") {
        Platform::SoundCloud
    } else {
        Platform::Other
    }
}

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(https?://)?(www\.)?(youtube\.com|youtu\.be|facebook\.com|fb\.watch|fb\.com|tiktok\.com|instagram\.com|soundcloud\.com)/.+$",
    )
    .expect("url pattern")
});

/// Check whether a single line looks like a downloadable URL on one of the
/// supported platforms.
pub fn validate_url(line: &str) -> bool {
    URL_RE.is_match(line)
}

/// Result of scrubbing a multi-line paste: URLs we accepted, plus the lines
/// that were neither URLs nor recognizable log noise. Rejected lines are for
/// a caller-side warning; they are never fatal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UrlBatch {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
}

/// Lines the UI itself writes into the paste area (banners, status lines,
/// previous command echoes) are silently dropped rather than reported.
fn is_log_noise(line: &str) -> bool {
    let upper = line.to_uppercase();
    line.starts_with('=')
        || line.starts_with('-')
        || line.starts_with('[')
        || line.starts_with("Paste")
        || upper.contains("DOWNLOAD")
        || upper.contains("RUNNING")
        || upper.contains("COMMAND:")
        || line.contains('\u{2705}')
        || line.contains('\u{274C}')
}

/// Extract video/audio URLs from a multi-line string.
pub fn extract_urls(text: &str) -> UrlBatch {
    let mut batch = UrlBatch::default();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || is_log_noise(line) {
            continue;
        }
        if validate_url(line) {
            batch.accepted.push(line.to_string());
        } else {
            batch.rejected.push(line.to_string());
        }
    }

    batch
}
