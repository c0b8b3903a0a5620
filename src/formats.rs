// src/formats.rs
// Parsing of `yt-dlp -F` output into resolution-grouped, downloadable
// video+audio pairings. The tool's listing is free-form text, so everything
// here is regex-driven, pure, and total: malformed input yields a partial or
// empty result, never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Codecs we recognize in a format line. Detection is a case-insensitive
/// substring search in this priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Codec {
    Av01,
    ByteVc1,
    H264,
    Vp9,
    Opus,
    Aac,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Av01 => "AV01",
            Codec::ByteVc1 => "ByteVC1",
            Codec::H264 => "H264",
            Codec::Vp9 => "VP9",
            Codec::Opus => "Opus",
            Codec::Aac => "AAC",
        };
        f.write_str(name)
    }
}

fn detect_codec(low: &str) -> Option<Codec> {
    if low.contains("av01") {
        Some(Codec::Av01)
    } else if low.contains("bytevc1") {
        Some(Codec::ByteVc1)
    } else if low.contains("avc") || low.contains("h264") {
        Some(Codec::H264)
    } else if low.contains("vp9") || low.contains("vp09") {
        Some(Codec::Vp9)
    } else if low.contains("opus") {
        Some(Codec::Opus)
    } else if low.contains("m4a") || low.contains("mp4a") {
        Some(Codec::Aac)
    } else {
        None
    }
}

/// Coarse quality tier derived from pixel height. Declaration order doubles
/// as display order: iterating a `BTreeMap` keyed by this enum yields the
/// highest tier first. Heights below 720 are not surfaced at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ResolutionGroup {
    R8K,
    R4K,
    R1440,
    R1080,
    R720,
}

impl ResolutionGroup {
    pub fn from_height(height: u32) -> Option<Self> {
        if height >= 4320 {
            Some(ResolutionGroup::R8K)
        } else if height >= 2160 {
            Some(ResolutionGroup::R4K)
        } else if height >= 1440 {
            Some(ResolutionGroup::R1440)
        } else if height >= 1080 {
            Some(ResolutionGroup::R1080)
        } else if height >= 720 {
            Some(ResolutionGroup::R720)
        } else {
            None
        }
    }
}

impl fmt::Display for ResolutionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionGroup::R8K => "8K (4320p)",
            ResolutionGroup::R4K => "4K (2160p)",
            ResolutionGroup::R1440 => "1440p",
            ResolutionGroup::R1080 => "1080p",
            ResolutionGroup::R720 => "720p",
        };
        f.write_str(name)
    }
}

/// One video stream from the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoFormat {
    pub id: String,
    pub codec: Option<Codec>,
    pub height: u32,
    pub group: ResolutionGroup,
}

/// One audio-only stream from the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub id: String,
    pub codec: Option<Codec>,
    pub bitrate_kbps: u32,
}

/// A complete downloadable selection: a video stream paired with the best
/// available audio stream, or a self-contained video stream whose audio is
/// already included (common on TikTok and Instagram).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatPairing {
    pub video_id: String,
    pub video_codec: Option<Codec>,
    /// `None` means the video stream carries its own audio.
    pub audio_id: Option<String>,
    pub audio_codec: Option<Codec>,
    pub audio_bitrate_kbps: u32,
    /// Format selector expression to hand to the download tool.
    pub selector: String,
    pub display: String,
}

impl FormatPairing {
    fn paired(video: &VideoFormat, audio: &AudioFormat) -> Self {
        let selector = format!("{}+{}", video.id, audio.id);
        let display = format!(
            "{} \u{2022} {} ({} {}k)",
            codec_label(video.codec, "Video"),
            selector,
            codec_label(audio.codec, "Audio"),
            audio.bitrate_kbps
        );
        FormatPairing {
            video_id: video.id.clone(),
            video_codec: video.codec,
            audio_id: Some(audio.id.clone()),
            audio_codec: audio.codec,
            audio_bitrate_kbps: audio.bitrate_kbps,
            selector,
            display,
        }
    }

    fn self_contained(video: &VideoFormat) -> Self {
        let display = format!(
            "{} \u{2022} {} (Audio Included)",
            codec_label(video.codec, "Video"),
            video.id
        );
        FormatPairing {
            video_id: video.id.clone(),
            video_codec: video.codec,
            audio_id: None,
            audio_codec: None,
            audio_bitrate_kbps: 0,
            selector: video.id.clone(),
            display,
        }
    }
}

fn codec_label(codec: Option<Codec>, fallback: &str) -> String {
    match codec {
        Some(c) => c.to_string(),
        None => fallback.to_string(),
    }
}

/// Parsed listing: pairings grouped by quality tier, best tier first.
/// Groups with no pairings are absent, never empty.
pub type FormatTable = BTreeMap<ResolutionGroup, Vec<FormatPairing>>;

/// Separate audio ids to try when pairing, highest quality first.
pub const AUDIO_PRIORITY: [&str; 5] = ["251", "140", "250", "249", "139"];

static RES_WXH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{3,4})x(\d{3,4})").expect("WxH pattern"));
static RES_P_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{3,4})p").expect("Hp pattern"));
static BITRATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)k").expect("bitrate pattern"));

fn is_header_line(line: &str) -> bool {
    line.contains("ID") && (line.contains("EXT") || line.contains("RESOLUTION"))
}

/// Parse a `-F` listing into grouped pairings. Input with no recognizable
/// header yields an empty table (a valid "no formats" result).
pub fn parse_format_listing(output: &str) -> FormatTable {
    let lines: Vec<&str> = output.lines().collect();

    let start = match lines.iter().position(|l| is_header_line(l)) {
        Some(i) => i,
        None => return FormatTable::new(),
    };

    let mut videos: Vec<VideoFormat> = Vec::new();
    let mut audios: HashMap<String, AudioFormat> = HashMap::new();

    for line in &lines[start + 1..] {
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let id = match parts.next() {
            Some(id) => id,
            None => continue,
        };
        if parts.next().is_none() {
            continue;
        }
        let low = line.to_lowercase();
        let codec = detect_codec(&low);

        if low.contains("audio only") {
            let bitrate_kbps = BITRATE_RE
                .captures(&low)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            audios.insert(
                id.to_string(),
                AudioFormat {
                    id: id.to_string(),
                    codec,
                    bitrate_kbps,
                },
            );
            continue;
        }

        // Two resolution spellings: "1920x1080" and "1080p"; prefer the
        // height component of the WxH form.
        let height = RES_WXH_RE
            .captures(line)
            .and_then(|c| c[2].parse::<u32>().ok())
            .or_else(|| RES_P_RE.captures(&low).and_then(|c| c[1].parse().ok()));

        let height = match height {
            Some(h) => h,
            None => continue, // neither audio nor video shaped; ignore
        };
        let group = match ResolutionGroup::from_height(height) {
            Some(g) => g,
            None => continue, // below 720p, not surfaced
        };

        videos.push(VideoFormat {
            id: id.to_string(),
            codec,
            height,
            group,
        });
    }

    let mut table = FormatTable::new();
    let mut seen: HashMap<ResolutionGroup, HashSet<Option<Codec>>> = HashMap::new();

    for video in &videos {
        // One representative pairing per (video codec, tier); first seen wins.
        if !seen.entry(video.group).or_default().insert(video.codec) {
            continue;
        }

        let pairing = AUDIO_PRIORITY
            .iter()
            .find_map(|id| audios.get(*id))
            .map(|audio| FormatPairing::paired(video, audio))
            .unwrap_or_else(|| FormatPairing::self_contained(video));

        table.entry(video.group).or_default().push(pairing);
    }

    table
}

/// Filters for the raw format-checker view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFilter {
    All,
    AudioOnly,
    /// Audio at or above 256 kbps.
    HighAudio,
    /// Audio at or above 480 kbps.
    TopAudio,
    VideoOnly,
}

fn audio_quality_marker(bitrate: u32) -> &'static str {
    if bitrate >= 480 {
        " [EXCELLENT]"
    } else if bitrate >= 256 {
        " [VERY GOOD]"
    } else if bitrate >= 160 {
        " [GOOD]"
    } else {
        " [MEDIUM]"
    }
}

/// Re-render a raw listing with one of the checker filters applied, keeping
/// the header block intact and annotating audio lines with a quality marker.
/// Input without a full header is passed through unchanged.
pub fn filter_listing(output: &str, filter: FormatFilter) -> String {
    let lines: Vec<&str> = output.lines().collect();

    let start = match lines
        .iter()
        .position(|l| l.contains("ID") && l.contains("EXT") && l.contains("RESOLUTION"))
    {
        Some(i) => i,
        None => return output.to_string(),
    };

    let mut result: Vec<String> = lines[..(start + 2).min(lines.len())]
        .iter()
        .map(|l| l.to_string())
        .collect();
    let mut audio_bitrates: Vec<u32> = Vec::new();

    for line in &lines[(start + 2).min(lines.len())..] {
        if line.trim().is_empty() {
            continue;
        }
        let low = line.to_lowercase();
        let bitrate: u32 = BITRATE_RE
            .captures(&low)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0);
        let is_audio = low.contains("audio only");
        let is_video = low.contains("video only") || (low.contains('x') && !is_audio);

        let rendered = if is_audio {
            format!("{}{}", line, audio_quality_marker(bitrate))
        } else {
            line.to_string()
        };

        let keep = match filter {
            FormatFilter::All => true,
            FormatFilter::AudioOnly => is_audio,
            FormatFilter::HighAudio => is_audio && bitrate >= 256,
            FormatFilter::TopAudio => is_audio && bitrate >= 480,
            FormatFilter::VideoOnly => is_video,
        };
        if keep {
            if is_audio {
                audio_bitrates.push(bitrate);
            }
            result.push(rendered);
        }
    }

    let audio_filter = matches!(
        filter,
        FormatFilter::AudioOnly | FormatFilter::HighAudio | FormatFilter::TopAudio
    );
    if audio_filter && !audio_bitrates.is_empty() {
        audio_bitrates.sort_unstable_by(|a, b| b.cmp(a));
        let max = audio_bitrates[0];
        result.push(String::new());
        result.push("AUDIO QUALITY SUMMARY:".to_string());
        result.push(format!("Highest available bitrate: {} kbps", max));
        result.push(
            if max >= 480 {
                "EXCELLENT - near the platform maximum (512 kbps 5.1)"
            } else if max >= 256 {
                "VERY GOOD - high-quality stereo (max 384 kbps)"
            } else if max >= 160 {
                "GOOD - standard quality"
            } else {
                "MEDIUM - lower-quality audio"
            }
            .to_string(),
        );
        result.push(format!("Found {} audio format(s)", audio_bitrates.len()));
    }

    result.join("\n")
}
