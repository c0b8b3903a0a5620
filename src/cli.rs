// src/cli.rs

use crate::command::AUDIO_CODECS;
use crate::formats::FormatFilter;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

/// Build the command-line interface.
pub fn build_cli() -> Command {
    Command::new("rustgrab")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multi-platform video and audio downloader built on yt-dlp")
        .arg(
            Arg::new("urls")
                .help("URLs to download; reads stdin when omitted (one per line)")
                .action(ArgAction::Append)
                .num_args(0..),
        )
        .arg(
            Arg::new("audio")
                .short('a')
                .long("audio")
                .help("Extract audio instead of downloading video")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("audio-format")
                .long("audio-format")
                .help("Target codec for audio extraction")
                .value_parser(AUDIO_CODECS)
                .default_value("mp3"),
        )
        .arg(
            Arg::new("selector")
                .short('f')
                .long("format")
                .help("Explicit format selector (e.g. 137+140), video mode only")
                .value_name("SELECTOR"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .help("Directory to save downloads into (default: your Downloads folder)")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("cookies")
                .long("cookies")
                .help("Netscape cookies.txt file to authenticate with")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand(
            Command::new("formats")
                .about("List downloadable formats for a URL")
                .arg(
                    Arg::new("url")
                        .help("Video URL to inspect")
                        .required(true),
                )
                .arg(
                    Arg::new("filter")
                        .long("filter")
                        .help("Show the raw listing filtered by stream kind")
                        .value_parser(["all", "audio", "high-audio", "top-audio", "video"]),
                ),
        )
}

/// Map a `--filter` value to the checker filter it names.
pub fn parse_filter(name: &str) -> FormatFilter {
    match name {
        "audio" => FormatFilter::AudioOnly,
        "high-audio" => FormatFilter::HighAudio,
        "top-audio" => FormatFilter::TopAudio,
        "video" => FormatFilter::VideoOnly,
        _ => FormatFilter::All,
    }
}
