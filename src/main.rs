// src/main.rs

use clap::ArgMatches;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use rustgrab::cli::{build_cli, parse_filter};
use rustgrab::command::DownloadJob;
use rustgrab::error::AppError;
use rustgrab::events::{channel_sink, Event};
use rustgrab::fetcher::{fetch_formats, fetch_listing};
use rustgrab::formats::filter_listing;
use rustgrab::platform::extract_urls;
use rustgrab::tool::{find_cookies_file, ToolConfig};
use rustgrab::worker::spawn_batch;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Initialize the logger with timestamped output.
fn init_logger() {
    let mut builder = env_logger::Builder::new();

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if cfg!(debug_assertions) {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.filter_level(LevelFilter::Info);
    }

    builder.parse_env("RUST_LOG");
    builder.init();
}

#[tokio::main]
async fn main() {
    init_logger();
    let matches = build_cli().get_matches();

    let result = match matches.subcommand() {
        Some(("formats", sub)) => run_formats(sub).await,
        _ => run_downloads(&matches).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// `formats <url>`: grouped pairings by default, or the raw filtered
/// listing when `--filter` is given.
async fn run_formats(matches: &ArgMatches) -> Result<(), AppError> {
    let tool = ToolConfig::detect()?;
    let url = matches
        .get_one::<String>("url")
        .cloned()
        .ok_or_else(|| AppError::ValidationError("a URL is required".to_string()))?;

    if let Some(filter) = matches.get_one::<String>("filter") {
        let raw = fetch_listing(&tool, &url).await?;
        println!("{}", filter_listing(&raw, parse_filter(filter)));
        return Ok(());
    }

    let table = fetch_formats(&tool, &url).await;
    if table.is_empty() {
        return Err(AppError::FetchError(format!(
            "no downloadable formats found for {}",
            url
        )));
    }
    for (group, pairings) in &table {
        println!("{}", group.to_string().cyan().bold());
        for pairing in pairings {
            println!(
                "  {}  {}",
                pairing.display,
                format!("(-f {})", pairing.selector).dimmed()
            );
        }
    }
    Ok(())
}

/// Default mode: queue every accepted URL as one sequential batch and
/// mirror its event stream onto the terminal.
async fn run_downloads(matches: &ArgMatches) -> Result<(), AppError> {
    let tool = Arc::new(ToolConfig::detect()?);

    let mut text = matches
        .get_many::<String>("urls")
        .map(|vals| vals.cloned().collect::<Vec<_>>().join("\n"))
        .unwrap_or_default();
    if text.trim().is_empty() {
        println!("{}", "Paste URLs (one per line), then Ctrl-D:".green());
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        text = buf;
    }

    let batch = extract_urls(&text);
    for line in &batch.rejected {
        eprintln!("{} {}", "Skipping unsupported line:".yellow(), line);
    }
    if batch.accepted.is_empty() {
        return Err(AppError::ValidationError(
            "no valid URLs to download".to_string(),
        ));
    }

    let output_dir = matches
        .get_one::<PathBuf>("output-dir")
        .cloned()
        .or_else(dirs_next::download_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir)?;

    let cookie_file = matches
        .get_one::<PathBuf>("cookies")
        .cloned()
        .or_else(find_cookies_file);
    let audio_mode = matches.get_flag("audio");
    let selector = matches.get_one::<String>("selector").cloned();
    let audio_format = matches.get_one::<String>("audio-format").cloned();

    let jobs: Vec<DownloadJob> = batch
        .accepted
        .iter()
        .map(|url| {
            let mut job = if audio_mode {
                let mut job = DownloadJob::audio(url, &output_dir);
                if let Some(codec) = &audio_format {
                    job = job.with_audio_codec(codec);
                }
                job
            } else {
                let mut job = DownloadJob::video(url, &output_dir);
                if let Some(sel) = &selector {
                    job = job.with_selector(sel);
                }
                job
            };
            if let Some(cookies) = &cookie_file {
                job = job.with_cookie_file(cookies);
            }
            job
        })
        .collect();

    println!(
        "{} {} download(s) into {}",
        "Queued".green().bold(),
        jobs.len(),
        output_dir.display()
    );

    let (sink, mut rx) = channel_sink();
    let handle = spawn_batch(Arc::clone(&tool), jobs, Arc::new(sink));

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut stop_requested = false;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(Event::Progress { percent }) => {
                    bar.set_position(percent.clamp(0.0, 100.0) as u64);
                }
                Some(Event::Log { tag, text }) => {
                    for line in text.lines().filter(|l| !l.is_empty()) {
                        bar.println(format!("[{}] {}", tag, line));
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !stop_requested => {
                stop_requested = true;
                bar.println(
                    "Stopping after the current process exits...".yellow().to_string(),
                );
                handle.stop();
            }
        }
    }
    bar.finish_and_clear();
    handle.wait().await;
    Ok(())
}
