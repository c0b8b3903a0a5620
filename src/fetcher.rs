// src/fetcher.rs
// Format discovery: run `yt-dlp -F`, parse the listing, retry with backoff.
// YouTube gets a rotation of browser cookie stores since listings there
// frequently require a signed-in session. Discovery never hard-fails; an
// empty table means "nothing usable found".

use crate::command::build_list_command;
use crate::error::AppError;
use crate::formats::{parse_format_listing, FormatTable};
use crate::platform::detect_platform;
use crate::tool::ToolConfig;
use log::{debug, warn};
use std::process::Stdio;
use std::time::Duration;

/// Attempts per browser before moving on.
pub const FETCH_ATTEMPTS: u32 = 3;
/// Hard cap on one listing invocation.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const YOUTUBE_BROWSERS: [&str; 4] = ["chrome", "safari", "firefox", "edge"];

/// Run one `-F` invocation to completion and return its combined output.
async fn attempt_fetch(
    tool: &ToolConfig,
    url: &str,
    browser: Option<&str>,
) -> Result<String, AppError> {
    let spec = build_list_command(tool, url, browser);
    debug!("Listing formats: {}", spec.display_line());

    let mut command = spec.to_async_command();
    command.stdin(Stdio::null()).kill_on_drop(true);

    match tokio::time::timeout(FETCH_TIMEOUT, command.output()).await {
        Ok(Ok(output)) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push('\n');
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            Ok(text)
        }
        Ok(Err(e)) => Err(AppError::IoError(e)),
        Err(_) => Err(AppError::FetchError(format!(
            "format listing timed out after {}s",
            FETCH_TIMEOUT.as_secs()
        ))),
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    // 1s, 2s, then capped at 4s
    Duration::from_secs((1u64 << attempt).min(4))
}

/// Fetch and parse the format table for a URL. YouTube rotates through
/// browser cookie stores; other platforms query cookie-less. Each browser
/// gets up to [`FETCH_ATTEMPTS`] tries with exponential backoff; a timeout
/// skips straight to the next browser. Exhaustion yields an empty table.
pub async fn fetch_formats(tool: &ToolConfig, url: &str) -> FormatTable {
    let browsers: Vec<Option<&str>> = if detect_platform(url).is_youtube() {
        YOUTUBE_BROWSERS.iter().map(|b| Some(*b)).collect()
    } else {
        vec![None]
    };

    for browser in browsers {
        for attempt in 0..FETCH_ATTEMPTS {
            match attempt_fetch(tool, url, browser).await {
                Ok(output) => {
                    let table = parse_format_listing(&output);
                    if !table.is_empty() {
                        debug!(
                            "Parsed {} resolution group(s) for {}",
                            table.len(),
                            url
                        );
                        return table;
                    }
                    debug!(
                        "No usable formats on attempt {} (browser: {:?})",
                        attempt + 1,
                        browser
                    );
                }
                Err(AppError::FetchError(msg)) => {
                    // Timed out; this browser's cookie store is a dead end.
                    warn!("{} (browser: {:?})", msg, browser);
                    break;
                }
                Err(e) => {
                    warn!(
                        "Format listing failed on attempt {}: {}",
                        attempt + 1,
                        e
                    );
                }
            }
            if attempt + 1 < FETCH_ATTEMPTS {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }
    }

    warn!("Exhausted all format-listing attempts for {}", url);
    FormatTable::new()
}

/// Single-shot raw listing for the format checker view. YouTube uses the
/// default browser cookie store; everything else goes cookie-less.
pub async fn fetch_listing(tool: &ToolConfig, url: &str) -> Result<String, AppError> {
    let browser = if detect_platform(url).is_youtube() {
        Some(crate::command::COOKIE_BROWSER)
    } else {
        None
    };
    attempt_fetch(tool, url, browser).await
}
