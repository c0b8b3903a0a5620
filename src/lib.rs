// src/lib.rs
// Download machinery behind the rustgrab binary, exposed as a library so
// alternative front-ends can drive the same jobs, events, and parsers.

pub mod cli;
pub mod command;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod formats;
pub mod platform;
pub mod runner;
pub mod tool;
pub mod worker;

pub use command::{DownloadJob, Mode};
pub use error::AppError;
pub use events::{channel_sink, Event, EventSink};
pub use fetcher::fetch_formats;
pub use formats::{parse_format_listing, FormatTable};
pub use platform::{detect_platform, extract_urls, validate_url, Platform};
pub use tool::ToolConfig;
pub use worker::{spawn_batch, BatchHandle};
