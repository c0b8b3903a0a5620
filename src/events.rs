// src/events.rs
// Event sink contract between the download machinery and whatever front-end
// drains it. Many producers (one per batch task), one consumer.

use serde::Serialize;
use tokio::sync::mpsc;

/// Events pushed from background workers toward the UI layer. Within one
/// job the ordering matches the child process output; across jobs there is
/// no ordering guarantee.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A raw output or status line associated with a batch display surface.
    Log { tag: String, text: String },
    /// Derived download progress, 0-100.
    Progress { percent: f64 },
}

/// Sink the workers emit into. Implementations must tolerate concurrent
/// producers and must never block the emitting task.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);

    fn log(&self, tag: &str, text: &str) {
        self.emit(Event::Log {
            tag: tag.to_string(),
            text: text.to_string(),
        });
    }

    fn progress(&self, percent: f64) {
        self.emit(Event::Progress { percent });
    }
}

/// Channel-backed sink; the receiving half is polled by the front-end.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        // A dropped receiver just means the front-end went away; workers
        // keep running to completion.
        let _ = self.tx.send(event);
    }
}

/// Create a sink plus the receiver the front-end drains.
pub fn channel_sink() -> (ChannelSink, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, rx)
}
