// SPDX-License-Identifier: MIT
//! Log sink — where subprocess output and pipeline progress lines go.
//!
//! The pipeline never talks to a terminal or a UI directly. It emits
//! [`LogLine`]s through a [`LogSink`] passed in by the caller, so an
//! embedding surface (CLI today, anything with a message loop tomorrow)
//! decides how lines reach the user. Sinks must be `Send + Sync`: the
//! process runner calls `emit` from its stdout/stderr reader tasks.

use std::sync::Mutex;

use tokio::sync::broadcast;

/// Which stream of the child process a line came from.
///
/// Lines the pipeline itself emits (progress, decisions) use `Stdout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// A single output line, in arrival order.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LogLine {
    pub source: StreamSource,
    pub text: String,
}

impl LogLine {
    pub fn out(text: impl Into<String>) -> Self {
        Self {
            source: StreamSource::Stdout,
            text: text.into(),
        }
    }

    pub fn err(text: impl Into<String>) -> Self {
        Self {
            source: StreamSource::Stderr,
            text: text.into(),
        }
    }
}

/// Destination for pipeline and subprocess output lines.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: LogLine);

    /// Convenience for pipeline progress messages.
    fn info(&self, text: &str) {
        self.emit(LogLine::out(text));
    }
}

// ─── ConsoleSink ──────────────────────────────────────────────────────────────

/// Prints lines to the launcher's own stdout/stderr and mirrors them into
/// `tracing` so file logs capture the full transcript.
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn emit(&self, line: LogLine) {
        match line.source {
            StreamSource::Stdout => {
                println!("{}", line.text);
                tracing::debug!(target: "transcript", "{}", line.text);
            }
            StreamSource::Stderr => {
                eprintln!("{}", line.text);
                tracing::debug!(target: "transcript", stderr = true, "{}", line.text);
            }
        }
    }
}

// ─── ChannelSink ──────────────────────────────────────────────────────────────

/// Fans lines out to broadcast subscribers.
///
/// An embedding UI subscribes and marshals lines onto whatever thread owns
/// the display; the emitting side never blocks on a consumer.
#[derive(Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<LogLine>,
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogLine> {
        self.tx.subscribe()
    }
}

impl LogSink for ChannelSink {
    fn emit(&self, line: LogLine) {
        // No subscribers is fine; lines are droppable, not load-bearing.
        let _ = self.tx.send(line);
    }
}

// ─── MemorySink ───────────────────────────────────────────────────────────────

/// Collects every line in memory. Used by tests to assert on transcripts.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<LogLine>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().expect("sink lock poisoned").clone()
    }

    /// True if any collected line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .expect("sink lock poisoned")
            .iter()
            .any(|l| l.text.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn emit(&self, line: LogLine) {
        self.lines.lock().expect("sink lock poisoned").push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_preserves_arrival_order() {
        let sink = MemorySink::new();
        sink.emit(LogLine::out("first"));
        sink.emit(LogLine::err("second"));
        sink.emit(LogLine::out("third"));

        let lines = sink.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "first");
        assert_eq!(lines[1].source, StreamSource::Stderr);
        assert_eq!(lines[2].text, "third");
    }

    #[test]
    fn channel_sink_without_subscribers_does_not_error() {
        let sink = ChannelSink::new();
        sink.emit(LogLine::out("dropped on the floor"));
    }

    #[tokio::test]
    async fn channel_sink_delivers_to_subscriber() {
        let sink = ChannelSink::new();
        let mut rx = sink.subscribe();
        sink.emit(LogLine::out("hello"));

        let line = rx.recv().await.unwrap();
        assert_eq!(line.text, "hello");
        assert_eq!(line.source, StreamSource::Stdout);
    }
}
