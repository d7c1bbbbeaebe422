//! Diagnostics sink injected into the converter
//!
//! The converter never talks to a process-wide logger directly. Every
//! diagnostic it produces goes through a [`DiagnosticSink`] handed in at
//! construction, so hosts can route messages wherever they need them.

use parking_lot::Mutex;
use tracing::Level;

/// Receiver for converter diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Emit one diagnostic line.
    fn emit(&self, level: Level, message: &str);
}

/// Forwards diagnostics to `tracing` under the `audio_converter` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "audio_converter", "{}", message),
            Level::WARN => tracing::warn!(target: "audio_converter", "{}", message),
            Level::INFO => tracing::info!(target: "audio_converter", "{}", message),
            Level::DEBUG => tracing::debug!(target: "audio_converter", "{}", message),
            Level::TRACE => tracing::trace!(target: "audio_converter", "{}", message),
        }
    }
}

/// A recorded diagnostic line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Whether any recorded message at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|d| d.level == level && d.message.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, level: Level, message: &str) {
        self.entries.lock().push(Diagnostic {
            level,
            message: message.to_string(),
        });
    }
}
