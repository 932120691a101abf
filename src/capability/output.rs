//! Output sink shared by the engine and the shell capability.
//!
//! Emission is line-atomic: concurrent writers (parallel loop workers,
//! streamed process output) may interleave lines but never partial
//! lines.

use std::sync::Mutex;

/// Line-atomic output writer.
pub trait OutputSink: Send + Sync {
    fn line(&self, text: &str);
}

/// Writes lines to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink {
    lock: Mutex<()>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for StdoutSink {
    fn line(&self, text: &str) {
        let _guard = self.lock.lock().expect("stdout sink lock poisoned");
        println!("{text}");
    }
}

/// Collects lines in memory; used by tests and plan dry-runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("memory sink lock poisoned").clone()
    }

    /// True when any captured line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    /// Index of the first line containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|l| l.contains(needle))
    }
}

impl OutputSink for MemorySink {
    fn line(&self, text: &str) {
        self.lines
            .lock()
            .expect("memory sink lock poisoned")
            .push(text.to_string());
    }
}
