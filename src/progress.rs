//! Indexing progress reporting.
//!
//! Reports observable progress during `docdex index` so operators see which
//! phase is running and how many batches remain. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts. Observability only:
//! nothing in the pipeline depends on these events.

use std::io::Write;

/// A single progress event for an indexing run.
#[derive(Clone, Debug)]
pub enum IndexProgressEvent {
    /// Extraction phase: n pages parsed out of total.
    Parsing { n: u64, total: u64 },
    /// Embedding phase: n batches completed out of total.
    Embedding { batch: u64, total: u64 },
    /// Upsert phase: n batches written out of total.
    Upserting { batch: u64, total: u64 },
}

/// Reports indexing progress. Implementations write to stderr.
pub trait IndexProgressReporter: Send + Sync {
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress: "index  embedding  batch 3 / 12".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Parsing { n, total } => {
                format!(
                    "index  parsing  {} / {} pages\n",
                    format_number(*n),
                    format_number(*total)
                )
            }
            IndexProgressEvent::Embedding { batch, total } => {
                format!("index  embedding  batch {} / {}\n", batch, total)
            }
            IndexProgressEvent::Upserting { batch, total } => {
                format!("index  upserting  batch {} / {}\n", batch, total)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = match &event {
            IndexProgressEvent::Parsing { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "parsing",
                "n": n,
                "total": total
            }),
            IndexProgressEvent::Embedding { batch, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "batch": batch,
                "total": total
            }),
            IndexProgressEvent::Upserting { batch, total } => serde_json::json!({
                "event": "progress",
                "phase": "upserting",
                "batch": batch,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
