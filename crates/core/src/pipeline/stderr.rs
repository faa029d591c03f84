//! Keyword heuristic for the conversion executable's stderr.
//!
//! Python tooling writes plenty of harmless chatter to stderr (progress bars,
//! deprecation notices). Only lines containing one of [`ERROR_KEYWORDS`] are
//! surfaced at error level. Stderr never fails a job on its own; only the
//! exit code does.

/// Lower-case keywords that mark a stderr line as a real diagnostic.
pub const ERROR_KEYWORDS: [&str; 6] = [
    "error",
    "failed",
    "exception",
    "warning",
    "traceback",
    "critical",
];

/// How a stderr line should be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrSeverity {
    /// Contains an error keyword; logged at `error` level.
    Error,
    /// Plain informational output; logged at `info` level.
    Info,
}

/// Classify a single stderr line (case-insensitive keyword match).
pub fn classify_stderr(line: &str) -> StderrSeverity {
    let lower = line.to_lowercase();
    if ERROR_KEYWORDS.iter().any(|k| lower.contains(k)) {
        StderrSeverity::Error
    } else {
        StderrSeverity::Info
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
