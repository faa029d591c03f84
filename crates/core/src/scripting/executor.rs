//! Command description, output line and error types for external executables.

use std::fmt;

/// How to invoke an external executable: `<runtime> <script_path> <args...>`.
#[derive(Debug, Clone)]
pub struct ScriptCommand {
    /// Interpreter or binary to run (e.g. `python`).
    pub runtime: String,
    /// Script passed as the runtime's first argument.
    pub script_path: String,
    /// Positional arguments after the script path.
    pub args: Vec<String>,
    /// Working directory for the child process (uses current dir if `None`).
    pub working_directory: Option<String>,
    /// Additional environment variables set for the child process.
    pub env_vars: Vec<(String, String)>,
}

/// One line of child output, tagged with the stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptExit {
    /// Process exit code (`None` if killed by signal).
    pub exit_code: Option<i32>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ScriptExit {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Errors that can occur while spawning or supervising a child.
#[derive(Debug)]
pub enum ScriptError {
    /// The runtime binary was not found.
    NotFound(String),
    /// The runtime exists but could not be executed.
    PermissionDenied(String),
    /// The child exceeded its deadline and was killed.
    Timeout {
        /// Elapsed wall-clock time before the process was killed.
        elapsed_ms: u64,
    },
    /// An I/O error occurred while spawning or waiting on the process.
    IoError(std::io::Error),
}

impl ScriptError {
    /// Classify a spawn error from [`tokio::process::Command::spawn`].
    pub fn from_spawn(runtime: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(runtime.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(runtime.to_string()),
            _ => Self::IoError(err),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Executable not found: {path}"),
            Self::PermissionDenied(path) => write!(f, "Permission denied: {path}"),
            Self::Timeout { elapsed_ms } => {
                write!(f, "Process timed out after {elapsed_ms}ms")
            }
            Self::IoError(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
