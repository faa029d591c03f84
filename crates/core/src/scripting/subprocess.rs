//! Streaming subprocess execution.
//!
//! [`spawn_streaming`] starts the child with piped stdout/stderr and forwards
//! every non-empty line over an unbounded channel as it is produced, so the
//! caller can react to output while the process is still running.
//! [`ScriptProcess::wait`] enforces an optional deadline.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::executor::{OutputLine, ScriptCommand, ScriptError, ScriptExit};

/// Maximum bytes kept from a single output line. Longer lines are truncated.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// A running child process.
///
/// Dropping this kills the child (`kill_on_drop`).
pub struct ScriptProcess {
    child: Child,
    started: Instant,
}

/// Spawn `command` and return the process handle plus a receiver yielding
/// its output lines. The receiver closes once both pipes reach EOF.
pub fn spawn_streaming(
    command: &ScriptCommand,
) -> Result<(ScriptProcess, mpsc::UnboundedReceiver<OutputLine>), ScriptError> {
    let mut cmd = Command::new(&command.runtime);
    cmd.arg(&command.script_path)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &command.env_vars {
        cmd.env(key, value);
    }

    if let Some(dir) = &command.working_directory {
        cmd.current_dir(dir);
    }

    let started = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|e| ScriptError::from_spawn(&command.runtime, e))?;

    let (tx, rx) = mpsc::unbounded_channel();

    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(forward_lines(stdout, tx, OutputLine::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, tx, OutputLine::Stderr));
    }

    Ok((ScriptProcess { child, started }, rx))
}

impl ScriptProcess {
    /// OS process id, if the child has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the child to exit.
    ///
    /// With `Some(deadline)`, a child still running after `deadline` is
    /// killed and [`ScriptError::Timeout`] is returned.
    pub async fn wait(&mut self, deadline: Option<Duration>) -> Result<ScriptExit, ScriptError> {
        let status = match deadline {
            Some(limit) => match tokio::time::timeout(limit, self.child.wait()).await {
                Ok(status) => status.map_err(ScriptError::IoError)?,
                Err(_elapsed) => {
                    // Best-effort: the child may have exited in the meantime.
                    let _ = self.child.kill().await;
                    return Err(ScriptError::Timeout {
                        elapsed_ms: self.elapsed_ms(),
                    });
                }
            },
            None => self.child.wait().await.map_err(ScriptError::IoError)?,
        };

        Ok(ScriptExit {
            exit_code: status.code(),
            duration_ms: self.elapsed_ms(),
        })
    }

    /// Kill the child and reap it.
    pub async fn kill(&mut self) -> Result<(), ScriptError> {
        self.child.kill().await.map_err(ScriptError::IoError)
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Read `stream` line by line and send each line wrapped by `wrap` until EOF
/// or the receiver is dropped.
///
/// Both `\n` and `\r` end a line, so carriage-return progress bars arrive
/// as separate updates. Empty lines are skipped. At most [`MAX_LINE_BYTES`]
/// are buffered per line; the rest of an overlong line is discarded as it is
/// read. Bytes are decoded as lossy UTF-8.
async fn forward_lines<R>(
    stream: R,
    tx: mpsc::UnboundedSender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        let chunk = match reader.fill_buf().await {
            Ok([]) | Err(_) => break,
            Ok(chunk) => chunk,
        };
        let end = chunk.iter().position(|b| matches!(b, b'\n' | b'\r'));
        let body = end.unwrap_or(chunk.len());
        let room = MAX_LINE_BYTES.saturating_sub(line.len());
        line.extend_from_slice(&chunk[..body.min(room)]);

        match end {
            Some(pos) => {
                reader.consume(pos + 1);
                if !line.is_empty() && !send_line(&tx, wrap, &mut line) {
                    return;
                }
            }
            None => reader.consume(body),
        }
    }
    if !line.is_empty() {
        send_line(&tx, wrap, &mut line);
    }
}

/// Send and clear the buffered line. Returns `false` once the receiver is gone.
fn send_line(
    tx: &mpsc::UnboundedSender<OutputLine>,
    wrap: fn(String) -> OutputLine,
    line: &mut Vec<u8>,
) -> bool {
    let text = String::from_utf8_lossy(line).into_owned();
    line.clear();
    tx.send(wrap(text)).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
