//! Child process execution with bounded output and an optional timeout.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Lossy stdout text, with a truncation marker appended when bytes were dropped.
    pub fn stdout_text(&self) -> String {
        with_notice(&self.stdout, self.stdout_truncated, "stdout")
    }

    pub fn stderr_text(&self) -> String {
        with_notice(&self.stderr, self.stderr_truncated, "stderr")
    }
}

fn with_notice(bytes: &[u8], truncated: usize, label: &str) -> String {
    let mut text = String::from_utf8_lossy(bytes).to_string();
    if truncated > 0 {
        text.push_str(&format!("\n[{label} truncated {truncated} bytes]\n"));
    }
    text
}

/// Run a command and capture stdout/stderr without risking pipe deadlocks.
///
/// Both pipes are drained concurrently while the child runs; at most
/// `output_limit_bytes` of each are kept. With `timeout = None` the call
/// waits for the child however long it takes. On timeout the child is killed
/// and `timed_out` is set.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs()), output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = spawn_capture(child.stdout.take(), "stdout", output_limit_bytes)?;
    let stderr = spawn_capture(child.stderr.take(), "stderr", output_limit_bytes)?;

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait().context("wait for command")?,
        Some(limit) => match child.wait_timeout(limit).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = limit.as_secs(), "command timed out, killing");
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
    };

    let stdout = stdout.finish()?;
    let stderr = stderr.finish()?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_truncated = stdout.dropped,
            stderr_truncated = stderr.dropped,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout: stdout.kept,
        stderr: stderr.kept,
        stdout_truncated: stdout.dropped,
        stderr_truncated: stderr.dropped,
        timed_out,
    })
}

/// Bytes kept from one pipe and how many were dropped past the limit.
#[derive(Debug, Default)]
struct Captured {
    kept: Vec<u8>,
    dropped: usize,
}

impl Captured {
    fn push(&mut self, chunk: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.kept.len());
        let take = chunk.len().min(room);
        self.kept.extend_from_slice(&chunk[..take]);
        self.dropped += chunk.len() - take;
    }
}

/// A reader thread draining one pipe until EOF.
struct CaptureThread {
    label: &'static str,
    handle: thread::JoinHandle<Result<Captured>>,
}

impl CaptureThread {
    fn finish(self) -> Result<Captured> {
        self.handle
            .join()
            .map_err(|_| anyhow!("{} reader thread panicked", self.label))?
            .with_context(|| format!("read {}", self.label))
    }
}

fn spawn_capture<R: Read + Send + 'static>(
    pipe: Option<R>,
    label: &'static str,
    limit: usize,
) -> Result<CaptureThread> {
    let mut pipe = pipe.ok_or_else(|| anyhow!("{label} was not piped"))?;
    let handle = thread::spawn(move || -> Result<Captured> {
        let mut captured = Captured::default();
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk)? {
                0 => return Ok(captured),
                n => captured.push(&chunk[..n], limit),
            }
        }
    });
    Ok(CaptureThread { label, handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_both_streams_and_exit_code() {
        let out = run_command(sh("echo out; echo err >&2; exit 3"), None, 1024).expect("run");
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stdout_text(), "out\n");
        assert_eq!(out.stderr_text(), "err\n");
        assert!(!out.timed_out);
    }

    #[test]
    fn truncates_beyond_limit() {
        let out = run_command(sh("printf 'abcdefghij'"), None, 4).expect("run");
        assert_eq!(out.stdout, b"abcd");
        assert_eq!(out.stdout_truncated, 6);
        assert!(out.stdout_text().contains("[stdout truncated 6 bytes]"));
    }

    #[test]
    fn kills_on_timeout() {
        let out = run_command(sh("exec sleep 5"), Some(Duration::from_millis(100)), 1024).expect("run");
        assert!(out.timed_out);
        assert!(!out.status.success());
    }

    #[test]
    fn capture_keeps_prefix_and_counts_the_rest() {
        let mut captured = Captured::default();
        captured.push(b"abc", 5);
        captured.push(b"defg", 5);
        captured.push(b"h", 5);
        assert_eq!(captured.kept, b"abcde");
        assert_eq!(captured.dropped, 3);
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let cmd = Command::new("/nonexistent/agentflow-binary");
        assert!(run_command(cmd, None, 16).is_err());
    }
}
