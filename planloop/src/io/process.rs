//! Child process helper for backend invocations: stdin prompt, bounded capture, timeout.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Output captured from a finished (or killed) child process.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
}

/// Bytes kept from one stream plus the count that was discarded.
#[derive(Debug, Default)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub truncated: usize,
}

impl Captured {
    /// Lossy text followed by a truncation marker when bytes were dropped.
    pub fn to_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated > 0 {
            text.push_str(&format!("\n[truncated {} bytes]\n", self.truncated));
        }
        text
    }
}

/// Spawn `cmd`, feed `stdin`, and wait up to `timeout`.
///
/// Both output pipes are drained on helper threads while the child runs, keeping at
/// most `limit` bytes of each. A child that outlives `timeout` is killed and reported
/// with `timed_out = true` rather than as an error.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), limit))]
pub fn run_with_timeout(
    mut cmd: Command,
    stdin: &[u8],
    timeout: Duration,
    limit: usize,
) -> Result<CapturedOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "spawning backend process");
    let mut child = cmd.spawn().context("spawn command")?;

    let stdout_reader = spawn_reader(&mut child, Stream::Stdout, limit)?;
    let stderr_reader = spawn_reader(&mut child, Stream::Stderr, limit)?;

    // Dropping the handle closes the pipe so the child sees EOF.
    {
        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        if let Err(err) = pipe.write_all(stdin) {
            // The child may exit without reading its input; its status decides the outcome.
            warn!(%err, "failed to write stdin");
        }
    }

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            child.kill().context("kill command")?;
            (child.wait().context("wait command after kill")?, true)
        }
    };

    let stdout = join_reader(stdout_reader).context("join stdout")?;
    let stderr = join_reader(stderr_reader).context("join stderr")?;
    if stdout.truncated > 0 || stderr.truncated > 0 {
        warn!(
            stdout_truncated = stdout.truncated,
            stderr_truncated = stderr.truncated,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

enum Stream {
    Stdout,
    Stderr,
}

fn spawn_reader(
    child: &mut Child,
    stream: Stream,
    limit: usize,
) -> Result<JoinHandle<Result<Captured>>> {
    let handle = match stream {
        Stream::Stdout => {
            let pipe = child
                .stdout
                .take()
                .ok_or_else(|| anyhow!("stdout was not piped"))?;
            thread::spawn(move || read_limited(pipe, limit))
        }
        Stream::Stderr => {
            let pipe = child
                .stderr
                .take()
                .ok_or_else(|| anyhow!("stderr was not piped"))?;
            thread::spawn(move || read_limited(pipe, limit))
        }
    };
    Ok(handle)
}

fn join_reader(handle: JoinHandle<Result<Captured>>) -> Result<Captured> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<Captured> {
    let mut captured = Captured::default();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(captured.bytes.len()));
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.truncated += n - keep;
    }
    Ok(captured)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdin_echo() {
        let cmd = Command::new("cat");
        let output = run_with_timeout(cmd, b"hello", Duration::from_secs(5), 1024).expect("run");
        assert!(output.status.success());
        assert!(!output.timed_out);
        assert_eq!(output.stdout.bytes, b"hello");
    }

    #[test]
    fn truncates_beyond_limit() {
        let cmd = Command::new("cat");
        let output = run_with_timeout(cmd, b"0123456789", Duration::from_secs(5), 4).expect("run");
        assert_eq!(output.stdout.bytes, b"0123");
        assert_eq!(output.stdout.truncated, 6);
        assert!(output.stdout.to_text().contains("[truncated 6 bytes]"));
    }

    #[test]
    fn kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let output = run_with_timeout(cmd, b"", Duration::from_millis(100), 1024).expect("run");
        assert!(output.timed_out);
    }
}
