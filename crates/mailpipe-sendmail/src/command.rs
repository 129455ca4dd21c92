//! Invocation of the delivery mechanism.

use crate::error::{Error, Result};
use crate::output::Output;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Default delivery mechanism.
pub const DEFAULT_PROGRAM: &str = "/usr/sbin/sendmail";

/// Default flags: read recipients from the message headers.
pub const DEFAULT_FLAGS: &str = "-t";

/// How often a bounded wait polls the child for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long pipes are still read once the child is gone. Processes that
/// inherited them, such as a backgrounded queue runner, may hold them open
/// for much longer.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Read size for the output pipes.
const CHUNK_SIZE: usize = 8 * 1024;

/// A sendmail-compatible command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendmailCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for SendmailCommand {
    fn default() -> Self {
        Self::from_flags(DEFAULT_PROGRAM, DEFAULT_FLAGS)
    }
}

impl SendmailCommand {
    /// Creates a command for `program` with no arguments and no timeout.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Creates a command for `program` with the words of `flags` as arguments.
    #[must_use]
    pub fn from_flags(program: impl Into<PathBuf>, flags: &str) -> Self {
        Self::new(program).with_flags(flags)
    }

    /// Appends a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends the whitespace-separated words of a flags string.
    #[must_use]
    pub fn with_flags(mut self, flags: &str) -> Self {
        self.args.extend(flags.split_whitespace().map(str::to_string));
        self
    }

    /// Limits how long [`run`](Self::run) waits for the child. A zero
    /// duration means no limit.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Returns the executable path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Spawns the command, writes `input` to its stdin and waits for it.
    ///
    /// Stdout and stderr are drained concurrently with the write so a
    /// chatty child cannot block on a full pipe. Once the child has exited
    /// or been killed, its pipes are read for a short grace period only, so
    /// a descendant holding them open cannot stall the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the executable cannot be started,
    /// [`Error::Timeout`] if the configured timeout expires,
    /// [`Error::ExitStatus`] on a non-zero exit and [`Error::Io`] if stdin
    /// could not be written for a reason other than the child closing it.
    pub fn run(&self, input: &[u8]) -> Result<Output> {
        tracing::debug!(
            program = %self.program.display(),
            args = ?self.args,
            bytes = input.len(),
            "Spawning delivery mechanism"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let deadline = self.timeout.map(|limit| Instant::now() + limit);
        let written = spawn_writer(child.stdin.take(), input.to_vec());
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match deadline {
            Some(deadline) => wait_with_deadline(&mut child, deadline)?,
            None => Some(child.wait()?),
        };

        let drain_until = Instant::now() + DRAIN_GRACE;
        let written = finish_write(&written, drain_until);
        let output = Output {
            exit_code: status.and_then(|s| s.code()),
            stdout: drain(&stdout, drain_until)?,
            stderr: drain(&stderr, drain_until)?,
        };

        let Some(status) = status else {
            let after = self.timeout.unwrap_or_default();
            tracing::debug!(?after, "Delivery mechanism timed out");
            return Err(Error::Timeout { after, output });
        };

        tracing::debug!(code = ?status.code(), "Delivery mechanism exited");

        if !status.success() {
            return Err(Error::ExitStatus { output });
        }

        match written {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e.into()),
            _ => Ok(output),
        }
    }
}

/// Writes `payload` to the child's stdin on its own thread and reports the
/// outcome once.
fn spawn_writer<W>(sink: Option<W>, payload: Vec<u8>) -> Receiver<io::Result<()>>
where
    W: Write + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = sink.map_or(Ok(()), |mut sink| {
            sink.write_all(&payload)?;
            sink.flush()
        });
        let _ = tx.send(result);
    });
    rx
}

/// Reads a pipe on its own thread, forwarding chunks until end of file.
fn spawn_reader<R>(source: Option<R>) -> Receiver<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    if let Some(mut source) = source {
        thread::spawn(move || {
            let mut chunk = vec![0_u8; CHUNK_SIZE];
            loop {
                let sent = match source.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => tx.send(Ok(chunk[..n].to_vec())),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                };
                if sent.is_err() {
                    break;
                }
            }
        });
    }
    rx
}

/// Collects forwarded chunks until end of file or `deadline`, whichever
/// comes first.
fn drain(chunks: &Receiver<io::Result<Vec<u8>>>, deadline: Instant) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    loop {
        match chunks.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(chunk) => buffer.extend(chunk?),
            Err(RecvTimeoutError::Disconnected) => return Ok(buffer),
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(bytes = buffer.len(), "Output pipe still open, abandoning it");
                return Ok(buffer);
            }
        }
    }
}

/// Waits for the stdin writer until `deadline`. A writer still blocked by
/// then is abandoned and counts as done.
fn finish_write(written: &Receiver<io::Result<()>>, deadline: Instant) -> io::Result<()> {
    match written.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::debug!("Input pipe still blocked, abandoning it");
            Ok(())
        }
        Err(RecvTimeoutError::Disconnected) => Err(io::Error::other("stdin writer panicked")),
    }
}

/// Waits until the child exits or `deadline` passes, killing it on expiry.
///
/// Returns `None` if the child had to be killed.
fn wait_with_deadline(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                tracing::warn!(?e, "Failed to kill delivery mechanism");
            }
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
