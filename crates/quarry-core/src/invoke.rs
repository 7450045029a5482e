//! External process invocation with bounded diagnostic capture.
//!
//! The engine is driven one subcommand at a time: spawn, optionally feed a
//! payload on stdin (secrets travel this way, never on the command line),
//! drain stdout and stderr cooperatively, and report nonzero exits as
//! structured errors carrying everything a caller needs to act on.

use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use quarry_domain::classify::{classify, Classification, ErrorMatcher};

/// Maximum number of bytes of stderr retained for error reporting.
///
/// Keeps a runaway engine from ballooning memory, and keeps invocation
/// errors small enough to ship in status reports. Only the most recent
/// bytes are kept on overflow.
pub const MAX_STDERR_CAPTURE: usize = 20_000;

const READ_CHUNK: usize = 8 * 1024;

/// Spawn-time adjustments for a single invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationOptions {
    /// Payload written to the child's stdin, then closed.
    pub stdin: Option<String>,
    /// Environment variables set (or overridden) in the child only.
    pub env: Vec<(String, String)>,
}

impl InvocationOptions {
    pub fn with_stdin(payload: impl Into<String>) -> Self {
        Self {
            stdin: Some(payload.into()),
            ..Self::default()
        }
    }

    pub fn with_env(env: Vec<(String, String)>) -> Self {
        Self {
            env,
            ..Self::default()
        }
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub stdout: String,
    /// Tail-kept: never longer than [`MAX_STDERR_CAPTURE`].
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error(
        "failure invoking {executable} with arguments {args:?}.\n\
         Exit code {exit_code} and error was:\n{stderr}"
    )]
    Failed {
        executable: String,
        args: Vec<String>,
        exit_code: i32,
        stderr: String,
        stdout: String,
    },
    #[error("could not spawn {executable}: {source}")]
    Spawn {
        executable: String,
        source: std::io::Error,
    },
    #[error("i/o error while driving {executable}: {source}")]
    Io {
        executable: String,
        source: std::io::Error,
    },
}

/// An invocation failure that has been run through the error classifier.
#[derive(Debug, thiserror::Error)]
#[error("{} (category: {})\n{}", .classification.message, .classification.category, .source)]
pub struct ClassifiedError {
    pub classification: Classification,
    #[source]
    pub source: InvocationError,
}

/// Run the executable and return its stdout. Nonzero exit is an error.
pub async fn run(
    executable: &str,
    args: &[String],
    options: InvocationOptions,
) -> Result<String, InvocationError> {
    Ok(run_captured(executable, args, options).await?.stdout)
}

/// Run the executable, classifying any nonzero-exit failure against the
/// given matcher list. Spawn and i/o errors propagate unclassified inside
/// the same error shape (their stderr is empty, so the fallback category
/// applies).
pub async fn run_classified(
    executable: &str,
    args: &[String],
    options: InvocationOptions,
    matchers: &[ErrorMatcher],
) -> Result<InvocationResult, ClassifiedError> {
    run_captured(executable, args, options)
        .await
        .map_err(|source| {
            let stderr = match &source {
                InvocationError::Failed { stderr, .. } => stderr.as_str(),
                _ => "",
            };
            ClassifiedError {
                classification: classify(stderr, matchers),
                source,
            }
        })
}

/// Full-capture variant: spawns, feeds stdin, drains both pipes.
pub async fn run_captured(
    executable: &str,
    args: &[String],
    options: InvocationOptions,
) -> Result<InvocationResult, InvocationError> {
    let mut command = Command::new(executable);
    command
        .args(args)
        .stdin(if options.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &options.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| InvocationError::Spawn {
        executable: executable.to_string(),
        source,
    })?;

    let io_err = |source: std::io::Error| InvocationError::Io {
        executable: executable.to_string(),
        source,
    };

    let stdin_pipe = if options.stdin.is_some() {
        Some(child.stdin.take().ok_or_else(|| {
            io_err(std::io::Error::other("child stdin not piped"))
        })?)
    } else {
        None
    };

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| io_err(std::io::Error::other("child stdout not piped")))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| io_err(std::io::Error::other("child stderr not piped")))?;

    // The payload is written while both output pipes drain: a child that
    // fills its stdout pipe before reading stdin would otherwise deadlock
    // against a payload larger than the stdin pipe buffer.
    let stdin_task = async {
        if let Some(mut stdin) = stdin_pipe {
            if let Some(payload) = &options.stdin {
                stdin.write_all(payload.as_bytes()).await?;
            }
            // Close the pipe so the child sees EOF.
            stdin.shutdown().await?;
        }
        Ok::<_, std::io::Error>(())
    };
    let stdout_task = async {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    };
    let stderr_task = async {
        let mut bounded = BoundedTailBuffer::new(MAX_STDERR_CAPTURE);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = stderr_pipe.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            bounded.push(&chunk[..n]);
        }
        Ok::<_, std::io::Error>(bounded)
    };

    let (stdin_written, stdout_bytes, stderr_bounded, status) =
        tokio::join!(stdin_task, stdout_task, stderr_task, child.wait());

    let stdout = String::from_utf8_lossy(&stdout_bytes.map_err(io_err)?).into_owned();
    let stderr = stderr_bounded.map_err(io_err)?.into_string();
    let status = status.map_err(io_err)?;
    let exit_code = status.code().unwrap_or(-1);

    // Nonzero exit takes precedence over a stdin write failure.
    if exit_code != 0 {
        return Err(InvocationError::Failed {
            executable: executable.to_string(),
            args: args.to_vec(),
            exit_code,
            stderr,
            stdout,
        });
    }
    stdin_written.map_err(io_err)?;

    Ok(InvocationResult {
        stdout,
        stderr,
        exit_code,
    })
}

/// A byte buffer that keeps at most `cap` bytes, always the most recent
/// ones. When an incoming chunk would overflow the cap, older bytes are
/// discarded from the front so the buffer still ends with the final byte
/// ever pushed.
#[derive(Debug)]
struct BoundedTailBuffer {
    bytes: Vec<u8>,
    cap: usize,
}

impl BoundedTailBuffer {
    fn new(cap: usize) -> Self {
        Self {
            bytes: Vec::new(),
            cap,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.cap {
            self.bytes.clear();
            self.bytes.extend_from_slice(&chunk[chunk.len() - self.cap..]);
            return;
        }
        let total = self.bytes.len() + chunk.len();
        if total > self.cap {
            self.bytes.drain(..total - self.cap);
        }
        self.bytes.extend_from_slice(chunk);
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
