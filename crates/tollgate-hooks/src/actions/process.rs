//! Bounded external commands

use std::{process::Stdio, time::Duration};

use tokio::{io::AsyncWriteExt, process::Command};
use tracing::debug;

/// Captured output of a finished command
#[derive(Debug, Clone)]
pub(crate) struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Why a command produced no output
#[derive(Debug)]
pub(crate) enum ProcessError {
    /// argv was empty
    NoCommand,
    /// The program could not be started
    Spawn(std::io::Error),
    /// Writing stdin or collecting output failed
    Io(std::io::Error),
    /// The deadline passed; the child has been killed
    Timeout(u64),
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::NoCommand => f.write_str("no command configured"),
            ProcessError::Spawn(e) => write!(f, "failed to start: {}", e),
            ProcessError::Io(e) => write!(f, "I/O error: {}", e),
            ProcessError::Timeout(ms) => write!(f, "timed out after {}ms", ms),
        }
    }
}

/// Run `argv` with optional stdin, killing it once `timeout` passes
pub(crate) async fn run_bounded(
    argv: &[String],
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let (program, args) = argv.split_first().ok_or(ProcessError::NoCommand)?;
    debug!(program = %program, args = args.len(), timeout_ms = timeout.as_millis() as u64, "Running command");

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(ProcessError::Spawn)?;
    let input = stdin.map(<[u8]>::to_vec);
    let pipe = child.stdin.take();

    // stdin is fed while output drains so a child echoing its input cannot
    // fill the stdout pipe and stall
    let feed = async move {
        if let (Some(mut pipe), Some(input)) = (pipe, input) {
            match pipe.write_all(&input).await {
                // The child exited or closed stdin without reading it all
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e),
                Ok(()) => pipe.shutdown().await?,
            }
        }
        Ok::<(), std::io::Error>(())
    };
    let run = async move {
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(ProcessError::Io)?;
        fed.map_err(ProcessError::Io)?;
        Ok::<_, ProcessError>(output)
    };

    // Dropping the future on timeout drops the child, which kills it
    let output = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| ProcessError::Timeout(timeout.as_millis() as u64))??;

    Ok(ProcessOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
