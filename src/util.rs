use std::{
    io::Error as IoError,
    path::{Path, PathBuf},
    process::{ExitStatus, Output, Stdio},
};

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio_util::sync::CancellationToken;

use crate::error::DocktaskError;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command execution error: {0}")]
    Io(#[from] IoError),
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Runs `program` with `args`, collecting both output pipes.
///
/// A non-zero exit status is reported as [`CommandError::Failed`] carrying the
/// trimmed stderr of the process.
pub async fn run_command(program: &str, args: &[&str]) -> Result<Output, CommandError> {
    let mut cmd = TokioCommand::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null());

    let mut child = cmd.spawn()?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let stdout_handle = tokio::spawn(collect_pipe(stdout_pipe));
    let stderr_handle = tokio::spawn(collect_pipe(stderr_pipe));

    let status = child.wait().await?;

    let stdout = match stdout_handle.await {
        Ok(result) => result?,
        Err(e) => return Err(CommandError::Io(IoError::other(e))),
    };

    let stderr = match stderr_handle.await {
        Ok(result) => result?,
        Err(e) => return Err(CommandError::Io(IoError::other(e))),
    };

    if !status.success() {
        return Err(CommandError::Failed {
            program: program.to_string(),
            status,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

async fn collect_pipe<R>(pipe: Option<R>) -> Result<Vec<u8>, IoError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut collected = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut collected).await?;
    }
    Ok(collected)
}

/// Fails with [`DocktaskError::Cancelled`] once `cancel` has fired.
pub fn ensure_not_cancelled(cancel: &CancellationToken, what: &str) -> crate::error::Result<()> {
    if cancel.is_cancelled() {
        return Err(DocktaskError::Cancelled(what.to_string()));
    }
    Ok(())
}

/// Renders `path` relative to `base` with forward slashes, for use inside a
/// Linux container. Paths outside `base` yield `None`.
pub fn container_relative_path(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

/// Resolves `path` against `root` unless it is already absolute.
pub fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
