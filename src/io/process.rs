use crate::error::{Result, SampleError};
use std::{
    ffi::OsStr,
    io::ErrorKind,
    process::{Command, Output, Stdio},
};
use tracing::debug;

fn spawn_error(tool: &str, e: std::io::Error) -> SampleError {
    if e.kind() == ErrorKind::NotFound {
        SampleError::ToolMissing {
            tool: tool.to_string(),
        }
    } else {
        SampleError::Io(e)
    }
}

fn describe_failure(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr);
    let last = stderr.lines().rev().find(|l| !l.trim().is_empty());
    match last {
        Some(line) => format!("{} ({})", out.status, line.trim()),
        None => out.status.to_string(),
    }
}

/// Run `tool` to completion and return its stdout. A non-zero exit
/// becomes `ToolFailed` carrying the last stderr line.
pub fn run_capture<I, S>(tool: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(tool);
    cmd.args(args).stdin(Stdio::null());
    debug!("exec {:?}", cmd);

    let out = cmd.output().map_err(|e| spawn_error(tool, e))?;
    if !out.status.success() {
        return Err(SampleError::ToolFailed {
            tool: tool.to_string(),
            status: describe_failure(&out),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

/// Run `tool` to completion, discarding its output.
pub fn run_status<I, S>(tool: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_capture(tool, args).map(|_| ())
}
