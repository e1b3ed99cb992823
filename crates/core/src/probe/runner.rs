//! Scoped execution of probe tools.

use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::error::ProbeError;

/// Runs a probe command to completion under a deadline.
///
/// The child is spawned with `kill_on_drop`, so a timeout (which drops the
/// pending wait) also terminates the process.
pub(super) async fn run_tool(
    mut command: Command,
    tool_path: &Path,
    timeout_secs: u64,
) -> Result<Output, ProbeError> {
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProbeError::ToolNotFound {
                    path: tool_path.to_path_buf(),
                }
            } else {
                ProbeError::Io(e)
            }
        })?;

    match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ProbeError::Timeout { timeout_secs }),
    }
}

/// Checks that a tool responds to its version flag.
pub(super) async fn check_tool(tool_path: &Path, version_flag: &str) -> Result<(), ProbeError> {
    let mut command = Command::new(tool_path);
    command.arg(version_flag);
    run_tool(command, tool_path, 10).await.map(|_| ())
}
