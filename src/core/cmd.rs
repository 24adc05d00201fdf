use anyhow::{Context, Result, bail};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Run `program` and collect its output, giving up after `timeout`.
///
/// The child is killed when the timeout elapses.
pub async fn run_cmd_timeout_async(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Output> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    tokio::time::timeout(timeout, child)
        .await
        .with_context(|| format!("Command timeout after {}ms: {}", timeout.as_millis(), program))?
        .with_context(|| format!("Failed to execute: {}", program))
}

/// Like [`run_cmd_timeout_async`] but fails on a non-zero exit status and
/// returns stdout as text.
pub async fn run_checked(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let out = run_cmd_timeout_async(program, args, timeout).await?;
    if !out.status.success() {
        bail!(
            "{} {} exited with {}: {}",
            program,
            args.join(" "),
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}
