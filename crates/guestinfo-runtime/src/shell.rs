use std::path::Path;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

/// Run a helper binary on the guest, capturing stdout and stderr.
///
/// Arguments are passed as an array, never through a shell.
pub fn run_host(cmd: &Path, args: &[&str]) -> Result<Output> {
    #[cfg(test)]
    if let Some(output) = super::shell_mock::intercept(cmd, args) {
        return Ok(output);
    }

    Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to run: {} {}", cmd.display(), args.join(" ")))
}

/// Run a helper binary and return its stdout, failing on a non-zero exit.
pub fn run_host_stdout(cmd: &Path, args: &[&str]) -> Result<Vec<u8>> {
    let output = run_host(cmd, args)?;
    if !output.status.success() {
        anyhow::bail!(
            "Command failed (exit {}): {} {}: {}",
            output.status.code().unwrap_or(-1),
            cmd.display(),
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output.stdout)
}
