//! External Command Execution
//!
//! Runs installer commands to completion in an explicit directory.

use std::path::Path;
use std::process::{Command, Output};

use log::debug;

use crate::error::{Result, SetupError};

/// Runs `cmd`, turning a non-zero exit into [`SetupError::Command`].
pub fn run_checked(cmd: &mut Command, label: &str) -> Result<Output> {
    debug!("Running: {}", label);
    let output = cmd.output()?;
    if !output.status.success() {
        return Err(SetupError::command(label, &output));
    }
    Ok(output)
}

/// Runs a shell pipeline with `bash -c` inside `dir`.
pub fn run_shell(script: &str, dir: &Path) -> Result<Output> {
    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(script).current_dir(dir);
    debug!("Executing in directory: {}", dir.display());
    run_checked(&mut cmd, script)
}

/// Downloads `url` into `dir` with wget, keeping the remote file name.
pub fn wget(url: &str, dir: &Path) -> Result<()> {
    let mut cmd = Command::new("wget");
    cmd.args(["--progress=dot:mega", "--no-check-certificate", url])
        .current_dir(dir);
    run_checked(&mut cmd, &format!("wget {}", url))?;
    Ok(())
}
