//! Process construction shared by the worker and the ad-hoc path.

use crate::error::{AppdError, Result};
use crate::service::unit::Unit;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Opens an output file for appending, creating it owner-read-write only.
fn open_output(path: &Path) -> Result<File> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .mode(0o600)
        .open(path)
        .map_err(|source| AppdError::IoOpen {
            path: path.to_path_buf(),
            source,
        })
}

/// Resolves the standard output and standard error of a child process.
///
/// Missing stdout inherits ours. Missing stderr follows stdout when stdout is
/// a file, and inherits ours otherwise.
pub(crate) fn redirect(stdout: Option<&Path>, stderr: Option<&Path>) -> Result<(Stdio, Stdio)> {
    let out_file = stdout.map(open_output).transpose()?;

    let err = match (stderr, &out_file) {
        (Some(path), _) => Stdio::from(open_output(path)?),
        (None, Some(file)) => {
            let shared = file.try_clone().map_err(|source| AppdError::IoOpen {
                path: stdout.map(Path::to_path_buf).unwrap_or_default(),
                source,
            })?;
            Stdio::from(shared)
        }
        (None, None) => Stdio::inherit(),
    };

    let out = match out_file {
        Some(file) => Stdio::from(file),
        None => Stdio::inherit(),
    };

    Ok((out, err))
}

/// Builds the command for a unit with its arguments, working directory and
/// redirected streams.
pub(crate) fn build_command(unit: &Unit) -> Result<Command> {
    let (stdout, stderr) = redirect(
        unit.std_out_file_path.as_deref(),
        unit.std_err_file_path.as_deref(),
    )?;

    let mut cmd = Command::new(&unit.command);
    cmd.args(&unit.arguments)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);

    if let Some(dir) = &unit.work_directory {
        cmd.current_dir(dir);
    }

    Ok(cmd)
}
