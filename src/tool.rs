//! Subprocess plumbing shared by the renderer and the assembler.

use std::process::Command;

use crate::config::ToolCommand;
use crate::error::MergeError;

/// Run `tool` with already-expanded `args`, blocking until it exits.
///
/// A nonzero exit status is an error carrying the tool's stderr.
pub(crate) fn run(tool: &ToolCommand, args: &[String]) -> Result<(), MergeError> {
    log::debug!("running {} {}", tool.program, args.join(" "));

    let output = Command::new(&tool.program)
        .args(args)
        .output()
        .map_err(|source| MergeError::ToolLaunch {
            tool: tool.program.clone(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(MergeError::ToolFailed {
            tool: tool.program.clone(),
            status: output.status,
            stderr,
        });
    }
    if !stderr.trim().is_empty() {
        log::debug!("{} stderr: {}", tool.program, stderr.trim());
    }
    Ok(())
}
