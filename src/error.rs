//! Error type shared by every pipeline stage.
//!
//! Nothing is recovered locally: each variant aborts the run and is reported
//! once by the binary.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    /// The data file does not match the shape its header promises.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("malformed input: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid SVG template: {0}")]
    Template(#[from] roxmltree::Error),

    #[error("cannot encode QR code for {value:?}: {reason}")]
    QrEncode { value: String, reason: String },

    #[error("file {} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}{}", stderr_suffix(.stderr))]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("invalid JSON: {0}")]
    Config(#[from] serde_json::Error),

    #[error("cannot serialise SVG page: {0}")]
    Serialize(String),

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl MergeError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MergeError::Read {
            path: path.into(),
            source,
        }
    }
}
