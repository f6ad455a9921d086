//! Document assembler – concatenates the single-page artifacts, in order,
//! into the output file.

use std::path::{Path, PathBuf};

use crate::config::ToolCommand;
use crate::error::MergeError;
use crate::tool;

pub trait DocumentAssembler {
    /// Merge `pages` into `output`. Called once per run, with pages in
    /// output order.
    fn assemble(&self, pages: &[PathBuf], output: &Path) -> Result<(), MergeError>;
}

/// Assembles through an external concatenation tool (Ghostscript by default).
#[derive(Debug, Clone)]
pub struct ExternalAssembler {
    command: ToolCommand,
}

impl ExternalAssembler {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl DocumentAssembler for ExternalAssembler {
    fn assemble(&self, pages: &[PathBuf], output: &Path) -> Result<(), MergeError> {
        let inputs: Vec<String> = pages
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let args = self.command.expand("", &output.to_string_lossy(), &inputs);
        tool::run(&self.command, &args)?;
        log::info!("assembled {} page(s) into {}", pages.len(), output.display());
        Ok(())
    }
}
