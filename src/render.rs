//! Page renderer – turns one filled SVG page into a single-page PDF.
//!
//! The conversion itself is done by an external program (Inkscape by
//! default). The page is serialised to a scratch file next to its output.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ToolCommand;
use crate::dom::Document;
use crate::error::MergeError;
use crate::tool;

/// Produces one page artifact per filled page.
pub trait PageRenderer {
    /// Render `page` (0-based `index`) into `dir`, returning the
    /// artifact's path.
    fn render_page(&self, page: &Document, dir: &Path, index: usize)
        -> Result<PathBuf, MergeError>;
}

/// File stem used for page `index`: `page-0001`, `page-0002`, …
pub fn page_stem(index: usize) -> String {
    format!("page-{:04}", index + 1)
}

/// Renders through an external converter.
#[derive(Debug, Clone)]
pub struct ExternalRenderer {
    command: ToolCommand,
}

impl ExternalRenderer {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl PageRenderer for ExternalRenderer {
    fn render_page(
        &self,
        page: &Document,
        scratch: &Path,
        index: usize,
    ) -> Result<PathBuf, MergeError> {
        let stem = page_stem(index);
        let svg_path = scratch.join(format!("{stem}.svg"));
        let pdf_path = scratch.join(format!("{stem}.pdf"));
        fs::write(&svg_path, page.to_xml()?)?;

        let args = self.command.expand(
            &svg_path.to_string_lossy(),
            &pdf_path.to_string_lossy(),
            &[],
        );
        tool::run(&self.command, &args)?;

        log::debug!("rendered page {} → {}", index + 1, pdf_path.display());
        Ok(pdf_path)
    }
}

/// Writes merged pages as SVG files into the target directory, without
/// conversion.
#[derive(Debug, Clone, Copy)]
pub struct SvgDirRenderer {
    overwrite: bool,
}

impl SvgDirRenderer {
    pub fn new(overwrite: bool) -> Self {
        Self { overwrite }
    }
}

impl PageRenderer for SvgDirRenderer {
    fn render_page(
        &self,
        page: &Document,
        dir: &Path,
        index: usize,
    ) -> Result<PathBuf, MergeError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.svg", page_stem(index)));
        if !self.overwrite && path.exists() {
            return Err(MergeError::OutputExists(path));
        }
        fs::write(&path, page.to_xml()?)?;
        Ok(path)
    }
}
