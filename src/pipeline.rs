//! Pipeline – ties together the data source, merging, page rendering and
//! assembly into a single function call.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::assemble::{DocumentAssembler, ExternalAssembler};
use crate::config::ToolConfig;
use crate::dom::{parse_svg, Document};
use crate::error::MergeError;
use crate::merge::{count_blocks, MergedPages};
use crate::qr::QrLevel;
use crate::render::{ExternalRenderer, PageRenderer, SvgDirRenderer};
use crate::source::{CsvSource, DataRow, SchemaMode, SourceOptions};

/// Configuration for a merge run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Replace an existing output instead of refusing.
    pub overwrite: bool,
    /// How the data file declares field kinds.
    pub schema: SchemaMode,
    /// Fields rendered as QR codes.
    pub qr_fields: Vec<String>,
    pub qr_level: QrLevel,
    /// External renderer and assembler commands.
    pub tools: ToolConfig,
}

impl PipelineConfig {
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            schema: self.schema,
            qr_fields: self.qr_fields.clone(),
            qr_level: self.qr_level,
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Pages emitted (one per merge pass that filled at least one block).
    pub pages: usize,
    /// Data rows merged.
    pub rows: usize,
    pub blocks_per_page: usize,
    pub output: PathBuf,
}

/// Read and parse the SVG template.
pub fn load_template(path: &Path) -> Result<Document, MergeError> {
    let text = fs::read_to_string(path).map_err(|e| MergeError::read(path, e))?;
    parse_svg(&text)
}

/// Open the CSV data file as a row source.
pub fn open_data(
    path: &Path,
    options: &SourceOptions,
) -> Result<CsvSource<BufReader<File>>, MergeError> {
    let file = File::open(path).map_err(|e| MergeError::read(path, e))?;
    CsvSource::new(BufReader::new(file), options)
}

/// Full pipeline: template + data → output PDF, using the configured
/// external tools.
pub fn generate_pdf(
    template_path: &Path,
    data_path: &Path,
    output_path: &Path,
    config: &PipelineConfig,
) -> Result<RunSummary, MergeError> {
    let template = load_template(template_path)?;
    let rows = open_data(data_path, &config.source_options())?;
    let renderer = ExternalRenderer::new(config.tools.renderer.clone());
    let assembler = ExternalAssembler::new(config.tools.assembler.clone());
    generate_with(
        &template,
        rows,
        &renderer,
        &assembler,
        output_path,
        config.overwrite,
    )
}

/// Merge, render and assemble with caller-supplied stages.
///
/// All intermediate pages live in a scratch directory that is removed when
/// this function returns, whatever the outcome. Without `overwrite` the
/// output is created exclusively just before assembly; if assembly then
/// fails, that empty file is removed again.
pub fn generate_with<I>(
    template: &Document,
    rows: I,
    renderer: &dyn PageRenderer,
    assembler: &dyn DocumentAssembler,
    output: &Path,
    overwrite: bool,
) -> Result<RunSummary, MergeError>
where
    I: Iterator<Item = Result<DataRow, MergeError>>,
{
    if !overwrite && output.exists() {
        return Err(MergeError::OutputExists(output.to_path_buf()));
    }

    let scratch = tempfile::Builder::new().prefix("mailmerge-").tempdir()?;
    log::debug!("scratch directory {}", scratch.path().display());

    let (rendered, rows_merged) = render_all(template, rows, renderer, scratch.path())?;
    let summary = RunSummary {
        pages: rendered.len(),
        rows: rows_merged,
        blocks_per_page: count_blocks(template),
        output: output.to_path_buf(),
    };

    if rendered.is_empty() {
        log::warn!("no pages were produced; {} not written", output.display());
        return Ok(summary);
    }

    let reserved = if overwrite {
        false
    } else {
        reserve_output(output)?;
        true
    };
    if let Err(e) = assembler.assemble(&rendered, output) {
        if reserved {
            let _ = fs::remove_file(output);
        }
        return Err(e);
    }

    log::info!(
        "wrote {} ({} page(s), {} row(s))",
        output.display(),
        summary.pages,
        summary.rows
    );
    Ok(summary)
}

/// Merge only, writing each page as an SVG file into `dir`.
pub fn emit_svg_pages(
    template_path: &Path,
    data_path: &Path,
    dir: &Path,
    config: &PipelineConfig,
) -> Result<RunSummary, MergeError> {
    let template = load_template(template_path)?;
    let rows = open_data(data_path, &config.source_options())?;
    let renderer = SvgDirRenderer::new(config.overwrite);
    let (written, rows_merged) = render_all(&template, rows, &renderer, dir)?;
    log::info!("wrote {} SVG page(s) to {}", written.len(), dir.display());

    Ok(RunSummary {
        pages: written.len(),
        rows: rows_merged,
        blocks_per_page: count_blocks(&template),
        output: dir.to_path_buf(),
    })
}

fn render_all<I>(
    template: &Document,
    rows: I,
    renderer: &dyn PageRenderer,
    dir: &Path,
) -> Result<(Vec<PathBuf>, usize), MergeError>
where
    I: Iterator<Item = Result<DataRow, MergeError>>,
{
    let mut rendered = Vec::new();
    let mut rows_merged = 0;
    for page in MergedPages::new(template, rows) {
        let page = page?;
        rows_merged += page.filled;
        let artifact = renderer.render_page(&page.document, dir, rendered.len())?;
        rendered.push(artifact);
    }
    Ok((rendered, rows_merged))
}

/// Create `output` exclusively so a file appearing mid-run is not clobbered.
fn reserve_output(output: &Path) -> Result<(), MergeError> {
    match OpenOptions::new().write(true).create_new(true).open(output) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(MergeError::OutputExists(output.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates;
    use std::cell::RefCell;

    /// Records page order instead of running anything.
    struct RecordingRenderer;

    impl PageRenderer for RecordingRenderer {
        fn render_page(
            &self,
            page: &Document,
            scratch: &Path,
            index: usize,
        ) -> Result<PathBuf, MergeError> {
            let path = scratch.join(format!("{index}.svg"));
            fs::write(&path, page.to_xml()?)?;
            Ok(path)
        }
    }

    #[derive(Default)]
    struct RecordingAssembler {
        calls: RefCell<Vec<Vec<PathBuf>>>,
        fail: bool,
    }

    impl DocumentAssembler for RecordingAssembler {
        fn assemble(&self, pages: &[PathBuf], output: &Path) -> Result<(), MergeError> {
            self.calls.borrow_mut().push(pages.to_vec());
            if self.fail {
                return Err(MergeError::MalformedInput("assembler failed".into()));
            }
            fs::write(output, b"%PDF-")?;
            Ok(())
        }
    }

    fn names(n: usize) -> Vec<Result<DataRow, MergeError>> {
        (0..n)
            .map(|i| Ok(DataRow::new().text("name", &format!("row{i}"))))
            .collect()
    }

    #[test]
    fn pipeline_basic() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let template = parse_svg(templates::two_up_template()).unwrap();
        let assembler = RecordingAssembler::default();

        let summary = generate_with(
            &template,
            names(3).into_iter(),
            &RecordingRenderer,
            &assembler,
            &output,
            false,
        )
        .unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.blocks_per_page, 2);
        let calls = assembler.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0][0].ends_with("0.svg"));
        assert!(calls[0][1].ends_with("1.svg"));
        // Scratch directory is gone once the run returns.
        assert!(!calls[0][0].exists());
        assert_eq!(fs::read(&output).unwrap(), b"%PDF-");
    }

    #[test]
    fn zero_rows_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let template = parse_svg(templates::two_up_template()).unwrap();
        let assembler = RecordingAssembler::default();

        let summary = generate_with(
            &template,
            names(0).into_iter(),
            &RecordingRenderer,
            &assembler,
            &output,
            false,
        )
        .unwrap();
        assert_eq!(summary.pages, 0);
        assert!(assembler.calls.borrow().is_empty());
        assert!(!output.exists());
    }

    #[test]
    fn existing_output_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        fs::write(&output, "keep me").unwrap();
        let template = parse_svg(templates::two_up_template()).unwrap();

        let err = generate_with(
            &template,
            names(1).into_iter(),
            &RecordingRenderer,
            &RecordingAssembler::default(),
            &output,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::OutputExists(p) if p == output));
        assert_eq!(fs::read_to_string(&output).unwrap(), "keep me");
    }

    #[test]
    fn overwrite_replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        fs::write(&output, "old").unwrap();
        let template = parse_svg(templates::two_up_template()).unwrap();

        generate_with(
            &template,
            names(1).into_iter(),
            &RecordingRenderer,
            &RecordingAssembler::default(),
            &output,
            true,
        )
        .unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"%PDF-");
    }

    #[test]
    fn failed_assembly_removes_reserved_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let template = parse_svg(templates::two_up_template()).unwrap();
        let assembler = RecordingAssembler {
            fail: true,
            ..RecordingAssembler::default()
        };

        let err = generate_with(
            &template,
            names(2).into_iter(),
            &RecordingRenderer,
            &assembler,
            &output,
            false,
        );
        assert!(err.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn reserve_output_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        reserve_output(&output).unwrap();
        assert!(matches!(
            reserve_output(&output),
            Err(MergeError::OutputExists(_))
        ));
    }

    #[test]
    fn missing_template_names_the_path() {
        let err = load_template(Path::new("/nonexistent/template.svg")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/template.svg"));
    }
}
