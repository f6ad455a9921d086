//! mailmerge – fill an SVG template with CSV rows and write one PDF.
//!
//! Usage:
//!   mailmerge <template.svg> <data.csv> <output.pdf> [--force] [--qr FIELD]...
//!
//! Every element with `class="template"` in the SVG is one block; each data
//! row fills one block, and a new page starts when the blocks run out.

use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser};

use svg_mailmerge::config::ToolConfig;
use svg_mailmerge::qr::QrLevel;
use svg_mailmerge::source::SchemaMode;
use svg_mailmerge::{emit_svg_pages, generate_pdf, MergeError, PipelineConfig, RunSummary};

#[derive(Parser, Debug)]
#[command(
    name = "mailmerge",
    version,
    about = "Mail-merge an SVG template with CSV data into a PDF"
)]
struct Cli {
    /// SVG template; elements with class="template" are the repeated blocks
    template: PathBuf,

    /// CSV data file; the first row names the fields
    data: PathBuf,

    /// Output PDF (a directory with --emit-svg)
    output: PathBuf,

    /// Overwrite the output if it already exists
    #[arg(short, long)]
    force: bool,

    /// Render FIELD as a QR code instead of text (repeatable)
    #[arg(short = 'q', long = "qr", value_name = "FIELD")]
    qr_fields: Vec<String>,

    /// The second CSV row declares each field's kind (text or qr)
    #[arg(long)]
    typed_header: bool,

    /// QR error correction level
    #[arg(long, value_name = "L|M|Q|H", default_value = "L")]
    qr_level: QrLevel,

    /// JSON file overriding the renderer/assembler commands
    #[arg(long, value_name = "FILE")]
    tools: Option<PathBuf>,

    /// Write merged SVG pages into OUTPUT (a directory) without converting
    #[arg(long)]
    emit_svg: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let mut cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.force && !cli.emit_svg && cli.output.exists() {
        if !confirm_overwrite(&cli.output) {
            process::exit(1);
        }
        cli.force = true;
    }

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Ask before clobbering `path`. Non-interactive runs never overwrite.
fn confirm_overwrite(path: &Path) -> bool {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        eprintln!(
            "Error: file {} already exists. Use --force to overwrite.",
            path.display()
        );
        eprintln!("Aborted");
        return false;
    }

    eprint!("File {} already exists. Overwrite? [y/N] ", path.display());
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        answer.clear();
    }
    if is_yes(&answer) {
        true
    } else {
        eprintln!("Aborted");
        false
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn run(cli: &Cli) -> Result<(), MergeError> {
    let tools = match &cli.tools {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|source| MergeError::Read {
                path: path.clone(),
                source,
            })?;
            ToolConfig::from_json(&json)?
        }
        None => ToolConfig::default(),
    };

    let config = PipelineConfig {
        overwrite: cli.force,
        schema: if cli.typed_header {
            SchemaMode::Typed
        } else {
            SchemaMode::Implicit
        },
        qr_fields: cli.qr_fields.clone(),
        qr_level: cli.qr_level,
        tools,
    };

    let summary = if cli.emit_svg {
        emit_svg_pages(&cli.template, &cli.data, &cli.output, &config)?
    } else {
        generate_pdf(&cli.template, &cli.data, &cli.output, &config)?
    };

    if cli.json {
        println!("{}", summary_json(&summary)?);
    } else if summary.pages > 0 {
        eprintln!(
            "Wrote '{}' ({} row{}, {} page{})",
            summary.output.display(),
            summary.rows,
            if summary.rows == 1 { "" } else { "s" },
            summary.pages,
            if summary.pages == 1 { "" } else { "s" }
        );
    } else {
        eprintln!("No data rows merged; nothing written.");
    }
    Ok(())
}

fn summary_json(summary: &RunSummary) -> Result<String, MergeError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn repeated_qr_flags() {
        let cli = Cli::parse_from([
            "mailmerge",
            "t.svg",
            "d.csv",
            "o.pdf",
            "-q",
            "code",
            "--qr",
            "url",
            "--qr-level",
            "h",
        ]);
        assert_eq!(cli.qr_fields, vec!["code", "url"]);
        assert_eq!(cli.qr_level, QrLevel::H);
        assert!(!cli.force);
    }

    #[test]
    fn summary_json_has_every_field() {
        let summary = RunSummary {
            pages: 2,
            rows: 3,
            blocks_per_page: 2,
            output: PathBuf::from("cards.pdf"),
        };
        let json: serde_json::Value =
            serde_json::from_str(&summary_json(&summary).unwrap()).unwrap();
        assert_eq!(json["pages"], 2);
        assert_eq!(json["rows"], 3);
        assert_eq!(json["blocks_per_page"], 2);
        assert_eq!(json["output"], "cards.pdf");
    }
}
