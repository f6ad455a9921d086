//! Tool config – which external programs render pages and assemble the
//! final document, and how they are invoked.
//!
//! Arguments are templates: `{input}` and `{output}` are replaced by paths,
//! and an argument that is exactly `{inputs}` expands to one argument per
//! page, in order.

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// One external command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Commands for the two external stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Single SVG page → single-page PDF.
    #[serde(default = "ToolConfig::default_renderer")]
    pub renderer: ToolCommand,
    /// Ordered single-page PDFs → output PDF.
    #[serde(default = "ToolConfig::default_assembler")]
    pub assembler: ToolCommand,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            renderer: Self::default_renderer(),
            assembler: Self::default_assembler(),
        }
    }
}

impl ToolConfig {
    /// Inkscape 1.x command line export.
    fn default_renderer() -> ToolCommand {
        ToolCommand::new(
            "inkscape",
            &["--export-type=pdf", "--export-filename={output}", "{input}"],
        )
    }

    /// Ghostscript `pdfwrite` concatenation.
    fn default_assembler() -> ToolCommand {
        ToolCommand::new(
            "gs",
            &[
                "-dBATCH",
                "-dNOPAUSE",
                "-q",
                "-sDEVICE=pdfwrite",
                "-sOutputFile={output}",
                "{inputs}",
            ],
        )
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> Result<String, MergeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialise from JSON. Missing sections keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, MergeError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Expand the argument templates.
    pub fn expand(&self, input: &str, output: &str, inputs: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len() + inputs.len());
        for arg in &self.args {
            if arg == "{inputs}" {
                out.extend(inputs.iter().cloned());
            } else {
                out.push(arg.replace("{input}", input).replace("{output}", output));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_inkscape_and_ghostscript() {
        let config = ToolConfig::default();
        assert_eq!(config.renderer.program, "inkscape");
        assert_eq!(config.assembler.program, "gs");
    }

    #[test]
    fn json_roundtrip() {
        let config = ToolConfig::default();
        let parsed = ToolConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "renderer": { "program": "rsvg-convert", "args": ["-f", "pdf", "-o", "{output}", "{input}"] } }"#;
        let config = ToolConfig::from_json(json).unwrap();
        assert_eq!(config.renderer.program, "rsvg-convert");
        assert_eq!(config.assembler, ToolConfig::default().assembler);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let err = ToolConfig::from_json("{ renderer: 1 }").unwrap_err();
        assert!(matches!(err, MergeError::Config(_)));
    }

    #[test]
    fn expand_substitutes_paths() {
        let cmd = ToolConfig::default().renderer;
        let args = cmd.expand("/tmp/p.svg", "/tmp/p.pdf", &[]);
        assert_eq!(
            args,
            vec!["--export-type=pdf", "--export-filename=/tmp/p.pdf", "/tmp/p.svg"]
        );
    }

    #[test]
    fn expand_spreads_inputs_in_order() {
        let cmd = ToolConfig::default().assembler;
        let pages = vec!["a.pdf".to_string(), "b.pdf".to_string()];
        let args = cmd.expand("", "out.pdf", &pages);
        assert_eq!(&args[4..], &["-sOutputFile=out.pdf", "a.pdf", "b.pdf"]);

        // Only a bare `{inputs}` argument is spread.
        let cmd = ToolCommand::new("x", &["--in={inputs}"]);
        assert_eq!(cmd.expand("", "", &pages), vec!["--in={inputs}"]);
    }
}
