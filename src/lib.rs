//! # svg-mailmerge – SVG template + CSV data → one PDF
//!
//! This crate fills repeated copies of an SVG template with rows of CSV data
//! and assembles the resulting pages into a single document. The pipeline
//! stages are:
//!
//! 1. **Parse** – SVG template → owned document tree ([`dom`])
//! 2. **Read** – CSV rows → lazy sequence of data rows ([`source`], [`qr`])
//! 3. **Merge** – fill template blocks, one copy per page ([`merge`])
//! 4. **Render** – each page → single-page PDF via an external tool ([`render`])
//! 5. **Assemble** – concatenate pages into the output ([`assemble`])
//!
//! The external commands are configured through [`config`].

pub mod assemble;
pub mod config;
pub mod dom;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod qr;
pub mod render;
pub mod source;
pub mod templates;
mod tool;

// Re-exports for convenience
pub use error::MergeError;
pub use pipeline::{emit_svg_pages, generate_pdf, PipelineConfig, RunSummary};
