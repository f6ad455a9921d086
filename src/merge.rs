//! Template merger – fills template blocks from the data rows, one page at a
//! time.
//!
//! A block is any element below the root whose `class` is exactly
//! [`TEMPLATE_CLASS`]. Within a block:
//! - `<tspan class="field">` receives the field's text;
//! - `<rect class="field">` is replaced by the field's graphic, keeping the
//!   rect's geometry and class. A `transform` on the rect moves onto a
//!   wrapping `<g>`.
//!
//! Each page is a fresh deep copy of the master template. Pages keep coming
//! until the data runs out; a pass that fills no block produces no page.

use crate::dom::{Document, Element, Node};
use crate::error::MergeError;
use crate::source::{DataRow, FieldValue};

/// Reserved class value marking a repeatable block.
pub const TEMPLATE_CLASS: &str = "template";

/// Attributes copied from an image placeholder onto its replacement.
const PLACEHOLDER_GEOMETRY: [&str; 5] = ["class", "x", "y", "width", "height"];

/// Result of one merge pass over a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    /// Blocks filled on this pass.
    pub filled: usize,
    /// False once the data source reported exhaustion.
    pub more: bool,
}

/// A filled copy of the template.
#[derive(Debug, Clone)]
pub struct Page {
    pub document: Document,
    pub filled: usize,
}

fn is_block(element: &Element) -> bool {
    element.attr("class") == Some(TEMPLATE_CLASS)
}

/// Number of fillable blocks in a template.
pub fn count_blocks(template: &Document) -> usize {
    template.root.find_paths(is_block).len()
}

/// Fill the blocks under `root` in document order, one row per block.
pub fn fill_page<I>(root: &mut Element, rows: &mut I) -> Result<FillOutcome, MergeError>
where
    I: Iterator<Item = Result<DataRow, MergeError>>,
{
    let mut filled = 0;
    for path in root.find_paths(is_block) {
        let Some(row) = rows.next() else {
            return Ok(FillOutcome {
                filled,
                more: false,
            });
        };
        let row = row?;
        // Paths stay valid: fills only rewrite text or swap nodes in place.
        if let Some(block) = root.element_at_mut(&path) {
            fill_block(block, &row);
            filled += 1;
        }
    }
    Ok(FillOutcome { filled, more: true })
}

/// Apply every field of `row` to the placeholders inside `block`.
pub fn fill_block(block: &mut Element, row: &DataRow) {
    for (field, value) in &row.fields {
        apply_field(block, field, value);
    }
}

fn apply_field(element: &mut Element, field: &str, value: &FieldValue) {
    for child in &mut element.children {
        let Node::Element(child_el) = child else {
            continue;
        };
        let tagged = child_el.attr("class") == Some(field);

        if tagged && child_el.is_svg("rect") {
            if let FieldValue::Graphic(graphic) = value {
                let replacement = splice_graphic(child_el, graphic);
                *child = Node::Element(replacement);
            }
            continue;
        }

        if tagged && child_el.is_svg("tspan") {
            if let FieldValue::Text(text) = value {
                child_el.set_text(text);
            }
        }
        apply_field(child_el, field, value);
    }
}

/// Build the subtree that takes the place of an image placeholder.
fn splice_graphic(placeholder: &Element, graphic: &Element) -> Element {
    let mut graphic = graphic.clone();
    for name in PLACEHOLDER_GEOMETRY {
        if let Some(value) = placeholder.attr(name) {
            graphic.set_attr(name, value);
        }
    }

    match placeholder.attr("transform") {
        Some(transform) => {
            let mut group = Element::svg("g").with_attr("transform", transform);
            group.push_element(graphic);
            group
        }
        None => graphic,
    }
}

/// Lazily produces filled pages from one template and one row sequence.
///
/// Two states: filling, then done. The iterator is done after the source
/// is exhausted, after a pass that filled nothing, or after an error.
pub struct MergedPages<'t, I> {
    template: &'t Document,
    rows: I,
    done: bool,
}

impl<'t, I> MergedPages<'t, I>
where
    I: Iterator<Item = Result<DataRow, MergeError>>,
{
    pub fn new(template: &'t Document, rows: I) -> Self {
        Self {
            template,
            rows,
            done: false,
        }
    }
}

impl<I> Iterator for MergedPages<'_, I>
where
    I: Iterator<Item = Result<DataRow, MergeError>>,
{
    type Item = Result<Page, MergeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut document = self.template.clone();
        let outcome = match fill_page(&mut document.root, &mut self.rows) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        log::debug!(
            "merge pass filled {} block(s), more={}",
            outcome.filled,
            outcome.more
        );

        if !outcome.more || outcome.filled == 0 {
            self.done = true;
        }
        if outcome.filled == 0 {
            return None;
        }
        Some(Ok(Page {
            document,
            filled: outcome.filled,
        }))
    }
}

/// Merge all rows into pages, collecting them.
pub fn merge_pages<I>(template: &Document, rows: I) -> Result<Vec<Page>, MergeError>
where
    I: IntoIterator<Item = Result<DataRow, MergeError>>,
{
    MergedPages::new(template, rows.into_iter()).collect()
}
