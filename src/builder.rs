//! Document builder.
//!
//! The parser feeds decoded text and structural events here; the builder
//! assembles the element sequence. Text accumulates into a pending run
//! that is sealed when the character format changes or a non-text element
//! arrives, so adjacent runs never share a format. While the in-table flag
//! is set, content routes into the current table cell; while a hyperlink
//! result is being captured, sealed runs route into the link instead of
//! the element list.

use crate::document::{Element, Hyperlink, Table, TableCell, TableRow, TextRun};
use crate::picture::Image;
use crate::types::CharacterFormat;
use bumpalo::Bump;
use bumpalo::collections::Vec as BumpVec;

/// Kinds of break elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    Paragraph,
    Line,
    Page,
}

struct TableState<'a> {
    rows: Vec<TableRow<'a>>,
    cells: Vec<TableCell<'a>>,
    cell_elements: Vec<Element<'a>>,
}

impl<'a> TableState<'a> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            cells: Vec::new(),
            cell_elements: Vec::new(),
        }
    }
}

/// Incremental assembler for the document element sequence.
pub struct DocumentBuilder<'a> {
    arena: &'a Bump,
    elements: Vec<Element<'a>>,
    pending_text: BumpVec<'a, u8>,
    pending_format: CharacterFormat,
    in_table: bool,
    table: Option<TableState<'a>>,
    capture: Option<Vec<TextRun<'a>>>,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self {
            arena,
            elements: Vec::new(),
            pending_text: BumpVec::new_in(arena),
            pending_format: CharacterFormat::default(),
            in_table: false,
            table: None,
            capture: None,
        }
    }

    /// Append decoded text under the given format. Extends the pending run
    /// while the format is unchanged, otherwise seals it first.
    pub fn append_text(&mut self, text: &str, format: CharacterFormat) {
        if text.is_empty() {
            return;
        }
        if !self.pending_text.is_empty() && self.pending_format != format {
            self.seal_run();
        }
        self.pending_format = format;
        self.pending_text.extend_from_slice(text.as_bytes());
    }

    /// Append a break element.
    pub fn append_break(&mut self, kind: BreakKind) {
        self.seal_run();
        if self.capture.is_some() {
            // Breaks inside a link result carry no display text
            return;
        }
        self.push_element(match kind {
            BreakKind::Paragraph => Element::ParagraphBreak,
            BreakKind::Line => Element::LineBreak,
            BreakKind::Page => Element::PageBreak,
        });
    }

    /// Append an image element.
    pub fn append_image(&mut self, image: Image<'a>) {
        self.seal_run();
        self.push_element(Element::Image(image));
    }

    /// Append a hyperlink element.
    pub fn append_hyperlink(&mut self, link: Hyperlink<'a>) {
        self.seal_run();
        self.push_element(Element::Hyperlink(link));
    }

    /// Re-append captured runs, merging with surrounding text where the
    /// formats line up.
    pub fn append_runs(&mut self, runs: Vec<TextRun<'a>>) {
        for run in runs {
            self.append_text(run.text, run.format);
        }
    }

    /// Route subsequent content into (or out of) the current table. Turning
    /// the flag off seals any open cell and row and emits the table.
    pub fn set_in_table(&mut self, in_table: bool) {
        if self.in_table == in_table {
            return;
        }
        if !in_table {
            self.seal_run();
            if let Some(mut table) = self.table.take() {
                if !table.cell_elements.is_empty() {
                    table.cells.push(TableCell {
                        boundary: 0,
                        elements: std::mem::take(&mut table.cell_elements),
                    });
                }
                if !table.cells.is_empty() {
                    table.rows.push(TableRow {
                        cells: std::mem::take(&mut table.cells),
                    });
                }
                self.in_table = false;
                if !table.rows.is_empty() {
                    self.push_element(Element::Table(Table { rows: table.rows }));
                }
                return;
            }
        }
        self.in_table = in_table;
        if in_table && self.table.is_none() {
            self.table = Some(TableState::new());
        }
    }

    /// Seal the current cell with its right boundary in twips.
    pub fn cell_end(&mut self, boundary: i32) {
        self.set_in_table(true);
        self.seal_run();
        if let Some(table) = &mut self.table {
            table.cells.push(TableCell {
                boundary,
                elements: std::mem::take(&mut table.cell_elements),
            });
        }
    }

    /// Seal the current row.
    pub fn row_end(&mut self) {
        self.set_in_table(true);
        self.seal_run();
        if let Some(table) = &mut self.table {
            if !table.cell_elements.is_empty() {
                table.cells.push(TableCell {
                    boundary: 0,
                    elements: std::mem::take(&mut table.cell_elements),
                });
            }
            if !table.cells.is_empty() {
                table.rows.push(TableRow {
                    cells: std::mem::take(&mut table.cells),
                });
            }
        }
    }

    /// Start capturing sealed runs for a hyperlink result.
    pub fn begin_link_capture(&mut self) {
        self.seal_run();
        self.capture = Some(Vec::new());
    }

    /// Stop capturing and return the captured runs.
    pub fn take_link_capture(&mut self) -> Vec<TextRun<'a>> {
        self.seal_run();
        self.capture.take().unwrap_or_default()
    }

    fn seal_run(&mut self) {
        if self.pending_text.is_empty() {
            return;
        }
        let bytes =
            std::mem::replace(&mut self.pending_text, BumpVec::new_in(self.arena)).into_bump_slice();
        // SAFETY: the pending buffer is only ever extended with `&str` bytes
        let text = unsafe { std::str::from_utf8_unchecked(bytes) };
        let format = self.pending_format;
        let arena = self.arena;

        if let Some(capture) = &mut self.capture {
            match capture.last_mut() {
                Some(last) if last.format == format => last.text = concat(arena, last.text, text),
                _ => capture.push(TextRun { text, format }),
            }
            return;
        }

        let sink = if self.in_table {
            match &mut self.table {
                Some(table) => &mut table.cell_elements,
                None => &mut self.elements,
            }
        } else {
            &mut self.elements
        };
        // Keep the no-adjacent-equal-runs invariant even when an aborted
        // capture or field re-appends text next to an existing run
        match sink.last_mut() {
            Some(Element::Text(last)) if last.format == format => {
                last.text = concat(arena, last.text, text);
            }
            _ => sink.push(Element::Text(TextRun { text, format })),
        }
    }

    fn push_element(&mut self, element: Element<'a>) {
        if self.in_table && let Some(table) = &mut self.table {
            table.cell_elements.push(element);
            return;
        }
        self.elements.push(element);
    }

    /// Seal all pending state and return the element sequence together with
    /// the index of top-level text runs.
    pub fn finish(mut self) -> (Vec<Element<'a>>, Vec<u32>) {
        // A capture left open by truncated input keeps its text
        if self.capture.is_some() {
            let runs = self.take_link_capture();
            self.append_runs(runs);
        }
        self.set_in_table(false);
        self.seal_run();

        let run_index = self
            .elements
            .iter()
            .enumerate()
            .filter_map(|(i, e)| matches!(e, Element::Text(_)).then_some(i as u32))
            .collect();
        (self.elements, run_index)
    }
}

fn concat<'a>(arena: &'a Bump, first: &str, second: &str) -> &'a str {
    bumpalo::format!(in arena, "{}{}", first, second).into_bump_str()
}
