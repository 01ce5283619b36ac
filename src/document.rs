//! Document model.
//!
//! A [`Document`] is the ordered element sequence a parse produces, plus
//! the font/color tables, metadata, and diagnostics. Every string and byte
//! buffer it references lives in the arena the parse allocated from, so the
//! borrowed form is `Document<'a>`. [`OwnedDocument`] bundles the arena
//! with the document for a single-owner, single-free lifecycle.

use crate::error::{Diagnostic, RtfResult};
use crate::info::Metadata;
use crate::parser::ParseOptions;
use crate::picture::Image;
use crate::types::{CharacterFormat, ColorTable, FontTable};
use bumpalo::Bump;
use std::io::Read;
use std::path::Path;

/// A maximal text span sharing one character format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRun<'a> {
    /// UTF-8 text, arena-owned
    pub text: &'a str,
    pub format: CharacterFormat,
}

/// A hyperlink with its display runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink<'a> {
    /// Target URL from the field instruction
    pub target: &'a str,
    /// Display text runs from the field result
    pub runs: Vec<TextRun<'a>>,
}

/// One table cell: nested content plus its right boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableCell<'a> {
    /// Right cell boundary in twips from `\cellx`, 0 when undeclared
    pub boundary: i32,
    pub elements: Vec<Element<'a>>,
}

/// One table row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRow<'a> {
    pub cells: Vec<TableCell<'a>>,
}

/// A table as a sequence of rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table<'a> {
    pub rows: Vec<TableRow<'a>>,
}

/// Raw payload of an embedded OLE object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedObject<'a> {
    /// Decoded object bytes, uninterpreted
    pub data: &'a [u8],
}

/// One document content element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element<'a> {
    Text(TextRun<'a>),
    ParagraphBreak,
    LineBreak,
    PageBreak,
    Image(Image<'a>),
    Table(Table<'a>),
    Hyperlink(Hyperlink<'a>),
}

/// A parsed RTF document borrowing from its arena.
#[derive(Debug)]
pub struct Document<'a> {
    pub(crate) elements: Vec<Element<'a>>,
    pub(crate) fonts: FontTable<'a>,
    pub(crate) colors: ColorTable,
    pub(crate) metadata: Metadata<'a>,
    pub(crate) objects: Vec<EmbeddedObject<'a>>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Code page declared by `\ansicpg` (1252 when absent)
    pub(crate) code_page: i32,
    /// Default font declared by `\deff`, −1 when absent
    pub(crate) default_font: i32,
    /// Indices of `Element::Text` entries, for O(1) run access
    pub(crate) run_index: Vec<u32>,
}

impl<'a> Document<'a> {
    /// The ordered content elements.
    #[inline]
    pub fn elements(&self) -> &[Element<'a>] {
        &self.elements
    }

    /// The font table.
    #[inline]
    pub fn fonts(&self) -> &FontTable<'a> {
        &self.fonts
    }

    /// The color table.
    #[inline]
    pub fn colors(&self) -> &ColorTable {
        &self.colors
    }

    /// Document metadata from the info group.
    #[inline]
    pub fn metadata(&self) -> &Metadata<'a> {
        &self.metadata
    }

    /// Raw payloads of embedded objects.
    #[inline]
    pub fn objects(&self) -> &[EmbeddedObject<'a>] {
        &self.objects
    }

    /// Recoverable conditions recorded while parsing.
    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The declared code page.
    #[inline]
    pub fn code_page(&self) -> i32 {
        self.code_page
    }

    /// The declared default font index, −1 when absent.
    #[inline]
    pub fn default_font(&self) -> i32 {
        self.default_font
    }

    /// Number of top-level text runs.
    #[inline]
    pub fn run_count(&self) -> usize {
        self.run_index.len()
    }

    /// The `index`-th top-level text run, in O(1).
    pub fn run(&self, index: usize) -> Option<&TextRun<'a>> {
        let element = self.elements.get(*self.run_index.get(index)? as usize)?;
        match element {
            Element::Text(run) => Some(run),
            _ => None,
        }
    }

    /// Iterate over the top-level text runs.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun<'a>> {
        self.run_index.iter().filter_map(|&i| {
            match self.elements.get(i as usize) {
                Some(Element::Text(run)) => Some(run),
                _ => None,
            }
        })
    }

    /// All text content with a newline at each paragraph or line break.
    ///
    /// Hyperlink display text contributes; table cells are separated by
    /// tabs and rows by newlines; images contribute nothing.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        append_plain_text(&self.elements, &mut out);
        out
    }
}

fn append_plain_text(elements: &[Element<'_>], out: &mut String) {
    for element in elements {
        match element {
            Element::Text(run) => out.push_str(run.text),
            Element::ParagraphBreak | Element::LineBreak | Element::PageBreak => out.push('\n'),
            Element::Image(_) => {}
            Element::Hyperlink(link) => {
                for run in &link.runs {
                    out.push_str(run.text);
                }
            }
            Element::Table(table) => {
                for row in &table.rows {
                    for (i, cell) in row.cells.iter().enumerate() {
                        if i > 0 {
                            out.push('\t');
                        }
                        append_plain_text(&cell.elements, out);
                    }
                    out.push('\n');
                }
            }
        }
    }
}

/// A document bundled with the arena that owns its storage.
///
/// Dropping an `OwnedDocument` releases the entire arena in one step; no
/// per-element cleanup runs. The document is immutable after construction
/// and may be read from any number of threads.
pub struct OwnedDocument {
    // Declared before the arena so the borrowing side drops first.
    document: Document<'static>,
    #[allow(dead_code)]
    arena: Bump,
}

// SAFETY: the arena is never allocated from or otherwise touched after
// construction, and the public surface hands out only shared references to
// the immutable document, so concurrent reads are sound.
unsafe impl Send for OwnedDocument {}
unsafe impl Sync for OwnedDocument {}

impl OwnedDocument {
    /// Parse an RTF document from a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use longan::OwnedDocument;
    ///
    /// let doc = OwnedDocument::parse(r"{\rtf1\ansi Hello \b World}")?;
    /// assert_eq!(doc.document().plain_text(), "Hello World");
    /// # Ok::<(), longan::RtfError>(())
    /// ```
    pub fn parse(input: &str) -> RtfResult<Self> {
        Self::from_bytes(input.as_bytes())
    }

    /// Parse an RTF document from bytes, transparently decompressing the
    /// LZFu container when present.
    pub fn from_bytes(bytes: &[u8]) -> RtfResult<Self> {
        Self::from_bytes_with_options(bytes, ParseOptions::default())
    }

    /// [`from_bytes`](Self::from_bytes) with explicit parse options.
    pub fn from_bytes_with_options(bytes: &[u8], options: ParseOptions) -> RtfResult<Self> {
        if crate::compressed::is_compressed_rtf(bytes) {
            let raw = crate::compressed::decompress(bytes)?;
            Self::parse_uncompressed(&raw, options)
        } else {
            Self::parse_uncompressed(bytes, options)
        }
    }

    /// Parse an RTF document from a file.
    pub fn open<P: AsRef<Path>>(path: P) -> RtfResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse from a stream through a fixed 1 KiB refill buffer.
    ///
    /// Compressed containers are not detected on this path; decompress
    /// before streaming if needed.
    pub fn from_reader<R: Read>(mut reader: R) -> RtfResult<Self> {
        Self::from_reader_with_options(&mut reader, ParseOptions::default())
    }

    /// [`from_reader`](Self::from_reader) with explicit parse options.
    pub fn from_reader_with_options(
        reader: &mut dyn Read,
        options: ParseOptions,
    ) -> RtfResult<Self> {
        let arena = Bump::new();
        let document = crate::parser::parse_reader(&arena, reader, options)?;
        // SAFETY: see `parse_uncompressed`
        let document = unsafe { detach(document) };
        Ok(Self { document, arena })
    }

    fn parse_uncompressed(bytes: &[u8], options: ParseOptions) -> RtfResult<Self> {
        let arena = Bump::new();
        let document = crate::parser::parse_bytes(&arena, bytes, options)?;
        // SAFETY: the document borrows only from `arena`, whose chunks are
        // heap-allocated and stable across moves of the `Bump` value. The
        // erased lifetime never escapes: `document()` reborrows it at the
        // lifetime of `&self`.
        let document = unsafe { detach(document) };
        Ok(Self { document, arena })
    }

    /// Borrow the parsed document.
    #[inline]
    pub fn document(&self) -> &Document<'_> {
        &self.document
    }

    /// Shorthand for [`Document::plain_text`].
    #[inline]
    pub fn plain_text(&self) -> String {
        self.document.plain_text()
    }

    /// Regenerate RTF for this document.
    #[inline]
    pub fn to_rtf(&self) -> Vec<u8> {
        crate::writer::generate(self.document())
    }
}

unsafe fn detach(document: Document<'_>) -> Document<'static> {
    // SAFETY: caller guarantees the arena outlives the returned value and
    // is never mutated while it is alive. Only the lifetime changes.
    unsafe { std::mem::transmute::<Document<'_>, Document<'static>>(document) }
}
