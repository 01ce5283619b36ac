//! Longan - a thread-safe RTF parser and generator
//!
//! This library parses Rich Text Format (RTF 1.9) documents into an
//! in-memory model, extracts plain text and per-run character formatting,
//! and regenerates RTF from the model. It is built to replace UI-bound,
//! platform-specific RTF implementations: parsing is a pure function from
//! bytes to an immutable document, every per-document allocation lives in
//! one arena released by a single drop, and a C ABI (the `ffi` module)
//! makes the engine embeddable from any language.
//!
//! # Features
//!
//! - **Streaming lexer**: byte-at-a-time tokenization over slices or any
//!   `io::Read`, including hex escapes, Unicode escapes with surrogate
//!   pairing, and `\bin` binary spans
//! - **Permissive parsing**: malformed input degrades to diagnostics; a
//!   strict mode promotes them to errors
//! - **Code pages**: `\ansicpg` text decoding via `encoding_rs`
//! - **Structure**: fonts, colors, images, hyperlinks, tables, metadata,
//!   embedded object payloads
//! - **Compressed RTF**: transparent LZFu container handling
//! - **Round trips**: regenerated RTF parses back element-for-element
//!
//! # Example - extracting text and runs
//!
//! ```
//! use longan::OwnedDocument;
//!
//! let doc = OwnedDocument::parse(r"{\rtf1\ansi Hello \b bold\b0 world}")?;
//! assert_eq!(doc.plain_text(), "Hello bold world");
//!
//! let document = doc.document();
//! assert_eq!(document.run_count(), 3);
//! assert!(document.run(1).unwrap().format.bold);
//! # Ok::<(), longan::RtfError>(())
//! ```
//!
//! # Example - regenerating RTF
//!
//! ```
//! use longan::OwnedDocument;
//!
//! let doc = OwnedDocument::parse(r"{\rtf1\ansi A\par B}")?;
//! let rtf = doc.to_rtf();
//! let again = OwnedDocument::from_bytes(&rtf)?;
//! assert_eq!(again.plain_text(), "A\nB");
//! # Ok::<(), longan::RtfError>(())
//! ```

pub mod builder;
pub mod compressed;
pub mod document;
pub mod encoding;
pub mod error;
pub mod ffi;
pub mod field;
pub mod info;
pub mod lexer;
pub mod parser;
pub mod picture;
pub mod reader;
pub mod types;
pub mod writer;

// Re-exports
pub use builder::BreakKind;
pub use compressed::{CompressionMode, compress, decompress, is_compressed_rtf};
pub use document::{
    Document, Element, EmbeddedObject, Hyperlink, OwnedDocument, Table, TableCell, TableRow,
    TextRun,
};
pub use error::{Diagnostic, DiagnosticKind, RtfError, RtfResult};
pub use info::Metadata;
pub use parser::{ParseOptions, parse_bytes, parse_reader};
pub use picture::{Image, ImageFormat, detect_format};
pub use reader::ByteReader;
pub use types::{
    Alignment, CharacterFormat, Color, ColorTable, FontEntry, FontFamily, FontTable,
    ParagraphFormat,
};
pub use writer::{RtfWriter, WriterOptions, generate};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_document_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OwnedDocument>();
    }

    #[test]
    fn test_concurrent_reads() {
        let doc = OwnedDocument::parse(r"{\rtf1\ansi shared \b text}").unwrap();
        let doc = std::sync::Arc::new(doc);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let doc = std::sync::Arc::clone(&doc);
                std::thread::spawn(move || doc.plain_text())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "shared text");
        }
    }

    #[test]
    fn test_independent_parses_are_reentrant() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let input = format!(r"{{\rtf1\ansi document {}}}", i);
                    OwnedDocument::parse(&input).unwrap().plain_text()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("document {}", i));
        }
    }

    #[test]
    fn test_compressed_input_transparently_decompressed() {
        let raw = br"{\rtf1\ansi compressed body}";
        let container = compress(raw, CompressionMode::Compressed);
        let doc = OwnedDocument::from_bytes(&container).unwrap();
        assert_eq!(doc.plain_text(), "compressed body");
    }

    #[test]
    fn test_open_reads_from_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br"{\rtf1\ansi from a file}").unwrap();
        let doc = OwnedDocument::open(file.path()).unwrap();
        assert_eq!(doc.plain_text(), "from a file");
    }

    #[test]
    fn test_from_reader_streams() {
        let doc = OwnedDocument::from_reader(std::io::Cursor::new(
            br"{\rtf1\ansi streamed}".to_vec(),
        ))
        .unwrap();
        assert_eq!(doc.plain_text(), "streamed");
    }
}
