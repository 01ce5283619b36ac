//! RTF generator.
//!
//! Serializes a [`Document`] back to RTF 1.9. Output is 7-bit clean:
//! non-ASCII characters are written as `\uN?` escapes and image payloads
//! as hex. For each run the writer emits the minimal set of control words
//! that transitions the previous run's format into the current one; a
//! value attribute falling back to unset forces a `\plain` re-emission.
//!
//! Newlines in the output are pure separators; the tokenizer drops them.

use crate::document::{Document, Element, Hyperlink, Table};
use crate::encoding::HEX_DIGITS;
use crate::info::Metadata;
use crate::picture::{Image, ImageFormat};
use crate::types::{CharacterFormat, UNSET_INDEX};
use std::io::{self, Write};

/// Hex bytes per payload line.
const IMAGE_BYTES_PER_LINE: usize = 64;

/// Generator options.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Code page written when the document does not declare one
    pub code_page: i32,
    /// Default font written when the document does not declare one
    pub default_font: i32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            code_page: 1252,
            default_font: 0,
        }
    }
}

/// Streaming RTF writer over any [`io::Write`] sink.
pub struct RtfWriter<W: Write> {
    writer: W,
    options: WriterOptions,
    /// The last byte written ended a control word, so literal text needs a
    /// separator first
    needs_separator: bool,
}

impl<W: Write> RtfWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, WriterOptions::default())
    }

    pub fn with_options(writer: W, options: WriterOptions) -> Self {
        Self {
            writer,
            options,
            needs_separator: false,
        }
    }

    /// Write a complete document.
    pub fn write_document(&mut self, document: &Document<'_>) -> io::Result<()> {
        self.write_header(document)?;
        self.write_font_table(document)?;
        self.write_color_table(document)?;
        self.write_metadata(document.metadata())?;

        let mut format = CharacterFormat::default();
        self.write_elements(document.elements(), &mut format)?;

        self.raw(b"}")?;
        Ok(())
    }

    fn write_header(&mut self, document: &Document<'_>) -> io::Result<()> {
        self.raw(b"{")?;
        self.control_param("rtf", 1)?;
        self.control("ansi")?;
        let code_page = if document.code_page() > 0 {
            document.code_page()
        } else {
            self.options.code_page
        };
        self.control_param("ansicpg", code_page)?;
        let default_font = if document.default_font() >= 0 {
            document.default_font()
        } else {
            self.options.default_font
        };
        self.control_param("deff", default_font)?;
        self.control_param("uc", 1)?;
        Ok(())
    }

    fn write_font_table(&mut self, document: &Document<'_>) -> io::Result<()> {
        let fonts = document.fonts();
        if fonts.iter().all(|f| !f.is_declared()) {
            return Ok(());
        }
        self.raw(b"{")?;
        self.control("fonttbl")?;
        for font in fonts.iter().filter(|f| f.is_declared()) {
            self.raw(b"{")?;
            self.control_param("f", font.index)?;
            let family = match font.family {
                crate::types::FontFamily::Nil => "fnil",
                crate::types::FontFamily::Roman => "froman",
                crate::types::FontFamily::Swiss => "fswiss",
                crate::types::FontFamily::Modern => "fmodern",
                crate::types::FontFamily::Script => "fscript",
                crate::types::FontFamily::Decor => "fdecor",
                crate::types::FontFamily::Tech => "ftech",
            };
            self.control(family)?;
            if font.charset != 0 {
                self.control_param("fcharset", font.charset)?;
            }
            self.write_text(font.name)?;
            self.raw(b";}")?;
        }
        self.raw(b"}\n")?;
        Ok(())
    }

    fn write_color_table(&mut self, document: &Document<'_>) -> io::Result<()> {
        let colors = document.colors();
        if colors.is_empty() {
            return Ok(());
        }
        self.raw(b"{")?;
        self.control("colortbl")?;
        for color in colors.iter() {
            self.control_param("red", i32::from(color.red))?;
            self.control_param("green", i32::from(color.green))?;
            self.control_param("blue", i32::from(color.blue))?;
            self.raw(b";")?;
        }
        self.raw(b"}\n")?;
        Ok(())
    }

    fn write_metadata(&mut self, metadata: &Metadata<'_>) -> io::Result<()> {
        if metadata.is_empty() {
            return Ok(());
        }
        self.raw(b"{")?;
        self.control("info")?;
        let fields = [
            ("title", metadata.title),
            ("subject", metadata.subject),
            ("author", metadata.author),
            ("operator", metadata.operator),
            ("keywords", metadata.keywords),
            ("doccomm", metadata.comment),
            ("company", metadata.company),
        ];
        for (word, value) in fields {
            if let Some(text) = value {
                self.raw(b"{")?;
                self.control(word)?;
                self.write_text(text)?;
                self.raw(b"}")?;
            }
        }
        if let Some(version) = metadata.version {
            self.control_param("version", version)?;
        }
        self.raw(b"}\n")?;
        Ok(())
    }

    fn write_elements(
        &mut self,
        elements: &[Element<'_>],
        format: &mut CharacterFormat,
    ) -> io::Result<()> {
        for element in elements {
            match element {
                Element::Text(run) => {
                    self.write_format_transition(format, &run.format)?;
                    self.write_text(run.text)?;
                    *format = run.format;
                }
                Element::ParagraphBreak => {
                    self.control("par")?;
                    self.raw(b"\n")?;
                }
                Element::LineBreak => self.control("line")?,
                Element::PageBreak => self.control("page")?,
                Element::Image(image) => self.write_image(image)?,
                Element::Hyperlink(link) => self.write_hyperlink(link)?,
                Element::Table(table) => self.write_table(table, format)?,
            }
        }
        Ok(())
    }

    /// Emit the control words taking `from` to `to`. Toggles switch with
    /// their `0` forms; a value attribute that falls back to unset cannot
    /// be expressed directly, so `\plain` resets and the rest re-emits.
    fn write_format_transition(
        &mut self,
        from: &CharacterFormat,
        to: &CharacterFormat,
    ) -> io::Result<()> {
        let mut from = *from;
        let regressed = (from.font != UNSET_INDEX && to.font == UNSET_INDEX)
            || (from.font_size != 0 && to.font_size == 0)
            || (from.foreground_color != UNSET_INDEX && to.foreground_color == UNSET_INDEX)
            || (from.background_color != UNSET_INDEX && to.background_color == UNSET_INDEX);
        if regressed {
            self.control("plain")?;
            from = CharacterFormat::default();
        }

        let toggles = [
            ("b", from.bold, to.bold),
            ("i", from.italic, to.italic),
            ("ul", from.underline, to.underline),
            ("strike", from.strike, to.strike),
            ("super", from.superscript, to.superscript),
            ("sub", from.subscript, to.subscript),
            ("v", from.hidden, to.hidden),
            ("scaps", from.smallcaps, to.smallcaps),
            ("caps", from.allcaps, to.allcaps),
        ];
        for (word, was, now) in toggles {
            if was != now {
                if now {
                    self.control(word)?;
                } else {
                    self.control_param(word, 0)?;
                }
            }
        }

        if to.font != from.font && to.font >= 0 {
            self.control_param("f", to.font)?;
        }
        if to.font_size != from.font_size && to.font_size > 0 {
            self.control_param("fs", i32::from(to.font_size))?;
        }
        if to.foreground_color != from.foreground_color && to.foreground_color >= 0 {
            self.control_param("cf", to.foreground_color)?;
        }
        if to.background_color != from.background_color && to.background_color >= 0 {
            self.control_param("cb", to.background_color)?;
        }
        Ok(())
    }

    fn write_hyperlink(&mut self, link: &Hyperlink<'_>) -> io::Result<()> {
        self.raw(b"{")?;
        self.control("field")?;
        self.raw(b"{")?;
        self.control_symbol(b'*')?;
        self.control("fldinst")?;
        self.write_text("HYPERLINK \"")?;
        self.write_text(link.target)?;
        self.write_text("\"")?;
        self.raw(b"}{")?;
        self.control("fldrslt")?;
        // The result group scope ends at the brace, so formats start clean
        self.control("plain")?;
        let mut format = CharacterFormat::default();
        for run in &link.runs {
            self.write_format_transition(&format, &run.format)?;
            self.write_text(run.text)?;
            format = run.format;
        }
        self.raw(b"}}")?;
        Ok(())
    }

    fn write_table(&mut self, table: &Table<'_>, format: &mut CharacterFormat) -> io::Result<()> {
        for row in &table.rows {
            self.control("trowd")?;
            for cell in &row.cells {
                self.control_param("cellx", cell.boundary)?;
            }
            self.control("intbl")?;
            for cell in &row.cells {
                self.write_elements(&cell.elements, format)?;
                self.control("cell")?;
            }
            self.control("row")?;
            self.raw(b"\n")?;
        }
        self.control("pard")?;
        Ok(())
    }

    fn write_image(&mut self, image: &Image<'_>) -> io::Result<()> {
        self.raw(b"{")?;
        self.control("pict")?;
        match image.format {
            ImageFormat::Png => self.control("pngblip")?,
            ImageFormat::Jpeg => self.control("jpegblip")?,
            ImageFormat::Emf => self.control("emfblip")?,
            ImageFormat::Wmf => self.control_param("wmetafile", 8)?,
            ImageFormat::Bmp => self.control_param("wbitmap", 0)?,
            ImageFormat::Other => {}
        }
        let dimensions = [
            ("picw", image.width),
            ("pich", image.height),
            ("picwgoal", image.goal_width),
            ("pichgoal", image.goal_height),
            ("picscalex", image.scale_x),
            ("picscaley", image.scale_y),
            ("wbmbitspixel", image.bits_per_pixel),
        ];
        for (word, value) in dimensions {
            if value > 0 {
                self.control_param(word, value)?;
            }
        }
        for (i, byte) in image.data.iter().enumerate() {
            if i % IMAGE_BYTES_PER_LINE == 0 {
                self.raw(b"\n")?;
            }
            let pair = [
                HEX_DIGITS[usize::from(byte >> 4)],
                HEX_DIGITS[usize::from(byte & 0x0F)],
            ];
            self.raw(&pair)?;
        }
        self.raw(b"}")?;
        Ok(())
    }

    /// Write literal text with RTF escaping.
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        for c in text.chars() {
            match c {
                '\\' => self.control_symbol(b'\\')?,
                '{' => self.control_symbol(b'{')?,
                '}' => self.control_symbol(b'}')?,
                '\t' => self.control("tab")?,
                c if (' '..='\u{7E}').contains(&c) => {
                    if self.needs_separator {
                        // A newline delimits the control word and is
                        // dropped by the tokenizer
                        self.raw(b"\n")?;
                    }
                    let mut buf = [0u8; 4];
                    self.raw(c.encode_utf8(&mut buf).as_bytes())?;
                }
                c => self.write_unicode_escape(c)?,
            }
        }
        Ok(())
    }

    /// Write a character as `\uN?`, splitting non-BMP characters into a
    /// surrogate pair.
    fn write_unicode_escape(&mut self, c: char) -> io::Result<()> {
        let code_point = u32::from(c);
        if code_point > 0xFFFF {
            let mut units = [0u16; 2];
            c.encode_utf16(&mut units);
            self.write_u_escape(units[0])?;
            self.write_u_escape(units[1])?;
        } else {
            self.write_u_escape(code_point as u16)?;
        }
        Ok(())
    }

    fn write_u_escape(&mut self, unit: u16) -> io::Result<()> {
        self.control_param("u", i32::from(unit as i16))?;
        self.raw(b"?")?;
        Ok(())
    }

    fn control(&mut self, word: &str) -> io::Result<()> {
        self.writer.write_all(b"\\")?;
        self.writer.write_all(word.as_bytes())?;
        self.needs_separator = true;
        Ok(())
    }

    fn control_param(&mut self, word: &str, value: i32) -> io::Result<()> {
        self.writer.write_all(b"\\")?;
        self.writer.write_all(word.as_bytes())?;
        let mut digits = itoa::Buffer::new();
        self.writer.write_all(digits.format(value).as_bytes())?;
        self.needs_separator = true;
        Ok(())
    }

    fn control_symbol(&mut self, symbol: u8) -> io::Result<()> {
        self.writer.write_all(&[b'\\', symbol])?;
        self.needs_separator = false;
        Ok(())
    }

    fn raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.needs_separator = false;
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Serialize a document to an RTF byte buffer.
pub fn generate(document: &Document<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    let result = RtfWriter::new(&mut out).write_document(document);
    // Writing into a Vec cannot fail
    debug_assert!(result.is_ok());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseOptions, parse_bytes};
    use bumpalo::Bump;
    use proptest::prelude::*;

    fn round_trip_elements(input: &str) {
        let arena_a = Bump::new();
        let first = parse_bytes(&arena_a, input.as_bytes(), ParseOptions::default()).unwrap();
        let rtf = generate(&first);
        let arena_b = Bump::new();
        let second = parse_bytes(&arena_b, &rtf, ParseOptions::default()).unwrap();
        assert_eq!(
            first.elements(),
            second.elements(),
            "regenerated RTF was: {}",
            String::from_utf8_lossy(&rtf)
        );
    }

    #[test]
    fn test_header_shape() {
        let arena = Bump::new();
        let doc = parse_bytes(&arena, br"{\rtf1\ansi hi}", ParseOptions::default()).unwrap();
        let rtf = generate(&doc);
        let text = String::from_utf8(rtf).unwrap();
        assert!(text.starts_with(r"{\rtf1\ansi\ansicpg1252\deff0\uc1"));
        assert!(text.ends_with('}'));
    }

    #[test]
    fn test_output_is_seven_bit_clean() {
        let arena = Bump::new();
        let doc = parse_bytes(
            &arena,
            "{\\rtf1\\ansi caf\\u233? \\u-10179?\\u-8704?}".as_bytes(),
            ParseOptions::default(),
        )
        .unwrap();
        let rtf = generate(&doc);
        assert!(rtf.iter().all(|&b| b < 0x80));
    }

    #[test]
    fn test_round_trip_formatted_runs() {
        round_trip_elements(r"{\rtf1\ansi Hello \b bold\b0 and \i italic\i0 world!}");
    }

    #[test]
    fn test_round_trip_breaks() {
        round_trip_elements(r"{\rtf1\ansi A\par B\line C\page D}");
    }

    #[test]
    fn test_round_trip_value_regression() {
        // Font, size, and both colors all fall back to unset mid-document
        round_trip_elements(
            r"{\rtf1\ansi{\fonttbl{\f1\fnil Marker;}}{\colortbl ;\red1\green2\blue3;\red4\green5\blue6;\red7\green8\blue9;}{\f1\fs48\cf2\cb3 styled}unstyled}",
        );
    }

    #[test]
    fn test_dangling_indices_clamp_to_unset() {
        let arena = Bump::new();
        let doc = parse_bytes(
            &arena,
            br"{\rtf1\ansi{\f9\cf9 dangling}}",
            ParseOptions::default(),
        )
        .unwrap();
        let run = doc.run(0).unwrap();
        assert_eq!(run.format.font, crate::types::UNSET_INDEX);
        assert_eq!(run.format.foreground_color, crate::types::UNSET_INDEX);
        round_trip_elements(r"{\rtf1\ansi{\f9\cf9 dangling}}");
    }

    #[test]
    fn test_round_trip_unicode() {
        round_trip_elements("{\\rtf1\\ansi caf\\u233? na\\u239?ve \\u-10179?\\u-8704?}");
    }

    #[test]
    fn test_round_trip_escaped_characters() {
        round_trip_elements(r"{\rtf1\ansi \{brace\} back\\slash tab\tab end}");
    }

    #[test]
    fn test_round_trip_hyperlink() {
        round_trip_elements(
            r#"{\rtf1\ansi See {\field{\*\fldinst HYPERLINK "https://example.com/a?b=c"}{\fldrslt\b the site}} now}"#,
        );
    }

    #[test]
    fn test_round_trip_table() {
        round_trip_elements(
            r"{\rtf1\ansi before\par\trowd\cellx1440\cellx2880\intbl a\cell b\cell\row\trowd\cellx1440\cellx2880\intbl c\cell d\cell\row\pard after}",
        );
    }

    #[test]
    fn test_round_trip_image() {
        round_trip_elements(
            r"{\rtf1\ansi{\pict\pngblip\picw100\pich50\picscalex200 89504e470d0a1a0a0011}}",
        );
    }

    #[test]
    fn test_round_trip_font_and_color_tables() {
        let input = r"{\rtf1\ansi\deff0{\fonttbl{\f0\fswiss\fcharset0 Arial;}{\f2\fmodern Courier New;}}{\colortbl ;\red255\green0\blue0;\red0\green0\blue255;}\f2\fs24\cf1 styled\plain plain}";
        let arena_a = Bump::new();
        let first = parse_bytes(&arena_a, input.as_bytes(), ParseOptions::default()).unwrap();
        let rtf = generate(&first);
        let arena_b = Bump::new();
        let second = parse_bytes(&arena_b, &rtf, ParseOptions::default()).unwrap();
        assert_eq!(first.elements(), second.elements());
        assert_eq!(first.fonts(), second.fonts());
        assert_eq!(first.colors(), second.colors());
    }

    #[test]
    fn test_round_trip_metadata() {
        let input = r"{\rtf1\ansi{\info{\title My Title}{\author An Author}\version2}body}";
        let arena_a = Bump::new();
        let first = parse_bytes(&arena_a, input.as_bytes(), ParseOptions::default()).unwrap();
        let rtf = generate(&first);
        let arena_b = Bump::new();
        let second = parse_bytes(&arena_b, &rtf, ParseOptions::default()).unwrap();
        assert_eq!(first.metadata(), second.metadata());
        assert_eq!(first.elements(), second.elements());
    }

    #[test]
    fn test_digit_text_after_parameterized_word() {
        // A run of digits directly after \cf1 must not merge into the
        // parameter on re-parse
        let input = r"{\rtf1\ansi{\cf1 99}00}";
        round_trip_elements(input);
    }

    proptest! {
        #[test]
        fn prop_round_trip_random_runs(
            segments in proptest::collection::vec(
                ("[ -~&&[^\\\\{}]]{0,6}", any::<bool>(), any::<bool>(), 0u8..3),
                1..8,
            )
        ) {
            let mut input = String::from(r"{\rtf1\ansi ");
            for (text, bold, italic, size) in &segments {
                input.push_str(if *bold { r"\b" } else { r"\b0" });
                input.push_str(if *italic { r"\i " } else { r"\i0 " });
                if *size > 0 {
                    input.push_str(&format!(r"\fs{} ", 20 + size));
                }
                input.push_str(text);
            }
            input.push('}');

            let arena_a = Bump::new();
            let first = parse_bytes(&arena_a, input.as_bytes(), ParseOptions::default()).unwrap();
            let rtf = generate(&first);
            let arena_b = Bump::new();
            let second = parse_bytes(&arena_b, &rtf, ParseOptions::default()).unwrap();
            prop_assert_eq!(first.elements(), second.elements());
        }
    }
}
