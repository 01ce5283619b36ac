//! RTF parser.
//!
//! A single streaming pass over the token stream. Formatting state lives
//! in a stack of value-typed frames, one per open group; the destination
//! carried by each frame decides who consumes text. Control words either
//! mutate the current frame, select a destination for the enclosing group,
//! or emit elements through the [`DocumentBuilder`].

use crate::builder::{BreakKind, DocumentBuilder};
use crate::document::{Document, EmbeddedObject, Hyperlink};
use crate::encoding::{DEFAULT_ENCODING, codepage_to_encoding, hex_digit};
use crate::error::{Diagnostic, DiagnosticKind, RtfError, RtfResult};
use crate::field::{FieldKind, classify_instruction, hyperlink_target};
use crate::info::{InfoField, Metadata};
use crate::lexer::{ControlWord, Lexer, Token};
use crate::picture::{Image, ImageFormat, detect_format};
use crate::reader::ByteReader;
use crate::types::{
    Alignment, CharacterFormat, Color, ColorTable, FontEntry, FontFamily, FontTable,
    ParagraphFormat, UNSET_INDEX,
};
use bumpalo::Bump;
use bumpalo::collections::Vec as BumpVec;
use encoding_rs::Encoding;
use smallvec::SmallVec;
use std::io::Read;

/// Parse configuration.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Promote every recoverable diagnostic to a fatal error
    pub strict: bool,
    /// Maximum group nesting depth; exceeding it aborts the parse
    pub max_group_depth: usize,
    /// Code page assumed until the document declares one
    pub default_code_page: i32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_group_depth: 100,
            default_code_page: 1252,
        }
    }
}

/// The contextual meaning of text within the current group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Body,
    FontTable,
    ColorTable,
    StyleSheet,
    Info(InfoField),
    Picture,
    Object,
    ObjectData,
    Field,
    FieldInstruction,
    FieldResult,
    /// Recognized but discarded content (headers, footers, `\*` groups)
    Skip,
}

/// Per-group snapshot, pushed on `{` and restored on `}`.
#[derive(Clone, Copy)]
struct GroupFrame {
    format: CharacterFormat,
    paragraph: ParagraphFormat,
    destination: Destination,
    /// Replacement units to skip after each `\u`, from `\uc`
    unicode_skip: i32,
    encoding: &'static Encoding,
    /// An `\*` was seen; the next unknown destination skips the group
    star_pending: bool,
}

impl GroupFrame {
    fn initial(encoding: &'static Encoding) -> Self {
        Self {
            format: CharacterFormat::default(),
            paragraph: ParagraphFormat::default(),
            destination: Destination::Body,
            unicode_skip: 1,
            encoding,
            star_pending: false,
        }
    }
}

/// Hex-to-binary accumulator for picture and object payloads.
struct HexAccumulator<'a> {
    data: BumpVec<'a, u8>,
    pending: Option<u8>,
}

impl<'a> HexAccumulator<'a> {
    fn new(arena: &'a Bump) -> Self {
        Self {
            data: BumpVec::new_in(arena),
            pending: None,
        }
    }

    fn push_hex(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b' ' || byte == b'\t' {
                continue;
            }
            match hex_digit(byte) {
                Some(nibble) => match self.pending.take() {
                    Some(high) => self.data.push((high << 4) | nibble),
                    None => self.pending = Some(nibble),
                },
                None => log::debug!("non-hex byte {:#04x} in binary payload", byte),
            }
        }
    }

    fn push_raw(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}

struct PictureState<'a> {
    acc: HexAccumulator<'a>,
    format: ImageFormat,
    format_declared: bool,
    width: i32,
    height: i32,
    bits_per_pixel: i32,
    goal_width: i32,
    goal_height: i32,
    scale_x: i32,
    scale_y: i32,
}

impl<'a> PictureState<'a> {
    fn new(arena: &'a Bump) -> Self {
        Self {
            acc: HexAccumulator::new(arena),
            format: ImageFormat::Other,
            format_declared: false,
            width: 0,
            height: 0,
            bits_per_pixel: 0,
            goal_width: 0,
            goal_height: 0,
            scale_x: 0,
            scale_y: 0,
        }
    }
}

struct FieldState<'a> {
    instruction: BumpVec<'a, u8>,
    result: Option<Vec<crate::document::TextRun<'a>>>,
}

impl<'a> FieldState<'a> {
    fn new(arena: &'a Bump) -> Self {
        Self {
            instruction: BumpVec::new_in(arena),
            result: None,
        }
    }
}

#[derive(Default)]
struct FontEntryState {
    /// A `\f` index was declared
    active: bool,
    index: i32,
    family: FontFamily,
    charset: i32,
    name: SmallVec<[u8; 32]>,
}

#[derive(Default)]
struct ColorEntryState {
    red: i32,
    green: i32,
    blue: i32,
    declared: bool,
}

/// Streaming parser assembling a [`Document`].
pub struct Parser<'a, 'r> {
    lexer: Lexer<'a, 'r>,
    arena: &'a Bump,
    options: ParseOptions,
    frames: Vec<GroupFrame>,
    builder: DocumentBuilder<'a>,
    fonts: FontTable<'a>,
    colors: ColorTable,
    metadata: Metadata<'a>,
    objects: Vec<EmbeddedObject<'a>>,
    diagnostics: Vec<Diagnostic>,
    /// Raw code-page bytes awaiting decode
    text_buf: SmallVec<[u8; 256]>,
    /// Raw bytes of the current info field
    info_buf: SmallVec<[u8; 64]>,
    font_entry: FontEntryState,
    color_entry: ColorEntryState,
    picture: Option<PictureState<'a>>,
    object_data: Option<HexAccumulator<'a>>,
    field: Option<FieldState<'a>>,
    /// Replacement units left to skip after a `\u`
    skip_remaining: u32,
    high_surrogate: Option<u16>,
    cell_boundaries: SmallVec<[i32; 8]>,
    cell_index: usize,
    code_page: i32,
    default_font: i32,
    expect_header: bool,
    preamble_reported: bool,
    done: bool,
}

impl<'a, 'r> Parser<'a, 'r> {
    fn new(lexer: Lexer<'a, 'r>, arena: &'a Bump, options: ParseOptions) -> Self {
        Self {
            lexer,
            arena,
            options,
            frames: Vec::new(),
            builder: DocumentBuilder::new(arena),
            fonts: FontTable::new(),
            colors: ColorTable::new(),
            metadata: Metadata::default(),
            objects: Vec::new(),
            diagnostics: Vec::new(),
            text_buf: SmallVec::new(),
            info_buf: SmallVec::new(),
            font_entry: FontEntryState::default(),
            color_entry: ColorEntryState::default(),
            picture: None,
            object_data: None,
            field: None,
            skip_remaining: 0,
            high_surrogate: None,
            cell_boundaries: SmallVec::new(),
            cell_index: 0,
            code_page: options.default_code_page,
            default_font: UNSET_INDEX,
            expect_header: false,
            preamble_reported: false,
            done: false,
        }
    }

    fn run(mut self) -> RtfResult<Document<'a>> {
        loop {
            let token = self.lexer.next_token()?;
            self.drain_lexer_diagnostics()?;

            let Some(token) = self.apply_unicode_skip(token) else {
                continue;
            };

            if self.high_surrogate.is_some()
                && !matches!(token, Token::Control(ControlWord::Unicode(_)))
            {
                self.high_surrogate = None;
                self.report(DiagnosticKind::InvalidUnicodeEscape)?;
                self.emit_str("\u{FFFD}")?;
            }

            if self.expect_header {
                self.expect_header = false;
                if !matches!(token, Token::Control(ControlWord::Rtf(_))) {
                    self.report(DiagnosticKind::MissingRtfHeader)?;
                }
            }

            match token {
                Token::Eof => break,
                Token::GroupOpen => self.open_group()?,
                Token::GroupClose => {
                    self.close_group()?;
                    if self.done {
                        break;
                    }
                }
                _ if self.frames.is_empty() => self.report_preamble_content()?,
                Token::Control(word) => self.handle_control(word)?,
                Token::Symbol(symbol) => self.handle_symbol(symbol)?,
                Token::Text(bytes) => self.handle_text(bytes)?,
                Token::HexByte(byte) => self.handle_hex_byte(byte)?,
                Token::Binary(data) => self.handle_binary(data)?,
            }
        }
        self.finish()
    }

    fn finish(mut self) -> RtfResult<Document<'a>> {
        self.flush_text()?;
        if !self.frames.is_empty() {
            self.report(DiagnosticKind::UnclosedGroups)?;
            while !self.frames.is_empty() {
                self.pop_frame()?;
            }
        }
        let (mut elements, run_index) = self.builder.finish();
        clamp_table_indices(&mut elements, self.fonts.len() as i32, self.colors.len() as i32);
        Ok(Document {
            elements,
            fonts: self.fonts,
            colors: self.colors,
            metadata: self.metadata,
            objects: self.objects,
            diagnostics: self.diagnostics,
            code_page: self.code_page,
            default_font: self.default_font,
            run_index,
        })
    }

    // ----- diagnostics -------------------------------------------------

    fn report(&mut self, kind: DiagnosticKind) -> RtfResult<()> {
        let diagnostic = Diagnostic::new(kind, self.lexer.position());
        log::warn!(
            "parse diagnostic {:?} at offset {}",
            diagnostic.kind,
            diagnostic.offset
        );
        self.diagnostics.push(diagnostic);
        if self.options.strict {
            return Err(diagnostic.promote());
        }
        Ok(())
    }

    fn drain_lexer_diagnostics(&mut self) -> RtfResult<()> {
        let pending: SmallVec<[Diagnostic; 2]> = self.lexer.drain_diagnostics().collect();
        for diagnostic in pending {
            self.diagnostics.push(diagnostic);
            if self.options.strict {
                return Err(diagnostic.promote());
            }
        }
        Ok(())
    }

    fn report_preamble_content(&mut self) -> RtfResult<()> {
        if !self.preamble_reported {
            self.preamble_reported = true;
            self.report(DiagnosticKind::ContentBeforeDocument)?;
        }
        Ok(())
    }

    // ----- group stack -------------------------------------------------

    fn open_group(&mut self) -> RtfResult<()> {
        self.flush_text()?;
        if self.frames.len() >= self.options.max_group_depth {
            return Err(RtfError::DepthExceeded {
                max: self.options.max_group_depth,
                offset: self.lexer.position(),
            });
        }
        let frame = match self.frames.last() {
            Some(parent) => {
                let mut frame = *parent;
                frame.star_pending = false;
                frame
            }
            None => {
                self.expect_header = true;
                GroupFrame::initial(
                    codepage_to_encoding(self.options.default_code_page)
                        .unwrap_or(DEFAULT_ENCODING),
                )
            }
        };
        self.frames.push(frame);
        Ok(())
    }

    fn close_group(&mut self) -> RtfResult<()> {
        self.flush_text()?;
        if self.frames.is_empty() {
            return self.report(DiagnosticKind::UnmatchedGroupClose);
        }
        self.pop_frame()?;
        if self.frames.is_empty() {
            self.done = true;
        }
        Ok(())
    }

    fn pop_frame(&mut self) -> RtfResult<()> {
        let Some(popped) = self.frames.pop() else {
            return Ok(());
        };
        let parent_destination = self.frames.last().map(|f| f.destination);
        if Some(popped.destination) != parent_destination {
            self.leave_destination(popped)?;
        }
        Ok(())
    }

    /// Commit whatever the closing group's destination accumulated.
    fn leave_destination(&mut self, popped: GroupFrame) -> RtfResult<()> {
        match popped.destination {
            Destination::Picture => self.commit_picture(),
            Destination::ObjectData => self.commit_object(),
            Destination::FieldResult => {
                let runs = self.builder.take_link_capture();
                match &mut self.field {
                    Some(field) => field.result = Some(runs),
                    // A result group outside any field keeps its text
                    None => self.builder.append_runs(runs),
                }
            }
            Destination::Field => self.commit_field(popped)?,
            Destination::FontTable => self.commit_font_entry(false)?,
            Destination::Info(field) => self.commit_info(field, popped.encoding),
            _ => {}
        }
        Ok(())
    }

    // ----- text routing ------------------------------------------------

    fn current_frame(&self) -> Option<GroupFrame> {
        self.frames.last().copied()
    }

    /// Decode pending body text through the frame's code page and hand it
    /// to the builder under the frame's character format.
    fn flush_text(&mut self) -> RtfResult<()> {
        if self.text_buf.is_empty() {
            return Ok(());
        }
        let Some(frame) = self.current_frame() else {
            self.text_buf.clear();
            return Ok(());
        };
        let bytes = std::mem::take(&mut self.text_buf);
        let (decoded, _, had_errors) = frame.encoding.decode(&bytes);
        if had_errors {
            self.report(DiagnosticKind::UndecodableText)?;
        }
        self.builder.set_in_table(frame.paragraph.in_table);
        self.builder.append_text(&decoded, frame.format);
        Ok(())
    }

    /// Emit already-decoded text (special characters, Unicode escapes)
    /// into whatever the current destination accumulates.
    fn emit_str(&mut self, text: &str) -> RtfResult<()> {
        let Some(frame) = self.current_frame() else {
            return Ok(());
        };
        match frame.destination {
            Destination::Body | Destination::FieldResult => {
                self.flush_text()?;
                self.builder.set_in_table(frame.paragraph.in_table);
                self.builder.append_text(text, frame.format);
            }
            Destination::FieldInstruction => {
                let encoded = frame.encoding.encode(text).0;
                if let Some(field) = &mut self.field {
                    field.instruction.extend_from_slice(&encoded);
                }
            }
            Destination::Info(info_field) if info_field != InfoField::None => {
                let encoded = frame.encoding.encode(text).0;
                self.info_buf.extend_from_slice(&encoded);
            }
            Destination::FontTable => {
                let encoded = frame.encoding.encode(text).0;
                self.font_entry.name.extend_from_slice(&encoded);
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_text(&mut self, bytes: &[u8]) -> RtfResult<()> {
        let Some(frame) = self.current_frame() else {
            return Ok(());
        };
        match frame.destination {
            Destination::Body | Destination::FieldResult => {
                self.text_buf.extend_from_slice(bytes);
            }
            Destination::FontTable => {
                for &byte in bytes {
                    if byte == b';' {
                        self.commit_font_entry(true)?;
                    } else {
                        self.font_entry.name.push(byte);
                    }
                }
            }
            Destination::ColorTable => {
                for &byte in bytes {
                    if byte == b';' {
                        self.commit_color_entry()?;
                    }
                }
            }
            Destination::Picture => {
                if let Some(picture) = &mut self.picture {
                    picture.acc.push_hex(bytes);
                }
            }
            Destination::ObjectData => {
                if let Some(acc) = &mut self.object_data {
                    acc.push_hex(bytes);
                }
            }
            Destination::FieldInstruction => {
                if let Some(field) = &mut self.field {
                    field.instruction.extend_from_slice(bytes);
                }
            }
            Destination::Info(info_field) if info_field != InfoField::None => {
                self.info_buf.extend_from_slice(bytes);
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_hex_byte(&mut self, byte: u8) -> RtfResult<()> {
        let Some(frame) = self.current_frame() else {
            return Ok(());
        };
        match frame.destination {
            Destination::Body | Destination::FieldResult => self.text_buf.push(byte),
            // A hex-escaped semicolon is a literal name byte, not a terminator
            Destination::FontTable => self.font_entry.name.push(byte),
            Destination::Picture => {
                if let Some(picture) = &mut self.picture {
                    picture.acc.push_raw(&[byte]);
                }
            }
            Destination::ObjectData => {
                if let Some(acc) = &mut self.object_data {
                    acc.push_raw(&[byte]);
                }
            }
            Destination::FieldInstruction => {
                if let Some(field) = &mut self.field {
                    field.instruction.push(byte);
                }
            }
            Destination::Info(info_field) if info_field != InfoField::None => {
                self.info_buf.push(byte);
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_binary(&mut self, data: &[u8]) -> RtfResult<()> {
        let Some(frame) = self.current_frame() else {
            return Ok(());
        };
        match frame.destination {
            Destination::Picture => {
                if let Some(picture) = &mut self.picture {
                    picture.acc.push_raw(data);
                }
            }
            Destination::ObjectData => {
                if let Some(acc) = &mut self.object_data {
                    acc.push_raw(data);
                }
            }
            // Binary runs contribute nothing outside embedded payloads
            _ => log::debug!("discarding {}-byte binary run", data.len()),
        }
        Ok(())
    }

    fn handle_symbol(&mut self, symbol: u8) -> RtfResult<()> {
        match symbol {
            b'*' => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.star_pending = true;
                }
            }
            b'\\' | b'{' | b'}' => self.handle_text(&[symbol])?,
            b'~' => self.emit_str("\u{00A0}")?,
            b'-' => self.emit_str("\u{00AD}")?,
            b'_' => self.emit_str("\u{2011}")?,
            other => log::debug!("ignoring control symbol {:?}", other as char),
        }
        Ok(())
    }

    // ----- control word dispatch ---------------------------------------

    fn handle_control(&mut self, word: ControlWord<'a>) -> RtfResult<()> {
        self.flush_text()?;

        let star_pending = match self.frames.last_mut() {
            Some(frame) => std::mem::replace(&mut frame.star_pending, false),
            None => false,
        };

        if let ControlWord::Unknown(name, _) = word {
            if star_pending {
                log::debug!("skipping group for unknown destination \\{}", name);
                self.set_destination(Destination::Skip);
            } else {
                log::debug!("ignoring unknown control word \\{}", name);
                if self.options.strict {
                    return Err(Diagnostic::new(
                        DiagnosticKind::UnknownControlWord,
                        self.lexer.position(),
                    )
                    .promote());
                }
            }
            return Ok(());
        }

        match word {
            // Encoding and document metadata
            ControlWord::Rtf(_) => {}
            ControlWord::Ansi => self.set_encoding(encoding_rs::WINDOWS_1252, 1252),
            ControlWord::Mac => self.set_encoding(encoding_rs::MACINTOSH, 10000),
            ControlWord::Pc => self.set_encoding(encoding_rs::IBM866, 437),
            ControlWord::Pca => self.set_encoding(encoding_rs::IBM866, 850),
            ControlWord::AnsiCodePage(cp) => match codepage_to_encoding(cp) {
                Some(encoding) => self.set_encoding(encoding, cp),
                None => self.report(DiagnosticKind::UnknownEncoding(cp))?,
            },
            ControlWord::DefaultFont(n) => self.default_font = n,

            // Destination selectors
            ControlWord::FontTable => self.set_destination(Destination::FontTable),
            ControlWord::ColorTable => {
                self.color_entry = ColorEntryState::default();
                self.set_destination(Destination::ColorTable);
            }
            ControlWord::StyleSheet => self.set_destination(Destination::StyleSheet),
            ControlWord::Info => self.set_destination(Destination::Info(InfoField::None)),
            ControlWord::Picture => {
                self.picture = Some(PictureState::new(self.arena));
                self.set_destination(Destination::Picture);
            }
            ControlWord::Object => self.set_destination(Destination::Object),
            ControlWord::ObjectData => {
                self.object_data = Some(HexAccumulator::new(self.arena));
                self.set_destination(Destination::ObjectData);
            }
            ControlWord::Field => {
                self.field = Some(FieldState::new(self.arena));
                self.set_destination(Destination::Field);
            }
            ControlWord::FieldInstruction => {
                if self.field.is_none() {
                    self.field = Some(FieldState::new(self.arena));
                }
                self.set_destination(Destination::FieldInstruction);
            }
            ControlWord::FieldResult => {
                if self.field.is_none() {
                    self.field = Some(FieldState::new(self.arena));
                }
                self.builder.begin_link_capture();
                self.set_destination(Destination::FieldResult);
            }
            ControlWord::Header | ControlWord::Footer | ControlWord::Footnote => {
                self.set_destination(Destination::Skip);
            }

            // Info fields
            ControlWord::Title => self.enter_info_field(InfoField::Title),
            ControlWord::Subject => self.enter_info_field(InfoField::Subject),
            ControlWord::Author => self.enter_info_field(InfoField::Author),
            ControlWord::Operator => self.enter_info_field(InfoField::Operator),
            ControlWord::Keywords => self.enter_info_field(InfoField::Keywords),
            ControlWord::DocComment => self.enter_info_field(InfoField::Comment),
            ControlWord::Company => self.enter_info_field(InfoField::Company),
            ControlWord::Version(v) => {
                if self.in_info() {
                    self.metadata.version = Some(v);
                }
            }

            // Character formatting toggles
            ControlWord::Bold(v) => self.with_format(|f| f.bold = v),
            ControlWord::Italic(v) => self.with_format(|f| f.italic = v),
            ControlWord::Underline(v) => self.with_format(|f| f.underline = v),
            ControlWord::UnderlineNone => self.with_format(|f| f.underline = false),
            ControlWord::Strike(v) => self.with_format(|f| f.strike = v),
            ControlWord::Superscript(v) => self.with_format(|f| f.superscript = v),
            ControlWord::Subscript(v) => self.with_format(|f| f.subscript = v),
            ControlWord::NoSuperSub => self.with_format(|f| {
                f.superscript = false;
                f.subscript = false;
            }),
            ControlWord::Hidden(v) => self.with_format(|f| f.hidden = v),
            ControlWord::SmallCaps(v) => self.with_format(|f| f.smallcaps = v),
            ControlWord::AllCaps(v) => self.with_format(|f| f.allcaps = v),
            ControlWord::Plain => self.with_format(|f| *f = CharacterFormat::default()),

            // Character formatting values
            ControlWord::FontNumber(n) => {
                if self.in_destination(Destination::FontTable) {
                    self.commit_font_entry(false)?;
                    self.font_entry.active = true;
                    self.font_entry.index = n;
                } else {
                    self.with_format(|f| f.font = n);
                }
            }
            ControlWord::FontSize(n) => {
                self.with_format(|f| f.font_size = n.clamp(0, i32::from(u16::MAX)) as u16)
            }
            ControlWord::FontCharset(n) => {
                if self.in_destination(Destination::FontTable) {
                    self.font_entry.charset = n;
                }
            }
            ControlWord::Family(family) => {
                if self.in_destination(Destination::FontTable) {
                    self.font_entry.family = family;
                }
            }
            ControlWord::Foreground(n) => {
                self.with_format(|f| f.foreground_color = color_index(n))
            }
            ControlWord::Background(n) => {
                self.with_format(|f| f.background_color = color_index(n))
            }

            // Color table channels
            ControlWord::Red(n) => self.set_color_channel(|c| &mut c.red, n),
            ControlWord::Green(n) => self.set_color_channel(|c| &mut c.green, n),
            ControlWord::Blue(n) => self.set_color_channel(|c| &mut c.blue, n),

            // Paragraph formatting
            ControlWord::Par => self.append_break(BreakKind::Paragraph)?,
            ControlWord::Line => self.append_break(BreakKind::Line)?,
            ControlWord::Page => self.append_break(BreakKind::Page)?,
            ControlWord::ParDefault => {
                self.with_paragraph(|p| *p = ParagraphFormat::default())
            }
            ControlWord::AlignLeft => self.with_paragraph(|p| p.alignment = Alignment::Left),
            ControlWord::AlignRight => self.with_paragraph(|p| p.alignment = Alignment::Right),
            ControlWord::AlignCenter => self.with_paragraph(|p| p.alignment = Alignment::Center),
            ControlWord::AlignJustify => {
                self.with_paragraph(|p| p.alignment = Alignment::Justify)
            }
            ControlWord::FirstIndent(n) => self.with_paragraph(|p| p.first_indent = n),
            ControlWord::LeftIndent(n) => self.with_paragraph(|p| p.left_indent = n),
            ControlWord::RightIndent(n) => self.with_paragraph(|p| p.right_indent = n),
            ControlWord::SpaceBefore(n) => self.with_paragraph(|p| p.space_before = n),
            ControlWord::SpaceAfter(n) => self.with_paragraph(|p| p.space_after = n),

            // Special characters
            ControlWord::Tab => self.emit_str("\t")?,
            ControlWord::EmDash => self.emit_str("\u{2014}")?,
            ControlWord::EnDash => self.emit_str("\u{2013}")?,
            ControlWord::LeftQuote => self.emit_str("\u{2018}")?,
            ControlWord::RightQuote => self.emit_str("\u{2019}")?,
            ControlWord::LeftDoubleQuote => self.emit_str("\u{201C}")?,
            ControlWord::RightDoubleQuote => self.emit_str("\u{201D}")?,
            ControlWord::Bullet => self.emit_str("\u{2022}")?,

            // Tables
            ControlWord::RowDefaults => {
                self.cell_boundaries.clear();
                self.cell_index = 0;
            }
            ControlWord::CellBoundary(x) => self.cell_boundaries.push(x),
            ControlWord::InTable => self.with_paragraph(|p| p.in_table = true),
            ControlWord::Cell => {
                if self.in_body() {
                    let boundary = self
                        .cell_boundaries
                        .get(self.cell_index)
                        .copied()
                        .unwrap_or(0);
                    self.cell_index += 1;
                    self.builder.cell_end(boundary);
                }
            }
            ControlWord::Row => {
                if self.in_body() {
                    self.builder.row_end();
                    self.cell_index = 0;
                }
            }

            // Picture properties
            ControlWord::PictureWidth(n) => self.with_picture(|p| p.width = n),
            ControlWord::PictureHeight(n) => self.with_picture(|p| p.height = n),
            ControlWord::PictureGoalWidth(n) => self.with_picture(|p| p.goal_width = n),
            ControlWord::PictureGoalHeight(n) => self.with_picture(|p| p.goal_height = n),
            ControlWord::PictureScaleX(n) => self.with_picture(|p| p.scale_x = n),
            ControlWord::PictureScaleY(n) => self.with_picture(|p| p.scale_y = n),
            ControlWord::BitsPerPixel(n) => self.with_picture(|p| p.bits_per_pixel = n),
            ControlWord::EmfBlip => self.set_picture_format(ImageFormat::Emf),
            ControlWord::PngBlip => self.set_picture_format(ImageFormat::Png),
            ControlWord::JpegBlip => self.set_picture_format(ImageFormat::Jpeg),
            ControlWord::Wmetafile(_) => self.set_picture_format(ImageFormat::Wmf),
            ControlWord::Wbitmap(_) | ControlWord::Dibitmap(_) => {
                self.set_picture_format(ImageFormat::Bmp)
            }

            // Unicode
            ControlWord::UnicodeSkip(n) => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.unicode_skip = n.max(0);
                }
            }
            ControlWord::Unicode(value) => self.handle_unicode(value)?,

            ControlWord::Unknown(..) => {}
        }
        Ok(())
    }

    // ----- dispatch helpers --------------------------------------------

    fn set_destination(&mut self, destination: Destination) {
        if let Some(frame) = self.frames.last_mut() {
            frame.destination = destination;
        }
    }

    fn set_encoding(&mut self, encoding: &'static Encoding, code_page: i32) {
        self.code_page = code_page;
        if let Some(frame) = self.frames.last_mut() {
            frame.encoding = encoding;
        }
    }

    fn with_format(&mut self, mutate: impl FnOnce(&mut CharacterFormat)) {
        if let Some(frame) = self.frames.last_mut() {
            mutate(&mut frame.format);
        }
    }

    fn with_paragraph(&mut self, mutate: impl FnOnce(&mut ParagraphFormat)) {
        if let Some(frame) = self.frames.last_mut() {
            mutate(&mut frame.paragraph);
        }
    }

    fn with_picture(&mut self, mutate: impl FnOnce(&mut PictureState<'a>)) {
        if let Some(picture) = &mut self.picture {
            mutate(picture);
        }
    }

    fn set_picture_format(&mut self, format: ImageFormat) {
        self.with_picture(|p| {
            p.format = format;
            p.format_declared = true;
        });
    }

    fn set_color_channel(
        &mut self,
        channel: impl FnOnce(&mut ColorEntryState) -> &mut i32,
        value: i32,
    ) {
        if self.in_destination(Destination::ColorTable) {
            *channel(&mut self.color_entry) = value;
            self.color_entry.declared = true;
        }
    }

    fn in_destination(&self, destination: Destination) -> bool {
        self.frames.last().map(|f| f.destination) == Some(destination)
    }

    fn in_body(&self) -> bool {
        matches!(
            self.frames.last().map(|f| f.destination),
            Some(Destination::Body | Destination::FieldResult)
        )
    }

    fn in_info(&self) -> bool {
        matches!(
            self.frames.last().map(|f| f.destination),
            Some(Destination::Info(_))
        )
    }

    fn enter_info_field(&mut self, field: InfoField) {
        let Some(frame) = self.frames.last().copied() else {
            return;
        };
        if let Destination::Info(previous) = frame.destination {
            // Flat info groups switch fields without a group boundary
            if previous != InfoField::None {
                self.commit_info(previous, frame.encoding);
            }
            self.set_destination(Destination::Info(field));
        }
    }

    fn append_break(&mut self, kind: BreakKind) -> RtfResult<()> {
        let Some(frame) = self.current_frame() else {
            return Ok(());
        };
        if matches!(
            frame.destination,
            Destination::Body | Destination::FieldResult
        ) {
            self.builder.set_in_table(frame.paragraph.in_table);
            self.builder.append_break(kind);
        }
        Ok(())
    }

    // ----- Unicode escapes ---------------------------------------------

    fn handle_unicode(&mut self, value: i32) -> RtfResult<()> {
        // Negative values are the signed-16-bit encoding of 0x8000..=0xFFFF
        let unit = value as u16;
        let skip = self
            .frames
            .last()
            .map(|f| f.unicode_skip.max(0) as u32)
            .unwrap_or(1);

        if let Some(high) = self.high_surrogate.take() {
            if (0xDC00..=0xDFFF).contains(&unit) {
                let code_point =
                    0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(unit) - 0xDC00);
                if let Some(c) = char::from_u32(code_point) {
                    self.emit_char(c)?;
                }
                self.skip_remaining = skip;
                return Ok(());
            }
            // The stashed high surrogate never got its partner
            self.report(DiagnosticKind::InvalidUnicodeEscape)?;
            self.emit_str("\u{FFFD}")?;
        }

        match unit {
            0xD800..=0xDBFF => self.high_surrogate = Some(unit),
            0xDC00..=0xDFFF => {
                self.report(DiagnosticKind::InvalidUnicodeEscape)?;
                self.emit_str("\u{FFFD}")?;
            }
            _ => {
                if let Some(c) = char::from_u32(u32::from(unit)) {
                    self.emit_char(c)?;
                }
            }
        }
        self.skip_remaining = skip;
        Ok(())
    }

    fn emit_char(&mut self, c: char) -> RtfResult<()> {
        let mut buf = [0u8; 4];
        self.emit_str(c.encode_utf8(&mut buf))
    }

    /// Consume tokens that are replacement text for a preceding `\u`.
    /// One unit is a text byte, a hex escape, or a control word/symbol; a
    /// further `\u` or any group boundary cancels the remainder.
    fn apply_unicode_skip(&mut self, token: Token<'a>) -> Option<Token<'a>> {
        if self.skip_remaining == 0 {
            return Some(token);
        }
        match token {
            Token::Text(bytes) => {
                let take = (self.skip_remaining as usize).min(bytes.len());
                self.skip_remaining -= take as u32;
                if take == bytes.len() {
                    None
                } else {
                    Some(Token::Text(&bytes[take..]))
                }
            }
            Token::HexByte(_) | Token::Symbol(_) | Token::Binary(_) => {
                self.skip_remaining -= 1;
                None
            }
            Token::Control(ControlWord::Unicode(_)) => {
                self.skip_remaining = 0;
                Some(token)
            }
            Token::Control(_) => {
                self.skip_remaining -= 1;
                None
            }
            Token::GroupOpen | Token::GroupClose | Token::Eof => {
                self.skip_remaining = 0;
                Some(token)
            }
        }
    }

    // ----- destination commits -----------------------------------------

    fn commit_font_entry(&mut self, on_terminator: bool) -> RtfResult<()> {
        let entry = std::mem::take(&mut self.font_entry);
        if !entry.active {
            if on_terminator && !entry.name.is_empty() {
                self.report(DiagnosticKind::InvalidFontEntry)?;
            }
            return Ok(());
        }
        let encoding = self
            .frames
            .last()
            .map(|f| f.encoding)
            .unwrap_or(DEFAULT_ENCODING);
        let (name, _, _) = encoding.decode(&entry.name);
        let name = self.arena.alloc_str(name.trim());
        self.fonts
            .insert(FontEntry::new(entry.index, name, entry.family, entry.charset));
        Ok(())
    }

    fn commit_color_entry(&mut self) -> RtfResult<()> {
        let entry = std::mem::take(&mut self.color_entry);
        let clamped = [entry.red, entry.green, entry.blue].map(|c| c.clamp(0, 255) as u8);
        if entry.declared
            && [entry.red, entry.green, entry.blue]
                .iter()
                .any(|&c| !(0..=255).contains(&c))
        {
            self.report(DiagnosticKind::InvalidColorEntry)?;
        }
        self.colors
            .push(Color::new(clamped[0], clamped[1], clamped[2]));
        Ok(())
    }

    fn commit_picture(&mut self) {
        let Some(state) = self.picture.take() else {
            return;
        };
        let data = state.acc.data.into_bump_slice();
        let format = if state.format_declared {
            state.format
        } else {
            detect_format(data)
        };
        let in_table = self
            .frames
            .last()
            .map(|f| f.paragraph.in_table)
            .unwrap_or(false);
        self.builder.set_in_table(in_table);
        self.builder.append_image(Image {
            format,
            width: state.width,
            height: state.height,
            bits_per_pixel: state.bits_per_pixel,
            goal_width: state.goal_width,
            goal_height: state.goal_height,
            scale_x: state.scale_x,
            scale_y: state.scale_y,
            data,
        });
    }

    fn commit_object(&mut self) {
        let Some(acc) = self.object_data.take() else {
            return;
        };
        let data = acc.data.into_bump_slice();
        if !data.is_empty() {
            self.objects.push(EmbeddedObject { data });
        }
    }

    fn commit_field(&mut self, popped: GroupFrame) -> RtfResult<()> {
        let Some(state) = self.field.take() else {
            return Ok(());
        };
        let (instruction, _, _) = popped.encoding.decode(&state.instruction);
        let runs = state.result.unwrap_or_default();

        if classify_instruction(&instruction) == FieldKind::Hyperlink
            && let Some(target) = hyperlink_target(&instruction)
        {
            let target = self.arena.alloc_str(target);
            let in_table = self
                .frames
                .last()
                .map(|f| f.paragraph.in_table)
                .unwrap_or(false);
            self.builder.set_in_table(in_table);
            self.builder.append_hyperlink(Hyperlink { target, runs });
        } else {
            // Non-hyperlink fields keep their result text as plain runs
            self.builder.append_runs(runs);
        }
        Ok(())
    }

    fn commit_info(&mut self, field: InfoField, encoding: &'static Encoding) {
        if field == InfoField::None || self.info_buf.is_empty() {
            self.info_buf.clear();
            return;
        }
        let bytes = std::mem::take(&mut self.info_buf);
        let (text, _, _) = encoding.decode(&bytes);
        self.metadata.set(field, self.arena.alloc_str(&text));
    }
}

fn color_index(value: i32) -> i32 {
    // Index 0 is the reserved auto entry, which means unset
    if value <= 0 { UNSET_INDEX } else { value }
}

/// Run formats must reference existing table entries or the unset
/// sentinel; indices left dangling by a missing table fall back to unset.
fn clamp_table_indices(elements: &mut [crate::document::Element<'_>], fonts: i32, colors: i32) {
    use crate::document::Element;

    let clamp = |format: &mut CharacterFormat| {
        if format.font < 0 || format.font >= fonts {
            format.font = UNSET_INDEX;
        }
        if format.foreground_color < 0 || format.foreground_color >= colors {
            format.foreground_color = UNSET_INDEX;
        }
        if format.background_color < 0 || format.background_color >= colors {
            format.background_color = UNSET_INDEX;
        }
    };

    for element in elements {
        match element {
            Element::Text(run) => clamp(&mut run.format),
            Element::Hyperlink(link) => {
                for run in &mut link.runs {
                    clamp(&mut run.format);
                }
            }
            Element::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        clamp_table_indices(&mut cell.elements, fonts, colors);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Parse a complete RTF document from a byte slice into `arena`.
pub fn parse_bytes<'a>(
    arena: &'a Bump,
    bytes: &[u8],
    options: ParseOptions,
) -> RtfResult<Document<'a>> {
    let lexer = Lexer::new(ByteReader::from_slice(bytes), arena);
    Parser::new(lexer, arena, options).run()
}

/// Parse a complete RTF document from a stream into `arena`.
pub fn parse_reader<'a>(
    arena: &'a Bump,
    reader: &mut dyn Read,
    options: ParseOptions,
) -> RtfResult<Document<'a>> {
    let lexer = Lexer::new(ByteReader::from_reader(reader), arena);
    Parser::new(lexer, arena, options).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Element;

    fn with_doc<R>(input: &str, check: impl FnOnce(&Document<'_>) -> R) -> R {
        let arena = Bump::new();
        let doc = parse_bytes(&arena, input.as_bytes(), ParseOptions::default()).unwrap();
        check(&doc)
    }

    #[test]
    fn test_plain_and_formatted_runs() {
        with_doc(
            r"{\rtf1\ansi Hello \b bold\b0 and \i italic\i0 world!}",
            |doc| {
                assert_eq!(doc.plain_text(), "Hello bold and italic world!");
                let runs: Vec<_> = doc.runs().collect();
                assert_eq!(runs.len(), 5);
                assert_eq!(runs[0].text, "Hello ");
                assert!(!runs[0].format.bold);
                assert_eq!(runs[1].text, "bold");
                assert!(runs[1].format.bold);
                assert_eq!(runs[2].text, " and ");
                assert_eq!(runs[3].text, "italic");
                assert!(runs[3].format.italic);
                assert_eq!(runs[4].text, " world!");
            },
        );
    }

    #[test]
    fn test_unicode_escape_with_replacement() {
        with_doc("{\\rtf1\\ansi\\u8364?}", |doc| {
            assert_eq!(doc.plain_text(), "\u{20AC}");
            assert_eq!(doc.run_count(), 1);
            assert!(doc.run(0).unwrap().format.is_plain());
        });
    }

    #[test]
    fn test_surrogate_pair() {
        // U+1F600 as the usual signed-16-bit pair
        with_doc(r"{\rtf1\ansi\u-10179?\u-8704?}", |doc| {
            assert_eq!(doc.plain_text(), "\u{1F600}");
        });
    }

    #[test]
    fn test_hex_escapes_default_code_page() {
        with_doc(r"{\rtf1\ansi \'41\'42\'43}", |doc| {
            assert_eq!(doc.plain_text(), "ABC");
        });
    }

    #[test]
    fn test_hex_escape_cp1252_euro() {
        with_doc(r"{\rtf1\ansi \'80}", |doc| {
            assert_eq!(doc.plain_text(), "\u{20AC}");
        });
    }

    #[test]
    fn test_ignorable_destination_skipped() {
        with_doc(r"{\rtf1\ansi {\*\generator Foo}Hello}", |doc| {
            assert_eq!(doc.plain_text(), "Hello");
            assert_eq!(doc.run_count(), 1);
        });
    }

    #[test]
    fn test_depth_limit_is_fatal() {
        let mut input = String::new();
        for _ in 0..101 {
            input.push('{');
        }
        for _ in 0..101 {
            input.push('}');
        }
        let arena = Bump::new();
        let result = parse_bytes(&arena, input.as_bytes(), ParseOptions::default());
        assert!(matches!(
            result,
            Err(RtfError::DepthExceeded { max: 100, .. })
        ));
    }

    #[test]
    fn test_paragraph_break_elements() {
        with_doc(r"{\rtf1\ansi A\par B}", |doc| {
            assert_eq!(doc.plain_text(), "A\nB");
            let elements = doc.elements();
            assert_eq!(elements.len(), 3);
            assert!(matches!(elements[0], Element::Text(run) if run.text == "A"));
            assert!(matches!(elements[1], Element::ParagraphBreak));
            assert!(matches!(elements[2], Element::Text(run) if run.text == "B"));
        });
    }

    #[test]
    fn test_group_scoped_formatting() {
        with_doc(r"{\rtf1\ansi a{\b b}c}", |doc| {
            let runs: Vec<_> = doc.runs().collect();
            assert_eq!(runs.len(), 3);
            assert!(!runs[0].format.bold);
            assert!(runs[1].format.bold);
            assert!(!runs[2].format.bold);
        });
    }

    #[test]
    fn test_font_and_color_tables() {
        with_doc(
            r"{\rtf1\ansi\deff0{\fonttbl{\f0\fswiss\fcharset0 Arial;}{\f1\fmodern Courier New;}}{\colortbl ;\red255\green0\blue0;}\f1\fs24\cf1 x}",
            |doc| {
                assert_eq!(doc.fonts().len(), 2);
                let arial = doc.fonts().get(0).unwrap();
                assert_eq!(arial.name, "Arial");
                assert_eq!(arial.family, FontFamily::Swiss);
                let courier = doc.fonts().get(1).unwrap();
                assert_eq!(courier.name, "Courier New");

                assert_eq!(doc.colors().len(), 2);
                assert_eq!(doc.colors().get(0).unwrap(), Color::default());
                assert_eq!(doc.colors().get(1).unwrap(), Color::new(255, 0, 0));

                assert_eq!(doc.default_font(), 0);
                let run = doc.run(0).unwrap();
                assert_eq!(run.format.font, 1);
                assert_eq!(run.format.font_size, 24);
                assert_eq!(run.format.foreground_color, 1);
            },
        );
    }

    #[test]
    fn test_color_zero_is_unset() {
        with_doc(r"{\rtf1\ansi\cf0 x}", |doc| {
            assert_eq!(doc.run(0).unwrap().format.foreground_color, UNSET_INDEX);
        });
    }

    #[test]
    fn test_uc_scoped_to_group() {
        // \uc2 inside the inner group does not leak to the outer one
        with_doc(r"{\rtf1\ansi{\uc2\u233xxA}\u233xB}", |doc| {
            assert_eq!(doc.plain_text(), "\u{E9}A\u{E9}B");
        });
    }

    #[test]
    fn test_unicode_skip_counts_hex_escape_as_one() {
        with_doc(r"{\rtf1\ansi\u233\'e9x}", |doc| {
            assert_eq!(doc.plain_text(), "\u{E9}x");
        });
    }

    #[test]
    fn test_hyperlink_field() {
        with_doc(
            r#"{\rtf1\ansi See {\field{\*\fldinst HYPERLINK "https://example.com"}{\fldrslt\ul the site}} now}"#,
            |doc| {
                assert_eq!(doc.plain_text(), "See the site now");
                let link = doc
                    .elements()
                    .iter()
                    .find_map(|e| match e {
                        Element::Hyperlink(link) => Some(link),
                        _ => None,
                    })
                    .expect("hyperlink element");
                assert_eq!(link.target, "https://example.com");
                assert_eq!(link.runs.len(), 1);
                assert_eq!(link.runs[0].text, "the site");
                assert!(link.runs[0].format.underline);
            },
        );
    }

    #[test]
    fn test_non_hyperlink_field_keeps_result() {
        with_doc(
            r"{\rtf1\ansi page {\field{\*\fldinst PAGE}{\fldrslt 7}} here}",
            |doc| {
                assert_eq!(doc.plain_text(), "page 7 here");
            },
        );
    }

    #[test]
    fn test_picture_hex_payload() {
        with_doc(
            r"{\rtf1\ansi{\pict\pngblip\picw100\pich50 89504e470d0a1a0a}}",
            |doc| {
                let image = doc
                    .elements()
                    .iter()
                    .find_map(|e| match e {
                        Element::Image(image) => Some(image),
                        _ => None,
                    })
                    .expect("image element");
                assert_eq!(image.format, ImageFormat::Png);
                assert_eq!(image.width, 100);
                assert_eq!(image.height, 50);
                assert_eq!(image.data, &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
            },
        );
    }

    #[test]
    fn test_picture_format_detected_without_blip() {
        with_doc(r"{\rtf1\ansi{\pict\picw1\pich1 ffd8ffe0}}", |doc| {
            let image = doc
                .elements()
                .iter()
                .find_map(|e| match e {
                    Element::Image(image) => Some(image),
                    _ => None,
                })
                .expect("image element");
            assert_eq!(image.format, ImageFormat::Jpeg);
        });
    }

    #[test]
    fn test_binary_in_body_discarded() {
        with_doc(r"{\rtf1\ansi a\bin3 xyzb}", |doc| {
            assert_eq!(doc.plain_text(), "ab");
        });
    }

    #[test]
    fn test_table_with_two_cells() {
        with_doc(
            r"{\rtf1\ansi\trowd\cellx1440\cellx2880\intbl left\cell right\cell\row\pard after}",
            |doc| {
                assert_eq!(doc.plain_text(), "left\tright\nafter");
                let table = doc
                    .elements()
                    .iter()
                    .find_map(|e| match e {
                        Element::Table(table) => Some(table),
                        _ => None,
                    })
                    .expect("table element");
                assert_eq!(table.rows.len(), 1);
                assert_eq!(table.rows[0].cells.len(), 2);
                assert_eq!(table.rows[0].cells[0].boundary, 1440);
                assert_eq!(table.rows[0].cells[1].boundary, 2880);
            },
        );
    }

    #[test]
    fn test_info_metadata() {
        with_doc(
            r"{\rtf1\ansi{\info{\title Annual Report}{\author Jane Doe}\version3}body}",
            |doc| {
                assert_eq!(doc.metadata().title, Some("Annual Report"));
                assert_eq!(doc.metadata().author, Some("Jane Doe"));
                assert_eq!(doc.metadata().version, Some(3));
                assert_eq!(doc.plain_text(), "body");
            },
        );
    }

    #[test]
    fn test_object_payload_extracted() {
        with_doc(
            r"{\rtf1\ansi{\object\objemb{\*\objdata 0102ff}}after}",
            |doc| {
                assert_eq!(doc.objects().len(), 1);
                assert_eq!(doc.objects()[0].data, &[0x01, 0x02, 0xFF]);
                assert_eq!(doc.plain_text(), "after");
            },
        );
    }

    #[test]
    fn test_stray_close_is_recoverable() {
        with_doc("}{\\rtf1\\ansi ok}", |doc| {
            assert_eq!(doc.plain_text(), "ok");
            assert!(
                doc.diagnostics()
                    .iter()
                    .any(|d| d.kind == DiagnosticKind::UnmatchedGroupClose)
            );
        });
    }

    #[test]
    fn test_eof_closes_groups_implicitly() {
        with_doc(r"{\rtf1\ansi {\b unclosed", |doc| {
            assert_eq!(doc.plain_text(), "unclosed");
            assert!(
                doc.diagnostics()
                    .iter()
                    .any(|d| d.kind == DiagnosticKind::UnclosedGroups)
            );
        });
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        with_doc(r"{\rtf1\ansi done}garbage after", |doc| {
            assert_eq!(doc.plain_text(), "done");
        });
    }

    #[test]
    fn test_strict_mode_promotes_stray_close() {
        let arena = Bump::new();
        let options = ParseOptions {
            strict: true,
            ..ParseOptions::default()
        };
        let result = parse_bytes(&arena, b"}{\\rtf1 x}", options);
        assert!(matches!(result, Err(RtfError::UnbalancedGroup { .. })));
    }

    #[test]
    fn test_strict_mode_rejects_unknown_word() {
        let arena = Bump::new();
        let options = ParseOptions {
            strict: true,
            ..ParseOptions::default()
        };
        let result = parse_bytes(&arena, br"{\rtf1\nosuchword x}", options);
        assert!(result.is_err());
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        with_doc(r"{\rtf1\ansi \{braced\} \\slash}", |doc| {
            assert_eq!(doc.plain_text(), "{braced} \\slash");
        });
    }

    #[test]
    fn test_special_character_words() {
        with_doc(r"{\rtf1\ansi a\emdash b\tab c\bullet d}", |doc| {
            assert_eq!(doc.plain_text(), "a\u{2014}b\tc\u{2022}d");
        });
    }

    #[test]
    fn test_plain_resets_formatting() {
        with_doc(r"{\rtf1\ansi\b\i\fs48 x\plain y}", |doc| {
            let runs: Vec<_> = doc.runs().collect();
            assert_eq!(runs.len(), 2);
            assert!(runs[0].format.bold && runs[0].format.italic);
            assert_eq!(runs[0].format.font_size, 48);
            assert!(runs[1].format.is_plain());
        });
    }

    #[test]
    fn test_adjacent_equal_runs_merge() {
        with_doc(r"{\rtf1\ansi a{\i0 b}c}", |doc| {
            // The inner group changes nothing, so one run results; the
            // space after the parameterized \i0 is literal
            assert_eq!(doc.run_count(), 1);
            assert_eq!(doc.run(0).unwrap().text, "a bc");
        });
    }

    #[test]
    fn test_ansicpg_shift_jis() {
        // 0x93 0xFA is U+65E5 in Shift-JIS
        with_doc(r"{\rtf1\ansi\ansicpg932\'93\'fa}", |doc| {
            assert_eq!(doc.plain_text(), "\u{65E5}");
            assert_eq!(doc.code_page(), 932);
        });
    }

    #[test]
    fn test_header_destination_skipped() {
        with_doc(r"{\rtf1\ansi{\header page header}body}", |doc| {
            assert_eq!(doc.plain_text(), "body");
        });
    }

    #[test]
    fn test_parse_reader_matches_slice() {
        let input = r"{\rtf1\ansi Hello \b streaming\b0 world}";
        let arena = Bump::new();
        let mut cursor = std::io::Cursor::new(input.as_bytes().to_vec());
        let doc = parse_reader(&arena, &mut cursor, ParseOptions::default()).unwrap();
        assert_eq!(doc.plain_text(), "Hello streaming world");
        assert_eq!(doc.run_count(), 3);
    }

    #[test]
    fn test_missing_header_is_diagnosed() {
        with_doc(r"{\ansi no header}", |doc| {
            assert_eq!(doc.plain_text(), "no header");
            assert!(
                doc.diagnostics()
                    .iter()
                    .any(|d| d.kind == DiagnosticKind::MissingRtfHeader)
            );
        });
    }

    #[test]
    fn test_lone_high_surrogate_replaced() {
        with_doc(r"{\rtf1\ansi\u-10179?x}", |doc| {
            assert_eq!(doc.plain_text(), "\u{FFFD}x");
            assert!(
                doc.diagnostics()
                    .iter()
                    .any(|d| d.kind == DiagnosticKind::InvalidUnicodeEscape)
            );
        });
    }

    #[test]
    fn test_arbitrary_input_does_not_panic() {
        // Handful of malformed shapes that must all terminate cleanly
        let cases: &[&[u8]] = &[
            b"",
            b"{",
            b"}",
            b"\\",
            b"{\\rtf1",
            b"{\\rtf1\\'q",
            b"{\\rtf1\\u}",
            b"{\\rtf1\\uc-1\\u65 x}",
            b"no rtf at all",
            b"{\\rtf1{\\fonttbl{\\f0;;;}}}",
        ];
        for case in cases {
            let arena = Bump::new();
            let _ = parse_bytes(&arena, case, ParseOptions::default());
        }
    }
}
