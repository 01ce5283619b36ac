//! Streaming RTF tokenizer.
//!
//! Pulls bytes from a [`ByteReader`] and classifies the next lexical unit:
//! group delimiters, control words with optional signed parameters, control
//! symbols, literal text, hex escapes, and `\bin` binary spans. Token
//! payloads are allocated in the document arena so they survive the lexer.
//!
//! Malformed input (overlong words, broken hex escapes) is recorded as a
//! diagnostic and lexing continues; only a truncated binary span or a
//! source error aborts.

use crate::error::{Diagnostic, DiagnosticKind, RtfError, RtfResult};
use crate::reader::ByteReader;
use crate::types::FontFamily;
use bumpalo::Bump;
use bumpalo::collections::Vec as BumpVec;

/// Control word names longer than this are truncated.
pub const MAX_WORD_LEN: usize = 32;

/// Numeric parameters longer than this many digits stop being consumed.
pub const MAX_PARAM_DIGITS: usize = 10;

/// A recognized control word, classified at lex time.
///
/// Unrecognized words surface as [`ControlWord::Unknown`] so the parser can
/// route them by destination (ignored in the body, group-skipped after an
/// `\*` marker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlWord<'a> {
    // Document preamble
    Rtf(i32),
    Ansi,
    Mac,
    Pc,
    Pca,
    AnsiCodePage(i32),
    DefaultFont(i32),

    // Destinations
    FontTable,
    ColorTable,
    StyleSheet,
    Info,
    Picture,
    Object,
    ObjectData,
    Field,
    FieldInstruction,
    FieldResult,
    Header,
    Footer,
    Footnote,

    // Info fields
    Title,
    Subject,
    Author,
    Operator,
    Keywords,
    DocComment,
    Company,
    Version(i32),

    // Picture properties
    PictureWidth(i32),
    PictureHeight(i32),
    PictureGoalWidth(i32),
    PictureGoalHeight(i32),
    PictureScaleX(i32),
    PictureScaleY(i32),
    BitsPerPixel(i32),
    EmfBlip,
    PngBlip,
    JpegBlip,
    Wmetafile(i32),
    Wbitmap(i32),
    Dibitmap(i32),

    // Color table channels
    Red(i32),
    Green(i32),
    Blue(i32),

    // Character formatting
    Bold(bool),
    Italic(bool),
    Underline(bool),
    UnderlineNone,
    Strike(bool),
    Superscript(bool),
    Subscript(bool),
    NoSuperSub,
    Hidden(bool),
    SmallCaps(bool),
    AllCaps(bool),
    Plain,
    FontNumber(i32),
    FontSize(i32),
    FontCharset(i32),
    Family(FontFamily),
    Foreground(i32),
    Background(i32),

    // Paragraph formatting
    Par,
    ParDefault,
    AlignLeft,
    AlignRight,
    AlignCenter,
    AlignJustify,
    FirstIndent(i32),
    LeftIndent(i32),
    RightIndent(i32),
    SpaceBefore(i32),
    SpaceAfter(i32),

    // Special characters
    Line,
    Page,
    Tab,
    EmDash,
    EnDash,
    LeftQuote,
    RightQuote,
    LeftDoubleQuote,
    RightDoubleQuote,
    Bullet,

    // Tables
    RowDefaults,
    Row,
    Cell,
    CellBoundary(i32),
    InTable,

    // Unicode
    Unicode(i32),
    UnicodeSkip(i32),

    // Unrecognized word, name arena-allocated
    Unknown(&'a str, Option<i32>),
}

/// One lexical unit of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// `{`
    GroupOpen,
    /// `}`
    GroupClose,
    /// `\word` with optional parameter
    Control(ControlWord<'a>),
    /// `\` followed by a single non-alphanumeric byte
    Symbol(u8),
    /// Literal text up to the next `\`, `{`, or `}`
    Text(&'a [u8]),
    /// One byte from a `\'HH` escape
    HexByte(u8),
    /// Raw payload of a `\binN` span
    Binary(&'a [u8]),
    /// End of input
    Eof,
}

/// Streaming tokenizer over a byte source.
pub struct Lexer<'a, 'r> {
    reader: ByteReader<'r>,
    arena: &'a Bump,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, 'r> Lexer<'a, 'r> {
    /// Create a lexer pulling from `reader`, allocating payloads in `arena`.
    #[inline]
    pub fn new(reader: ByteReader<'r>, arena: &'a Bump) -> Self {
        Self {
            reader,
            arena,
            diagnostics: Vec::new(),
        }
    }

    /// Byte offset of the next unconsumed byte.
    #[inline]
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Diagnostics recorded since the last drain.
    #[inline]
    pub(crate) fn drain_diagnostics(&mut self) -> std::vec::Drain<'_, Diagnostic> {
        self.diagnostics.drain(..)
    }

    fn report(&mut self, kind: DiagnosticKind) {
        log::warn!("lexer diagnostic {:?} at offset {}", kind, self.position());
        self.diagnostics.push(Diagnostic::new(kind, self.position()));
    }

    /// Produce the next token. Returns [`Token::Eof`] once input is
    /// exhausted; subsequent calls keep returning it.
    pub fn next_token(&mut self) -> RtfResult<Token<'a>> {
        loop {
            let Some(byte) = self.reader.peek()? else {
                return Ok(Token::Eof);
            };
            match byte {
                b'{' => {
                    self.reader.consume_n(1);
                    return Ok(Token::GroupOpen);
                }
                b'}' => {
                    self.reader.consume_n(1);
                    return Ok(Token::GroupClose);
                }
                // Raw line breaks are not tokens
                b'\r' | b'\n' => {
                    self.reader.consume_n(1);
                }
                b'\\' => {
                    if let Some(token) = self.lex_escape()? {
                        return Ok(token);
                    }
                }
                _ => {
                    if let Some(token) = self.lex_text()? {
                        return Ok(token);
                    }
                }
            }
        }
    }

    /// Lex everything starting with a backslash. Returns `None` when the
    /// construct was consumed without producing a token (broken hex escape).
    fn lex_escape(&mut self) -> RtfResult<Option<Token<'a>>> {
        self.reader.consume_n(1); // backslash
        let Some(byte) = self.reader.peek()? else {
            // Lone backslash at end of input
            self.report(DiagnosticKind::UnknownControlWord);
            return Ok(Some(Token::Eof));
        };

        match byte {
            b'a'..=b'z' | b'A'..=b'Z' => self.lex_control_word(),
            b'\'' => self.lex_hex_escape(),
            // An escaped line break is a paragraph break
            b'\r' | b'\n' => {
                self.reader.consume_n(1);
                Ok(Some(Token::Control(ControlWord::Par)))
            }
            _ => {
                self.reader.consume_n(1);
                Ok(Some(Token::Symbol(byte)))
            }
        }
    }

    fn lex_control_word(&mut self) -> RtfResult<Option<Token<'a>>> {
        let mut name = [0u8; MAX_WORD_LEN];
        let mut len = 0;
        let mut overlong = false;

        while let Some(byte) = self.reader.peek()? {
            if !byte.is_ascii_alphabetic() {
                break;
            }
            self.reader.consume_n(1);
            if len < MAX_WORD_LEN {
                name[len] = byte;
                len += 1;
            } else {
                overlong = true;
            }
        }
        if overlong {
            self.report(DiagnosticKind::OverlongControlWord);
        }

        let param = self.lex_parameter()?;

        // A space directly after the letters is the delimiter and is part
        // of this token; a numeric parameter is delimited by the non-digit
        // itself, so a space after it is literal text.
        if param.is_none() && self.reader.peek()? == Some(b' ') {
            self.reader.consume_n(1);
        }

        let word = &name[..len];
        if word == b"bin" {
            // The payload follows one delimiting space, not counted in N
            if self.reader.peek()? == Some(b' ') {
                self.reader.consume_n(1);
            }
            let expected = param.unwrap_or(0).max(0) as usize;
            return Ok(Some(self.lex_binary_span(expected)?));
        }

        Ok(Some(Token::Control(classify(word, param, self.arena))))
    }

    fn lex_parameter(&mut self) -> RtfResult<Option<i32>> {
        let negative = if self.reader.peek()? == Some(b'-') {
            self.reader.consume_n(1);
            true
        } else {
            false
        };

        let mut digits = 0;
        let mut value: i64 = 0;
        while digits < MAX_PARAM_DIGITS {
            let Some(byte) = self.reader.peek()? else {
                break;
            };
            if !byte.is_ascii_digit() {
                break;
            }
            self.reader.consume_n(1);
            value = value * 10 + i64::from(byte - b'0');
            digits += 1;
        }

        if digits == 0 {
            return Ok(None);
        }
        if negative {
            value = -value;
        }
        Ok(Some(value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32))
    }

    fn lex_hex_escape(&mut self) -> RtfResult<Option<Token<'a>>> {
        self.reader.consume_n(1); // quote
        let Some(high) = self.reader.consume()? else {
            self.report(DiagnosticKind::InvalidHexEscape);
            return Ok(None);
        };
        let Some(low) = self.reader.consume()? else {
            self.report(DiagnosticKind::InvalidHexEscape);
            return Ok(None);
        };
        match crate::encoding::hex_pair(high, low) {
            Some(value) => Ok(Some(Token::HexByte(value))),
            None => {
                // Both bytes are consumed and dropped
                self.report(DiagnosticKind::InvalidHexEscape);
                Ok(None)
            }
        }
    }

    /// Read exactly `expected` raw bytes, regardless of their content.
    fn lex_binary_span(&mut self, expected: usize) -> RtfResult<Token<'a>> {
        let mut data = BumpVec::with_capacity_in(expected, self.arena);
        let mut remaining = expected;
        while remaining > 0 {
            let window = self.reader.buffered()?;
            if window.is_empty() {
                return Err(RtfError::TruncatedBinary {
                    expected,
                    offset: self.reader.position(),
                });
            }
            let take = remaining.min(window.len());
            data.extend_from_slice(&window[..take]);
            self.reader.consume_n(take);
            remaining -= take;
        }
        Ok(Token::Binary(data.into_bump_slice()))
    }

    /// Accumulate literal text up to the next delimiter, dropping raw
    /// CR/LF. Returns `None` when only line breaks were consumed.
    fn lex_text(&mut self) -> RtfResult<Option<Token<'a>>> {
        let mut out = BumpVec::new_in(self.arena);
        loop {
            let window = self.reader.buffered()?;
            if window.is_empty() {
                break;
            }
            let stop = memchr::memchr3(b'\\', b'{', b'}', window).unwrap_or(window.len());
            if stop == 0 {
                break;
            }
            let hit_delimiter = stop < window.len();
            for &byte in &window[..stop] {
                if byte != b'\r' && byte != b'\n' {
                    out.push(byte);
                }
            }
            self.reader.consume_n(stop);
            if hit_delimiter {
                break;
            }
        }
        if out.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Token::Text(out.into_bump_slice())))
        }
    }
}

/// Map a control word name to its classified form.
fn classify<'a>(word: &[u8], param: Option<i32>, arena: &'a Bump) -> ControlWord<'a> {
    let value = param.unwrap_or(1);
    let flag = param.unwrap_or(1) != 0;

    match word {
        // Document preamble
        b"rtf" => ControlWord::Rtf(value),
        b"ansi" => ControlWord::Ansi,
        b"mac" => ControlWord::Mac,
        b"pc" => ControlWord::Pc,
        b"pca" => ControlWord::Pca,
        b"ansicpg" => ControlWord::AnsiCodePage(value),
        b"deff" => ControlWord::DefaultFont(value),

        // Destinations
        b"fonttbl" => ControlWord::FontTable,
        b"colortbl" => ControlWord::ColorTable,
        b"stylesheet" => ControlWord::StyleSheet,
        b"info" => ControlWord::Info,
        b"pict" => ControlWord::Picture,
        b"object" => ControlWord::Object,
        b"objdata" => ControlWord::ObjectData,
        b"field" => ControlWord::Field,
        b"fldinst" => ControlWord::FieldInstruction,
        b"fldrslt" => ControlWord::FieldResult,
        b"header" | b"headerl" | b"headerr" | b"headerf" => ControlWord::Header,
        b"footer" | b"footerl" | b"footerr" | b"footerf" => ControlWord::Footer,
        b"footnote" => ControlWord::Footnote,

        // Info fields
        b"title" => ControlWord::Title,
        b"subject" => ControlWord::Subject,
        b"author" => ControlWord::Author,
        b"operator" => ControlWord::Operator,
        b"keywords" => ControlWord::Keywords,
        b"doccomm" => ControlWord::DocComment,
        b"company" => ControlWord::Company,
        b"version" => ControlWord::Version(value),

        // Picture properties
        b"picw" => ControlWord::PictureWidth(value),
        b"pich" => ControlWord::PictureHeight(value),
        b"picwgoal" => ControlWord::PictureGoalWidth(value),
        b"pichgoal" => ControlWord::PictureGoalHeight(value),
        b"picscalex" => ControlWord::PictureScaleX(value),
        b"picscaley" => ControlWord::PictureScaleY(value),
        b"wbmbitspixel" => ControlWord::BitsPerPixel(value),
        b"emfblip" => ControlWord::EmfBlip,
        b"pngblip" => ControlWord::PngBlip,
        b"jpegblip" => ControlWord::JpegBlip,
        b"wmetafile" => ControlWord::Wmetafile(value),
        b"wbitmap" => ControlWord::Wbitmap(value),
        b"dibitmap" => ControlWord::Dibitmap(value),

        // Color table channels
        b"red" => ControlWord::Red(value),
        b"green" => ControlWord::Green(value),
        b"blue" => ControlWord::Blue(value),

        // Character formatting
        b"b" => ControlWord::Bold(flag),
        b"i" => ControlWord::Italic(flag),
        b"ul" => ControlWord::Underline(flag),
        b"ulnone" => ControlWord::UnderlineNone,
        b"strike" => ControlWord::Strike(flag),
        b"super" => ControlWord::Superscript(flag),
        b"sub" => ControlWord::Subscript(flag),
        b"nosupersub" => ControlWord::NoSuperSub,
        b"v" => ControlWord::Hidden(flag),
        b"scaps" => ControlWord::SmallCaps(flag),
        b"caps" => ControlWord::AllCaps(flag),
        b"plain" => ControlWord::Plain,
        b"f" => ControlWord::FontNumber(value),
        b"fs" => ControlWord::FontSize(value),
        b"fcharset" => ControlWord::FontCharset(value),
        b"fnil" => ControlWord::Family(FontFamily::Nil),
        b"froman" => ControlWord::Family(FontFamily::Roman),
        b"fswiss" => ControlWord::Family(FontFamily::Swiss),
        b"fmodern" => ControlWord::Family(FontFamily::Modern),
        b"fscript" => ControlWord::Family(FontFamily::Script),
        b"fdecor" => ControlWord::Family(FontFamily::Decor),
        b"ftech" => ControlWord::Family(FontFamily::Tech),
        b"cf" => ControlWord::Foreground(value),
        b"cb" | b"highlight" => ControlWord::Background(value),

        // Paragraph formatting
        b"par" => ControlWord::Par,
        b"pard" => ControlWord::ParDefault,
        b"ql" => ControlWord::AlignLeft,
        b"qr" => ControlWord::AlignRight,
        b"qc" => ControlWord::AlignCenter,
        b"qj" => ControlWord::AlignJustify,
        b"fi" => ControlWord::FirstIndent(value),
        b"li" => ControlWord::LeftIndent(value),
        b"ri" => ControlWord::RightIndent(value),
        b"sb" => ControlWord::SpaceBefore(value),
        b"sa" => ControlWord::SpaceAfter(value),

        // Special characters
        b"line" => ControlWord::Line,
        b"page" => ControlWord::Page,
        b"tab" => ControlWord::Tab,
        b"emdash" => ControlWord::EmDash,
        b"endash" => ControlWord::EnDash,
        b"lquote" => ControlWord::LeftQuote,
        b"rquote" => ControlWord::RightQuote,
        b"ldblquote" => ControlWord::LeftDoubleQuote,
        b"rdblquote" => ControlWord::RightDoubleQuote,
        b"bullet" => ControlWord::Bullet,

        // Tables
        b"trowd" => ControlWord::RowDefaults,
        b"row" => ControlWord::Row,
        b"cell" => ControlWord::Cell,
        b"cellx" => ControlWord::CellBoundary(value),
        b"intbl" => ControlWord::InTable,

        // Unicode
        b"u" => ControlWord::Unicode(value),
        b"uc" => ControlWord::UnicodeSkip(value),

        _ => {
            // SAFETY: the name buffer only ever holds ASCII letters
            let name = unsafe { std::str::from_utf8_unchecked(word) };
            ControlWord::Unknown(arena.alloc_str(name), param)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &[u8]) -> (Vec<Token<'_>>, Vec<Diagnostic>) {
        // Leak the arena so tokens can be returned; fine for tests
        let arena: &'static Bump = Box::leak(Box::new(Bump::new()));
        let mut lexer = Lexer::new(ByteReader::from_slice(input), arena);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        let diagnostics = lexer.drain_diagnostics().collect();
        (tokens, diagnostics)
    }

    #[test]
    fn test_simple_document() {
        let (tokens, diags) = tokenize(br"{\rtf1\ansi Hello}");
        assert!(diags.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::GroupOpen,
                Token::Control(ControlWord::Rtf(1)),
                Token::Control(ControlWord::Ansi),
                Token::Text(b"Hello"),
                Token::GroupClose,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_delimiter_space_absorbed() {
        let (tokens, _) = tokenize(br"\b bold");
        assert_eq!(
            tokens,
            vec![
                Token::Control(ControlWord::Bold(true)),
                Token::Text(b"bold"),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_toggle_off_parameter() {
        let (tokens, _) = tokenize(br"\b0\i1");
        assert_eq!(tokens[0], Token::Control(ControlWord::Bold(false)));
        assert_eq!(tokens[1], Token::Control(ControlWord::Italic(true)));
    }

    #[test]
    fn test_space_after_parameter_is_literal() {
        let (tokens, _) = tokenize(br"\b0 and");
        assert_eq!(tokens[0], Token::Control(ControlWord::Bold(false)));
        assert_eq!(tokens[1], Token::Text(b" and"));
    }

    #[test]
    fn test_negative_parameter() {
        let (tokens, _) = tokenize(br"\u-10179?");
        assert_eq!(tokens[0], Token::Control(ControlWord::Unicode(-10179)));
        assert_eq!(tokens[1], Token::Text(b"?"));
    }

    #[test]
    fn test_control_symbols() {
        let (tokens, _) = tokenize(br"\{\}\\\~\*");
        assert_eq!(
            tokens,
            vec![
                Token::Symbol(b'{'),
                Token::Symbol(b'}'),
                Token::Symbol(b'\\'),
                Token::Symbol(b'~'),
                Token::Symbol(b'*'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_hex_escape() {
        let (tokens, diags) = tokenize(br"\'41\'e9");
        assert!(diags.is_empty());
        assert_eq!(tokens[0], Token::HexByte(0x41));
        assert_eq!(tokens[1], Token::HexByte(0xE9));
    }

    #[test]
    fn test_invalid_hex_escape_skipped() {
        let (tokens, diags) = tokenize(br"\'zzA");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::InvalidHexEscape);
        // The two bad bytes are gone, the rest continues as text
        assert_eq!(tokens[0], Token::Text(b"A"));
    }

    #[test]
    fn test_binary_span_ignores_delimiters() {
        let (tokens, _) = tokenize(b"\\bin5 {\\}ab rest");
        assert_eq!(tokens[0], Token::Binary(b"{\\}ab"));
        assert_eq!(tokens[1], Token::Text(b" rest"));
    }

    #[test]
    fn test_truncated_binary_is_fatal() {
        let arena = Bump::new();
        let mut lexer = Lexer::new(ByteReader::from_slice(b"\\bin10 ab"), &arena);
        assert!(matches!(
            lexer.next_token(),
            Err(RtfError::TruncatedBinary { expected: 10, .. })
        ));
    }

    #[test]
    fn test_raw_line_breaks_dropped() {
        let (tokens, _) = tokenize(b"ab\r\ncd\n");
        assert_eq!(tokens[0], Token::Text(b"abcd"));
    }

    #[test]
    fn test_overlong_word_truncated() {
        let word: Vec<u8> = std::iter::once(b'\\')
            .chain(std::iter::repeat_n(b'x', 40))
            .collect();
        let (tokens, diags) = tokenize(&word);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::OverlongControlWord);
        match tokens[0] {
            Token::Control(ControlWord::Unknown(name, None)) => assert_eq!(name.len(), 32),
            ref other => panic!("expected truncated unknown word, got {:?}", other),
        }
    }

    #[test]
    fn test_parameter_digit_cap() {
        let (tokens, _) = tokenize(br"\fs12345678901");
        // Ten digits consumed, the eleventh becomes text
        assert_eq!(
            tokens[0],
            Token::Control(ControlWord::FontSize(1234567890))
        );
        assert_eq!(tokens[1], Token::Text(b"1"));
    }

    #[test]
    fn test_unknown_word_preserved() {
        let (tokens, _) = tokenize(br"\generator5");
        assert_eq!(
            tokens[0],
            Token::Control(ControlWord::Unknown("generator", Some(5)))
        );
    }
}
