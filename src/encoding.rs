//! Character encoding utilities for RTF text.
//!
//! RTF carries text in a Windows code page declared by `\ansicpg` (or
//! implied by `\ansi`, `\mac`, `\pc`, `\pca`) and escapes bytes outside
//! ASCII as `\'HH`. This module maps code page identifiers to
//! `encoding_rs` encodings and provides the hex-digit helpers shared by
//! the lexer and the picture/object accumulators.

use encoding_rs::Encoding;

/// The default ANSI encoding (Windows-1252).
pub const DEFAULT_ENCODING: &'static Encoding = encoding_rs::WINDOWS_1252;

/// Map a Windows code page identifier to an `encoding_rs` encoding.
///
/// Covers the code pages commonly declared by RTF writers. The match
/// compiles to a jump table and the returned references are static, so no
/// allocation occurs.
///
/// # Examples
/// ```
/// use longan::encoding::codepage_to_encoding;
///
/// let encoding = codepage_to_encoding(936).unwrap();
/// assert_eq!(encoding.name(), "GBK");
/// ```
#[inline]
pub fn codepage_to_encoding(codepage: i32) -> Option<&'static Encoding> {
    match codepage {
        // DOS codepages
        437 => Some(encoding_rs::IBM866), // IBM866 (close approximation to CP437)
        850 => Some(encoding_rs::IBM866), // DOS Latin 1 (approximation)

        // Windows codepages (Western scripts)
        874 => Some(encoding_rs::WINDOWS_874),   // Thai
        1250 => Some(encoding_rs::WINDOWS_1250), // Central European
        1251 => Some(encoding_rs::WINDOWS_1251), // Cyrillic
        1252 => Some(encoding_rs::WINDOWS_1252), // Western European (default ANSI)
        1253 => Some(encoding_rs::WINDOWS_1253), // Greek
        1254 => Some(encoding_rs::WINDOWS_1254), // Turkish
        1255 => Some(encoding_rs::WINDOWS_1255), // Hebrew
        1256 => Some(encoding_rs::WINDOWS_1256), // Arabic
        1257 => Some(encoding_rs::WINDOWS_1257), // Baltic
        1258 => Some(encoding_rs::WINDOWS_1258), // Vietnamese

        // East Asian codepages
        932 => Some(encoding_rs::SHIFT_JIS),  // Japanese Shift-JIS
        936 => Some(encoding_rs::GBK),        // Simplified Chinese (GB2312/GBK)
        949 => Some(encoding_rs::EUC_KR),     // Korean
        950 => Some(encoding_rs::BIG5),       // Traditional Chinese (Big5)
        54936 => Some(encoding_rs::GB18030),  // Chinese GB18030 (superset of GBK)
        20932 => Some(encoding_rs::EUC_JP),   // Japanese EUC-JP

        // ISO 8859 series
        28591 => Some(encoding_rs::WINDOWS_1252), // ISO-8859-1 approximation
        28592 => Some(encoding_rs::ISO_8859_2),   // Latin 2 (Central European)
        28595 => Some(encoding_rs::ISO_8859_5),   // Cyrillic
        28597 => Some(encoding_rs::ISO_8859_7),   // Greek
        28605 => Some(encoding_rs::ISO_8859_15),  // Latin 9 (Western with Euro)

        // KOI8 series
        20866 => Some(encoding_rs::KOI8_R), // KOI8-R (Russian)
        21866 => Some(encoding_rs::KOI8_U), // KOI8-U (Ukrainian)

        // Macintosh
        10000 => Some(encoding_rs::MACINTOSH), // Macintosh Roman

        // Unicode
        65001 => Some(encoding_rs::UTF_8), // UTF-8

        // Unsupported codepage
        _ => None,
    }
}

/// Decode a single ASCII hex digit.
#[inline]
pub fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Combine two ASCII hex digits into a byte.
#[inline]
pub fn hex_pair(high: u8, low: u8) -> Option<u8> {
    Some((hex_digit(high)? << 4) | hex_digit(low)?)
}

/// Lowercase hex digits, indexed by nibble value.
pub const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";
