//! Compressed RTF container (MS-OXRTFCP).
//!
//! Mail stores wrap RTF bodies in a 16-byte header followed by either
//! LZ-compressed data ("LZFu") or the raw bytes ("MELA"). Compression runs
//! over a 4 KiB circular dictionary preloaded with a fixed RTF preamble;
//! a CRC32 over the body guards the compressed form.

use crate::error::{RtfError, RtfResult};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, IntoBytes};
use zerocopy_derive::{
    FromBytes as DeriveFromBytes, Immutable, IntoBytes as DeriveIntoBytes, KnownLayout,
};

/// Signature of LZ-compressed bodies.
const COMPRESSED_MAGIC: [u8; 4] = *b"LZFu";

/// Signature of stored (uncompressed) bodies.
const STORED_MAGIC: [u8; 4] = *b"MELA";

/// Circular dictionary size.
const DICT_SIZE: usize = 4096;

/// Longest representable match.
const MAX_MATCH: usize = 17;

/// Dictionary preload mandated by the format.
const DICT_SEED: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}\
{\\f0\\fnil \\froman \\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArial\
Times New RomanCourier{\\colortbl\\red0\\green0\\blue0\r\n\\par \\pard\\plain\\f0\\fs20\
\\b\\i\\u\\tab\\tx";

const _: () = assert!(DICT_SEED.len() == 207);

/// 16-byte container header.
#[repr(C)]
#[derive(Debug, Clone, Copy, DeriveIntoBytes, DeriveFromBytes, Immutable, KnownLayout)]
struct ContainerHeader {
    /// Total size in bytes, excluding this field
    compressed_size: U32,
    /// Size of the body once decompressed
    raw_size: U32,
    magic: [u8; 4],
    /// CRC32 over the body; zero for stored bodies
    crc32: U32,
}

/// How [`compress`] encodes the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    /// LZ compression over the preloaded dictionary
    #[default]
    Compressed,
    /// Raw bytes behind a container header
    Stored,
}

/// Whether `data` starts with a compressed-RTF container header.
pub fn is_compressed_rtf(data: &[u8]) -> bool {
    data.len() >= 16 && (data[8..12] == COMPRESSED_MAGIC || data[8..12] == STORED_MAGIC)
}

/// Unwrap a container and return the raw RTF bytes.
pub fn decompress(data: &[u8]) -> RtfResult<Vec<u8>> {
    let Ok((header, body)) = ContainerHeader::ref_from_prefix(data) else {
        return Err(RtfError::InvalidStructure(
            "compressed RTF container shorter than its 16-byte header".into(),
        ));
    };

    match header.magic {
        COMPRESSED_MAGIC => {
            let computed = crc_fast::checksum(crc_fast::CrcAlgorithm::Crc32IsoHdlc, body) as u32;
            if computed != header.crc32.get() {
                return Err(RtfError::InvalidStructure(format!(
                    "compressed RTF checksum mismatch: header {:#010x}, body {:#010x}",
                    header.crc32.get(),
                    computed
                )));
            }
            Ok(decode_body(body, header.raw_size.get() as usize))
        }
        STORED_MAGIC => {
            if header.crc32.get() != 0 {
                return Err(RtfError::InvalidStructure(
                    "stored RTF container must carry a zero checksum".into(),
                ));
            }
            let size = (header.raw_size.get() as usize).min(body.len());
            Ok(body[..size].to_vec())
        }
        _ => Err(RtfError::InvalidStructure(format!(
            "unrecognized compression signature {:?}",
            header.magic
        ))),
    }
}

fn seeded_dict() -> Box<[u8; DICT_SIZE]> {
    let mut dict = Box::new([b' '; DICT_SIZE]);
    dict[..DICT_SEED.len()].copy_from_slice(DICT_SEED);
    dict
}

fn decode_body(body: &[u8], raw_size: usize) -> Vec<u8> {
    let mut dict = seeded_dict();
    let mut write_pos = DICT_SEED.len();
    let mut out = Vec::with_capacity(raw_size);
    let mut pos = 0;

    'outer: while pos < body.len() {
        let control = body[pos];
        pos += 1;
        for bit in 0..8 {
            if control & (1 << bit) != 0 {
                if pos + 2 > body.len() {
                    break 'outer;
                }
                let token = u16::from_be_bytes([body[pos], body[pos + 1]]);
                pos += 2;
                let offset = (token >> 4) as usize & 0xFFF;
                // An offset naming the write position is the end marker
                if offset == write_pos {
                    break 'outer;
                }
                let length = (token & 0xF) as usize + 2;
                for step in 0..length {
                    let byte = dict[(offset + step) % DICT_SIZE];
                    out.push(byte);
                    dict[write_pos] = byte;
                    write_pos = (write_pos + 1) % DICT_SIZE;
                }
            } else {
                if pos >= body.len() {
                    break 'outer;
                }
                let byte = body[pos];
                pos += 1;
                out.push(byte);
                dict[write_pos] = byte;
                write_pos = (write_pos + 1) % DICT_SIZE;
            }
        }
    }
    out
}

/// Wrap raw RTF bytes in a container.
pub fn compress(data: &[u8], mode: CompressionMode) -> Vec<u8> {
    let (magic, body, crc32) = match mode {
        CompressionMode::Compressed => {
            let body = encode_body(data);
            let crc = crc_fast::checksum(crc_fast::CrcAlgorithm::Crc32IsoHdlc, &body) as u32;
            (COMPRESSED_MAGIC, body, crc)
        }
        CompressionMode::Stored => (STORED_MAGIC, data.to_vec(), 0),
    };

    let header = ContainerHeader {
        compressed_size: U32::new((body.len() + 12) as u32),
        raw_size: U32::new(data.len() as u32),
        magic,
        crc32: U32::new(crc32),
    };

    let mut out = Vec::with_capacity(16 + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&body);
    out
}

fn encode_body(data: &[u8]) -> Vec<u8> {
    let mut dict = seeded_dict();
    let mut write_pos = DICT_SEED.len();
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    let mut tokens: Vec<u8> = Vec::with_capacity(16);
    let mut i = 0;
    let mut finished = false;

    while !finished {
        let mut control = 0u8;
        tokens.clear();
        for bit in 0..8 {
            if i >= data.len() {
                // End marker: a reference to the current write position
                control |= 1 << bit;
                let token = ((write_pos as u16) & 0xFFF) << 4;
                tokens.extend_from_slice(&token.to_be_bytes());
                finished = true;
                break;
            }
            let (offset, length) = longest_match(&dict, write_pos, &data[i..]);
            if length >= 2 {
                control |= 1 << bit;
                let token = (((offset as u16) & 0xFFF) << 4) | ((length as u16 - 2) & 0xF);
                tokens.extend_from_slice(&token.to_be_bytes());
                for &byte in &data[i..i + length] {
                    dict[write_pos] = byte;
                    write_pos = (write_pos + 1) % DICT_SIZE;
                }
                i += length;
            } else {
                tokens.push(data[i]);
                dict[write_pos] = data[i];
                write_pos = (write_pos + 1) % DICT_SIZE;
                i += 1;
            }
        }
        out.push(control);
        out.extend_from_slice(&tokens);
    }
    out
}

/// Longest dictionary match for the head of `input`, emulating the
/// decoder's copy-while-writing semantics so self-overlapping runs are
/// representable.
fn longest_match(dict: &[u8; DICT_SIZE], write_pos: usize, input: &[u8]) -> (usize, usize) {
    let max_len = input.len().min(MAX_MATCH);
    let mut best_offset = 0;
    let mut best_len = 0;
    if max_len < 2 {
        return (0, 0);
    }

    for start in 0..DICT_SIZE {
        if start == write_pos {
            // Reserved for the end marker
            continue;
        }
        let mut len = 0;
        while len < max_len {
            let src = (start + len) % DICT_SIZE;
            // Steps already copied in this match overwrite the window at
            // the write position; read those from the input instead.
            let back = (src + DICT_SIZE - write_pos) % DICT_SIZE;
            let value = if back < len { input[back] } else { dict[src] };
            if value != input[len] {
                break;
            }
            len += 1;
        }
        if len > best_len {
            best_offset = start;
            best_len = len;
            if best_len == max_len {
                break;
            }
        }
    }
    (best_offset, best_len)
}
