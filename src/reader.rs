//! Pull-based byte source feeding the lexer.
//!
//! A [`ByteReader`] yields one octet at a time with single-octet peek and
//! explicit end-of-input. It is backed either by a borrowed byte slice or
//! by any [`std::io::Read`] implementation behind a fixed 1 KiB refill
//! buffer. A refill that yields zero bytes is reported as end-of-input and
//! is sticky; reader errors propagate as fatal [`RtfError::Io`].

use crate::error::RtfResult;
use std::io::Read;

/// Size of the refill buffer for stream-backed sources.
pub const REFILL_BUF_LEN: usize = 1024;

enum Source<'r> {
    Slice {
        data: &'r [u8],
        pos: usize,
    },
    Stream {
        reader: &'r mut dyn Read,
        buf: Box<[u8; REFILL_BUF_LEN]>,
        start: usize,
        end: usize,
        eof: bool,
    },
}

/// Single-threaded pull source with one-octet peek.
pub struct ByteReader<'r> {
    source: Source<'r>,
    position: u64,
}

impl<'r> ByteReader<'r> {
    /// Create a reader over a byte slice.
    #[inline]
    pub fn from_slice(data: &'r [u8]) -> Self {
        Self {
            source: Source::Slice { data, pos: 0 },
            position: 0,
        }
    }

    /// Create a reader over a stream, buffered in 1 KiB chunks.
    #[inline]
    pub fn from_reader(reader: &'r mut dyn Read) -> Self {
        Self {
            source: Source::Stream {
                reader,
                buf: Box::new([0u8; REFILL_BUF_LEN]),
                start: 0,
                end: 0,
                eof: false,
            },
            position: 0,
        }
    }

    /// Number of bytes consumed so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Look at the next byte without consuming it.
    #[inline]
    pub fn peek(&mut self) -> RtfResult<Option<u8>> {
        Ok(self.buffered()?.first().copied())
    }

    /// Consume and return the next byte.
    #[inline]
    pub fn consume(&mut self) -> RtfResult<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.consume_n(1);
        }
        Ok(byte)
    }

    /// The currently available window of unconsumed bytes.
    ///
    /// Refills from the stream when empty. An empty return means
    /// end-of-input. The window length is at most [`REFILL_BUF_LEN`] for
    /// stream sources; callers scanning with `memchr` must loop.
    pub fn buffered(&mut self) -> RtfResult<&[u8]> {
        match &mut self.source {
            Source::Slice { data, pos } => Ok(&data[*pos..]),
            Source::Stream {
                reader,
                buf,
                start,
                end,
                eof,
            } => {
                if start == end && !*eof {
                    *start = 0;
                    *end = 0;
                    loop {
                        match reader.read(&mut buf[..]) {
                            Ok(0) => {
                                *eof = true;
                                break;
                            }
                            Ok(n) => {
                                *end = n;
                                break;
                            }
                            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
                Ok(&buf[*start..*end])
            }
        }
    }

    /// Advance past `n` bytes previously observed through [`buffered`].
    ///
    /// `n` must not exceed the length of the last buffered window.
    ///
    /// [`buffered`]: Self::buffered
    #[inline]
    pub fn consume_n(&mut self, n: usize) {
        match &mut self.source {
            Source::Slice { data, pos } => {
                debug_assert!(*pos + n <= data.len());
                *pos += n;
            }
            Source::Stream { start, end, .. } => {
                debug_assert!(*start + n <= *end);
                *start += n;
            }
        }
        self.position += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_slice_peek_consume() {
        let mut r = ByteReader::from_slice(b"ab");
        assert_eq!(r.peek().unwrap(), Some(b'a'));
        assert_eq!(r.peek().unwrap(), Some(b'a'));
        assert_eq!(r.consume().unwrap(), Some(b'a'));
        assert_eq!(r.position(), 1);
        assert_eq!(r.consume().unwrap(), Some(b'b'));
        assert_eq!(r.consume().unwrap(), None);
        assert_eq!(r.peek().unwrap(), None);
        assert_eq!(r.position(), 2);
    }

    #[test]
    fn test_stream_refill_across_chunks() {
        let data: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        let mut cursor = Cursor::new(data.clone());
        let mut r = ByteReader::from_reader(&mut cursor);

        let mut collected = Vec::new();
        while let Some(b) = r.consume().unwrap() {
            collected.push(b);
        }
        assert_eq!(collected, data);
        assert_eq!(r.position(), 3000);
    }

    #[test]
    fn test_stream_eof_is_sticky() {
        let mut cursor = Cursor::new(b"x".to_vec());
        let mut r = ByteReader::from_reader(&mut cursor);
        assert_eq!(r.consume().unwrap(), Some(b'x'));
        assert_eq!(r.consume().unwrap(), None);
        assert_eq!(r.consume().unwrap(), None);
    }

    #[test]
    fn test_buffered_window_and_consume_n() {
        let mut r = ByteReader::from_slice(b"hello world");
        let window = r.buffered().unwrap();
        assert_eq!(window, b"hello world");
        r.consume_n(6);
        assert_eq!(r.buffered().unwrap(), b"world");
        assert_eq!(r.position(), 6);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("backing store failure"))
        }
    }

    #[test]
    fn test_reader_error_propagates() {
        let mut failing = FailingReader;
        let mut r = ByteReader::from_reader(&mut failing);
        assert!(r.peek().is_err());
    }
}
