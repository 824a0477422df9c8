#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::mem;

use crate::brd::ByteReader;
use crate::err::Result;

/// Byte that ends a line
pub const LINE_TERMINATOR: u8 = b'\n';

/// How malformed UTF-8 inside a line is handled
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecodePolicy {
    /// Fail the line
    Strict,
    /// Substitute U+FFFD for each malformed sequence
    #[default]
    Replace,
    /// Drop malformed sequences
    Ignore,
}

/// Undecoded line bytes, terminator included when present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub bytes: Vec<u8>,
    /// File offset of the first byte
    pub offset: u64,
}

impl RawLine {
    pub fn has_terminator(&self) -> bool {
        self.bytes.last() == Some(&LINE_TERMINATOR)
    }
}

/// Cuts the reader's byte stream into lines
#[derive(Debug)]
pub struct LineSplitter {
    reader: ByteReader,
    // Bytes of a line that started in an earlier window
    pending: Vec<u8>,
    pending_offset: u64,
}

impl LineSplitter {
    pub fn new(reader: ByteReader) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            pending_offset: 0,
        }
    }

    /// Next line, or `None` once the file is exhausted
    pub fn next_raw_line(&mut self) -> Result<Option<RawLine>> {
        self.next_raw_line_with(|_, _| {})
    }

    /// Like [`next_raw_line`](Self::next_raw_line), reporting each refill
    /// as `(bytes_read, reached_eof)`
    pub fn next_raw_line_with(
        &mut self,
        mut on_refill: impl FnMut(usize, bool),
    ) -> Result<Option<RawLine>> {
        loop {
            let window = self.reader.available();

            if let Some(at) = memchr::memchr(LINE_TERMINATOR, window) {
                let line = if self.pending.is_empty() {
                    RawLine {
                        bytes: window[..=at].to_vec(),
                        offset: self.reader.offset(),
                    }
                } else {
                    let mut bytes = mem::take(&mut self.pending);
                    bytes.extend_from_slice(&window[..=at]);
                    RawLine {
                        bytes,
                        offset: self.pending_offset,
                    }
                };
                self.reader.consume(at + 1);
                return Ok(Some(line));
            }

            if !window.is_empty() {
                if self.pending.is_empty() {
                    self.pending_offset = self.reader.offset();
                }
                let taken = window.len();
                self.pending.extend_from_slice(window);
                self.reader.consume(taken);
            }

            let (read, eof) = self.reader.fill()?;
            on_refill(read, eof);
            if read == 0 {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(RawLine {
                    bytes: mem::take(&mut self.pending),
                    offset: self.pending_offset,
                }));
            }
        }
    }

    /// Continue splitting from `offset`, which must be a line start
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.pending.clear();
        self.reader.seek_to(offset)
    }

    /// Start over from the first line
    pub fn rewind(&mut self) -> Result<()> {
        self.pending.clear();
        self.reader.reopen()
    }

    pub fn close(&mut self) -> bool {
        self.pending.clear();
        self.reader.close()
    }

    pub fn reader(&self) -> &ByteReader {
        &self.reader
    }
}

/// Remove the trailing `\n` and, if asked, a `\r` before it
pub fn strip_terminator(bytes: &mut Vec<u8>, strip_carriage_return: bool) {
    if bytes.last() == Some(&LINE_TERMINATOR) {
        bytes.pop();
        if strip_carriage_return && bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
}

/// Text produced by [`decode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// Offset of the first malformed sequence that was repaired
    pub first_invalid: Option<usize>,
}

/// Strict decoding failed at this byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidUtf8 {
    pub offset: usize,
}

pub fn decode(bytes: Vec<u8>, policy: DecodePolicy) -> std::result::Result<Decoded, InvalidUtf8> {
    let err = match String::from_utf8(bytes) {
        Ok(text) => {
            return Ok(Decoded {
                text,
                first_invalid: None,
            });
        }
        Err(err) => err,
    };

    let offset = err.utf8_error().valid_up_to();
    let bytes = err.into_bytes();
    let text = match policy {
        DecodePolicy::Strict => return Err(InvalidUtf8 { offset }),
        DecodePolicy::Replace => String::from_utf8_lossy(&bytes).into_owned(),
        DecodePolicy::Ignore => bytes.utf8_chunks().map(|chunk| chunk.valid()).collect(),
    };
    Ok(Decoded {
        text,
        first_invalid: Some(offset),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn splitter(content: &[u8], buffer: usize) -> (tempfile::NamedTempFile, LineSplitter) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        let reader = ByteReader::open(file.path(), buffer).unwrap();
        (file, LineSplitter::new(reader))
    }

    fn drain(splitter: &mut LineSplitter) -> Vec<RawLine> {
        let mut lines = Vec::new();
        while let Some(line) = splitter.next_raw_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn splits_across_windows() {
        let (_file, mut splitter) = splitter(b"ab\ncdefg\n\nh", 3);
        let lines = drain(&mut splitter);
        let bytes: Vec<&[u8]> = lines.iter().map(|l| l.bytes.as_slice()).collect();
        assert_eq!(bytes, [&b"ab\n"[..], b"cdefg\n", b"\n", b"h"]);
        let offsets: Vec<u64> = lines.iter().map(|l| l.offset).collect();
        assert_eq!(offsets, [0, 3, 9, 10]);
        assert!(!lines[3].has_terminator());
    }

    #[test]
    fn line_longer_than_buffer() {
        let long = "x".repeat(50);
        let content = format!("{long}\nshort\n");
        let (_file, mut splitter) = splitter(content.as_bytes(), 8);
        let lines = drain(&mut splitter);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].bytes, format!("{long}\n").into_bytes());
        assert_eq!(lines[1].offset, 51);
    }

    #[test]
    fn terminator_on_window_edge() {
        let (_file, mut splitter) = splitter(b"abc\ndef\n", 4);
        let lines = drain(&mut splitter);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].bytes, b"def\n");
    }

    #[test]
    fn empty_file_has_no_lines() {
        let (_file, mut splitter) = splitter(b"", 16);
        assert_eq!(splitter.next_raw_line().unwrap(), None);
    }

    #[test]
    fn refills_are_reported() {
        let (_file, mut splitter) = splitter(b"abcdef\n", 4);
        let mut refills = Vec::new();
        let line = splitter
            .next_raw_line_with(|read, eof| refills.push((read, eof)))
            .unwrap();
        assert!(line.is_some());
        assert_eq!(refills, [(4, false), (3, false)]);
        assert_eq!(splitter.reader().refills(), 2);
    }

    #[test]
    fn seek_drops_pending_fragment() {
        let (_file, mut splitter) = splitter(b"first\nsecond\n", 64);
        drain(&mut splitter);
        splitter.seek(6).unwrap();
        let line = splitter.next_raw_line().unwrap().unwrap();
        assert_eq!(line.bytes, b"second\n");
        assert_eq!(line.offset, 6);
    }

    #[test]
    fn strip_handles_crlf() {
        let mut bytes = b"abc\r\n".to_vec();
        strip_terminator(&mut bytes, false);
        assert_eq!(bytes, b"abc\r");

        let mut bytes = b"abc\r\n".to_vec();
        strip_terminator(&mut bytes, true);
        assert_eq!(bytes, b"abc");

        let mut bytes = b"abc\r".to_vec();
        strip_terminator(&mut bytes, true);
        assert_eq!(bytes, b"abc\r");
    }

    #[test]
    fn decode_policies() {
        let bad = b"ab\xffcd".to_vec();

        let replaced = decode(bad.clone(), DecodePolicy::Replace).unwrap();
        assert_eq!(replaced.text, "ab\u{FFFD}cd");
        assert_eq!(replaced.first_invalid, Some(2));

        let ignored = decode(bad.clone(), DecodePolicy::Ignore).unwrap();
        assert_eq!(ignored.text, "abcd");

        assert_eq!(
            decode(bad, DecodePolicy::Strict),
            Err(InvalidUtf8 { offset: 2 })
        );

        let clean = decode("héllo".as_bytes().to_vec(), DecodePolicy::Strict).unwrap();
        assert_eq!(clean.text, "héllo");
        assert_eq!(clean.first_invalid, None);
    }
}
