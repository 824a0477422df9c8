#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One decoded line of the file
///
/// The text is owned and shared by reference count between the cache and
/// callers; it never points into the reader's buffer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Line {
    index: u64,
    text: Arc<str>,
    byte_len: usize,
    offset: u64,
}

impl Line {
    pub fn new(index: u64, text: impl Into<Arc<str>>, byte_len: usize, offset: u64) -> Self {
        Self {
            index,
            text: text.into(),
            byte_len,
            offset,
        }
    }

    /// Zero-based position in the file
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Raw length in bytes, terminator included
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// File offset of the first byte
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_text(self) -> Arc<str> {
        self.text
    }
}

impl AsRef<str> for Line {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq<str> for Line {
    fn eq(&self, other: &str) -> bool {
        &*self.text == other
    }
}

impl PartialEq<&str> for Line {
    fn eq(&self, other: &&str) -> bool {
        &*self.text == *other
    }
}
