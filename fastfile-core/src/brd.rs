use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::err::{FastFileError, Result};

/// Open file plus a fixed-size window of its raw bytes
///
/// Bytes in `buf[pos..len]` have been read from the file but not yet handed
/// to the splitter. A refill always starts writing at offset 0, dropping
/// whatever was consumed before.
#[derive(Debug)]
pub struct ByteReader {
    path: PathBuf,
    file: Option<File>,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
    eof: bool,
    // File offset of buf[0]
    window_start: u64,
    // File offset the next read starts at
    next_read: u64,
    consumed: u64,
    refills: u64,
}

fn open_regular(path: &Path) -> Result<File> {
    let file = File::open(path).map_err(|source| FastFileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata = file.metadata().map_err(|source| FastFileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(FastFileError::NotAFile {
            path: path.to_path_buf(),
        });
    }
    Ok(file)
}

impl ByteReader {
    /// Open `path` for reading with a buffer of `capacity` bytes
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_regular(&path)?;
        Ok(Self {
            path,
            file: Some(file),
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            pos: 0,
            len: 0,
            eof: false,
            window_start: 0,
            next_read: 0,
            consumed: 0,
            refills: 0,
        })
    }

    /// Refill the buffer from offset 0, returning `(bytes_read, reached_eof)`.
    ///
    /// A read error releases the handle; the reader refuses further reads
    /// until it is repositioned with [`seek_to`](Self::seek_to).
    pub fn fill(&mut self) -> Result<(usize, bool)> {
        let Some(file) = self.file.as_mut() else {
            return Err(FastFileError::UseAfterClose {
                path: self.path.clone(),
            });
        };

        self.pos = 0;
        self.len = 0;
        self.window_start = self.next_read;

        let read = loop {
            match file.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    self.file = None;
                    return Err(FastFileError::Read {
                        path: self.path.clone(),
                        source,
                    });
                }
            }
        };

        self.len = read;
        self.next_read += read as u64;
        self.eof = read == 0;
        self.refills += 1;
        Ok((read, self.eof))
    }

    /// Bytes read but not consumed yet
    #[inline]
    pub fn available(&self) -> &[u8] {
        &self.buf[self.pos..self.len]
    }

    #[inline]
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len - self.pos);
        let n = n.min(self.len - self.pos);
        self.pos += n;
        self.consumed += n as u64;
    }

    /// File offset of the first unconsumed byte
    #[inline]
    pub fn offset(&self) -> u64 {
        self.window_start + self.pos as u64
    }

    /// Drop the buffer and continue reading at `offset`.
    ///
    /// Reacquires the handle if it was released.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        let file = match self.file.take() {
            Some(file) => file,
            None => open_regular(&self.path)?,
        };
        let file = self.file.insert(file);
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| FastFileError::Read {
                path: self.path.clone(),
                source,
            })?;

        self.pos = 0;
        self.len = 0;
        self.eof = false;
        self.window_start = offset;
        self.next_read = offset;
        Ok(())
    }

    /// Back to the start of the file, reacquiring the handle if needed
    pub fn reopen(&mut self) -> Result<()> {
        self.seek_to(0)
    }

    /// Release the handle. Returns whether one was held.
    pub fn close(&mut self) -> bool {
        self.pos = 0;
        self.len = 0;
        self.file.take().is_some()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of `fill` calls that reached the file
    pub fn refills(&self) -> u64 {
        self.refills
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ByteReader::open(dir.path().join("nope.log"), 16).unwrap_err();
        match err {
            FastFileError::Open { source, .. } => assert_eq!(source.kind(), ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ByteReader::open(dir.path(), 16).unwrap_err();
        assert!(matches!(err, FastFileError::NotAFile { .. }));
    }

    #[test]
    fn fills_in_fixed_windows() {
        let file = fixture(b"0123456789");
        let mut reader = ByteReader::open(file.path(), 4).unwrap();

        assert_eq!(reader.fill().unwrap(), (4, false));
        assert_eq!(reader.available(), b"0123");
        reader.consume(3);
        assert_eq!(reader.available(), b"3");
        assert_eq!(reader.offset(), 3);

        reader.consume(1);
        assert_eq!(reader.fill().unwrap(), (4, false));
        assert_eq!(reader.available(), b"4567");
        assert_eq!(reader.offset(), 4);

        reader.consume(4);
        assert_eq!(reader.fill().unwrap(), (2, false));
        reader.consume(2);
        assert_eq!(reader.fill().unwrap(), (0, true));
        assert!(reader.is_eof());
        assert_eq!(reader.refills(), 4);
        assert_eq!(reader.bytes_consumed(), 10);
    }

    #[test]
    fn close_is_idempotent() {
        let file = fixture(b"abc");
        let mut reader = ByteReader::open(file.path(), 4).unwrap();
        assert!(reader.close());
        assert!(!reader.close());
        assert!(matches!(
            reader.fill(),
            Err(FastFileError::UseAfterClose { .. })
        ));
    }

    #[test]
    fn seek_reacquires_released_handle() {
        let file = fixture(b"hello world");
        let mut reader = ByteReader::open(file.path(), 32).unwrap();
        reader.close();

        reader.seek_to(6).unwrap();
        assert!(reader.is_open());
        assert_eq!(reader.fill().unwrap(), (5, false));
        assert_eq!(reader.available(), b"world");
        assert_eq!(reader.offset(), 6);
    }

    #[test]
    fn reopen_starts_over() {
        let file = fixture(b"abcdef");
        let mut reader = ByteReader::open(file.path(), 4).unwrap();
        reader.fill().unwrap();
        reader.consume(4);
        reader.fill().unwrap();
        reader.consume(2);
        reader.fill().unwrap();
        assert!(reader.is_eof());
        reader.close();

        reader.reopen().unwrap();
        assert!(reader.is_open());
        assert!(!reader.is_eof());
        assert_eq!(reader.offset(), 0);
        assert_eq!(reader.fill().unwrap(), (4, false));
        assert_eq!(reader.available(), b"abcd");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn read_error_releases_handle() {
        // Regular file whose offset 0 is never mapped, so reads fail with EIO
        let mut reader = ByteReader::open("/proc/self/mem", 64).unwrap();
        let err = reader.fill().unwrap_err();
        assert!(matches!(err, FastFileError::Read { .. }));
        assert!(!reader.is_open());
        assert!(matches!(
            reader.fill(),
            Err(FastFileError::UseAfterClose { .. })
        ));
    }
}
