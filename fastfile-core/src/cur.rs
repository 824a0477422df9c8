#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::brd::ByteReader;
use crate::cfg::FastFileConfig;
use crate::clo::LineOffsets;
use crate::dbg::{Diagnostics, Event, Tracer};
use crate::err::{FastFileError, Result};
use crate::lch::LineCache;
use crate::lin::Line;
use crate::spl::{self, InvalidUtf8, LineSplitter};

/// Lifecycle of a [`FastFile`]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    Open,
    /// Every line has been returned; `restart` goes back to `Open`
    Exhausted,
    /// Closed explicitly or after a fatal error
    Closed,
}

/// Counters describing the work a cursor has done
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    pub refills: u64,
    pub bytes_consumed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    /// Lines decoded, counting lines decoded again after a rewind
    pub lines_produced: u64,
    pub rewinds: u64,
    pub seeks: u64,
}

/// Capabilities a host-language adapter forwards to
pub trait LineSource: Sized {
    fn open(path: &Path) -> Result<Self>;

    /// Next line, `None` once exhausted
    fn next_line(&mut self) -> Result<Option<Line>>;

    fn close(&mut self);
}

/// Lazy, restartable sequence of the lines of one file
///
/// Lines come back in file order. Each request first checks the LRU cache
/// and the most recently produced line; only a miss drives the
/// splitter and, through it, file I/O. [`get_line`](Self::get_line) reads
/// any index through the same cache. Indices behind the scan position that
/// were evicted are reached again by seeking (with `track_offsets`) or by
/// rescanning from the start of the file.
///
/// The file handle is released on [`close`](Self::close), on drop, on a
/// fatal error, and as soon as the end of the file is reached.
///
/// ```no_run
/// use fastfile_core::{FastFile, FastFileConfig};
///
/// let config = FastFileConfig::default().with_cache_capacity(3);
/// let mut file = FastFile::with_config("app.log", config)?;
/// while let Some(line) = file.next_line()? {
///     println!("{}: {}", line.index(), line);
/// }
/// file.close();
/// # Ok::<(), fastfile_core::FastFileError>(())
/// ```
#[derive(Debug)]
pub struct FastFile {
    config: FastFileConfig,
    splitter: LineSplitter,
    cache: LineCache,
    offsets: Option<LineOffsets>,
    tracer: Tracer,
    state: CursorState,
    // Index next_line() returns next
    next_index: u64,
    // Index the splitter produces next
    scan_index: u64,
    // Known once the end of the file has been seen
    total: Option<u64>,
    last: Option<Line>,
    stats: CursorStats,
    iter_failed: bool,
}

impl FastFile {
    /// Open `path` with the default configuration
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(path, FastFileConfig::default())
    }

    pub fn with_config(path: impl AsRef<Path>, config: FastFileConfig) -> Result<Self> {
        Self::build(path.as_ref(), config, None)
    }

    /// Open with a diagnostics sink receiving the events enabled by
    /// `config.debug_level`
    pub fn with_diagnostics(
        path: impl AsRef<Path>,
        config: FastFileConfig,
        sink: impl Diagnostics + 'static,
    ) -> Result<Self> {
        Self::build(path.as_ref(), config, Some(Box::new(sink)))
    }

    fn build(
        path: &Path,
        config: FastFileConfig,
        sink: Option<Box<dyn Diagnostics>>,
    ) -> Result<Self> {
        let mut tracer = Tracer::new(config.debug_level);
        if let Some(sink) = sink {
            tracer.set_sink(sink);
        }

        let reader = config
            .validate()
            .and_then(|()| ByteReader::open(path, config.buffer_size));
        let reader = match reader {
            Ok(reader) => reader,
            Err(error) => {
                tracer.emit(Event::Failed { error: &error });
                return Err(error);
            }
        };
        tracer.emit(Event::Opened {
            path,
            buffer_size: config.buffer_size,
        });

        Ok(Self {
            cache: LineCache::new(config.cache_capacity),
            offsets: config.track_offsets.then(LineOffsets::new),
            splitter: LineSplitter::new(reader),
            config,
            tracer,
            state: CursorState::Open,
            next_index: 0,
            scan_index: 0,
            total: None,
            last: None,
            stats: CursorStats::default(),
            iter_failed: false,
        })
    }

    /// Whether another line follows. May read that line ahead; it is kept
    /// so the following [`next_line`](Self::next_line) does no extra I/O.
    pub fn has_next(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_some())
    }

    /// Next line in file order, `None` once the file is exhausted
    pub fn next_line(&mut self) -> Result<Option<Line>> {
        match self.state {
            CursorState::Closed => return Err(self.use_after_close()),
            CursorState::Exhausted => return Ok(None),
            CursorState::Open => {}
        }
        match self.fetch(self.next_index)? {
            Some(line) => {
                self.next_index += 1;
                Ok(Some(line))
            }
            None => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
        }
    }

    /// The line `next_line` would return, without advancing
    pub fn peek(&mut self) -> Result<Option<Line>> {
        match self.state {
            CursorState::Closed => Err(self.use_after_close()),
            CursorState::Exhausted => Ok(None),
            CursorState::Open => self.fetch(self.next_index),
        }
    }

    /// Random access by ordinal index; `None` past the last line.
    ///
    /// Shares the cache with forward iteration and leaves the iteration
    /// position untouched.
    pub fn get_line(&mut self, index: u64) -> Result<Option<Line>> {
        if self.state == CursorState::Closed {
            return Err(self.use_after_close());
        }
        self.fetch(index)
    }

    /// Up to `count` upcoming lines, without advancing.
    ///
    /// Lines beyond the cache capacity get evicted again before the cursor
    /// reaches them, so keep `count` within it.
    #[cfg(feature = "view")]
    pub fn lookahead(&mut self, count: usize) -> Result<Vec<Line>> {
        match self.state {
            CursorState::Closed => return Err(self.use_after_close()),
            CursorState::Exhausted => return Ok(Vec::new()),
            CursorState::Open => {}
        }
        let mut lines = Vec::with_capacity(count.min(self.cache.capacity().max(1)));
        let start = self.next_index;
        for index in start..start.saturating_add(count as u64) {
            match self.fetch(index)? {
                Some(line) => lines.push(line),
                None => break,
            }
        }
        Ok(lines)
    }

    /// [`lookahead`](Self::lookahead) joined with `\n`
    #[cfg(feature = "view")]
    pub fn view_lines(&mut self, count: usize) -> Result<String> {
        let lines = self.lookahead(count)?;
        Ok(lines.iter().map(Line::text).collect::<Vec<_>>().join("\n"))
    }

    /// Go back to the first line, reopening the file at offset 0.
    ///
    /// Cached lines survive unless `retain_cache_on_restart` is off.
    pub fn restart(&mut self) -> Result<()> {
        if self.state == CursorState::Closed {
            return Err(self.use_after_close());
        }
        if !self.config.retain_cache_on_restart {
            self.cache.clear();
            self.last = None;
        }
        if let Err(error) = self.splitter.rewind() {
            return Err(self.fail(error));
        }
        self.scan_index = 0;
        self.next_index = 0;
        self.state = CursorState::Open;
        self.stats.rewinds += 1;
        self.tracer.emit(Event::Rewind { target: 0 });
        Ok(())
    }

    /// Release the file handle. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.splitter.close();
        self.state = CursorState::Closed;
        self.tracer.emit(Event::Closed {
            path: self.splitter.reader().path(),
        });
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Index of the line `next_line` returns next
    pub fn position(&self) -> u64 {
        self.next_index
    }

    /// Total number of lines, once the end of the file has been seen
    pub fn line_count(&self) -> Option<u64> {
        self.total
    }

    pub fn path(&self) -> &Path {
        self.splitter.reader().path()
    }

    pub fn config(&self) -> &FastFileConfig {
        &self.config
    }

    pub fn cache(&self) -> &LineCache {
        &self.cache
    }

    pub fn stats(&self) -> CursorStats {
        let reader = self.splitter.reader();
        CursorStats {
            refills: reader.refills(),
            bytes_consumed: reader.bytes_consumed(),
            ..self.stats
        }
    }

    fn fetch(&mut self, index: u64) -> Result<Option<Line>> {
        if self.total.is_some_and(|total| index >= total) {
            return Ok(None);
        }
        if let Some(line) = self.cache.get(index) {
            self.stats.cache_hits += 1;
            self.tracer.emit(Event::CacheHit { index });
            return Ok(Some(line));
        }
        // Only reached for a line the cache cannot hold, e.g. capacity 0
        if let Some(line) = self.last.as_ref().filter(|line| line.index() == index) {
            return Ok(Some(line.clone()));
        }
        self.stats.cache_misses += 1;
        self.tracer.emit(Event::CacheMiss { index });

        if index != self.scan_index {
            self.reposition(index)?;
        }
        loop {
            match self.produce()? {
                Some(line) if line.index() == index => return Ok(Some(line)),
                Some(_) => {}
                None => return Ok(None),
            }
        }
    }

    // Seek straight to `index` when its start is known. Otherwise rescan
    // from byte 0 if it is behind the scan, or keep reading forward.
    fn reposition(&mut self, index: u64) -> Result<()> {
        let known = self.offsets.as_ref().and_then(|o| o.start_of(index));
        let (scan_index, offset) = match known {
            Some(offset) => {
                self.stats.seeks += 1;
                self.tracer.emit(Event::Seek { index, offset });
                (index, offset)
            }
            None if index > self.scan_index => return Ok(()),
            None => {
                self.stats.rewinds += 1;
                self.tracer.emit(Event::Rewind { target: index });
                (0, 0)
            }
        };
        if let Err(error) = self.splitter.seek(offset) {
            return Err(self.fail(error));
        }
        self.scan_index = scan_index;
        Ok(())
    }

    fn produce(&mut self) -> Result<Option<Line>> {
        let tracer = &mut self.tracer;
        let raw = self
            .splitter
            .next_raw_line_with(|bytes, eof| tracer.emit(Event::Refill { bytes, eof }));
        let raw = match raw {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.total = Some(self.scan_index);
                self.tracer.emit(Event::Exhausted {
                    lines: self.scan_index,
                });
                self.splitter.close();
                return Ok(None);
            }
            Err(error) => return Err(self.fail(error)),
        };

        let index = self.scan_index;
        let byte_len = raw.bytes.len();
        let mut bytes = raw.bytes;
        if !self.config.keep_terminator {
            spl::strip_terminator(&mut bytes, self.config.strip_carriage_return);
        }
        let decoded = match spl::decode(bytes, self.config.decode_policy) {
            Ok(decoded) => decoded,
            Err(InvalidUtf8 { offset }) => {
                return Err(self.fail(FastFileError::Decode { index, offset }));
            }
        };
        if let Some(offset) = decoded.first_invalid {
            self.tracer.emit(Event::DecodeRecovered { index, offset });
        }

        let line = Line::new(index, decoded.text, byte_len, raw.offset);
        self.scan_index += 1;
        self.stats.lines_produced += 1;
        if let Some(offsets) = self.offsets.as_mut() {
            offsets.record(index, raw.offset);
        }
        if let Some(evicted) = self.cache.put(index, line.clone()) {
            self.stats.evictions += 1;
            self.tracer.emit(Event::Evicted { index: evicted });
        }
        self.last = Some(line.clone());
        Ok(Some(line))
    }

    // Fatal errors close the cursor
    fn fail(&mut self, error: FastFileError) -> FastFileError {
        self.tracer.emit(Event::Failed { error: &error });
        self.splitter.close();
        self.state = CursorState::Closed;
        error
    }

    fn use_after_close(&self) -> FastFileError {
        FastFileError::UseAfterClose {
            path: self.path().to_path_buf(),
        }
    }
}

impl LineSource for FastFile {
    fn open(path: &Path) -> Result<Self> {
        FastFile::open(path)
    }

    fn next_line(&mut self) -> Result<Option<Line>> {
        FastFile::next_line(self)
    }

    fn close(&mut self) {
        FastFile::close(self)
    }
}

/// Yields `Err` once if the cursor fails or is used after close, then stops.
impl Iterator for FastFile {
    type Item = Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter_failed {
            return None;
        }
        match self.next_line() {
            Ok(line) => line.map(Ok),
            Err(error) => {
                self.iter_failed = true;
                Some(Err(error))
            }
        }
    }
}

impl Drop for FastFile {
    fn drop(&mut self) {
        self.close();
    }
}
