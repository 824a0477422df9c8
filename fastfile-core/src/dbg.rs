//! Diagnostics collaborator.
//!
//! The engine reports what it does (refills, cache traffic, rewinds) as
//! [`Event`]s handed to a [`Diagnostics`] sink. The sink is supplied by the
//! application; the engine never picks a logging backend on its own. Events
//! are filtered by the [`DebugLevel`] mask set in the configuration before
//! they reach the sink, so a cursor with the default `OFF` level does no
//! formatting work at all.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use crate::err::FastFileError;

/// Environment variable consulted by [`DebugLevel::from_env`]
pub const DEBUG_LEVEL_ENV: &str = "FASTFILE_DEBUG_LEVEL";

/// Severity of a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Failures surfaced to the caller
    Error,
    /// Coarse progress: opens, refills, rewinds, closes
    Info,
    /// One event per line: cache hits, misses and evictions
    Trace,
}

impl Level {
    /// Bit this level occupies in a [`DebugLevel`] mask
    pub const fn bit(self) -> u32 {
        match self {
            Level::Error => 1,
            Level::Info => 4,
            Level::Trace => 8,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "error",
            Level::Info => "info",
            Level::Trace => "trace",
        })
    }
}

/// Bitmask selecting which [`Level`]s reach the sink
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DebugLevel(u32);

impl DebugLevel {
    pub const OFF: DebugLevel = DebugLevel(0);
    pub const ERROR: DebugLevel = DebugLevel(Level::Error.bit());
    pub const INFO: DebugLevel = DebugLevel(Level::Error.bit() | Level::Info.bit());
    pub const ALL: DebugLevel =
        DebugLevel(Level::Error.bit() | Level::Info.bit() | Level::Trace.bit());

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn enables(self, level: Level) -> bool {
        self.0 & level.bit() != 0
    }

    /// Parse either a raw mask (`"13"`) or a level name (`"info"`)
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(bits) = value.parse::<u32>() {
            return Some(Self(bits));
        }
        match value.to_ascii_lowercase().as_str() {
            "off" | "none" => Some(Self::OFF),
            "error" => Some(Self::ERROR),
            "info" => Some(Self::INFO),
            "trace" | "all" => Some(Self::ALL),
            _ => None,
        }
    }

    /// Read the level from `FASTFILE_DEBUG_LEVEL`, falling back to `OFF`.
    ///
    /// Meant for the application wiring a process-wide default into
    /// [`FastFileConfig`](crate::FastFileConfig); the engine itself only ever
    /// looks at the configured value.
    pub fn from_env() -> Self {
        std::env::var(DEBUG_LEVEL_ENV)
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or(Self::OFF)
    }
}

/// Something the engine did
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    Opened { path: &'a Path, buffer_size: usize },
    Refill { bytes: usize, eof: bool },
    CacheHit { index: u64 },
    CacheMiss { index: u64 },
    Evicted { index: u64 },
    /// Scan restarted from the beginning of the file
    Rewind { target: u64 },
    /// Scan repositioned through the offset index
    Seek { index: u64, offset: u64 },
    DecodeRecovered { index: u64, offset: usize },
    Exhausted { lines: u64 },
    Closed { path: &'a Path },
    Failed { error: &'a FastFileError },
}

impl Event<'_> {
    pub fn level(&self) -> Level {
        match self {
            Event::Failed { .. } => Level::Error,
            Event::CacheHit { .. } | Event::CacheMiss { .. } | Event::Evicted { .. } => {
                Level::Trace
            }
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Opened { path, buffer_size } => {
                write!(f, "opened {} with a {buffer_size} byte buffer", path.display())
            }
            Event::Refill { bytes, eof } => write!(f, "refill read {bytes} bytes (eof={eof})"),
            Event::CacheHit { index } => write!(f, "cache hit for line {index}"),
            Event::CacheMiss { index } => write!(f, "cache miss for line {index}"),
            Event::Evicted { index } => write!(f, "evicted line {index}"),
            Event::Rewind { target } => write!(f, "rewinding to reach line {target}"),
            Event::Seek { index, offset } => write!(f, "seek to line {index} at byte {offset}"),
            Event::DecodeRecovered { index, offset } => {
                write!(f, "recovered invalid UTF-8 in line {index} at byte {offset}")
            }
            Event::Exhausted { lines } => write!(f, "end of file after {lines} lines"),
            Event::Closed { path } => write!(f, "closed {}", path.display()),
            Event::Failed { error } => write!(f, "{error}"),
        }
    }
}

/// Receiver for engine events, supplied by the surrounding application
pub trait Diagnostics: Send {
    fn record(&mut self, level: Level, event: &Event<'_>);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl Diagnostics for NoopSink {
    fn record(&mut self, _level: Level, _event: &Event<'_>) {}
}

/// Sink writing one `[level] message` line per event
#[derive(Debug)]
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> Diagnostics for WriterSink<W> {
    fn record(&mut self, level: Level, event: &Event<'_>) {
        // A broken diagnostics channel must not fail the scan
        let _ = writeln!(self.writer, "[{level}] {event}");
    }
}

/// Event counters, shareable through `Arc<Mutex<_>>`
#[cfg(feature = "rt-feedback")]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeFeedback {
    pub opens: u64,
    pub refills: u64,
    pub bytes_read: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub rewinds: u64,
    pub seeks: u64,
    pub decode_recoveries: u64,
    pub errors: u64,
    pub closes: u64,
}

#[cfg(feature = "rt-feedback")]
impl Diagnostics for RuntimeFeedback {
    fn record(&mut self, _level: Level, event: &Event<'_>) {
        match *event {
            Event::Opened { .. } => self.opens += 1,
            Event::Refill { bytes, .. } => {
                self.refills += 1;
                self.bytes_read += bytes as u64;
            }
            Event::CacheHit { .. } => self.cache_hits += 1,
            Event::CacheMiss { .. } => self.cache_misses += 1,
            Event::Evicted { .. } => self.evictions += 1,
            Event::Rewind { .. } => self.rewinds += 1,
            Event::Seek { .. } => self.seeks += 1,
            Event::DecodeRecovered { .. } => self.decode_recoveries += 1,
            Event::Failed { .. } => self.errors += 1,
            Event::Closed { .. } => self.closes += 1,
            Event::Exhausted { .. } => {}
        }
    }
}

#[cfg(feature = "rt-feedback")]
impl Diagnostics for std::sync::Arc<std::sync::Mutex<RuntimeFeedback>> {
    fn record(&mut self, level: Level, event: &Event<'_>) {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .record(level, event);
    }
}

/// Sink forwarding events to `tracing` under the `fastfile` target
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[cfg(feature = "tracing")]
impl Diagnostics for TracingSink {
    fn record(&mut self, level: Level, event: &Event<'_>) {
        match level {
            Level::Error => tracing::error!(target: "fastfile", "{event}"),
            Level::Info => tracing::debug!(target: "fastfile", "{event}"),
            Level::Trace => tracing::trace!(target: "fastfile", "{event}"),
        }
    }
}

/// Level filter plus optional sink, owned by one cursor
pub(crate) struct Tracer {
    level: DebugLevel,
    sink: Option<Box<dyn Diagnostics>>,
}

impl Tracer {
    pub(crate) fn new(level: DebugLevel) -> Self {
        Self { level, sink: None }
    }

    pub(crate) fn set_sink(&mut self, sink: Box<dyn Diagnostics>) {
        self.sink = Some(sink);
    }

    #[inline]
    pub(crate) fn emit(&mut self, event: Event<'_>) {
        let level = event.level();
        if !self.level.enables(level) {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.record(level, &event);
        }
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("level", &self.level)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
