// Public modules
pub mod brd;
pub mod cfg;
pub mod clo;
pub mod cur;
pub mod dbg;
pub mod err;
pub mod lch;
pub mod lin;
pub mod spl;

// Re-export commonly used types for convenience
pub use brd::ByteReader;
pub use cfg::{DEFAULT_BUFFER_SIZE, DEFAULT_CACHE_CAPACITY, FastFileConfig};
pub use clo::LineOffsets;
pub use cur::{CursorState, CursorStats, FastFile, LineSource};
#[cfg(feature = "rt-feedback")]
pub use dbg::RuntimeFeedback;
#[cfg(feature = "tracing")]
pub use dbg::TracingSink;
pub use dbg::{DebugLevel, Diagnostics, Event, Level, NoopSink, WriterSink};
pub use err::{FastFileError, Result};
pub use lch::LineCache;
pub use lin::Line;
pub use spl::{DecodePolicy, LineSplitter, RawLine};
