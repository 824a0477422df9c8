#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dbg::DebugLevel;
use crate::err::{FastFileError, Result};
use crate::spl::DecodePolicy;

/// Raw buffer size used when none is given (128 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Number of decoded lines kept in the cache by default
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Construction-time settings for a [`FastFile`](crate::FastFile)
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastFileConfig {
    /// Capacity of the raw read buffer in bytes
    pub buffer_size: usize,
    /// Maximum number of lines held by the cache, 0 disables it
    pub cache_capacity: usize,
    pub decode_policy: DecodePolicy,
    pub debug_level: DebugLevel,
    /// Also strip a `\r` sitting right before the `\n`
    pub strip_carriage_return: bool,
    /// Keep the line ending in the decoded text
    pub keep_terminator: bool,
    /// Keep cached lines when the cursor is restarted
    pub retain_cache_on_restart: bool,
    /// Record the start offset of every line so evicted lines can be
    /// reached by seeking instead of rescanning from the start
    pub track_offsets: bool,
}

impl Default for FastFileConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            decode_policy: DecodePolicy::default(),
            debug_level: DebugLevel::OFF,
            strip_carriage_return: false,
            keep_terminator: false,
            retain_cache_on_restart: true,
            track_offsets: false,
        }
    }
}

impl FastFileConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn with_decode_policy(mut self, decode_policy: DecodePolicy) -> Self {
        self.decode_policy = decode_policy;
        self
    }

    pub fn with_debug_level(mut self, debug_level: DebugLevel) -> Self {
        self.debug_level = debug_level;
        self
    }

    pub fn with_strip_carriage_return(mut self, strip: bool) -> Self {
        self.strip_carriage_return = strip;
        self
    }

    pub fn with_keep_terminator(mut self, keep: bool) -> Self {
        self.keep_terminator = keep;
        self
    }

    pub fn with_retain_cache_on_restart(mut self, retain: bool) -> Self {
        self.retain_cache_on_restart = retain;
        self
    }

    pub fn with_track_offsets(mut self, track: bool) -> Self {
        self.track_offsets = track;
        self
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(FastFileError::InvalidConfig(
                "buffer_size must be at least one byte".into(),
            ));
        }
        Ok(())
    }
}
