use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while opening or scanning a file
#[derive(Error, Debug)]
pub enum FastFileError {
    #[error("cannot open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{}' is not a regular file", path.display())]
    NotAFile { path: PathBuf },

    #[error("read failed on '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Only raised under [`DecodePolicy::Strict`](crate::DecodePolicy::Strict)
    #[error("invalid UTF-8 in line {index} at byte {offset}")]
    Decode { index: u64, offset: usize },

    #[error("'{}' was already closed", path.display())]
    UseAfterClose { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FastFileError>;
