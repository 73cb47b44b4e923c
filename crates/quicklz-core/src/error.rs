//! QuickLZ error types

use thiserror::Error;

/// QuickLZ error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Output capacity exceeded: buffer holds {capacity} bytes")]
    CapacityExceeded { capacity: usize },

    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    #[error("Invalid magic number")]
    InvalidMagic,

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// QuickLZ result type
pub type Result<T> = std::result::Result<T, Error>;
