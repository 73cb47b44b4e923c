//! QuickLZ - byte-oriented LZ77 compression
//!
//! A single-pass dictionary coder: a 4096-slot hash table proposes earlier
//! occurrences of the next few bytes, and the output is a stream of
//! literals, back-references and run records grouped under 8-bit control
//! bytes. There is no entropy stage.
//!
//! ## Layers
//!
//! - **Raw stream** ([`compress`], [`decompress`]): the bare token stream.
//!   The caller keeps the original length; output never exceeds
//!   [`worst_case`] bytes.
//! - **Frame** ([`compress_frame`], [`decompress_frame`]): self-describing
//!   container with block sizes and an optional CRC32C.
//!
//! ```rust
//! let data = b"abcabcabcabcabcabcabcabc";
//! let raw = quicklz_core::compress(data)?;
//! assert_eq!(quicklz_core::decompress(&raw, data.len())?, data);
//!
//! let framed = quicklz_core::compress_frame(data, &Default::default())?;
//! assert_eq!(quicklz_core::decompress_frame(&framed)?, data);
//! # Ok::<(), quicklz_core::Error>(())
//! ```

mod compress;
mod decompress;
pub mod error;
pub mod frame;
pub mod token;

pub use compress::{compress, compress_to, worst_case, CompressStats, Compressor};
pub use decompress::{decompress, decompress_to};
pub use error::{Error, Result};
pub use frame::{
    compress_frame, compress_frame_to, decompress_frame, decompress_frame_to, Flags,
    FrameHeader, DEFAULT_BLOCK_SIZE, MAGIC, MAX_BLOCK_SIZE, VERSION,
};
pub use token::{tokens, MatchForm, Token, Tokens};

/// Compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// No compression, just framing
    Stored = 0,
    /// QuickLZ token stream (default)
    #[default]
    Fast = 1,
}

/// Frame options
#[derive(Debug, Clone)]
pub struct Options {
    /// Compression level
    pub level: Level,
    /// Append a CRC32C of the original data
    pub checksum: bool,
    /// Bytes per independently compressed block
    pub block_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            level: Level::default(),
            checksum: true,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidOptions(format!(
                "block size must be between 1 and {} bytes, got {}",
                MAX_BLOCK_SIZE, self.block_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_empty() {
        let data = b"";
        let compressed = compress(data).unwrap();
        let decompressed = decompress(&compressed, data.len()).unwrap();
        assert_eq!(data.as_slice(), decompressed.as_slice());
    }

    #[test]
    fn test_roundtrip_small() {
        let data = b"Hello, QuickLZ!";
        let compressed = compress(data).unwrap();
        let decompressed = decompress(&compressed, data.len()).unwrap();
        assert_eq!(data.as_slice(), decompressed.as_slice());
    }

    #[test]
    fn test_roundtrip_repeated() {
        let data = b"abcdabcdabcdabcdabcdabcdabcdabcd";
        let compressed = compress(data).unwrap();
        let decompressed = decompress(&compressed, data.len()).unwrap();
        assert_eq!(data.as_slice(), decompressed.as_slice());
        // Repeated data should compress well
        assert!(compressed.len() < data.len());
    }

    #[test]
    fn test_period_three_stays_literal() {
        // every candidate sits 3 back, below the minimum offset
        let data = b"abcabcabcabcabcabcabcabcabcabc";
        let compressed = compress(data).unwrap();
        assert_eq!(compressed.len(), worst_case(data.len()));
        assert_eq!(decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_large() {
        let data: Vec<u8> = (0..10000).map(|i| (i % 256) as u8).collect();
        let compressed = compress(&data).unwrap();
        let decompressed = decompress(&compressed, data.len()).unwrap();
        assert_eq!(data, decompressed);
    }

    #[test]
    fn test_roundtrip_json() {
        let data = br#"{"id":123,"name":"test","data":[1,2,3],"nested":{"key":"value"}}"#;
        let compressed = compress(data).unwrap();
        let decompressed = decompress(&compressed, data.len()).unwrap();
        assert_eq!(data.as_slice(), decompressed.as_slice());
    }

    #[test]
    fn test_frame_level_stored() {
        let data = b"test data";
        let opts = Options {
            level: Level::Stored,
            checksum: false,
            ..Options::default()
        };
        let compressed = compress_frame(data, &opts).unwrap();
        let decompressed = decompress_frame(&compressed).unwrap();
        assert_eq!(data.as_slice(), decompressed.as_slice());
    }

    #[test]
    fn test_invalid_options() {
        for block_size in [0, MAX_BLOCK_SIZE + 1] {
            let opts = Options {
                block_size,
                ..Options::default()
            };
            assert!(matches!(
                compress_frame(b"x", &opts),
                Err(Error::InvalidOptions(_))
            ));
        }
    }
}
