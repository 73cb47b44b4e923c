//! Frame format for QuickLZ
//!
//! The raw stream carries no length, so the frame records it per block and
//! can seal the whole payload with a checksum.
//!
//! ```text
//! ┌──────────┬─────────┬───────┬────────────┬────────────┬──────────────┐
//! │ Magic    │ Version │ Flags │ Blocks...  │ End marker │ CRC32C       │
//! │ 4 bytes  │ 1 byte  │ 1 byte│            │ 2 bytes    │ if CHECKSUM  │
//! └──────────┴─────────┴───────┴────────────┴────────────┴──────────────┘
//!
//! Block format:
//! ┌─────────────────┬─────────────────┬──────────────┐
//! │ Compressed Size │ Original Size   │ Data         │
//! │ varint          │ varint          │ N bytes      │
//! └─────────────────┴─────────────────┴──────────────┘
//!
//! End marker: Compressed Size = 0, Original Size = 0
//! Compressed Size == Original Size: block stored uncompressed
//! ```

use bitflags::bitflags;

use crate::compress::{worst_case, Compressor};
use crate::decompress::decompress_to;
use crate::{Error, Level, Options, Result};

/// Magic bytes: "QLZF"
pub const MAGIC: [u8; 4] = *b"QLZF";

/// Current format version
pub const VERSION: u8 = 1;

/// Default block size (1MB)
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 20;

/// Largest block a reader accepts (16MB)
pub const MAX_BLOCK_SIZE: usize = 16 << 20;

bitflags! {
    /// Frame flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        /// CRC32C of the original data follows the end marker
        const CHECKSUM = 0b0000_0001;
    }
}

/// Frame header
#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub version: u8,
    pub flags: Flags,
}

impl FrameHeader {
    pub const SIZE: usize = 6; // magic(4) + version(1) + flags(1)

    pub fn new(flags: Flags) -> Self {
        Self {
            version: VERSION,
            flags,
        }
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&MAGIC);
        buf.push(self.version);
        buf.push(self.flags.bits());
    }

    pub fn read_from(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::InvalidFrame("header too short".into()));
        }
        if buf[0..4] != MAGIC {
            return Err(Error::InvalidMagic);
        }
        let version = buf[4];
        if version == 0 || version > VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let flags = Flags::from_bits(buf[5])
            .ok_or_else(|| Error::InvalidFrame(format!("unknown flags {:#04x}", buf[5])))?;
        Ok(Self { version, flags })
    }
}

/// Write a varint
pub fn write_varint(mut value: usize, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Read a varint from buffer, return (value, bytes_read)
pub fn read_varint(buf: &[u8]) -> Result<(usize, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        // the tenth byte holds only bit 63
        if shift == 63 && byte > 1 {
            return Err(Error::InvalidFrame("varint overflows 64 bits".into()));
        }
        value |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            let value = usize::try_from(value)
                .map_err(|_| Error::InvalidFrame("varint overflows usize".into()))?;
            return Ok((value, i + 1));
        }

        shift += 7;
    }

    Err(Error::InvalidFrame("varint truncated".into()))
}

/// Block header: compressed_size, original_size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub compressed_size: usize,
    pub original_size: usize,
}

impl BlockHeader {
    pub const END: Self = Self {
        compressed_size: 0,
        original_size: 0,
    };

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        write_varint(self.compressed_size, buf);
        write_varint(self.original_size, buf);
    }

    /// Read block header, return (header, bytes_read)
    pub fn read_from(buf: &[u8]) -> Result<(Self, usize)> {
        let (compressed_size, n1) = read_varint(buf)?;
        let (original_size, n2) = read_varint(&buf[n1..])?;
        Ok((
            Self {
                compressed_size,
                original_size,
            },
            n1 + n2,
        ))
    }

    /// Check if this is end marker
    pub fn is_end(&self) -> bool {
        self.compressed_size == 0
    }

    pub fn is_stored(&self) -> bool {
        self.compressed_size == self.original_size
    }
}

/// Compress `input` into a new frame
pub fn compress_frame(input: &[u8], opts: &Options) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(input.len() / 2 + 16);
    compress_frame_to(input, &mut output, opts)?;
    Ok(output)
}

/// Append a frame holding `input` to `output`
pub fn compress_frame_to(input: &[u8], output: &mut Vec<u8>, opts: &Options) -> Result<()> {
    opts.validate()?;

    let start = output.len();
    let flags = if opts.checksum {
        Flags::CHECKSUM
    } else {
        Flags::empty()
    };
    FrameHeader::new(flags).write_to(output);

    let mut compressor = Compressor::new();
    let mut scratch = Vec::new();
    let mut blocks = 0;
    for block in input.chunks(opts.block_size) {
        write_block(&mut compressor, &mut scratch, block, opts.level, output)?;
        blocks += 1;
    }

    BlockHeader::END.write_to(output);

    if opts.checksum {
        output.extend_from_slice(&crc32c::crc32c(input).to_le_bytes());
    }

    log::debug!(
        "framed {} bytes into {} bytes ({} blocks, {:?})",
        input.len(),
        output.len() - start,
        blocks,
        opts.level
    );

    Ok(())
}

fn write_block(
    compressor: &mut Compressor,
    scratch: &mut Vec<u8>,
    block: &[u8],
    level: Level,
    output: &mut Vec<u8>,
) -> Result<()> {
    let data = match level {
        Level::Stored => block,
        Level::Fast => {
            scratch.resize(worst_case(block.len()), 0);
            let size = compressor.compress_to(block, scratch)?;
            // Store uncompressed unless it actually shrank
            if size < block.len() {
                &scratch[..size]
            } else {
                block
            }
        }
    };

    log::trace!("block {} -> {} bytes", block.len(), data.len());

    BlockHeader {
        compressed_size: data.len(),
        original_size: block.len(),
    }
    .write_to(output);
    output.extend_from_slice(data);

    Ok(())
}

/// Decompress a frame
pub fn decompress_frame(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    decompress_frame_to(input, &mut output)?;
    Ok(output)
}

/// Decompress a frame, appending to `output`
pub fn decompress_frame_to(input: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let header = FrameHeader::read_from(input)?;
    let start = output.len();
    let mut pos = FrameHeader::SIZE;

    loop {
        let (block, header_size) = BlockHeader::read_from(&input[pos..])?;
        pos += header_size;

        if block.is_end() {
            if block.original_size != 0 {
                return Err(Error::InvalidFrame("malformed end marker".into()));
            }
            break;
        }

        if block.original_size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidFrame(format!(
                "block of {} bytes exceeds the {} byte limit",
                block.original_size, MAX_BLOCK_SIZE
            )));
        }
        if block.compressed_size > block.original_size {
            return Err(Error::InvalidFrame("compressed block larger than original".into()));
        }

        let data = input
            .get(pos..pos + block.compressed_size)
            .ok_or_else(|| Error::InvalidFrame("block truncated".into()))?;
        pos += block.compressed_size;

        if block.is_stored() {
            output.extend_from_slice(data);
        } else {
            let offset = output.len();
            output.resize(offset + block.original_size, 0);
            decompress_to(data, &mut output[offset..]).map_err(|e| match e {
                Error::CapacityExceeded { .. } => Error::CorruptStream(format!(
                    "block decodes to more than its {} bytes or carries trailing bytes",
                    block.original_size
                )),
                e => e,
            })?;
        }
    }

    if header.flags.contains(Flags::CHECKSUM) {
        let bytes = input
            .get(pos..pos + 4)
            .ok_or_else(|| Error::InvalidFrame("checksum truncated".into()))?;
        let expected = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let actual = crc32c::crc32c(&output[start..]);
        if expected != actual {
            return Err(Error::ChecksumMismatch { expected, actual });
        }
        pos += 4;
    }

    if pos != input.len() {
        return Err(Error::InvalidFrame(format!(
            "{} trailing bytes after frame",
            input.len() - pos
        )));
    }

    log::debug!(
        "unframed {} bytes into {} bytes",
        input.len(),
        output.len() - start
    );

    Ok(())
}
