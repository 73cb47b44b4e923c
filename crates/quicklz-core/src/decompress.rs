//! QuickLZ decompression

use crate::token::{Token, Tokens};
use crate::{Error, Result};

/// Decompress a raw stream whose decoded size is `original_len`
pub fn decompress(input: &[u8], original_len: usize) -> Result<Vec<u8>> {
    let mut output = vec![0; original_len];
    decompress_to(input, &mut output)?;
    Ok(output)
}

/// Decompress into `output`, which must be exactly the decoded size
///
/// Returns bytes written. Malformed input fails with `CorruptStream`
/// instead of reading or writing out of bounds; a stream that still has
/// units left once `output` is full fails with `CapacityExceeded`.
pub fn decompress_to(input: &[u8], output: &mut [u8]) -> Result<usize> {
    let mut tokens = Tokens::new(input, output.len())?;
    let mut pos = 0;

    for token in tokens.by_ref() {
        match token? {
            Token::Literal(byte) => {
                output[pos] = byte;
                pos += 1;
            }
            Token::Match { offset, len, .. } => {
                expand(output, pos, offset, len);
                pos += len;
            }
            Token::Run { value, len } => {
                output[pos..pos + len].fill(value);
                pos += len;
            }
        }
    }

    if tokens.consumed() < input.len() {
        log::trace!(
            "{} bytes left over after decoding {} bytes",
            input.len() - tokens.consumed(),
            pos
        );
        return Err(Error::CapacityExceeded {
            capacity: output.len(),
        });
    }

    Ok(pos)
}

/// Copy `len` bytes from `offset` back to `to`
///
/// When the source runs into the destination the copy goes byte by byte,
/// so a short period repeats across the whole length.
#[inline]
fn expand(buf: &mut [u8], to: usize, offset: usize, len: usize) {
    let from = to - offset;
    if from + len > to {
        for i in 0..len {
            buf[to + i] = buf[from + i];
        }
    } else {
        buf.copy_within(from..from + len, to);
    }
}
