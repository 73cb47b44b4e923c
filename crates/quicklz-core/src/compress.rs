//! QuickLZ compression
//!
//! Algorithm overview (one greedy pass, no backtracking):
//! 1. Five identical bytes start a run token
//! 2. Otherwise the hash table proposes the last position whose next bytes
//!    hashed alike; four matching bytes give a long match, three a short one
//! 3. Anything else is emitted as a literal
//!
//! Each unit adds one bit to the open control byte. The last few bytes are
//! always literals so that the run test and the hash probe never read past
//! the end of input.

use crate::token::{
    Token, HASH_SIZE, MAX_MATCH, MAX_OFFSET, MAX_RUN, MAX_TOKEN_LEN, MIN_MATCH, MIN_RUN,
    TAIL_GUARD,
};
use crate::{Error, Result};

/// Compressed size bound for `len` input bytes: every unit a literal, one
/// control byte per eight of them plus the first.
#[inline]
pub fn worst_case(len: usize) -> usize {
    len + len / 8 + 1
}

#[inline]
fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// 12-bit hash; only the low three bytes of `word` take part
#[inline]
fn hash(word: u32) -> usize {
    (((word >> 12) ^ word) & 0x0fff) as usize
}

/// Compress into a freshly allocated buffer
pub fn compress(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = vec![0; worst_case(input.len())];
    let size = compress_to(input, &mut output)?;
    output.truncate(size);
    Ok(output)
}

/// Compress into `output`, return bytes written
pub fn compress_to(input: &[u8], output: &mut [u8]) -> Result<usize> {
    Compressor::new().compress_to(input, output)
}

/// Unit counts from the last compression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressStats {
    pub literals: usize,
    pub matches: usize,
    pub runs: usize,
}

/// Reusable compressor owning the match-finder table
///
/// The table is reset on every call; nothing carries over between inputs.
pub struct Compressor {
    hash_table: Vec<usize>,
    stats: CompressStats,
}

impl Compressor {
    pub fn new() -> Self {
        Self {
            hash_table: vec![0; HASH_SIZE],
            stats: CompressStats::default(),
        }
    }

    /// Counts from the most recent call
    pub fn stats(&self) -> CompressStats {
        self.stats
    }

    /// Compress `input` into `output`, return bytes written
    ///
    /// `output` of `worst_case(input.len())` bytes always suffices; a
    /// smaller one fails with `CapacityExceeded` as soon as a write would
    /// not fit.
    pub fn compress_to(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.hash_table.fill(0);
        self.stats = CompressStats::default();

        let mut sink = Sink::new(output);
        let mut control = Control::open(&mut sink)?;
        let mut pos = 0;

        while pos + TAIL_GUARD < input.len() {
            let token = self.find_token(input, pos);
            self.emit(token, &mut sink, &mut control)?;
            pos += token.decoded_len();
        }

        for &byte in &input[pos..] {
            self.emit(Token::Literal(byte), &mut sink, &mut control)?;
        }

        control.close(&mut sink);

        log::debug!(
            "compressed {} -> {} bytes ({} literals, {} matches, {} runs)",
            input.len(),
            sink.pos,
            self.stats.literals,
            self.stats.matches,
            self.stats.runs
        );

        Ok(sink.pos)
    }

    /// Choose the unit starting at `pos`; at least `TAIL_GUARD + 1` bytes remain
    fn find_token(&mut self, input: &[u8], pos: usize) -> Token {
        let word = read_u32(input, pos);

        if word == read_u32(input, pos + 1) {
            let value = input[pos];
            let limit = (pos + MAX_RUN).min(input.len());
            let mut end = pos + MIN_RUN;
            while end < limit && input[end] == value {
                end += 1;
            }
            return Token::run(value, end - pos);
        }

        let slot = hash(word);
        let candidate = self.hash_table[slot];
        self.hash_table[slot] = pos;

        let offset = pos - candidate;
        if !(MIN_MATCH..MAX_OFFSET).contains(&offset) {
            return Token::Literal(input[pos]);
        }

        let prior = read_u32(input, candidate);
        if prior & 0x00ff_ffff != word & 0x00ff_ffff {
            return Token::Literal(input[pos]);
        }

        if prior != word {
            return Token::short_match(offset).unwrap_or(Token::Literal(input[pos]));
        }

        let limit = (pos + MAX_MATCH).min(input.len());
        let mut len = MIN_MATCH;
        while pos + len < limit && input[candidate + len] == input[pos + len] {
            len += 1;
        }
        Token::long_match(offset, len)
    }

    fn emit(&mut self, token: Token, sink: &mut Sink<'_>, control: &mut Control) -> Result<()> {
        match token {
            Token::Literal(_) => self.stats.literals += 1,
            Token::Match { .. } => self.stats.matches += 1,
            Token::Run { .. } => self.stats.runs += 1,
        }

        let mut buf = [0u8; MAX_TOKEN_LEN];
        let n = token.encode(&mut buf);
        sink.put_slice(&buf[..n])?;
        control.push(token.control_bit(), sink)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds-checked writer over the caller's output slice
struct Sink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Sink<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put_slice(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(Error::CapacityExceeded {
                capacity: self.buf.len(),
            });
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Claim one byte to be filled in later, return its index
    fn reserve(&mut self) -> Result<usize> {
        self.put_slice(&[0])?;
        Ok(self.pos - 1)
    }
}

/// The control byte being filled; its slot is reserved ahead of its units
struct Control {
    slot: usize,
    bits: u8,
    count: u8,
}

impl Control {
    fn open(sink: &mut Sink<'_>) -> Result<Self> {
        Ok(Self {
            slot: sink.reserve()?,
            bits: 0,
            count: 0,
        })
    }

    fn push(&mut self, bit: bool, sink: &mut Sink<'_>) -> Result<()> {
        self.bits = (self.bits << 1) | bit as u8;
        self.count += 1;
        if self.count == 8 {
            sink.buf[self.slot] = self.bits;
            *self = Self::open(sink)?;
        }
        Ok(())
    }

    /// Write the final byte with unused low bits zeroed
    fn close(self, sink: &mut Sink<'_>) {
        sink.buf[self.slot] = if self.count == 0 {
            0
        } else {
            self.bits << (8 - self.count)
        };
    }
}
