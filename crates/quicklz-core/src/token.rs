//! Token format of the raw QuickLZ stream
//!
//! ```text
//! ┌────────────┬──────────────────────────────────────┬───────┬──────────────────────────┐
//! │ Token      │ Bits                                 │ Bytes │ Fields                   │
//! ├────────────┼──────────────────────────────────────┼───────┼──────────────────────────┤
//! │ Literal    │ (control bit 0)                      │ 1     │ raw byte                 │
//! │ Short7     │ 0aaa aaaa                            │ 1     │ offset, length 3         │
//! │ Short13    │ 100a aaaa  aaaa aaaa                 │ 2     │ offset, length 3         │
//! │ Long10     │ 101l llaa  aaaa aaaa                 │ 2     │ length-4, offset         │
//! │ Long16     │ 110l llll  a(16)                     │ 3     │ length-4, offset         │
//! │ Long17     │ 1110 llll  llll lllA  a(16)          │ 4     │ length-4, offset         │
//! │ Run        │ 1111 llll  llll llll  vvvv vvvv      │ 3     │ length-5, value          │
//! └────────────┴──────────────────────────────────────┴───────┴──────────────────────────┘
//! ```
//!
//! A control byte, read MSB first, precedes every group of up to 8 units:
//! `0` for a literal, `1` for a match or run. The stream carries no header
//! or length; the decoded size travels out of band.

use crate::{Error, Result};

/// Number of hash table slots (12-bit hash)
pub const HASH_SIZE: usize = 1 << 12;

/// Length of the short back-references
pub const SHORT_MATCH: usize = 3;

/// Minimum length of the long back-references
pub const MIN_MATCH: usize = 4;

/// Maximum match length (11-bit length field)
pub const MAX_MATCH: usize = MIN_MATCH + 0x07ff;

/// Minimum run length
pub const MIN_RUN: usize = 5;

/// Maximum run length (12-bit length field)
pub const MAX_RUN: usize = MIN_RUN + 0x0fff;

/// Offsets must stay below this (17-bit offset field)
pub const MAX_OFFSET: usize = 1 << 17;

/// Once this few bytes remain, both directions switch to plain literals
pub const TAIL_GUARD: usize = 5;

/// Largest encoded token
pub const MAX_TOKEN_LEN: usize = 4;

/// Encoding used by a back-reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchForm {
    /// Length 3, offset below 128
    Short7,
    /// Length 3, offset below 8192
    Short13,
    /// Length 4..=11, offset below 1024
    Long10,
    /// Length 4..=35, offset below 65536
    Long16,
    /// Length 4..=2051, offset below 131072
    Long17,
}

impl MatchForm {
    /// Form for a three byte match, if its offset is reachable
    pub fn for_short(offset: usize) -> Option<Self> {
        if offset < 128 {
            Some(MatchForm::Short7)
        } else if offset < 8192 {
            Some(MatchForm::Short13)
        } else {
            None
        }
    }

    /// Smallest form holding a match of at least four bytes
    pub fn for_long(len: usize, offset: usize) -> Self {
        let extra = len - MIN_MATCH;
        if extra < 8 && offset < 1024 {
            MatchForm::Long10
        } else if extra < 32 && offset < 65536 {
            MatchForm::Long16
        } else {
            MatchForm::Long17
        }
    }

    pub fn encoded_len(self) -> usize {
        match self {
            MatchForm::Short7 => 1,
            MatchForm::Short13 | MatchForm::Long10 => 2,
            MatchForm::Long16 => 3,
            MatchForm::Long17 => 4,
        }
    }
}

/// One unit of the raw stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A byte copied as-is
    Literal(u8),
    /// Copy `len` bytes starting `offset` bytes back
    Match {
        offset: usize,
        len: usize,
        form: MatchForm,
    },
    /// `len` copies of `value`
    Run { value: u8, len: usize },
}

impl Token {
    /// Three byte back-reference, or `None` when the offset is too far for the short forms
    pub fn short_match(offset: usize) -> Option<Self> {
        MatchForm::for_short(offset).map(|form| Token::Match {
            offset,
            len: SHORT_MATCH,
            form,
        })
    }

    pub fn long_match(offset: usize, len: usize) -> Self {
        debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&len));
        debug_assert!(offset < MAX_OFFSET);
        Token::Match {
            offset,
            len,
            form: MatchForm::for_long(len, offset),
        }
    }

    pub fn run(value: u8, len: usize) -> Self {
        debug_assert!((MIN_RUN..=MAX_RUN).contains(&len));
        Token::Run { value, len }
    }

    /// Bytes this token expands to
    pub fn decoded_len(&self) -> usize {
        match *self {
            Token::Literal(_) => 1,
            Token::Match { len, .. } | Token::Run { len, .. } => len,
        }
    }

    /// Bytes this token occupies in the stream
    pub fn encoded_len(&self) -> usize {
        match *self {
            Token::Literal(_) => 1,
            Token::Match { form, .. } => form.encoded_len(),
            Token::Run { .. } => 3,
        }
    }

    /// Control bit recorded for this token
    pub fn control_bit(&self) -> bool {
        !matches!(self, Token::Literal(_))
    }

    /// Encode into `buf`, return bytes written
    pub fn encode(&self, buf: &mut [u8; MAX_TOKEN_LEN]) -> usize {
        match *self {
            Token::Literal(byte) => {
                buf[0] = byte;
                1
            }
            Token::Match { offset, len, form } => {
                match form {
                    MatchForm::Short7 => {
                        buf[0] = offset as u8;
                    }
                    MatchForm::Short13 => {
                        buf[0] = 0x80 | (offset >> 8) as u8;
                        buf[1] = offset as u8;
                    }
                    MatchForm::Long10 => {
                        let extra = len - MIN_MATCH;
                        buf[0] = 0xa0 | (extra << 2) as u8 | (offset >> 8) as u8;
                        buf[1] = offset as u8;
                    }
                    MatchForm::Long16 => {
                        let extra = len - MIN_MATCH;
                        buf[0] = 0xc0 | extra as u8;
                        buf[1] = (offset >> 8) as u8;
                        buf[2] = offset as u8;
                    }
                    MatchForm::Long17 => {
                        let extra = len - MIN_MATCH;
                        buf[0] = 0xe0 | (extra >> 7) as u8;
                        buf[1] = (extra << 1) as u8 | (offset >> 16) as u8;
                        buf[2] = (offset >> 8) as u8;
                        buf[3] = offset as u8;
                    }
                }
                form.encoded_len()
            }
            Token::Run { value, len } => {
                let extra = len - MIN_RUN;
                buf[0] = 0xf0 | (extra >> 8) as u8;
                buf[1] = extra as u8;
                buf[2] = value;
                3
            }
        }
    }

    /// Parse a match or run token (control bit 1), return (token, bytes_read)
    pub fn read(buf: &[u8]) -> Result<(Self, usize)> {
        let b0 = take(buf, 1)?[0];

        if b0 & 0x80 == 0 {
            let token = Token::Match {
                offset: b0 as usize,
                len: SHORT_MATCH,
                form: MatchForm::Short7,
            };
            return Ok((token, 1));
        }

        if b0 & 0x60 == 0 {
            let t = take(buf, 2)?;
            let token = Token::Match {
                offset: ((b0 as usize & 0x1f) << 8) | t[1] as usize,
                len: SHORT_MATCH,
                form: MatchForm::Short13,
            };
            return Ok((token, 2));
        }

        if b0 & 0x40 == 0 {
            let t = take(buf, 2)?;
            let token = Token::Match {
                offset: ((b0 as usize & 0x03) << 8) | t[1] as usize,
                len: ((b0 as usize >> 2) & 0x07) + MIN_MATCH,
                form: MatchForm::Long10,
            };
            return Ok((token, 2));
        }

        if b0 & 0x20 == 0 {
            let t = take(buf, 3)?;
            let token = Token::Match {
                offset: ((t[1] as usize) << 8) | t[2] as usize,
                len: (b0 as usize & 0x1f) + MIN_MATCH,
                form: MatchForm::Long16,
            };
            return Ok((token, 3));
        }

        if b0 & 0x10 == 0 {
            let t = take(buf, 4)?;
            let token = Token::Match {
                offset: ((t[1] as usize & 0x01) << 16) | ((t[2] as usize) << 8) | t[3] as usize,
                len: (((b0 as usize & 0x0f) << 7) | (t[1] as usize >> 1)) + MIN_MATCH,
                form: MatchForm::Long17,
            };
            return Ok((token, 4));
        }

        let t = take(buf, 3)?;
        let token = Token::Run {
            value: t[2],
            len: (((b0 as usize & 0x0f) << 8) | t[1] as usize) + MIN_RUN,
        };
        Ok((token, 3))
    }
}

#[inline]
fn take(buf: &[u8], n: usize) -> Result<&[u8]> {
    buf.get(..n)
        .ok_or_else(|| Error::CorruptStream("truncated token".into()))
}

/// Walk a raw stream unit by unit
///
/// `expected` is the decoded size; the walk ends once that many bytes have
/// been produced. Offsets and lengths are checked against what has been
/// produced so far, so every `Ok` token can be applied without bounds
/// surprises.
pub fn tokens(input: &[u8], expected: usize) -> Result<Tokens<'_>> {
    Tokens::new(input, expected)
}

/// Iterator over the units of a raw stream
pub struct Tokens<'a> {
    input: &'a [u8],
    pos: usize,
    control: u8,
    count: u8,
    produced: usize,
    expected: usize,
    failed: bool,
}

impl<'a> Tokens<'a> {
    pub fn new(input: &'a [u8], expected: usize) -> Result<Self> {
        let control = *input
            .first()
            .ok_or_else(|| Error::CorruptStream("missing control byte".into()))?;

        Ok(Self {
            input,
            pos: 1,
            control,
            count: 0,
            produced: 0,
            expected,
            failed: false,
        })
    }

    /// Stream bytes consumed so far
    pub fn consumed(&self) -> usize {
        self.pos.min(self.input.len())
    }

    /// Decoded bytes accounted for so far
    pub fn produced(&self) -> usize {
        self.produced
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or_else(|| Error::CorruptStream("unexpected end of stream".into()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_unit(&mut self) -> Result<Token> {
        if self.produced + TAIL_GUARD >= self.expected {
            // Tail: literals only. The compressor still reserved a control
            // slot after every eighth unit, so step over it.
            let token = Token::Literal(self.next_byte()?);
            self.count += 1;
            if self.count == 8 {
                self.count = 0;
                self.pos += 1;
            }
            return Ok(token);
        }

        let token = if self.control & 0x80 != 0 {
            let (token, size) = Token::read(self.input.get(self.pos..).unwrap_or(&[]))?;
            self.pos += size;
            token
        } else {
            Token::Literal(self.next_byte()?)
        };

        self.control <<= 1;
        self.count += 1;
        if self.count == 8 {
            self.control = self.next_byte()?;
            self.count = 0;
        }

        Ok(token)
    }

    fn check(&self, token: Token) -> Result<Token> {
        if let Token::Match { offset, .. } = token {
            if offset == 0 || offset > self.produced {
                return Err(Error::CorruptStream(format!(
                    "offset {} reaches before the start of output (at {})",
                    offset, self.produced
                )));
            }
        }

        if self.produced + token.decoded_len() > self.expected {
            return Err(Error::CorruptStream(format!(
                "token expands past the expected size of {} bytes",
                self.expected
            )));
        }

        Ok(token)
    }
}

impl Iterator for Tokens<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.produced >= self.expected {
            return None;
        }

        let result = self.read_unit().and_then(|token| self.check(token));
        match &result {
            Ok(token) => self.produced += token.decoded_len(),
            Err(_) => self.failed = true,
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(token: Token) -> Vec<u8> {
        let mut buf = [0u8; MAX_TOKEN_LEN];
        let n = token.encode(&mut buf);
        assert_eq!(n, token.encoded_len());
        buf[..n].to_vec()
    }

    #[test]
    fn test_form_selection() {
        assert_eq!(MatchForm::for_short(127), Some(MatchForm::Short7));
        assert_eq!(MatchForm::for_short(128), Some(MatchForm::Short13));
        assert_eq!(MatchForm::for_short(8191), Some(MatchForm::Short13));
        assert_eq!(MatchForm::for_short(8192), None);

        assert_eq!(MatchForm::for_long(11, 1023), MatchForm::Long10);
        assert_eq!(MatchForm::for_long(12, 1023), MatchForm::Long16);
        assert_eq!(MatchForm::for_long(4, 1024), MatchForm::Long16);
        assert_eq!(MatchForm::for_long(35, 65535), MatchForm::Long16);
        assert_eq!(MatchForm::for_long(36, 100), MatchForm::Long17);
        assert_eq!(MatchForm::for_long(4, 65536), MatchForm::Long17);
    }

    #[test]
    fn test_bit_layout() {
        assert_eq!(encoded(Token::Literal(0x5a)), [0x5a]);
        assert_eq!(encoded(Token::short_match(127).unwrap()), [0x7f]);
        assert_eq!(encoded(Token::short_match(8191).unwrap()), [0x9f, 0xff]);
        assert_eq!(encoded(Token::long_match(1023, 11)), [0xbf, 0xff]);
        assert_eq!(encoded(Token::long_match(65535, 35)), [0xdf, 0xff, 0xff]);
        assert_eq!(
            encoded(Token::long_match(131071, MAX_MATCH)),
            [0xef, 0xff, 0xff, 0xff]
        );
        assert_eq!(encoded(Token::run(0x41, MAX_RUN)), [0xff, 0xff, 0x41]);
        assert_eq!(encoded(Token::run(0x00, MIN_RUN)), [0xf0, 0x00, 0x00]);
    }

    #[test]
    fn test_read_matches_encode() {
        let samples = [
            Token::short_match(4).unwrap(),
            Token::short_match(5000).unwrap(),
            Token::long_match(700, 9),
            Token::long_match(40000, 30),
            Token::long_match(70000, 4),
            Token::long_match(1, 2000),
            Token::run(0xee, 777),
        ];

        for token in samples {
            let bytes = encoded(token);
            let (parsed, size) = Token::read(&bytes).unwrap();
            assert_eq!(parsed, token);
            assert_eq!(size, bytes.len());
        }
    }

    #[test]
    fn test_read_truncated() {
        assert!(matches!(Token::read(&[]), Err(Error::CorruptStream(_))));
        assert!(matches!(Token::read(&[0x9f]), Err(Error::CorruptStream(_))));
        assert!(matches!(Token::read(&[0xe0, 0x00, 0x01]), Err(Error::CorruptStream(_))));
        assert!(matches!(Token::read(&[0xf0, 0x01]), Err(Error::CorruptStream(_))));
    }

    #[test]
    fn test_walk_stream() {
        // "abcd" as literals, then an 8 byte copy from 4 back
        let stream = [0x08, b'a', b'b', b'c', b'd', 0xb0, 0x04];
        let walked: Vec<Token> = tokens(&stream, 12)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(walked.len(), 5);
        assert_eq!(walked[3], Token::Literal(b'd'));
        assert_eq!(
            walked[4],
            Token::Match {
                offset: 4,
                len: 8,
                form: MatchForm::Long10
            }
        );
    }

    #[test]
    fn test_walk_rejects_bad_offset() {
        let mut walk = tokens(&[0x80, 0x05], 10).unwrap();
        assert!(matches!(walk.next(), Some(Err(Error::CorruptStream(_)))));
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_walk_rejects_overrun() {
        let mut walk = tokens(&[0x80, 0xf0, 0x10, 0x41], 10).unwrap();
        assert!(matches!(walk.next(), Some(Err(Error::CorruptStream(_)))));
    }

    #[test]
    fn test_walk_needs_control_byte() {
        assert!(matches!(tokens(&[], 0), Err(Error::CorruptStream(_))));
    }
}
