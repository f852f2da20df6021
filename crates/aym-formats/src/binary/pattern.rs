//! Pattern text compiler
//!
//! Grammar (whitespace ignored):
//!
//! | Text        | Meaning                                              |
//! |-------------|------------------------------------------------------|
//! | `?`         | any byte                                             |
//! | `1f`, `x3`  | hex byte, `x` is a wildcard nibble                   |
//! | `%0101xxxx` | bit mask, `x` is a wildcard bit                      |
//! | `'c`        | literal character                                    |
//! | `+12+`      | twelve any-bytes                                     |
//! | `lo-hi`     | range, replaces the single-value token before it     |
//! | `a|b`       | either value, joins with the token before it         |
//! | `{N}`       | repeat the previous token, or group ending here      |
//! | `( ... )`   | group                                                |

use std::fmt;

/// Pattern compile failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// Text ended inside a token
    #[error("unexpected end of pattern")]
    UnexpectedEnd,
    /// Character not allowed at this position
    #[error("invalid character '{ch}' at position {pos}")]
    InvalidCharacter {
        /// Byte offset in pattern text
        pos: usize,
        /// Offending character
        ch: char,
    },
    /// Range, alternative or quantor without a token before it
    #[error("no token before operator at position {pos}")]
    MissingOperand {
        /// Byte offset in pattern text
        pos: usize,
    },
    /// Range bound matches more than one value
    #[error("range bound at position {pos} is not a single value")]
    NotSingleValue {
        /// Byte offset in pattern text
        pos: usize,
    },
    /// Range with `low >= high`
    #[error("invalid range {low:02x}-{high:02x}")]
    InvertedRange {
        /// Lower bound
        low: u8,
        /// Upper bound
        high: u8,
    },
    /// `)` without matching `(`
    #[error("unbalanced group end at position {pos}")]
    UnbalancedGroup {
        /// Byte offset in pattern text
        pos: usize,
    },
    /// Some byte value is not matched for more than 255 consecutive tokens
    #[error("pattern too sparse for shift table")]
    ShiftOverflow,
    /// Count or compiled pattern longer than [`MAX_PATTERN_SIZE`]
    #[error("pattern too large at position {pos}")]
    TooLarge {
        /// Byte offset in pattern text
        pos: usize,
    },
}

/// Longest compiled pattern, also the largest skip or repeat count
pub const MAX_PATTERN_SIZE: usize = 0x10000;

/// Set of 256 byte values
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteSet([u64; 4]);

impl ByteSet {
    /// Set containing every value matched by `token`
    pub fn from_token(token: &Token) -> Self {
        let mut set = Self::default();
        for value in 0..=255u8 {
            if token.matches(value) {
                set.insert(value);
            }
        }
        set
    }

    /// Add a value
    pub fn insert(&mut self, value: u8) {
        self.0[usize::from(value >> 6)] |= 1 << (value & 63);
    }

    /// Check membership
    pub fn contains(&self, value: u8) -> bool {
        self.0[usize::from(value >> 6)] & (1 << (value & 63)) != 0
    }

    /// Union of two sets
    pub fn union(&self, other: &Self) -> Self {
        let mut result = *self;
        for (dst, src) in result.0.iter_mut().zip(other.0) {
            *dst |= src;
        }
        result
    }

    /// Number of values in the set
    pub fn len(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Set has no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ByteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries((0..=255u8).filter(|v| self.contains(*v)))
            .finish()
    }
}

/// Single byte matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Matches all 256 values
    AnyByte,
    /// Matches one value
    ExactByte(u8),
    /// Matches values with `value & mask == expected`
    MaskedByte {
        /// Significant bits
        mask: u8,
        /// Expected significant bits
        value: u8,
    },
    /// Matches `low..=high`
    Range {
        /// Lowest value
        low: u8,
        /// Highest value
        high: u8,
    },
    /// Matches any value of the set
    Set(ByteSet),
}

impl Token {
    fn from_mask(mask: u8, value: u8) -> Self {
        match mask {
            0 => Token::AnyByte,
            0xff => Token::ExactByte(value),
            _ => Token::MaskedByte { mask, value },
        }
    }

    /// Check if `value` is accepted
    pub fn matches(&self, value: u8) -> bool {
        match *self {
            Token::AnyByte => true,
            Token::ExactByte(expected) => value == expected,
            Token::MaskedByte { mask, value: expected } => value & mask == expected,
            Token::Range { low, high } => (low..=high).contains(&value),
            Token::Set(ref set) => set.contains(value),
        }
    }

    /// Token accepts every value
    pub fn is_any(&self) -> bool {
        match self {
            Token::AnyByte => true,
            Token::Set(set) => set.len() == 256,
            _ => (0..=255u8).all(|v| self.matches(v)),
        }
    }

    /// The only value this token accepts
    pub fn single_value(&self) -> Option<u8> {
        let set = ByteSet::from_token(self);
        if set.len() == 1 {
            (0..=255u8).find(|v| set.contains(*v))
        } else {
            None
        }
    }
}

struct Cursor<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn next(&mut self) -> Result<u8, PatternError> {
        let ch = *self.text.get(self.pos).ok_or(PatternError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(ch)
    }

    fn invalid(&self, ch: u8) -> PatternError {
        PatternError::InvalidCharacter {
            pos: self.pos - 1,
            ch: ch as char,
        }
    }

    fn number_until(&mut self, terminator: u8) -> Result<usize, PatternError> {
        let start = self.pos;
        let mut result = 0usize;
        loop {
            let ch = self.next()?;
            if ch == terminator {
                return Ok(result);
            }
            if !ch.is_ascii_digit() {
                return Err(self.invalid(ch));
            }
            result = result
                .checked_mul(10)
                .and_then(|r| r.checked_add(usize::from(ch - b'0')))
                .filter(|r| *r <= MAX_PATTERN_SIZE)
                .ok_or(PatternError::TooLarge { pos: start })?;
        }
    }

    fn nibble(&mut self) -> Result<(u8, u8), PatternError> {
        let ch = self.next()?;
        match ch {
            b'x' => Ok((0, 0)),
            b'0'..=b'9' => Ok((0xf, ch - b'0')),
            b'a'..=b'f' => Ok((0xf, ch - b'a' + 10)),
            b'A'..=b'F' => Ok((0xf, ch - b'A' + 10)),
            _ => Err(self.invalid(ch)),
        }
    }

    /// Hex pair or `%` bit mask starting at the current position
    fn mask_token(&mut self) -> Result<Token, PatternError> {
        if self.text.get(self.pos) == Some(&b'%') {
            self.pos += 1;
            let mut mask = 0u8;
            let mut value = 0u8;
            for bit in (0..8).rev() {
                let ch = self.next()?;
                match ch {
                    b'1' => {
                        value |= 1 << bit;
                        mask |= 1 << bit;
                    }
                    b'0' => mask |= 1 << bit,
                    b'x' => {}
                    _ => return Err(self.invalid(ch)),
                }
            }
            Ok(Token::from_mask(mask, value))
        } else {
            let (hi_mask, hi) = self.nibble()?;
            let (lo_mask, lo) = self.nibble()?;
            Ok(Token::from_mask(hi_mask << 4 | lo_mask, hi << 4 | lo))
        }
    }
}

fn ensure_room(len: usize, extra: usize, pos: usize) -> Result<(), PatternError> {
    if len.saturating_add(extra) > MAX_PATTERN_SIZE {
        Err(PatternError::TooLarge { pos })
    } else {
        Ok(())
    }
}

/// Compile pattern text into a flat token list
pub fn compile(text: &str) -> Result<Vec<Token>, PatternError> {
    let mut cursor = Cursor {
        text: text.as_bytes(),
        pos: 0,
    };
    let mut result: Vec<Token> = Vec::new();
    let mut group_begins: Vec<usize> = Vec::new();
    let mut groups: Vec<(usize, usize)> = Vec::new();
    while let Some(&ch) = cursor.text.get(cursor.pos) {
        let pos = cursor.pos;
        match ch {
            b'?' => {
                cursor.pos += 1;
                result.push(Token::AnyByte);
            }
            b'+' => {
                cursor.pos += 1;
                let skip = cursor.number_until(b'+')?;
                ensure_room(result.len(), skip, pos)?;
                result.extend(std::iter::repeat(Token::AnyByte).take(skip));
            }
            b'\'' => {
                cursor.pos += 1;
                let value = cursor.next()?;
                result.push(Token::ExactByte(value));
            }
            b'-' => {
                cursor.pos += 1;
                let last = result.last_mut().ok_or(PatternError::MissingOperand { pos })?;
                let low = last
                    .single_value()
                    .ok_or(PatternError::NotSingleValue { pos })?;
                let bound_pos = cursor.pos;
                let high = cursor
                    .mask_token()?
                    .single_value()
                    .ok_or(PatternError::NotSingleValue { pos: bound_pos })?;
                if low >= high {
                    return Err(PatternError::InvertedRange { low, high });
                }
                *last = Token::Range { low, high };
            }
            b'|' => {
                cursor.pos += 1;
                let last = result.last_mut().ok_or(PatternError::MissingOperand { pos })?;
                let other = cursor.mask_token()?;
                let set = ByteSet::from_token(last).union(&ByteSet::from_token(&other));
                *last = Token::Set(set);
            }
            b'{' => {
                cursor.pos += 1;
                if result.is_empty() {
                    return Err(PatternError::MissingOperand { pos });
                }
                let mult = cursor.number_until(b'}')?;
                if mult != 0 {
                    let dup: Vec<Token> = match groups.last() {
                        Some(&(begin, end)) if end == result.len() => {
                            groups.pop();
                            result[begin..].to_vec()
                        }
                        _ => result[result.len() - 1..].to_vec(),
                    };
                    ensure_room(result.len(), dup.len().saturating_mul(mult - 1), pos)?;
                    for _ in 1..mult {
                        result.extend_from_slice(&dup);
                    }
                }
            }
            b'(' => {
                cursor.pos += 1;
                group_begins.push(result.len());
            }
            b')' => {
                cursor.pos += 1;
                let begin = group_begins
                    .pop()
                    .ok_or(PatternError::UnbalancedGroup { pos })?;
                groups.push((begin, result.len()));
            }
            b' ' | b'\n' | b'\r' | b'\t' => cursor.pos += 1,
            _ => result.push(cursor.mask_token()?),
        }
    }
    Ok(result)
}
