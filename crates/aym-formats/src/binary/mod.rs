//! Binary signature matching
//!
//! A [`Format`] is compiled from pattern text (see [`pattern`]) into a
//! shift table. [`Format::matches`] checks a signature at the start of a
//! buffer, [`Format::search`] finds the first position it occurs at using
//! backward scanning with per-byte skip distances.

pub mod pattern;

pub use pattern::{ByteSet, PatternError, Token};

/// Shift distances for one pattern position, indexed by byte value
type ShiftRow = [u8; 256];

/// Compiled binary signature
#[derive(Clone)]
pub struct Format {
    /// Leading any-byte tokens
    offset: usize,
    /// Rows for the remaining tokens, last token first
    rows: Vec<ShiftRow>,
    min_size: usize,
    search_window: Option<usize>,
}

impl std::fmt::Debug for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Format")
            .field("offset", &self.offset)
            .field("tokens", &self.rows.len())
            .field("min_size", &self.min_size)
            .field("search_window", &self.search_window)
            .finish()
    }
}

impl Format {
    /// Compile pattern text
    pub fn compile(text: &str) -> Result<Self, PatternError> {
        let tokens = pattern::compile(text)?;
        let offset = tokens.iter().take_while(|t| t.is_any()).count();
        let tail = &tokens[offset..];
        if tail.is_empty() {
            return Ok(Self {
                offset,
                rows: Vec::new(),
                min_size: 0,
                search_window: None,
            });
        }
        let mut rows = vec![[0u8; 256]; tail.len()];
        for value in 0..=255u8 {
            let mut distance = 1usize;
            for (row, token) in rows.iter_mut().zip(tail) {
                if token.matches(value) {
                    distance = 0;
                }
                row[usize::from(value)] =
                    u8::try_from(distance).map_err(|_| PatternError::ShiftOverflow)?;
                distance += 1;
            }
        }
        rows.reverse();
        Ok(Self {
            offset,
            rows,
            min_size: 0,
            search_window: None,
        })
    }

    /// Compile a built-in pattern.
    ///
    /// # Panics
    ///
    /// Panics if `text` does not compile. Only use for literals.
    pub fn from_static(text: &'static str) -> Self {
        match Self::compile(text) {
            Ok(format) => format,
            Err(e) => panic!("invalid built-in pattern {text:?}: {e}"),
        }
    }

    /// Reject buffers shorter than `size`
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Skip searching in buffers larger than `size`
    pub fn with_search_window(mut self, size: usize) -> Self {
        self.search_window = Some(size);
        self
    }

    /// Number of bytes the pattern spans
    pub fn len(&self) -> usize {
        self.offset + self.rows.len()
    }

    /// Pattern has no tokens
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check signature at the start of `data`
    pub fn matches(&self, data: &[u8]) -> bool {
        if data.len() < self.min_size {
            return false;
        }
        if self.rows.is_empty() {
            return self.offset < data.len();
        }
        let end = self.len();
        end <= data.len() && self.shift_at(data, end - 1) == 0
    }

    /// First position `k` with `matches(&data[k..])`, or `data.len()` if none
    pub fn search(&self, data: &[u8]) -> usize {
        let size = data.len();
        if self.search_window.is_some_and(|window| size > window) || size < self.min_size {
            return size;
        }
        if self.rows.is_empty() {
            return if self.offset < size { 0 } else { size };
        }
        let scan_start = self.len() - 1;
        let mut scan_pos = scan_start;
        while scan_pos < size {
            let shift = self.shift_at(data, scan_pos);
            if shift == 0 {
                let found = scan_pos - scan_start;
                return if size - found < self.min_size { size } else { found };
            }
            scan_pos += usize::from(shift);
        }
        size
    }

    /// Shift required with the last pattern byte aligned to `last`
    fn shift_at(&self, data: &[u8], last: usize) -> u8 {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| row[usize::from(data[last - idx])])
            .find(|shift| *shift != 0)
            .unwrap_or(0)
    }
}
