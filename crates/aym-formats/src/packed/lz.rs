//! LZ-style depacking
//!
//! Packed streams share one shape: a control-bit stream selects between a
//! literal byte and a back-reference with a run length. [`decode`] unpacks
//! such a stream into a buffer of declared size; formats with a circular
//! output window build on [`CircularWindow`] instead. All reads and window
//! accesses are bounds-checked and reported as
//! [`FormatError`](crate::FormatError) on violation.
//!
//! Stream layout understood by [`decode`]:
//!
//! | Control bit | Token                                                  |
//! |-------------|--------------------------------------------------------|
//! | `0`         | literal byte                                           |
//! | `1`         | run byte `n`, then distance `d` ([`BackRefWidth`]);     |
//! |             | copies `n + 1` bytes starting `d` bytes back           |
//!
//! Control bytes are fetched on demand, bits are consumed MSB first.
//! Decoding stops once the declared size is produced.

use crate::{require, FormatError, Result};

/// Largest window a stream may declare
pub const MAX_WINDOW_SIZE: usize = 0x10000;

/// Largest output [`decode`] accepts, the ZX Spectrum RAM above the screen
pub const MAX_DECODED_SIZE: usize = 0xc000;

/// Sequential bounds-checked byte reader
#[derive(Debug, Clone)]
pub struct ByteStream<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteStream<'a> {
    /// Reader over `data` starting at offset 0
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Reader over `data` starting at `position`
    pub fn at(data: &'a [u8], position: usize) -> Result<Self> {
        if position > data.len() {
            return Err(FormatError::UnexpectedEof {
                offset: position,
                needed: 0,
            });
        }
        Ok(Self { data, position })
    }

    /// Next byte
    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.position)
            .ok_or(FormatError::UnexpectedEof {
                offset: self.position,
                needed: 1,
            })?;
        self.position += 1;
        Ok(byte)
    }

    /// Next little-endian word
    pub fn read_le16(&mut self) -> Result<u16> {
        let lo = self.read_byte()?;
        let hi = self.read_byte()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Offset of the next byte
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

/// MSB-first control bit reader.
///
/// The state register holds the pending bits followed by a sentinel `1`;
/// when only the sentinel is left, the next control byte is fetched from the
/// stream.
#[derive(Debug, Clone, Copy)]
pub struct ControlBits {
    state: u32,
}

impl ControlBits {
    /// Reader fetching a control byte on the first call
    pub fn new() -> Self {
        Self::with_state(0x80)
    }

    /// Reader with a preset state register. `0x40` yields a single `0` bit
    /// before the first control byte is fetched.
    pub fn with_state(state: u8) -> Self {
        Self {
            state: u32::from(state),
        }
    }

    /// Next control bit
    pub fn next_bit(&mut self, stream: &mut ByteStream<'_>) -> Result<bool> {
        self.state <<= 1;
        if self.state & 0xff == 0 {
            self.state = u32::from(stream.read_byte()?) << 1 | 1;
        }
        let bit = self.state & 0x100 != 0;
        self.state &= 0xff;
        Ok(bit)
    }
}

impl Default for ControlBits {
    fn default() -> Self {
        Self::new()
    }
}

/// Encoding width of back-reference positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackRefWidth {
    /// Single byte
    Byte,
    /// Little-endian word
    Word,
}

impl BackRefWidth {
    /// Read one back-reference position
    pub fn read(self, stream: &mut ByteStream<'_>) -> Result<usize> {
        match self {
            BackRefWidth::Byte => stream.read_byte().map(usize::from),
            BackRefWidth::Word => stream.read_le16().map(usize::from),
        }
    }
}

/// Fixed-size circular output window.
///
/// Every time the write cursor wraps the complete window is handed to the
/// sink; [`finish`](CircularWindow::finish) flushes the partial tail.
#[derive(Debug, Clone)]
pub struct CircularWindow {
    buffer: Vec<u8>,
    cursor: usize,
}

impl CircularWindow {
    /// Window of `size` bytes, `1..=MAX_WINDOW_SIZE`
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || size > MAX_WINDOW_SIZE {
            return Err(format!("invalid window size {size}").into());
        }
        Ok(Self {
            buffer: vec![0; size],
            cursor: 0,
        })
    }

    /// Window size
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Append a literal
    pub fn push(&mut self, byte: u8, sink: &mut impl FnMut(&[u8])) {
        self.buffer[self.cursor] = byte;
        self.cursor += 1;
        if self.cursor == self.buffer.len() {
            sink(&self.buffer);
            self.cursor = 0;
        }
    }

    /// Copy `count` bytes starting at absolute window position `source`
    pub fn copy(&mut self, source: usize, count: usize, sink: &mut impl FnMut(&[u8])) -> Result<()> {
        let size = self.buffer.len();
        if source >= size {
            return Err(format!("back reference {source} outside window of {size}").into());
        }
        let mut source = source;
        for _ in 0..count {
            let byte = self.buffer[source];
            self.push(byte, sink);
            source += 1;
            if source == size {
                source = 0;
            }
        }
        Ok(())
    }

    /// Flush bytes written since the last wrap
    pub fn finish(self, sink: &mut impl FnMut(&[u8])) {
        if self.cursor != 0 {
            sink(&self.buffer[..self.cursor]);
        }
    }
}

/// Unpack `data` into exactly `declared_size` bytes.
///
/// Returns the unpacked bytes and the packed size consumed. The declared
/// size is validated before anything is allocated.
pub fn decode(data: &[u8], declared_size: usize, width: BackRefWidth) -> Result<(Vec<u8>, usize)> {
    if declared_size == 0 || declared_size > MAX_DECODED_SIZE {
        return Err(format!("invalid declared size {declared_size}").into());
    }
    let mut stream = ByteStream::new(data);
    let mut bits = ControlBits::new();
    let mut output = Vec::with_capacity(declared_size);
    while output.len() < declared_size {
        if !bits.next_bit(&mut stream)? {
            output.push(stream.read_byte()?);
            continue;
        }
        let run = usize::from(stream.read_byte()?) + 1;
        let distance = width.read(&mut stream)?;
        require(
            distance != 0 && distance <= output.len(),
            "back reference outside decoded data",
        )?;
        require(
            run <= declared_size - output.len(),
            "back reference past the declared size",
        )?;
        let source = output.len() - distance;
        // overlapping runs repeat the bytes just written
        for idx in source..source + run {
            let byte = output[idx];
            output.push(byte);
        }
    }
    Ok((output, stream.position()))
}
