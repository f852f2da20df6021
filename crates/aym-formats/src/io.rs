//! Bounds-checked byte-offset accessors
//!
//! Binary layouts are read field by field at explicit offsets instead of
//! overlaying packed structs, so every access is checked against the buffer.

use crate::{FormatError, Result};

/// Read-only view over a module buffer with checked field access
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// Wrap a buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Whole buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Buffer size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check that `offset..offset + size` lies inside the buffer
    pub fn ensure_range(&self, offset: usize, size: usize) -> Result<()> {
        let end = offset
            .checked_add(size)
            .ok_or_else(|| FormatError::from("integer overflow while checking bounds"))?;
        if end > self.data.len() {
            return Err(FormatError::UnexpectedEof {
                offset,
                needed: size,
            });
        }
        Ok(())
    }

    /// Sub-slice `offset..offset + size`
    pub fn slice(&self, offset: usize, size: usize) -> Result<&'a [u8]> {
        self.ensure_range(offset, size)?;
        Ok(&self.data[offset..offset + size])
    }

    /// Tail starting at `offset`
    pub fn tail(&self, offset: usize) -> Result<&'a [u8]> {
        self.data.get(offset..).ok_or(FormatError::UnexpectedEof {
            offset,
            needed: 0,
        })
    }

    /// Unsigned byte
    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.ensure_range(offset, 1)?;
        Ok(self.data[offset])
    }

    /// Signed byte
    pub fn read_i8(&self, offset: usize) -> Result<i8> {
        self.read_u8(offset).map(|b| b as i8)
    }

    /// Little-endian word
    pub fn read_le16(&self, offset: usize) -> Result<u16> {
        self.ensure_range(offset, 2)?;
        Ok(u16::from_le_bytes([self.data[offset], self.data[offset + 1]]))
    }

    /// Little-endian double word
    pub fn read_le32(&self, offset: usize) -> Result<u32> {
        let bytes = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Big-endian word
    pub fn read_be16(&self, offset: usize) -> Result<u16> {
        self.ensure_range(offset, 2)?;
        Ok(u16::from_be_bytes([self.data[offset], self.data[offset + 1]]))
    }

    /// Big-endian double word
    pub fn read_be32(&self, offset: usize) -> Result<u32> {
        let bytes = self.slice(offset, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Zero-terminated string starting at `offset`; returns the string and
    /// the offset past the terminator
    pub fn read_nt_string(&self, offset: usize) -> Result<(String, usize)> {
        let tail = self.tail(offset)?;
        let len = tail
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| FormatError::from(format!("unterminated string at 0x{offset:04x}")))?;
        Ok((latin1(&tail[..len]), offset + len + 1))
    }
}

/// Decode a fixed-width text field, dropping trailing spaces and zeros
pub fn fixed_string(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|b| *b != b' ' && *b != 0)
        .map_or(0, |pos| pos + 1);
    latin1(&raw[..end])
}

/// Decode 8-bit text one byte per char
pub fn latin1(raw: &[u8]) -> String {
    raw.iter().map(|b| *b as char).collect()
}

/// CRC32 of a region
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}
