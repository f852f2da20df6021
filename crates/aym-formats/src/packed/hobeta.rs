//! Hobeta single file container
//!
//! 17-byte header: 8-byte name, type, start address, payload length,
//! sectors count (second byte of the full length) and a checksum of the
//! first 15 bytes.

use aym_common::MetaBuilder;

use crate::binary::Format;
use crate::catalog::{report, Content, Decoded, Decoder};
use crate::io::ByteView;
use crate::packed::trdos::SECTOR_SIZE;
use crate::{require, FormatError, Result};

const HEADER_SIZE: usize = 17;
const CHECKED_SIZE: usize = 15;
const LENGTH_OFFSET: usize = 11;
const FULL_LENGTH_OFFSET: usize = 13;
const CHECKSUM_OFFSET: usize = 15;

const FORMAT: &str = concat!(
    // name and type
    "(20-7a){9}",
    // start, length
    "?? ??",
    // full length is whole sectors
    "00 01-ff"
);

/// Checksum of the header's first 15 bytes
pub fn header_checksum(header: &[u8]) -> u16 {
    let sum: u32 = header.iter().take(CHECKED_SIZE).map(|b| u32::from(*b)).sum();
    (105 + 257 * sum) as u16
}

/// Payload and used size
pub fn unpack(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let view = ByteView::new(data);
    let header = view.slice(0, HEADER_SIZE)?;
    let stored = view.read_le16(CHECKSUM_OFFSET)?;
    let computed = header_checksum(header);
    if stored != computed {
        return Err(FormatError::ChecksumMismatch {
            stored: u32::from(stored),
            computed: u32::from(computed),
        });
    }
    let length = usize::from(view.read_le16(LENGTH_OFFSET)?);
    let full_length = usize::from(view.read_le16(FULL_LENGTH_OFFSET)?);
    require(
        full_length % SECTOR_SIZE == 0 && full_length != 0,
        "full length is not whole sectors",
    )?;
    require(
        length != 0 && length.div_ceil(SECTOR_SIZE) * SECTOR_SIZE == full_length,
        "length does not agree with sectors count",
    )?;
    let payload = view.slice(HEADER_SIZE, full_length)?;
    Ok((payload[..length].to_vec(), HEADER_SIZE + full_length))
}

/// Hobeta decoder
#[derive(Debug)]
pub struct HobetaDecoder {
    format: Format,
}

impl HobetaDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT).with_min_size(HEADER_SIZE + SECTOR_SIZE),
        }
    }

    fn decode_file(&self, data: &[u8]) -> Result<Decoded> {
        let (payload, used_size) = unpack(data)?;
        Ok(Decoded {
            content: Content::Packed(payload),
            used_size,
            fixed_checksum: None,
        })
    }
}

impl Default for HobetaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for HobetaDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data)
            && ByteView::new(data)
                .read_le16(CHECKSUM_OFFSET)
                .is_ok_and(|stored| stored == header_checksum(data))
    }

    fn decode(&self, data: &[u8], _meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        report("HOBETA", self.decode_file(data))
    }
}

/// Wrap `payload` into a Hobeta file named `name` of type `kind`
#[cfg(test)]
pub(crate) fn pack(name: &[u8; 8], kind: u8, payload: &[u8]) -> Vec<u8> {
    let sectors = payload.len().div_ceil(SECTOR_SIZE);
    let mut data = name.to_vec();
    data.push(kind);
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    data.extend_from_slice(&[0, sectors as u8]);
    let checksum = header_checksum(&data);
    data.extend_from_slice(&checksum.to_le_bytes());
    data.extend_from_slice(payload);
    data.resize(HEADER_SIZE + sectors * SECTOR_SIZE, 0);
    data
}
