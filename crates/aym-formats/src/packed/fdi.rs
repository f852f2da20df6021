//! Full Disk Image
//!
//! A 14-byte header (`FDI`, write protection, cylinders, sides, text and
//! data offsets, extra info size) is followed by one descriptor per track:
//! data offset, sectors count and a 7-byte record per sector. Sectors of a
//! track are concatenated in ascending logical number order.

use aym_common::MetaBuilder;

use crate::binary::Format;
use crate::catalog::{report, Content, Decoded, Decoder};
use crate::io::ByteView;
use crate::{require, Result};

/// Unpacked image size limit
pub const FDI_MAX_SIZE: usize = 1024 * 1024;

const HEADER_SIZE: usize = 14;
const CYLINDERS: std::ops::RangeInclusive<usize> = 40..=100;
const SIDES: std::ops::RangeInclusive<usize> = 1..=2;
const TRACK_HEADER_SIZE: usize = 7;
const SECTOR_RECORD_SIZE: usize = 7;
const MAX_SECTOR_SIZE_CODE: u8 = 6;

const FORMAT: &str = concat!(
    "'F'D'I",
    // write protection
    "%0000000x",
    // cylinders
    "%0xxxxxxx 00",
    // sides
    "%000000xx 00"
);

#[derive(Debug, Clone, Copy)]
struct Header {
    cylinders: usize,
    sides: usize,
    data_offset: usize,
    info_size: usize,
}

impl Header {
    fn read(view: &ByteView<'_>) -> Result<Self> {
        view.ensure_range(0, HEADER_SIZE)?;
        require(view.slice(0, 3)? == b"FDI", "invalid FDI id")?;
        let header = Self {
            cylinders: usize::from(view.read_le16(4)?),
            sides: usize::from(view.read_le16(6)?),
            data_offset: usize::from(view.read_le16(10)?),
            info_size: usize::from(view.read_le16(12)?),
        };
        require(
            (HEADER_SIZE..=view.len()).contains(&header.data_offset),
            "data offset out of range",
        )?;
        require(CYLINDERS.contains(&header.cylinders), "invalid cylinders count")?;
        require(SIDES.contains(&header.sides), "invalid sides count")?;
        Ok(header)
    }
}

struct SectorRef<'a> {
    number: u8,
    data: &'a [u8],
}

/// Unpack the image, returning the data and the used size
pub fn unpack(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let view = ByteView::new(data);
    let header = Header::read(&view)?;
    let mut result = Vec::new();
    let mut used_size = header.data_offset;
    let mut track_offset = HEADER_SIZE + header.info_size;
    for cylinder in 0..header.cylinders {
        for _side in 0..header.sides {
            let track_data = view.read_le32(track_offset)? as usize;
            let count = usize::from(view.read_u8(track_offset + 6)?);
            let mut sectors = Vec::with_capacity(count);
            for idx in 0..count {
                let record = track_offset + TRACK_HEADER_SIZE + idx * SECTOR_RECORD_SIZE;
                // head is always 0 in the wild and not checked
                require(
                    usize::from(view.read_u8(record)?) == cylinder,
                    "sector cylinder mismatch",
                )?;
                let number = view.read_u8(record + 2)?;
                let size_code = view.read_u8(record + 3)?;
                require(size_code <= MAX_SECTOR_SIZE_CODE, "invalid sector size")?;
                let size = 128usize << size_code;
                let offset = header.data_offset
                    + track_data
                    + usize::from(view.read_le16(record + 5)?);
                sectors.push(SectorRef {
                    number,
                    data: view.slice(offset, size)?,
                });
                used_size = used_size.max(offset + size);
            }
            sectors.sort_by_key(|sector| sector.number);
            for sector in &sectors {
                require(
                    result.len() + sector.data.len() <= FDI_MAX_SIZE,
                    "unpacked image too big",
                )?;
                result.extend_from_slice(sector.data);
            }
            track_offset += TRACK_HEADER_SIZE + count * SECTOR_RECORD_SIZE;
        }
    }
    Ok((result, used_size))
}

/// FDI decoder
#[derive(Debug)]
pub struct FdiDecoder {
    format: Format,
}

impl FdiDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT),
        }
    }

    fn decode_image(&self, data: &[u8]) -> Result<Decoded> {
        let (unpacked, used_size) = unpack(data)?;
        Ok(Decoded {
            content: Content::Packed(unpacked),
            used_size,
            fixed_checksum: None,
        })
    }
}

impl Default for FdiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FdiDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        Header::read(&ByteView::new(data)).is_ok()
    }

    fn decode(&self, data: &[u8], _meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        report("FDI", self.decode_image(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Image with `cylinders` single-sided tracks of two 256-byte sectors
    /// stored in reverse order; sector `n` of cylinder `c` is filled with
    /// `c * 2 + n`
    fn image(cylinders: u16) -> Vec<u8> {
        let tracks = usize::from(cylinders);
        let track_header = TRACK_HEADER_SIZE + 2 * SECTOR_RECORD_SIZE;
        let data_offset = HEADER_SIZE + tracks * track_header;
        let mut data = b"FDI\0".to_vec();
        data.extend_from_slice(&cylinders.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&(data_offset as u16).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        for cyl in 0..tracks {
            data.extend_from_slice(&((cyl * 512) as u32).to_le_bytes());
            data.extend_from_slice(&[0, 0, 2]);
            for (slot, number) in [1u8, 0].iter().enumerate() {
                data.extend_from_slice(&[cyl as u8, 0, *number, 1, 0]);
                data.extend_from_slice(&((slot * 256) as u16).to_le_bytes());
            }
        }
        for cyl in 0..tracks {
            for number in [1u8, 0] {
                data.extend(std::iter::repeat((cyl * 2) as u8 + number).take(256));
            }
        }
        data
    }

    #[test]
    fn test_sectors_sorted() {
        let mut data = image(40);
        let expected_used = data.len();
        data.extend_from_slice(&[0xaa; 10]);
        let decoder = FdiDecoder::new();
        assert!(decoder.format().matches(&data));
        assert!(decoder.check(&data));
        let decoded = decoder.decode(&data, &mut ()).unwrap();
        assert_eq!(decoded.used_size, expected_used);
        let Content::Packed(unpacked) = decoded.content else {
            panic!("packed data expected");
        };
        assert_eq!(unpacked.len(), 40 * 512);
        assert_eq!(unpacked[0], 0);
        assert_eq!(unpacked[256], 1);
        assert_eq!(unpacked[512 + 300], 3);
    }

    #[test]
    fn test_geometry_limits() {
        let decoder = FdiDecoder::new();
        assert!(!decoder.check(&image(39)));
        assert!(!decoder.check(&image(101)));
        let mut data = image(40);
        data[6] = 3;
        assert!(!decoder.check(&data));
    }

    #[test]
    fn test_truncated_sector() {
        let mut data = image(40);
        data.truncate(data.len() - 1);
        assert!(FdiDecoder::new().decode(&data, &mut ()).is_none());
    }
}
