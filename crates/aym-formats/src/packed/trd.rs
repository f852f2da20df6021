//! TR-DOS disk images
//!
//! 80 tracks, 2 sides, 16 sectors of 256 bytes. The catalogue occupies
//! sectors 0 to 7 of track 0 (up to 128 entries of 16 bytes); sector 8 is
//! the service sector holding the disk type and the TR-DOS id.

use aym_common::MetaBuilder;

use crate::binary::Format;
use crate::catalog::{report, CatalogueEntry, Content, Decoded, Decoder};
use crate::io::ByteView;
use crate::packed::trdos::{unique_name, FileEntry, DELETED, END_OF_CATALOGUE, SECTOR_SIZE};
use crate::{require, Result};

const SECTORS_PER_TRACK: usize = 16;
const TRACKS: usize = 160;

/// Image size
pub const IMAGE_SIZE: usize = TRACKS * SECTORS_PER_TRACK * SECTOR_SIZE;

const ENTRY_SIZE: usize = 16;
const MAX_ENTRIES: usize = 128;
const START_SECTOR_OFFSET: usize = 14;
const START_TRACK_OFFSET: usize = 15;
const SERVICE_SECTOR: usize = 8 * SECTOR_SIZE;
const DISK_TYPE_OFFSET: usize = SERVICE_SECTOR + 0xe3;
const TRDOS_ID_OFFSET: usize = SERVICE_SECTOR + 0xe7;
const TRDOS_ID: u8 = 0x10;

const FORMAT: &str = concat!(
    // catalogue and the service sector up to the disk type
    "+2275+",
    // disk type, files count, free sectors
    "16-19 00-80 ??",
    // TR-DOS id
    "10"
);

/// Files stored on the image
pub fn parse(data: &[u8]) -> Result<Vec<CatalogueEntry>> {
    let view = ByteView::new(data);
    view.ensure_range(0, IMAGE_SIZE)?;
    require(view.read_u8(TRDOS_ID_OFFSET)? == TRDOS_ID, "missing TR-DOS id")?;
    require(
        (0x16..=0x19).contains(&view.read_u8(DISK_TYPE_OFFSET)?),
        "invalid disk type",
    )?;

    let mut files = Vec::new();
    let mut names = Vec::new();
    for idx in 0..MAX_ENTRIES {
        let offset = idx * ENTRY_SIZE;
        match view.read_u8(offset)? {
            END_OF_CATALOGUE => break,
            DELETED => continue,
            _ => {}
        }
        let entry = FileEntry::read(&view, offset)?;
        if entry.sectors == 0 {
            continue;
        }
        let sector = usize::from(view.read_u8(offset + START_SECTOR_OFFSET)?);
        let track = usize::from(view.read_u8(offset + START_TRACK_OFFSET)?);
        require(sector < SECTORS_PER_TRACK, "invalid start sector")?;
        let start = (track * SECTORS_PER_TRACK + sector) * SECTOR_SIZE;
        let body = view.slice(start, entry.size())?;
        let name = unique_name(entry.name, &names);
        names.push(name.clone());
        files.push(CatalogueEntry {
            name,
            data: body.to_vec(),
        });
    }
    require(!files.is_empty(), "no files")?;
    Ok(files)
}

/// TRD decoder
#[derive(Debug)]
pub struct TrdDecoder {
    format: Format,
}

impl TrdDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT).with_min_size(IMAGE_SIZE),
        }
    }

    fn decode_image(&self, data: &[u8]) -> Result<Decoded> {
        Ok(Decoded {
            content: Content::Catalogue(parse(data)?),
            used_size: IMAGE_SIZE,
            fixed_checksum: None,
        })
    }
}

impl Default for TrdDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for TrdDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data)
    }

    fn decode(&self, data: &[u8], _meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        report("TRD", self.decode_image(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_entry(image: &mut [u8], idx: usize, name: &[u8; 8], sectors: u8, sector: u8, track: u8) {
        let offset = idx * ENTRY_SIZE;
        image[offset..offset + 8].copy_from_slice(name);
        image[offset + 8] = b'C';
        image[offset + 13] = sectors;
        image[offset + START_SECTOR_OFFSET] = sector;
        image[offset + START_TRACK_OFFSET] = track;
    }

    fn image() -> Vec<u8> {
        let mut image = vec![0u8; IMAGE_SIZE];
        image[DISK_TYPE_OFFSET] = 0x16;
        image[DISK_TYPE_OFFSET + 1] = 2;
        image[TRDOS_ID_OFFSET] = TRDOS_ID;
        put_entry(&mut image, 0, b"ONE     ", 1, 0, 1);
        put_entry(&mut image, 1, b"\x01WO     ", 1, 1, 1);
        put_entry(&mut image, 2, b"THREE   ", 2, 15, 1);
        let track1 = SECTORS_PER_TRACK * SECTOR_SIZE;
        image[track1] = 0xaa;
        image[track1 + 15 * SECTOR_SIZE] = 0xbb;
        image[track1 + 16 * SECTOR_SIZE] = 0xcc;
        image
    }

    #[test]
    fn test_catalogue() {
        let data = image();
        let decoder = TrdDecoder::new();
        assert!(decoder.check(&data));
        let decoded = decoder.decode(&data, &mut ()).unwrap();
        assert_eq!(decoded.used_size, IMAGE_SIZE);
        let Content::Catalogue(files) = decoded.content else {
            panic!("catalogue expected");
        };
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "ONE.C");
        assert_eq!(files[0].data[0], 0xaa);
        assert_eq!(files[1].name, "THREE.C");
        assert_eq!(files[1].data.len(), 512);
        assert_eq!(files[1].data[256], 0xcc);
    }

    #[test]
    fn test_service_sector_checked() {
        let mut data = image();
        data[TRDOS_ID_OFFSET] = 0;
        assert!(!TrdDecoder::new().check(&data));
        assert!(parse(&data).is_err());
        assert!(!TrdDecoder::new().check(&image()[..IMAGE_SIZE - 1]));
    }
}
