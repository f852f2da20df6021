//! SCL archives
//!
//! `SINCLAIR` id, files count, one 14-byte TR-DOS entry per file, file data
//! in whole sectors and a trailing 32-bit sum of all preceding bytes.

use aym_common::MetaBuilder;

use crate::binary::Format;
use crate::catalog::{report, CatalogueEntry, Content, Decoded, Decoder};
use crate::io::ByteView;
use crate::packed::trdos::{unique_name, FileEntry};
use crate::{require, FormatError, Result};

const SIGNATURE: &[u8; 8] = b"SINCLAIR";
const COUNT_OFFSET: usize = 8;
const ENTRIES_OFFSET: usize = 9;
const ENTRY_SIZE: usize = 14;
const CHECKSUM_SIZE: usize = 4;

const FORMAT: &str = "'S'I'N'C'L'A'I'R 01-ff";

fn checksum(data: &[u8]) -> u32 {
    data.iter()
        .fold(0u32, |sum, b| sum.wrapping_add(u32::from(*b)))
}

/// Files and used size
pub fn parse(data: &[u8]) -> Result<(Vec<CatalogueEntry>, usize)> {
    let view = ByteView::new(data);
    require(view.slice(0, SIGNATURE.len())? == SIGNATURE, "invalid SCL id")?;
    let count = usize::from(view.read_u8(COUNT_OFFSET)?);
    require(count != 0, "empty archive")?;

    let mut offset = ENTRIES_OFFSET + count * ENTRY_SIZE;
    let mut files = Vec::with_capacity(count);
    let mut names = Vec::with_capacity(count);
    for idx in 0..count {
        let entry = FileEntry::read(&view, ENTRIES_OFFSET + idx * ENTRY_SIZE)?;
        let body = view.slice(offset, entry.size())?;
        offset += entry.size();
        let name = unique_name(entry.name, &names);
        names.push(name.clone());
        files.push(CatalogueEntry {
            name,
            data: body.to_vec(),
        });
    }

    let stored = view.read_le32(offset)?;
    let computed = checksum(&data[..offset]);
    if stored != computed {
        return Err(FormatError::ChecksumMismatch { stored, computed });
    }
    Ok((files, offset + CHECKSUM_SIZE))
}

/// SCL decoder
#[derive(Debug)]
pub struct SclDecoder {
    format: Format,
}

impl SclDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT),
        }
    }

    fn decode_archive(&self, data: &[u8]) -> Result<Decoded> {
        let (files, used_size) = parse(data)?;
        Ok(Decoded {
            content: Content::Catalogue(files),
            used_size,
            fixed_checksum: None,
        })
    }
}

impl Default for SclDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SclDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data)
    }

    fn decode(&self, data: &[u8], _meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        report("SCL", self.decode_archive(data))
    }
}

/// Archive holding `files` as `(name, type, sectors contents)`
#[cfg(test)]
pub(crate) fn build(files: &[(&[u8; 8], u8, Vec<u8>)]) -> Vec<u8> {
    use crate::packed::trdos::SECTOR_SIZE;

    let mut data = SIGNATURE.to_vec();
    data.push(files.len() as u8);
    for (name, kind, body) in files {
        data.extend_from_slice(&name[..]);
        data.push(*kind);
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.push(body.len().div_ceil(SECTOR_SIZE) as u8);
    }
    for (_, _, body) in files {
        let start = data.len();
        data.extend_from_slice(body);
        data.resize(start + body.len().div_ceil(SECTOR_SIZE) * SECTOR_SIZE, 0);
    }
    let sum = checksum(&data);
    data.extend_from_slice(&sum.to_le_bytes());
    data
}
