//! ZXZip archives
//!
//! A sequence of packed files, each starting with a 22-byte header: TR-DOS
//! name and type, unpacked size and sectors, packed size, CRC32 of the
//! unpacked data, packing method and flags. Stored (`0`) and deflated (`3`)
//! files are unpacked; shrink and implode are recognized but not supported.
//! Scanning stops at the first data that is not a valid file.

use std::io::Read;

use aym_common::MetaBuilder;
use flate2::read::DeflateDecoder;

use crate::binary::Format;
use crate::catalog::{report, CatalogueEntry, Content, Decoded, Decoder};
use crate::io::{crc32, ByteView};
use crate::packed::trdos::{unique_name, FileEntry};
use crate::{require, FormatError, Result};

const HEADER_SIZE: usize = 22;
const SOURCE_SIZE_OFFSET: usize = 11;
const PACKED_SIZE_OFFSET: usize = 14;
const CRC_OFFSET: usize = 16;
const METHOD_OFFSET: usize = 20;

const FORMAT: &str = concat!(
    // name and type, then two bytes of type parameters
    "(20-7a){9} ??",
    // unpacked size, sectors, packed size
    "?? 01-ff ??",
    // crc
    "????",
    // method, flags
    "00-03 %0000000x"
);

/// Packing method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Stored as is
    Store,
    /// LZW
    Shrink,
    /// Sliding dictionary with Shannon-Fano trees
    Implode,
    /// Raw deflate stream
    Deflate,
}

impl Method {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Method::Store),
            1 => Some(Method::Shrink),
            2 => Some(Method::Implode),
            3 => Some(Method::Deflate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Header {
    source_size: usize,
    packed_size: usize,
    crc: u32,
    method: Method,
}

impl Header {
    fn read(view: &ByteView<'_>, offset: usize) -> Result<Self> {
        let code = view.read_u8(offset + METHOD_OFFSET)?;
        let method = Method::from_code(code)
            .ok_or_else(|| FormatError::from(format!("invalid method {code}")))?;
        let header = Self {
            source_size: usize::from(view.read_le16(offset + SOURCE_SIZE_OFFSET)?),
            packed_size: usize::from(view.read_le16(offset + PACKED_SIZE_OFFSET)?),
            crc: view.read_le32(offset + CRC_OFFSET)?,
            method,
        };
        require(
            header.source_size != 0 && header.packed_size != 0,
            "empty file",
        )?;
        require(
            header.method != Method::Store || header.source_size == header.packed_size,
            "stored size mismatch",
        )?;
        Ok(header)
    }
}

fn inflate(packed: &[u8], size: usize) -> Result<Vec<u8>> {
    let mut unpacked = Vec::with_capacity(size);
    DeflateDecoder::new(packed)
        .take(size as u64 + 1)
        .read_to_end(&mut unpacked)
        .map_err(|e| FormatError::DecompressionError(format!("invalid deflate stream: {e}")))?;
    require(unpacked.len() == size, "unpacked size mismatch")?;
    Ok(unpacked)
}

/// Unpack the file at `offset`, returning its contents and packed size
/// including the header
pub fn unpack_file(data: &[u8], offset: usize) -> Result<(Vec<u8>, usize)> {
    let view = ByteView::new(data);
    let header = Header::read(&view, offset)?;
    let packed = view.slice(offset + HEADER_SIZE, header.packed_size)?;
    let unpacked = match header.method {
        Method::Store => packed.to_vec(),
        Method::Deflate => inflate(packed, header.source_size)?,
        other => return Err(FormatError::Unsupported(format!("{other:?} method"))),
    };
    let computed = crc32(&unpacked);
    if computed != header.crc {
        return Err(FormatError::ChecksumMismatch {
            stored: header.crc,
            computed,
        });
    }
    Ok((unpacked, HEADER_SIZE + header.packed_size))
}

/// ZXZip decoder
#[derive(Debug)]
pub struct ZxZipDecoder {
    format: Format,
}

impl ZxZipDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT),
        }
    }

    fn is_file(&self, data: &[u8]) -> bool {
        self.format.matches(data) && Header::read(&ByteView::new(data), 0).is_ok()
    }

    /// Files and used size
    pub fn parse(&self, data: &[u8]) -> Result<(Vec<CatalogueEntry>, usize)> {
        let view = ByteView::new(data);
        let mut files: Vec<CatalogueEntry> = Vec::new();
        let mut names = Vec::new();
        let mut offset = 0;
        while offset < data.len() && self.is_file(&data[offset..]) {
            let (unpacked, used) = match unpack_file(data, offset) {
                Ok(file) => file,
                Err(e) if files.is_empty() => return Err(e),
                Err(e) => {
                    log::debug!("ZXZIP: stop at 0x{offset:x}: {e}");
                    break;
                }
            };
            let name = unique_name(FileEntry::read(&view, offset)?.name, &names);
            names.push(name.clone());
            files.push(CatalogueEntry {
                name,
                data: unpacked,
            });
            offset += used;
        }
        require(!files.is_empty(), "no files")?;
        Ok((files, offset))
    }

    fn decode_archive(&self, data: &[u8]) -> Result<Decoded> {
        let (files, used_size) = self.parse(data)?;
        Ok(Decoded {
            content: Content::Catalogue(files),
            used_size,
            fixed_checksum: None,
        })
    }
}

impl Default for ZxZipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ZxZipDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.is_file(data)
    }

    fn decode(&self, data: &[u8], _meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        report("ZXZIP", self.decode_archive(data))
    }
}

/// One archived file named `name` of type `kind`
#[cfg(test)]
pub(crate) fn pack(name: &[u8; 8], kind: u8, payload: &[u8], deflate: bool) -> Vec<u8> {
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    let packed = if deflate {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(payload).unwrap();
        encoder.finish().unwrap()
    } else {
        payload.to_vec()
    };
    let mut data = name.to_vec();
    data.extend_from_slice(&[kind, 0, 0x80]);
    data.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    data.push(payload.len().div_ceil(256) as u8);
    data.extend_from_slice(&(packed.len() as u16).to_le_bytes());
    data.extend_from_slice(&crc32(payload).to_le_bytes());
    data.push(if deflate { 3 } else { 0 });
    data.push(0);
    data.extend_from_slice(&packed);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(seed: u8) -> Vec<u8> {
        (0..600u32).map(|v| (v % 7) as u8 + seed).collect()
    }

    #[test]
    fn test_files_and_used_size() {
        let mut data = pack(b"TUNE    ", b'C', &payload(1), true);
        data.extend(pack(b"TUNE    ", b'C', &payload(2), false));
        data.extend(pack(b"boot    ", b'B', &[0xc9], false));
        let used = data.len();
        data.extend_from_slice(&[0; 8]);

        let decoder = ZxZipDecoder::new();
        assert!(decoder.check(&data));
        let decoded = decoder.decode(&data, &mut ()).unwrap();
        assert_eq!(decoded.used_size, used);
        let Content::Catalogue(files) = decoded.content else {
            panic!("catalogue expected");
        };
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["TUNE.C", "TUNE.C~1", "boot.B"]);
        assert_eq!(files[0].data, payload(1));
        assert_eq!(files[1].data, payload(2));
        assert_eq!(files[2].data, vec![0xc9]);
    }

    #[test]
    fn test_deflate_packs_smaller() {
        let data = pack(b"TUNE    ", b'C', &payload(0), true);
        assert!(data.len() < HEADER_SIZE + 600);
        let (unpacked, used) = unpack_file(&data, 0).unwrap();
        assert_eq!(unpacked, payload(0));
        assert_eq!(used, data.len());
    }

    #[test]
    fn test_crc_mismatch() {
        let mut data = pack(b"TUNE    ", b'C', &payload(0), false);
        data[CRC_OFFSET] ^= 1;
        assert!(matches!(
            unpack_file(&data, 0),
            Err(FormatError::ChecksumMismatch { .. })
        ));
        assert!(ZxZipDecoder::new().decode(&data, &mut ()).is_none());
    }

    #[test]
    fn test_unsupported_method() {
        let mut data = pack(b"TUNE    ", b'C', &payload(0), true);
        data[METHOD_OFFSET] = 2;
        assert!(ZxZipDecoder::new().check(&data));
        assert!(matches!(
            unpack_file(&data, 0),
            Err(FormatError::Unsupported(_))
        ));
    }

    #[test]
    fn test_broken_later_file_ends_archive() {
        let first = pack(b"TUNE    ", b'C', &payload(0), false);
        let mut data = first.clone();
        data.extend(pack(b"NEXT    ", b'C', &payload(1), true));
        data.truncate(data.len() - 10);
        let (files, used) = ZxZipDecoder::new().parse(&data).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(used, first.len());
    }

    #[test]
    fn test_header_checks() {
        let decoder = ZxZipDecoder::new();
        let mut data = pack(b"TUNE    ", b'C', &payload(0), false);
        data[PACKED_SIZE_OFFSET] ^= 1;
        assert!(!decoder.check(&data));
        assert!(!decoder.check(&data[..HEADER_SIZE - 1]));
        assert!(decoder.decode(&[0; 64], &mut ()).is_none());
    }
}
