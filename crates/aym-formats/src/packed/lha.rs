//! LHA unpacking for packed register dumps
//!
//! Most YM files in the wild are LH5 archives holding a single file. The
//! first archive member is unpacked via `delharc`; uncompressed input never
//! reaches this module.

use std::io::Read;
#[cfg(not(target_arch = "wasm32"))]
use std::io::Write;

use crate::{FormatError, Result};

/// Bytes searched for the `-lh?-` method id
const LHA_SEARCH_LIMIT: usize = 40;

const LHA_SIGNATURE_LENGTH: usize = 5;

/// Unpacked size limit
pub const MAX_DECOMPRESSED_SIZE: usize = 16 * 1024 * 1024;

/// Offset of the `-lh[0-7]-` method id, if present
fn find_lha_signature(data: &[u8]) -> Option<usize> {
    if data.len() < LHA_SIGNATURE_LENGTH + 2 {
        return None;
    }
    let search_limit = LHA_SEARCH_LIMIT.min(data.len() - LHA_SIGNATURE_LENGTH);
    (1..=search_limit).find(|&i| {
        matches!(
            &data[i..i + LHA_SIGNATURE_LENGTH],
            [b'-', b'l', b'h', b'0'..=b'7', b'-']
        )
    })
}

/// Data looks like an LHA archive
pub fn is_lha_compressed(data: &[u8]) -> bool {
    find_lha_signature(data).is_some()
}

/// Unpack the first member of an LHA archive
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let reader = delharc::LhaDecodeReader::new(data).map_err(|e| {
        FormatError::DecompressionError(format!("failed to parse LHA archive: {e}"))
    })?;

    #[cfg(not(target_arch = "wasm32"))]
    let mut temp_file = tempfile::NamedTempFile::new()?;
    #[cfg(not(target_arch = "wasm32"))]
    let reader = {
        temp_file.write_all(data)?;
        temp_file.flush()?;
        delharc::parse_file(temp_file.path()).map_err(|e| {
            FormatError::DecompressionError(format!("failed to parse LHA archive: {e}"))
        })?
    };

    let mut decompressed = Vec::new();
    reader
        .take(MAX_DECOMPRESSED_SIZE as u64)
        .read_to_end(&mut decompressed)
        .map_err(|e| FormatError::DecompressionError(format!("LHA decompression failed: {e}")))?;
    if decompressed.len() >= MAX_DECOMPRESSED_SIZE {
        return Err(FormatError::DecompressionError(format!(
            "unpacked data exceeds {MAX_DECOMPRESSED_SIZE} bytes"
        )));
    }
    log::debug!(
        "unpacked LHA archive: {} -> {} bytes",
        data.len(),
        decompressed.len()
    );
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lha_method_detection() {
        for level in b'0'..=b'7' {
            let data = [0x20, b'-', b'l', b'h', level, b'-', 0x15];
            assert!(is_lha_compressed(&data));
        }
        assert!(!is_lha_compressed(b"\x20-lh8-\x15"));
        assert!(!is_lha_compressed(b"\x20-lh5\x00\x15"));
        assert!(!is_lha_compressed(b"\x20-lh5-"));
        assert!(!is_lha_compressed(b"YM3!"));
        assert!(!is_lha_compressed(&[]));
    }

    #[test]
    fn test_signature_not_at_start() {
        assert!(!is_lha_compressed(b"-lh5-\x00\x00"));
        let mut data = b"YM6!LeOnArD!".to_vec();
        data.extend_from_slice(b"Title: Song-lh edition");
        assert!(!is_lha_compressed(&data));
    }

    #[test]
    fn test_garbage_archive_fails() {
        let result = decompress(b"\x20-lh5-\x15GARBAGE");
        assert!(matches!(
            result,
            Err(FormatError::DecompressionError(_)) | Err(FormatError::Io(_))
        ));
    }
}
