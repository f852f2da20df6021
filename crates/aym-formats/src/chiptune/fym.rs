//! FYM register dumps
//!
//! The whole file is a zlib stream. Unpacked layout: five little-endian
//! dwords (header size, frames count, loop frame, chip clock, interrupt
//! frequency), title and author as C strings, then 14 register columns of
//! `frames` bytes each starting at the header size offset.

use std::io::Read;

use aym_common::MetaBuilder;
use flate2::read::ZlibDecoder;

use crate::binary::Format;
use crate::catalog::{report, Content, Decoded, Decoder};
use crate::io::{crc32, ByteView};
use crate::stream::{StreamBuilder, StreamModelBuilder, REGISTERS};
use crate::{require, FormatError, Result};

/// Program name reported for FYM dumps
pub const EDITOR: &str = "FYM";

const FIXED_HEADER_SIZE: usize = 20;
/// Unpacked size limit
pub const MAX_UNPACKED_SIZE: usize = 16 * 1024 * 1024;

// zlib header: deflate with 32k window and a valid check value
const FORMAT: &str = "78 01|5e|9c|da";

/// Unpack the zlib stream, returning the data and the packed bytes consumed
pub fn unpack(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let mut decoder = ZlibDecoder::new(data);
    let mut unpacked = Vec::new();
    (&mut decoder)
        .take(MAX_UNPACKED_SIZE as u64 + 1)
        .read_to_end(&mut unpacked)
        .map_err(|e| FormatError::DecompressionError(format!("invalid zlib stream: {e}")))?;
    if unpacked.len() > MAX_UNPACKED_SIZE {
        return Err(FormatError::DecompressionError(format!(
            "unpacked size exceeds limit of {MAX_UNPACKED_SIZE} bytes"
        )));
    }
    let used = decoder.total_in() as usize;
    Ok((unpacked, used.min(data.len())))
}

/// Parse unpacked dump data into `builder`
pub fn parse<B: StreamBuilder + ?Sized>(unpacked: &[u8], builder: &mut B) -> Result<()> {
    let view = ByteView::new(unpacked);
    let header_size = view.read_le32(0)? as usize;
    let frames = view.read_le32(4)? as usize;
    let loop_frame = view.read_le32(8)? as usize;
    let clock = view.read_le32(12)?;
    let int_freq = view.read_le32(16)?;
    require(header_size >= FIXED_HEADER_SIZE, "header too small")?;
    require(frames != 0, "zero frames")?;

    let (title, next) = view.read_nt_string(FIXED_HEADER_SIZE)?;
    let (author, _) = view.read_nt_string(next)?;
    let columns = view.slice(
        header_size,
        frames.checked_mul(REGISTERS).ok_or("frames count overflow")?,
    )?;

    let meta = builder.meta();
    meta.set_program(EDITOR);
    meta.set_title(&title);
    meta.set_author(&author);
    builder.set_clock_rate(u64::from(clock));
    if int_freq != 0 {
        builder.set_frame_rate(int_freq);
    }
    if loop_frame < frames {
        builder.set_loop(loop_frame);
    }
    builder.set_frames(frames);
    for (reg, column) in columns.chunks_exact(frames).enumerate() {
        builder.start_channel(reg);
        builder.add_values(column);
    }
    Ok(())
}

/// FYM decoder
#[derive(Debug)]
pub struct FymDecoder {
    format: Format,
}

impl FymDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT),
        }
    }

    fn decode_stream(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Result<Decoded> {
        let (unpacked, used_size) = unpack(data)?;
        let mut builder = StreamModelBuilder::new(meta);
        parse(&unpacked, &mut builder)?;
        Ok(Decoded {
            content: Content::Stream(builder.build()),
            used_size,
            fixed_checksum: Some(crc32(&unpacked)),
        })
    }
}

impl Default for FymDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FymDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data)
    }

    fn decode(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        report("FYM", self.decode_stream(data, meta))
    }
}
