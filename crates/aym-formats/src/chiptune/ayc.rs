//! AY Chip Compiler register streams
//!
//! The 50-byte header holds the song duration in frames and one buffer
//! descriptor per register: the depacking window size class (1 or 4, in
//! 256-byte units) and a relative offset of the packed column. Each column is
//! an LZ stream decoded into a circular window that is flushed to the
//! builder every time it wraps.

use aym_common::MetaBuilder;

use crate::binary::Format;
use crate::catalog::{report, Content, Decoded, Decoder};
use crate::io::{crc32, ByteView};
use crate::packed::lz::{BackRefWidth, ByteStream, CircularWindow, ControlBits};
use crate::stream::{StreamBuilder, StreamModelBuilder, REGISTERS};
use crate::{require, Result};

/// Program name reported for AYC streams
pub const EDITOR: &str = "AY Chip Compiler";

/// Chip clock AYC streams are recorded for
pub const CLOCK_RATE: u64 = 1_000_000;

const DESCRIPTORS_OFFSET: usize = 2;
const DESCRIPTOR_SIZE: usize = 3;
const HEADER_SIZE: usize = 50;
const MIN_SIZE: usize = HEADER_SIZE + REGISTERS;

const FORMAT: &str = concat!(
    // about 10 minutes at most
    "?00-75",
    // first column right after the header
    "01|04 2e00",
    // no more than 32k
    "(01|04 ?00-80){13}",
    "ff{6}"
);

#[derive(Debug, Clone, Copy)]
struct BufferDescriptor {
    size_hi: u8,
    offset: usize,
}

impl BufferDescriptor {
    fn read(view: &ByteView<'_>, register: usize) -> Result<Self> {
        let pos = DESCRIPTORS_OFFSET + register * DESCRIPTOR_SIZE;
        let size_hi = view.read_u8(pos)?;
        let relative = usize::from(view.read_le16(pos + 1)?);
        Ok(Self {
            size_hi,
            offset: relative + register * DESCRIPTOR_SIZE + 4,
        })
    }

    fn is_valid(&self) -> bool {
        matches!(self.size_hi, 1 | 4)
    }

    fn window_size(&self) -> usize {
        usize::from(self.size_hi) << 8
    }

    fn width(&self) -> BackRefWidth {
        if self.size_hi == 1 {
            BackRefWidth::Byte
        } else {
            BackRefWidth::Word
        }
    }
}

fn read_descriptors(view: &ByteView<'_>) -> Result<[BufferDescriptor; REGISTERS]> {
    let mut descriptors = [BufferDescriptor {
        size_hi: 0,
        offset: 0,
    }; REGISTERS];
    for (register, slot) in descriptors.iter_mut().enumerate() {
        *slot = BufferDescriptor::read(view, register)?;
    }
    Ok(descriptors)
}

/// Header sanity: valid window classes and ascending column offsets
pub fn fast_check(data: &[u8]) -> bool {
    if data.len() <= HEADER_SIZE {
        return false;
    }
    let Ok(descriptors) = read_descriptors(&ByteView::new(data)) else {
        return false;
    };
    let mut min_start = HEADER_SIZE;
    for descriptor in &descriptors {
        if !descriptor.is_valid() || descriptor.offset < min_start {
            return false;
        }
        min_start = descriptor.offset;
    }
    true
}

/// Back-reference run length; `0` encodes 256
fn read_counter(stream: &mut ByteStream<'_>) -> Result<usize> {
    let value = stream.read_byte()?.wrapping_neg();
    Ok(if value == 0 { 256 } else { usize::from(value) })
}

/// Depack one register column of exactly `count` values
fn parse_column<B: StreamBuilder + ?Sized>(
    count: usize,
    descriptor: &BufferDescriptor,
    stream: &mut ByteStream<'_>,
    builder: &mut B,
) -> Result<()> {
    let mut window = CircularWindow::new(descriptor.window_size())?;
    let mut bits = ControlBits::with_state(0x40);
    let mut sink = |values: &[u8]| builder.add_values(values);
    let mut left = count;
    while left != 0 {
        if bits.next_bit(stream)? {
            let run = read_counter(stream)?;
            let source = descriptor.width().read(stream)?;
            require(run <= left, "back reference past the column end")?;
            left -= run;
            window.copy(source, run, &mut sink)?;
        } else {
            left -= 1;
            window.push(stream.read_byte()?, &mut sink);
        }
    }
    window.finish(&mut sink);
    Ok(())
}

/// Parse a stream into `builder`, returning the used size and the range
/// covered by packed columns
pub fn parse<B: StreamBuilder + ?Sized>(data: &[u8], builder: &mut B) -> Result<(usize, usize)> {
    require(fast_check(data), "invalid AYC header")?;
    let view = ByteView::new(data);
    let frames = usize::from(view.read_le16(0)?);
    let descriptors = read_descriptors(&view)?;

    builder.meta().set_program(EDITOR);
    builder.set_clock_rate(CLOCK_RATE);
    builder.set_frames(frames);
    let mut used_begin = data.len();
    let mut used_end = 0;
    for (register, descriptor) in descriptors.iter().enumerate() {
        builder.start_channel(register);
        let mut stream = ByteStream::at(data, descriptor.offset)?;
        parse_column(frames, descriptor, &mut stream, builder)?;
        used_begin = used_begin.min(descriptor.offset);
        used_end = used_end.max(stream.position());
    }
    Ok((used_begin, used_end))
}

/// AYC decoder
#[derive(Debug)]
pub struct AycDecoder {
    format: Format,
}

impl AycDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT).with_min_size(MIN_SIZE),
        }
    }

    fn decode_stream(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Result<Decoded> {
        let mut builder = StreamModelBuilder::new(meta);
        let (begin, end) = parse(data, &mut builder)?;
        Ok(Decoded {
            content: Content::Stream(builder.build()),
            used_size: end,
            fixed_checksum: Some(crc32(&data[begin..end])),
        })
    }
}

impl Default for AycDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AycDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        fast_check(data)
    }

    fn decode(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        report("AYC", self.decode_stream(data, meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Header with every column stored as the given packed bytes
    fn stream(frames: u16, columns: &[Vec<u8>; REGISTERS]) -> Vec<u8> {
        let mut data = vec![0xff; HEADER_SIZE];
        data[0..2].copy_from_slice(&frames.to_le_bytes());
        for (register, column) in columns.iter().enumerate() {
            let pos = DESCRIPTORS_OFFSET + register * DESCRIPTOR_SIZE;
            let relative = data.len() - register * DESCRIPTOR_SIZE - 4;
            data[pos] = 1;
            data[pos + 1..pos + 3].copy_from_slice(&(relative as u16).to_le_bytes());
            data.extend_from_slice(column);
        }
        data
    }

    #[test]
    fn test_first_descriptor_offset() {
        let columns: [Vec<u8>; REGISTERS] = std::array::from_fn(|_| vec![0x00, 0x00]);
        let data = stream(1, &columns);
        assert_eq!(&data[2..5], &[0x01, 0x2e, 0x00]);
        assert!(AycDecoder::new().format().matches(&data));
        assert!(fast_check(&data));
    }

    #[test]
    fn test_literals_and_back_reference() {
        // control byte 0x40: after the preset zero bit, bits are 0,1,0,...
        // literal 7, literal 9, back reference of 3 from 0, literal 5
        let column = vec![7, 0x40, 9, 0xfd, 0x00, 5];
        let columns: [Vec<u8>; REGISTERS] = std::array::from_fn(|_| column.clone());
        let data = stream(6, &columns);
        let mut meta = ();
        let mut builder = StreamModelBuilder::new(&mut meta);
        let (begin, end) = parse(&data, &mut builder).unwrap();
        assert_eq!(begin, HEADER_SIZE);
        assert_eq!(end, data.len());
        let model = builder.build();
        let first: Vec<u8> = model.frames.iter().map(|f| f.registers[0]).collect();
        assert_eq!(first, vec![7, 9, 7, 9, 7, 5]);
        assert_eq!(model.clock_rate, Some(CLOCK_RATE));
    }

    #[test]
    fn test_window_wrap_keeps_order() {
        // literals 1, 2, 3, then 256 and 41 values copied from position 0
        let column = vec![1, 0x30, 2, 3, 0x00, 0x00, 0xd7, 0x00];
        let columns: [Vec<u8>; REGISTERS] = std::array::from_fn(|_| column.clone());
        let data = stream(300, &columns);
        let mut meta = ();
        let mut builder = StreamModelBuilder::new(&mut meta);
        parse(&data, &mut builder).unwrap();
        let model = builder.build();
        assert_eq!(model.len(), 300);
        for (idx, frame) in model.frames.iter().enumerate() {
            assert_eq!(frame.registers[5], [1, 2, 3][idx % 3], "frame {idx}");
        }
    }

    #[test]
    fn test_overlong_back_reference_rejected() {
        let column = vec![7, 0x40, 9, 0x00, 0x00];
        let columns: [Vec<u8>; REGISTERS] = std::array::from_fn(|_| column.clone());
        let data = stream(4, &columns);
        assert!(AycDecoder::new().decode(&data, &mut ()).is_none());
    }

    #[test]
    fn test_descending_offsets_rejected() {
        let columns: [Vec<u8>; REGISTERS] = std::array::from_fn(|_| vec![0x00, 0x00]);
        let mut data = stream(1, &columns);
        data[DESCRIPTORS_OFFSET + 4] = 0;
        data[DESCRIPTORS_OFFSET + 5] = 0;
        assert!(!fast_check(&data));
    }
}
