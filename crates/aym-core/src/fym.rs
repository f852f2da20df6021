//! FYM register dump writer
//!
//! FYM is a zlib-compressed stream: a little-endian header (header size,
//! frames count, loop frame, chip clock, interrupt frequency), title and
//! author as C strings, then each of the 14 registers for all frames.
//! Frames without an envelope shape write store `0xff` in register 13.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

use crate::backend::AymDevice;
use crate::registers::{DataChunk, Register, REGISTERS_COUNT};
use crate::Result;

/// Fixed header part: five little-endian dwords
pub const FYM_HEADER_SIZE: usize = 20;

/// Envelope shape column value for frames without a shape write
pub const FYM_NO_ENVELOPE: u8 = 0xff;

/// Dump properties stored in the FYM header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FymParameters {
    /// Song title
    pub title: String,
    /// Song author
    pub author: String,
    /// Frame to restart from
    pub loop_frame: u32,
    /// Chip clock in Hz
    pub clock_freq: u64,
    /// Frame duration in microseconds
    pub frame_duration_us: u32,
}

/// Device recording the full register state once per rendered chunk
#[derive(Debug, Clone)]
pub struct FymDumper {
    params: FymParameters,
    state: [u8; REGISTERS_COUNT],
    frames: Vec<[u8; REGISTERS_COUNT]>,
}

impl FymDumper {
    /// Create an empty dump
    pub fn new(params: FymParameters) -> Self {
        Self {
            params,
            state: [0; REGISTERS_COUNT],
            frames: Vec::new(),
        }
    }

    /// Frames recorded so far
    pub fn frames(&self) -> &[[u8; REGISTERS_COUNT]] {
        &self.frames
    }

    /// Serialize and compress the dump
    pub fn finish(&self) -> Result<Vec<u8>> {
        let title = self.params.title.as_bytes();
        let author = self.params.author.as_bytes();
        let header_size = FYM_HEADER_SIZE + title.len() + 1 + author.len() + 1;
        let frames_count = self.frames.len();
        let int_freq = 1_000_000 / self.params.frame_duration_us.max(1);

        let mut raw = Vec::with_capacity(header_size + frames_count * REGISTERS_COUNT);
        raw.extend_from_slice(&(header_size as u32).to_le_bytes());
        raw.extend_from_slice(&(frames_count as u32).to_le_bytes());
        raw.extend_from_slice(&self.params.loop_frame.to_le_bytes());
        raw.extend_from_slice(&(self.params.clock_freq as u32).to_le_bytes());
        raw.extend_from_slice(&int_freq.to_le_bytes());
        raw.extend_from_slice(title);
        raw.push(0);
        raw.extend_from_slice(author);
        raw.push(0);
        for reg in 0..REGISTERS_COUNT {
            raw.extend(self.frames.iter().map(|frame| frame[reg]));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }
}

impl AymDevice for FymDumper {
    fn render_data(&mut self, chunk: &DataChunk) {
        for reg in Register::ALL {
            if let Some(value) = chunk.get(reg) {
                self.state[reg as usize] = value & reg.width_mask();
            }
        }
        let mut frame = self.state;
        if chunk.get(Register::EnvelopeShape).is_none() {
            frame[Register::EnvelopeShape as usize] = FYM_NO_ENVELOPE;
        }
        self.frames.push(frame);
    }

    fn reset(&mut self) {
        self.state = [0; REGISTERS_COUNT];
        self.frames.clear();
    }

    fn dump_registers(&self) -> [u8; REGISTERS_COUNT] {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    #[test]
    fn test_fym_layout() {
        let mut dumper = FymDumper::new(FymParameters {
            title: "Tune".into(),
            author: "Me".into(),
            loop_frame: 1,
            clock_freq: 1_773_400,
            frame_duration_us: 20_000,
        });
        let mut chunk = DataChunk::new(0);
        chunk.set(Register::VolumeA, 0x3f);
        dumper.render_data(&chunk);
        let mut chunk = DataChunk::new(0);
        chunk.set(Register::ToneALo, 0x12);
        dumper.render_data(&chunk);

        let packed = dumper.finish().unwrap();
        let mut raw = Vec::new();
        ZlibDecoder::new(&packed[..]).read_to_end(&mut raw).unwrap();

        let header_size = FYM_HEADER_SIZE + 5 + 3;
        assert_eq!(&raw[0..4], &(header_size as u32).to_le_bytes());
        assert_eq!(&raw[4..8], &2u32.to_le_bytes());
        assert_eq!(&raw[16..20], &50u32.to_le_bytes());
        assert_eq!(&raw[20..25], b"Tune\0");
        assert_eq!(raw.len(), header_size + 2 * REGISTERS_COUNT);
        // register 0 column, then 1, ...
        assert_eq!(&raw[header_size..header_size + 2], &[0x00, 0x12]);
        let vol_a = header_size + 2 * Register::VolumeA as usize;
        assert_eq!(&raw[vol_a..vol_a + 2], &[0x1f, 0x1f]);
        let shape = header_size + 2 * Register::EnvelopeShape as usize;
        assert_eq!(&raw[shape..shape + 2], &[FYM_NO_ENVELOPE, FYM_NO_ENVELOPE]);
    }
}
