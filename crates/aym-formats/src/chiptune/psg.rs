//! PSG register dumps
//!
//! A 16-byte header (`PSG\x1a`, version, interrupt frequency) followed by a
//! command stream: `0xff` starts a frame, `0xfe N` skips `4 * N` frames,
//! `0xfd` ends the dump and any byte below 16 is a register number followed
//! by its value. Dumps longer than [`MAX_FRAMES`] are rejected.

use aym_common::MetaBuilder;

use crate::binary::Format;
use crate::catalog::{report, Content, Decoded, Decoder};
use crate::chiptune::ym::MAX_FRAMES;
use crate::io::crc32;
use crate::packed::lz::ByteStream;
use crate::stream::{StreamBuilder, StreamModelBuilder, REGISTERS};
use crate::{require, Result};

const HEADER_SIZE: usize = 16;
const VERSION_OFFSET: usize = 4;
const FREQUENCY_OFFSET: usize = 5;
/// Interrupt frequency is stored starting from this version
const FREQUENCY_VERSION: u8 = 10;

const FRAME: u8 = 0xff;
const SKIP: u8 = 0xfe;
const END: u8 = 0xfd;
const MAX_REGISTER: u8 = 0x0f;

const FORMAT: &str = "'P'S'G 1a";

/// Parse a dump into `builder`, returning the used size
pub fn parse<B: StreamBuilder + ?Sized>(data: &[u8], builder: &mut B) -> Result<usize> {
    let mut stream = ByteStream::at(data, HEADER_SIZE)?;
    let version = data[VERSION_OFFSET];
    let frequency = data[FREQUENCY_OFFSET];
    if version >= FREQUENCY_VERSION && frequency != 0 {
        builder.set_frame_rate(u32::from(frequency));
    }

    let mut frames = 0usize;
    while stream.remaining() != 0 {
        match stream.read_byte()? {
            FRAME => {
                require(frames < MAX_FRAMES, "frames count exceeds limit")?;
                builder.add_frame();
                frames += 1;
            }
            SKIP => {
                let count = 4 * usize::from(stream.read_byte()?);
                require(frames + count <= MAX_FRAMES, "frames count exceeds limit")?;
                for _ in 0..count {
                    builder.add_frame();
                }
                frames += count;
            }
            END => break,
            register @ 0..=MAX_REGISTER => {
                let value = stream.read_byte()?;
                if frames == 0 {
                    builder.add_frame();
                    frames = 1;
                }
                if usize::from(register) < REGISTERS {
                    builder.set_register(usize::from(register), value);
                }
            }
            other => return Err(format!("invalid command 0x{other:02x}").into()),
        }
    }
    if frames == 0 {
        return Err("no frames".into());
    }
    Ok(stream.position())
}

/// PSG decoder
#[derive(Debug)]
pub struct PsgDecoder {
    format: Format,
}

impl PsgDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT).with_min_size(HEADER_SIZE + 1),
        }
    }

    fn decode_stream(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Result<Decoded> {
        let mut builder = StreamModelBuilder::new(meta);
        let used_size = parse(data, &mut builder)?;
        Ok(Decoded {
            content: Content::Stream(builder.build()),
            used_size,
            fixed_checksum: Some(crc32(&data[HEADER_SIZE..used_size])),
        })
    }
}

impl Default for PsgDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PsgDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data)
    }

    fn decode(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        if !self.check(data) {
            return None;
        }
        report("PSG", self.decode_stream(data, meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(body: &[u8]) -> Vec<u8> {
        let mut data = b"PSG\x1a".to_vec();
        data.resize(HEADER_SIZE, 0);
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn test_frames_and_skips() {
        let data = dump(&[FRAME, 0, 0x10, 7, 0x38, FRAME, SKIP, 1, FRAME, 8, 15, END, 0xaa]);
        let decoded = PsgDecoder::new().decode(&data, &mut ()).unwrap();
        assert_eq!(decoded.used_size, data.len() - 1);
        let Content::Stream(model) = decoded.content else {
            panic!("stream expected");
        };
        assert_eq!(model.len(), 7);
        assert_eq!(model.frames[0].registers[0], 0x10);
        assert_eq!(model.frames[0].registers[7], 0x38);
        assert_eq!(model.frames[5].registers[7], 0x38);
        assert_eq!(model.frames[6].registers[8], 15);
        assert_eq!(model.frames[6].written, 1 << 8);
    }

    #[test]
    fn test_writes_before_first_frame() {
        let data = dump(&[1, 2, 14, 0x55]);
        let mut meta = ();
        let mut builder = StreamModelBuilder::new(&mut meta);
        assert_eq!(parse(&data, &mut builder).unwrap(), data.len());
        let model = builder.build();
        assert_eq!(model.len(), 1);
        assert_eq!(model.frames[0].written, 1 << 1);
    }

    #[test]
    fn test_frame_rate_from_header() {
        let mut data = dump(&[FRAME]);
        data[VERSION_OFFSET] = FREQUENCY_VERSION;
        data[FREQUENCY_OFFSET] = 60;
        let decoded = PsgDecoder::new().decode(&data, &mut ()).unwrap();
        let Content::Stream(model) = decoded.content else {
            panic!("stream expected");
        };
        assert_eq!(model.frame_rate, Some(60));
    }

    #[test]
    fn test_invalid_input() {
        let decoder = PsgDecoder::new();
        assert!(decoder.decode(&dump(&[FRAME, 0x20]), &mut ()).is_none());
        assert!(decoder.decode(&dump(&[FRAME, 3]), &mut ()).is_none());
        assert!(decoder.decode(&dump(&[END]), &mut ()).is_none());
        assert!(!decoder.check(b"PSG\x1b"));
    }

    #[test]
    fn test_frames_limit() {
        // 98 skips of 1020 frames fit, one more runs past the limit
        let mut body = vec![FRAME];
        for _ in 0..MAX_FRAMES / 1020 {
            body.extend_from_slice(&[SKIP, 0xff]);
        }
        let mut meta = ();
        let mut builder = StreamModelBuilder::new(&mut meta);
        assert!(parse(&dump(&body), &mut builder).is_ok());

        body.extend_from_slice(&[SKIP, 0xff, END]);
        let mut builder = StreamModelBuilder::new(&mut meta);
        assert!(parse(&dump(&body), &mut builder).is_err());
        assert!(PsgDecoder::new().decode(&dump(&body), &mut ()).is_none());
    }
}
