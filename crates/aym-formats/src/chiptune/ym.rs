//! YM register dumps (Atari ST)
//!
//! Supported layouts:
//! - `YM2!`/`YM3!`: 4-byte id, then 14 interleaved register columns
//! - `YM3b`: as YM3 with a trailing little-endian loop frame
//! - `YM4!`: `LeOnArD!` header, digidrums, title/author/comment strings,
//!   14-register frames
//! - `YM5!`/`YM6!`: as YM4 with chip clock, player frequency and extra data
//!   fields, 16-register frames
//!
//! Frames of YM4 and newer are interleaved when attribute bit 0 is set.
//! Registers 14 and 15 carry effect data and are dropped. Most files in the
//! wild are LHA archives; with the `lha` feature they are unpacked
//! transparently.

use aym_common::{MetaBuilder, ATARI_ST_CLOCK, FRAME_RATE_PAL};

use crate::binary::Format;
use crate::catalog::{report, Content, Decoded, Decoder};
use crate::io::{crc32, ByteView};
use crate::stream::{StreamBuilder, StreamModelBuilder, REGISTERS};
use crate::{require, Result};

const ID_SIZE: usize = 4;
const SIGNATURE: &[u8; 8] = b"LeOnArD!";
const END_MARKER: &[u8; 4] = b"End!";
const ATTR_INTERLEAVED: u32 = 1;
const LOOP_SIZE: usize = 4;

/// Upper bound on the declared frames count
pub const MAX_FRAMES: usize = 100_000;

const FORMAT: &str = "'Y'M 32-36 21|62";

/// Format revision, from the 4-byte id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// `YM2!`
    Ym2,
    /// `YM3!`
    Ym3,
    /// `YM3b`
    Ym3b,
    /// `YM4!`
    Ym4,
    /// `YM5!`
    Ym5,
    /// `YM6!`
    Ym6,
}

impl Version {
    /// Version of the given id
    pub fn detect(data: &[u8]) -> Option<Self> {
        match data.get(..ID_SIZE)? {
            b"YM2!" => Some(Version::Ym2),
            b"YM3!" => Some(Version::Ym3),
            b"YM3b" => Some(Version::Ym3b),
            b"YM4!" => Some(Version::Ym4),
            b"YM5!" => Some(Version::Ym5),
            b"YM6!" => Some(Version::Ym6),
            _ => None,
        }
    }

    fn program(self) -> &'static str {
        match self {
            Version::Ym2 => "YM2",
            Version::Ym3 => "YM3",
            Version::Ym3b => "YM3b",
            Version::Ym4 => "YM4",
            Version::Ym5 => "YM5",
            Version::Ym6 => "YM6",
        }
    }

    fn registers_per_frame(self) -> usize {
        match self {
            Version::Ym5 | Version::Ym6 => 16,
            _ => REGISTERS,
        }
    }
}

/// Fields of the `LeOnArD!` header
#[derive(Debug, Clone)]
struct Header {
    frames: usize,
    attributes: u32,
    digidrums: usize,
    clock: u32,
    player_freq: u16,
    loop_frame: u32,
    extra_size: usize,
    body: usize,
}

impl Header {
    fn read(view: &ByteView<'_>, version: Version) -> Result<Self> {
        require(
            view.slice(ID_SIZE, SIGNATURE.len())? == SIGNATURE,
            "invalid YM signature",
        )?;
        let frames = view.read_be32(12)? as usize;
        require(frames != 0, "zero frames")?;
        require(frames <= MAX_FRAMES, "frames count exceeds limit")?;
        let attributes = view.read_be32(16)?;
        let digidrums = usize::from(view.read_be16(20)?);
        if version == Version::Ym4 {
            return Ok(Self {
                frames,
                attributes,
                digidrums,
                clock: ATARI_ST_CLOCK,
                player_freq: FRAME_RATE_PAL as u16,
                loop_frame: view.read_be32(22)?,
                extra_size: 0,
                body: 26,
            });
        }
        Ok(Self {
            frames,
            attributes,
            digidrums,
            clock: view.read_be32(22)?,
            player_freq: view.read_be16(26)?,
            loop_frame: view.read_be32(28)?,
            extra_size: usize::from(view.read_be16(32)?),
            body: 34,
        })
    }
}

/// Frames data as register columns
fn deliver_columns<B: StreamBuilder + ?Sized>(
    body: &[u8],
    frames: usize,
    per_frame: usize,
    interleaved: bool,
    builder: &mut B,
) {
    builder.set_frames(frames);
    for reg in 0..REGISTERS {
        builder.start_channel(reg);
        if interleaved {
            builder.add_values(&body[reg * frames..(reg + 1) * frames]);
        } else {
            let column: Vec<u8> = body
                .chunks_exact(per_frame)
                .map(|frame| frame[reg])
                .collect();
            builder.add_values(&column);
        }
    }
}

/// Early dumps: the whole payload is 14 interleaved columns
fn parse_simple<B: StreamBuilder + ?Sized>(
    view: &ByteView<'_>,
    version: Version,
    builder: &mut B,
) -> Result<(usize, usize)> {
    let end = if version == Version::Ym3b {
        require(view.len() >= ID_SIZE + LOOP_SIZE, "missing loop frame")?;
        view.len() - LOOP_SIZE
    } else {
        view.len()
    };
    let payload = view.slice(ID_SIZE, end - ID_SIZE)?;
    require(
        !payload.is_empty() && payload.len() % REGISTERS == 0,
        "data size is not a multiple of 14",
    )?;
    let frames = payload.len() / REGISTERS;
    require(frames <= MAX_FRAMES, "frames count exceeds limit")?;

    builder.set_clock_rate(u64::from(ATARI_ST_CLOCK));
    builder.set_frame_rate(FRAME_RATE_PAL);
    if version == Version::Ym3b {
        let loop_frame = view.read_le32(end)? as usize;
        require(loop_frame < frames, "loop frame exceeds frames count")?;
        builder.set_loop(loop_frame);
    }
    deliver_columns(payload, frames, REGISTERS, true, builder);
    Ok((ID_SIZE, view.len()))
}

/// Skip digidrum samples, returning the offset past them
fn skip_digidrums(view: &ByteView<'_>, mut offset: usize, count: usize) -> Result<usize> {
    for _ in 0..count {
        let size = view.read_be32(offset)? as usize;
        offset = offset
            .checked_add(4 + size)
            .ok_or("digidrum offset overflow")?;
        view.ensure_range(offset, 0)?;
    }
    Ok(offset)
}

fn parse_extended<B: StreamBuilder + ?Sized>(
    view: &ByteView<'_>,
    version: Version,
    builder: &mut B,
) -> Result<(usize, usize)> {
    let header = Header::read(view, version)?;
    let mut offset = header
        .body
        .checked_add(header.extra_size)
        .ok_or("extra data offset overflow")?;
    offset = skip_digidrums(view, offset, header.digidrums)?;

    let (title, next) = view.read_nt_string(offset)?;
    let (author, next) = view.read_nt_string(next)?;
    let (comment, next) = view.read_nt_string(next)?;
    offset = next;

    let meta = builder.meta();
    meta.set_program(version.program());
    meta.set_title(&title);
    meta.set_author(&author);
    meta.set_comment(&comment);

    let per_frame = version.registers_per_frame();
    let body_size = header
        .frames
        .checked_mul(per_frame)
        .ok_or("frame data size overflow")?;
    let body = view.slice(offset, body_size)?;
    let frames_start = offset;
    let mut end = offset + body_size;
    if view.slice(end, END_MARKER.len()).ok() == Some(&END_MARKER[..]) {
        end += END_MARKER.len();
    }

    if header.clock != 0 {
        builder.set_clock_rate(u64::from(header.clock));
    }
    if header.player_freq != 0 {
        builder.set_frame_rate(u32::from(header.player_freq));
    }
    if (header.loop_frame as usize) < header.frames {
        builder.set_loop(header.loop_frame as usize);
    }
    let interleaved = header.attributes & ATTR_INTERLEAVED != 0;
    deliver_columns(body, header.frames, per_frame, interleaved, builder);
    Ok((frames_start, end))
}

/// Parse an unpacked dump into `builder`, returning the frames data start
/// and the used size
pub fn parse<B: StreamBuilder + ?Sized>(data: &[u8], builder: &mut B) -> Result<(usize, usize)> {
    let version = Version::detect(data).ok_or("not a YM dump")?;
    let view = ByteView::new(data);
    match version {
        Version::Ym2 | Version::Ym3 | Version::Ym3b => {
            builder.meta().set_program(version.program());
            parse_simple(&view, version, builder)
        }
        Version::Ym4 | Version::Ym5 | Version::Ym6 => parse_extended(&view, version, builder),
    }
}

/// YM decoder
#[derive(Debug)]
pub struct YmDecoder {
    format: Format,
}

impl YmDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT),
        }
    }

    fn decode_plain(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Result<Decoded> {
        let mut builder = StreamModelBuilder::new(meta);
        let (start, end) = parse(data, &mut builder)?;
        Ok(Decoded {
            content: Content::Stream(builder.build()),
            used_size: end,
            fixed_checksum: Some(crc32(&data[start..end])),
        })
    }

    #[cfg(feature = "lha")]
    fn decode_packed(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Result<Decoded> {
        let unpacked = crate::packed::lha::decompress(data)?;
        let decoded = self.decode_plain(&unpacked, meta)?;
        Ok(Decoded {
            used_size: data.len(),
            ..decoded
        })
    }

    fn decode_any(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Result<Decoded> {
        #[cfg(feature = "lha")]
        {
            if Version::detect(data).is_none() && crate::packed::lha::is_lha_compressed(data) {
                return self.decode_packed(data, meta);
            }
        }
        self.decode_plain(data, meta)
    }
}

impl Default for YmDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for YmDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        #[cfg(feature = "lha")]
        {
            if crate::packed::lha::is_lha_compressed(data) {
                return true;
            }
        }
        Version::detect(data).is_some()
    }

    fn decode(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        report("YM", self.decode_any(data, meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aym_common::BasicMetadata;

    fn ym5(frames: u32, attributes: u32, body: &[u8]) -> Vec<u8> {
        let mut data = b"YM5!LeOnArD!".to_vec();
        data.extend_from_slice(&frames.to_be_bytes());
        data.extend_from_slice(&attributes.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&2_000_000u32.to_be_bytes());
        data.extend_from_slice(&50u16.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(b"Title\0Author\0Comment\0");
        data.extend_from_slice(body);
        data.extend_from_slice(END_MARKER);
        data
    }

    #[test]
    fn test_version_detection() {
        assert_eq!(Version::detect(b"YM3!...."), Some(Version::Ym3));
        assert_eq!(Version::detect(b"YM3b...."), Some(Version::Ym3b));
        assert_eq!(Version::detect(b"YM6!"), Some(Version::Ym6));
        assert_eq!(Version::detect(b"YM7!"), None);
        assert_eq!(Version::detect(b"YM"), None);
        let decoder = YmDecoder::new();
        assert!(decoder.format().matches(b"YM5!"));
        assert!(decoder.format().matches(b"YM3b"));
        assert!(!decoder.format().matches(b"YM7!"));
    }

    #[test]
    fn test_ym3_deinterleave() {
        let mut data = b"YM3!".to_vec();
        // two frames: register r holds r in frame 0 and r + 0x40 in frame 1
        for reg in 0..REGISTERS as u8 {
            data.push(reg);
            data.push(reg + 0x40);
        }
        let decoded = YmDecoder::new().decode(&data, &mut ()).unwrap();
        assert_eq!(decoded.used_size, data.len());
        let Content::Stream(model) = decoded.content else {
            panic!("stream expected");
        };
        assert_eq!(model.len(), 2);
        assert_eq!(model.frames[1].registers[7], 0x47);
        assert_eq!(model.frames[0].registers[12], 12);
        assert_eq!(model.clock_rate, Some(u64::from(ATARI_ST_CLOCK)));
    }

    #[test]
    fn test_ym3b_loop() {
        let mut data = b"YM3b".to_vec();
        data.extend_from_slice(&[0u8; 3 * REGISTERS]);
        data.extend_from_slice(&2u32.to_le_bytes());
        let decoded = YmDecoder::new().decode(&data, &mut ()).unwrap();
        let Content::Stream(model) = decoded.content else {
            panic!("stream expected");
        };
        assert_eq!(model.loop_frame, 2);

        let len = data.len();
        data[len - 4] = 3;
        assert!(YmDecoder::new().decode(&data, &mut ()).is_none());
    }

    #[test]
    fn test_ym5_sequential_frames() {
        let mut body = Vec::new();
        for frame in 0..2u8 {
            let mut regs = [frame; 16];
            regs[13] = if frame == 0 { 0x0a } else { 0xff };
            body.extend_from_slice(&regs);
        }
        let data = ym5(2, 0, &body);
        let mut meta = BasicMetadata::new();
        let decoded = YmDecoder::new().decode(&data, &mut meta).unwrap();
        assert_eq!(decoded.used_size, data.len());
        assert_eq!(meta.title, "Title");
        assert_eq!(meta.author, "Author");
        assert_eq!(meta.comments, "Comment");
        assert_eq!(meta.program, "YM5");

        let Content::Stream(model) = decoded.content else {
            panic!("stream expected");
        };
        assert_eq!(model.loop_frame, 1);
        assert_eq!(model.frame_rate, Some(50));
        assert_eq!(model.frames[1].registers[0], 1);
        assert!(model.frames[0].is_written(13));
        assert!(!model.frames[1].is_written(13));
        assert_eq!(model.frames[1].registers[13], 0x0a);
    }

    #[test]
    fn test_ym5_interleaved_frames() {
        let mut body = vec![0u8; 2 * 16];
        // register 8: frame 0 = 3, frame 1 = 9
        body[16] = 3;
        body[17] = 9;
        let data = ym5(2, ATTR_INTERLEAVED, &body);
        let decoded = YmDecoder::new().decode(&data, &mut ()).unwrap();
        let Content::Stream(model) = decoded.content else {
            panic!("stream expected");
        };
        assert_eq!(model.frames[0].registers[8], 3);
        assert_eq!(model.frames[1].registers[8], 9);
    }

    #[test]
    fn test_truncated_frames_rejected() {
        let data = ym5(4, 0, &[0u8; 16]);
        assert!(YmDecoder::new().decode(&data, &mut ()).is_none());
    }
}
