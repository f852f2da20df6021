//! Compiled SoundTracker modules
//!
//! Header (27 bytes): tempo, positions/ornaments/patterns offsets, 18-byte
//! identifier and size. Samples follow the header up to the positions,
//! ornaments are stored between the ornaments and patterns offsets, and the
//! pattern descriptors list is terminated by `0xff`.

use aym_common::MetaBuilder;

use super::{
    SoundTrackerBuilder, EDITOR, MAX_ORNAMENTS_COUNT, MAX_PATTERNS_COUNT, MAX_PATTERN_SIZE,
    MAX_SAMPLES_COUNT, SAMPLE_ORNAMENT_SIZE,
};
use crate::binary::Format;
use crate::catalog::{report, Content, Decoded, Decoder};
use crate::chiptune::{Extent, ModelBuilder};
use crate::io::{crc32, fixed_string, ByteView};
use crate::track::{Ornament, Position, Sample, SampleLine, CHANNELS};
use crate::{require, Result};

const TEMPO_OFFSET: usize = 0;
const POSITIONS_OFFSET_FIELD: usize = 1;
const ORNAMENTS_OFFSET_FIELD: usize = 3;
const PATTERNS_OFFSET_FIELD: usize = 5;
const IDENTIFIER_OFFSET: usize = 7;
const IDENTIFIER_SIZE: usize = 18;
const HEADER_SIZE: usize = 27;

const SAMPLE_LINE_SIZE: usize = 3;
const SAMPLE_SIZE: usize = 1 + SAMPLE_ORNAMENT_SIZE * SAMPLE_LINE_SIZE + 2;
const ORNAMENT_SIZE: usize = 1 + SAMPLE_ORNAMENT_SIZE;
const PATTERN_DESCRIPTOR_SIZE: usize = 1 + 2 * CHANNELS;
const PATTERNS_LIST_END: u8 = 0xff;

/// Identifier prefix of modules without a title
const COMPILER_SIGNATURE: &str = "SONG BY ST COMPILE";

const FORMAT: &str = concat!(
    // tempo
    "01-20",
    // positions, ornaments and patterns offsets
    "?00-3f ?00-3f ?00-3f",
    // identifier
    "+18+",
    // size
    "?00-3f",
    // first sample number
    "00-0f"
);

struct Header {
    tempo: u8,
    positions: usize,
    ornaments: usize,
    patterns: usize,
    identifier: String,
}

impl Header {
    fn read(view: &ByteView<'_>) -> Result<Self> {
        let header = Self {
            tempo: view.read_u8(TEMPO_OFFSET)?,
            positions: usize::from(view.read_le16(POSITIONS_OFFSET_FIELD)?),
            ornaments: usize::from(view.read_le16(ORNAMENTS_OFFSET_FIELD)?),
            patterns: usize::from(view.read_le16(PATTERNS_OFFSET_FIELD)?),
            identifier: fixed_string(view.slice(IDENTIFIER_OFFSET, IDENTIFIER_SIZE)?),
        };
        require(header.tempo != 0, "zero tempo")?;
        require(
            header.positions >= HEADER_SIZE + SAMPLE_SIZE,
            "no samples before positions",
        )?;
        require(
            header.patterns >= header.ornaments + ORNAMENT_SIZE,
            "no ornaments before patterns",
        )?;
        view.ensure_range(header.patterns, PATTERN_DESCRIPTOR_SIZE)?;
        Ok(header)
    }
}

/// Structural check beyond the signature
pub fn check_module(data: &[u8]) -> bool {
    Header::read(&ByteView::new(data)).is_ok()
}

fn parse_sample(view: &ByteView<'_>, offset: usize) -> Result<(usize, Sample)> {
    let number = usize::from(view.read_u8(offset)?);
    require(number < MAX_SAMPLES_COUNT, "invalid sample number")?;
    let mut lines = Vec::with_capacity(SAMPLE_ORNAMENT_SIZE);
    for idx in 0..SAMPLE_ORNAMENT_SIZE {
        let line = view.slice(offset + 1 + idx * SAMPLE_LINE_SIZE, SAMPLE_LINE_SIZE)?;
        let magnitude = i32::from(line[0] & 0xf0) * 16 + i32::from(line[2]);
        lines.push(SampleLine {
            level: line[0] & 0x0f,
            noise: line[1] & 0x1f,
            noise_masked: line[1] & 0x80 != 0,
            tone_masked: line[1] & 0x40 != 0,
            tone_offset: if line[1] & 0x20 != 0 {
                magnitude
            } else {
                -magnitude
            },
        });
    }
    let loop_offset = offset + 1 + SAMPLE_ORNAMENT_SIZE * SAMPLE_LINE_SIZE;
    let loop_start = usize::from(view.read_u8(loop_offset)?);
    let loop_size = usize::from(view.read_u8(loop_offset + 1)?);
    Ok((
        number,
        Sample::new(lines, loop_start, loop_start + loop_size + 1),
    ))
}

fn parse_ornament(view: &ByteView<'_>, offset: usize) -> Result<(usize, Ornament)> {
    let number = usize::from(view.read_u8(offset)?);
    require(number < MAX_ORNAMENTS_COUNT, "invalid ornament number")?;
    let lines = view
        .slice(offset + 1, SAMPLE_ORNAMENT_SIZE)?
        .iter()
        .map(|b| i32::from(*b as i8))
        .collect();
    Ok((number, Ornament::new(lines, 0)))
}

/// Read position of one channel's command stream
#[derive(Debug, Clone, Copy, Default)]
struct ChannelCursor {
    offset: usize,
    period: usize,
    counter: usize,
}

fn parse_channel<B: SoundTrackerBuilder>(
    view: &ByteView<'_>,
    cursor: &mut ChannelCursor,
    builder: &mut B,
) -> Result<()> {
    loop {
        let cmd = view.read_u8(cursor.offset)?;
        cursor.offset += 1;
        match cmd {
            0x00..=0x5f => {
                builder.set_note(u32::from(cmd));
                break;
            }
            0x60..=0x6f => builder.set_sample_number(u32::from(cmd - 0x60)),
            0x70..=0x7f => {
                builder.set_no_envelope();
                builder.set_ornament_number(u32::from(cmd - 0x70));
            }
            0x80 => {
                builder.set_rest();
                break;
            }
            0x81 => break,
            0x82 => {
                builder.set_ornament_number(0);
                builder.set_no_envelope();
            }
            0x83..=0x8e => {
                let period = view.read_u8(cursor.offset)?;
                cursor.offset += 1;
                builder.set_ornament_number(0);
                builder.set_envelope(cmd - 0x80, u16::from(period));
            }
            0xa1..=0xfe => cursor.period = usize::from(cmd - 0xa1),
            _ => return Err(format!("invalid pattern command 0x{cmd:02x}").into()),
        }
    }
    cursor.counter = cursor.period;
    Ok(())
}

fn parse_pattern<B: SoundTrackerBuilder>(
    view: &ByteView<'_>,
    index: usize,
    offsets: [usize; CHANNELS],
    extent: &mut Extent,
    builder: &mut B,
) -> Result<()> {
    let mut cursors = offsets.map(|offset| ChannelCursor {
        offset,
        ..ChannelCursor::default()
    });
    builder.start_pattern(index);
    let mut line = 0;
    while line < MAX_PATTERN_SIZE {
        if cursors[0].counter == 0 && view.read_u8(cursors[0].offset)? == PATTERNS_LIST_END {
            // end marker
            extent.touch(cursors[0].offset + 1);
            break;
        }
        builder.start_line(line);
        for (chan, cursor) in cursors.iter_mut().enumerate() {
            if cursor.counter > 0 {
                cursor.counter -= 1;
                continue;
            }
            builder.start_channel(chan);
            parse_channel(view, cursor, builder)?;
        }
        line += 1;
    }
    require(line != 0, "empty pattern")?;
    builder.finish_pattern(line);
    for cursor in &cursors {
        extent.touch(cursor.offset);
    }
    Ok(())
}

/// Parse a module into `builder`, returning the used size
pub fn parse<B: SoundTrackerBuilder>(data: &[u8], builder: &mut B) -> Result<usize> {
    let view = ByteView::new(data);
    let header = Header::read(&view)?;
    let mut extent = Extent::new(HEADER_SIZE);

    builder.meta().set_program(EDITOR);
    if !header.identifier.is_empty() && !header.identifier.starts_with(COMPILER_SIGNATURE) {
        builder.meta().set_title(&header.identifier);
    }
    builder.set_initial_tempo(u32::from(header.tempo));

    let samples = (header.positions - HEADER_SIZE) / SAMPLE_SIZE;
    for idx in 0..samples {
        let offset = HEADER_SIZE + idx * SAMPLE_SIZE;
        let (number, sample) = parse_sample(&view, offset)?;
        builder.set_sample(number, sample);
        extent.touch(offset + SAMPLE_SIZE);
    }

    let ornaments = (header.patterns - header.ornaments) / ORNAMENT_SIZE;
    for idx in 0..ornaments {
        let offset = header.ornaments + idx * ORNAMENT_SIZE;
        let (number, ornament) = parse_ornament(&view, offset)?;
        builder.set_ornament(number, ornament);
        extent.touch(offset + ORNAMENT_SIZE);
    }

    let count = usize::from(view.read_u8(header.positions)?) + 1;
    let mut positions = Vec::with_capacity(count);
    for idx in 0..count {
        let entry = view.slice(header.positions + 1 + idx * 2, 2)?;
        let number = usize::from(entry[0]);
        require(
            (1..=MAX_PATTERNS_COUNT).contains(&number),
            "invalid pattern in positions",
        )?;
        positions.push(Position {
            pattern: number - 1,
            transposition: i32::from(entry[1] as i8),
        });
    }
    extent.touch(header.positions + 1 + count * 2);

    let mut offset = header.patterns;
    loop {
        let number = view.read_u8(offset)?;
        if number == PATTERNS_LIST_END {
            extent.touch(offset + 1);
            break;
        }
        let number = usize::from(number);
        require(
            (1..=MAX_PATTERNS_COUNT).contains(&number),
            "invalid pattern number",
        )?;
        let channels = [
            usize::from(view.read_le16(offset + 1)?),
            usize::from(view.read_le16(offset + 3)?),
            usize::from(view.read_le16(offset + 5)?),
        ];
        if positions.iter().any(|p| p.pattern == number - 1) {
            parse_pattern(&view, number - 1, channels, &mut extent, builder)?;
        }
        offset += PATTERN_DESCRIPTOR_SIZE;
    }
    builder.set_positions(positions);
    Ok(extent.end())
}

/// STC decoder
#[derive(Debug)]
pub struct StcDecoder {
    format: Format,
}

impl StcDecoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT),
        }
    }

    fn decode_module(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Result<Decoded> {
        let mut builder = ModelBuilder::new(meta);
        let used_size = parse(data, &mut builder)?;
        Ok(Decoded {
            content: Content::Track(builder.build()),
            used_size,
            fixed_checksum: Some(crc32(&data[HEADER_SIZE..used_size])),
        })
    }
}

impl Default for StcDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StcDecoder {
    fn format(&self) -> &Format {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data) && check_module(data)
    }

    fn decode(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        if !self.check(data) {
            return None;
        }
        report("STC", self.decode_module(data, meta))
    }
}
