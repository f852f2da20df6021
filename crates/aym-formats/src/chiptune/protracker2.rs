//! ProTracker 2.x modules
//!
//! Header (131 bytes): tempo, length, loop position, 32 sample offsets,
//! 16 ornament offsets, patterns table offset and a 30-byte title, then the
//! positions list terminated by `0xff`. Each pattern holds three command
//! streams; a `0x00` on channel A ends the pattern.

use aym_common::MetaBuilder;

use crate::binary::Format;
use crate::catalog::{report, Content, Decoded, Decoder};
use crate::chiptune::{Extent, ModelBuilder};
use crate::io::{crc32, fixed_string, ByteView};
use crate::track::{Ornament, Sample, SampleLine, CHANNELS};
use crate::{require, Result};

/// Program name reported for ProTracker 2 modules
pub const EDITOR: &str = "ProTracker 2";

const TEMPO_OFFSET: usize = 0;
const LENGTH_OFFSET: usize = 1;
const LOOP_OFFSET: usize = 2;
const SAMPLES_OFFSETS: usize = 3;
const ORNAMENTS_OFFSETS: usize = 67;
const PATTERNS_OFFSET_FIELD: usize = 99;
const NAME_OFFSET: usize = 101;
const NAME_SIZE: usize = 30;
const POSITIONS_OFFSET: usize = 131;
const HEADER_SIZE: usize = POSITIONS_OFFSET;

const MAX_SAMPLES_COUNT: usize = 32;
const MAX_ORNAMENTS_COUNT: usize = 16;
const MAX_PATTERNS_COUNT: usize = 32;
const MAX_PATTERN_SIZE: usize = 64;
const POSITIONS_END: u8 = 0xff;
const PATTERN_END: u8 = 0x00;
const SAMPLE_LINE_SIZE: usize = 3;
const PATTERN_DESCRIPTOR_SIZE: usize = 2 * CHANNELS;

const FORMAT: &str = concat!(
    // tempo, length, loop
    "01-3f 01-ff 00-fe",
    // samples and ornaments offsets
    "(?00-3f){32} (?00-3f){16}",
    // patterns offset
    "?00-3f",
    // title
    "+30+",
    // first position
    "00-1f"
);

/// Builder receiving ProTracker 2 modules
pub trait ProTracker2Builder {
    /// Metadata sink
    fn meta(&mut self) -> &mut dyn MetaBuilder;
    /// Frames per line at start
    fn set_initial_tempo(&mut self, tempo: u32);
    /// Sample `index`
    fn set_sample(&mut self, index: usize, sample: Sample);
    /// Ornament `index`
    fn set_ornament(&mut self, index: usize, ornament: Ornament);
    /// Song order and loop position
    fn set_positions(&mut self, positions: Vec<usize>, loop_position: usize);

    /// Begin pattern `index`
    fn start_pattern(&mut self, index: usize);
    /// End the current pattern, `size` lines long
    fn finish_pattern(&mut self, size: usize);
    /// Begin line `index` of the current pattern
    fn start_line(&mut self, index: usize);
    /// Frames per line from the current line on
    fn set_tempo(&mut self, tempo: u32);
    /// Begin channel `index` of the current line
    fn start_channel(&mut self, index: usize);

    /// Channel rest
    fn set_rest(&mut self);
    /// Note in semitones
    fn set_note(&mut self, note: u32);
    /// Sample change
    fn set_sample_number(&mut self, sample: u32);
    /// Ornament change
    fn set_ornament_number(&mut self, ornament: u32);
    /// Channel volume
    fn set_volume(&mut self, volume: u32);
    /// Continuous slide
    fn set_glissade(&mut self, step: i16);
    /// Slide towards the note
    fn set_note_slide(&mut self, step: u16, limit: i16);
    /// Stop slides
    fn set_no_glissade(&mut self);
    /// Noise period offset
    fn set_noise_addon(&mut self, addon: i8);
    /// Hardware envelope
    fn set_envelope(&mut self, shape: u8, period: u16);
    /// Hardware envelope off
    fn set_no_envelope(&mut self);
}

struct Header {
    tempo: u8,
    length: usize,
    loop_position: usize,
    patterns: usize,
}

impl Header {
    fn read(view: &ByteView<'_>) -> Result<Self> {
        view.ensure_range(0, HEADER_SIZE)?;
        let header = Self {
            tempo: view.read_u8(TEMPO_OFFSET)?,
            length: usize::from(view.read_u8(LENGTH_OFFSET)?),
            loop_position: usize::from(view.read_u8(LOOP_OFFSET)?),
            patterns: usize::from(view.read_le16(PATTERNS_OFFSET_FIELD)?),
        };
        require(header.tempo != 0, "zero tempo")?;
        require(header.length != 0, "no positions")?;
        require(header.patterns >= HEADER_SIZE, "patterns inside header")?;
        Ok(header)
    }
}

/// Structural check beyond the signature
pub fn check_module(data: &[u8]) -> bool {
    let view = ByteView::new(data);
    Header::read(&view)
        .and_then(|header| view.ensure_range(header.patterns, PATTERN_DESCRIPTOR_SIZE))
        .is_ok()
}

fn parse_sample(view: &ByteView<'_>, offset: usize, extent: &mut Extent) -> Result<Sample> {
    let size = usize::from(view.read_u8(offset)?);
    let loop_start = usize::from(view.read_u8(offset + 1)?);
    let raw = view.slice(offset + 2, size * SAMPLE_LINE_SIZE)?;
    extent.touch(offset + 2 + raw.len());
    let lines = raw
        .chunks_exact(SAMPLE_LINE_SIZE)
        .map(|line| {
            let magnitude = i32::from(line[1] & 0x0f) << 8 | i32::from(line[2]);
            SampleLine {
                level: line[1] >> 4,
                noise: line[0] >> 3,
                noise_masked: line[0] & 0x02 != 0,
                tone_masked: line[0] & 0x01 != 0,
                tone_offset: if line[0] & 0x04 != 0 {
                    magnitude
                } else {
                    -magnitude
                },
            }
        })
        .collect();
    Ok(Sample::new(lines, loop_start, size))
}

fn parse_ornament(view: &ByteView<'_>, offset: usize, extent: &mut Extent) -> Result<Ornament> {
    let size = usize::from(view.read_u8(offset)?);
    let loop_position = usize::from(view.read_u8(offset + 1)?);
    let raw = view.slice(offset + 2, size)?;
    extent.touch(offset + 2 + size);
    let lines = raw.iter().map(|b| i32::from(*b as i8)).collect();
    Ok(Ornament::new(lines, loop_position))
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelCursor {
    offset: usize,
    period: usize,
    counter: usize,
}

/// Sample and ornament indices referenced by patterns
#[derive(Debug, Default)]
struct Usage {
    samples: u32,
    ornaments: u16,
}

fn parse_channel<B: ProTracker2Builder>(
    view: &ByteView<'_>,
    cursor: &mut ChannelCursor,
    usage: &mut Usage,
    builder: &mut B,
) -> Result<()> {
    loop {
        let cmd = view.read_u8(cursor.offset)?;
        cursor.offset += 1;
        match cmd {
            0xe1..=0xff => {
                let sample = cmd - 0xe0;
                usage.samples |= 1 << sample;
                builder.set_sample_number(u32::from(sample));
            }
            0xe0 => {
                builder.set_rest();
                break;
            }
            0x80..=0xdf => {
                builder.set_note(u32::from(cmd - 0x80));
                break;
            }
            0x7f => builder.set_no_envelope(),
            0x71..=0x7e => {
                let period = view.read_le16(cursor.offset)?;
                cursor.offset += 2;
                builder.set_envelope(cmd - 0x70, period);
            }
            0x70 => break,
            0x60..=0x6f => {
                let ornament = cmd - 0x60;
                usage.ornaments |= 1 << ornament;
                builder.set_ornament_number(u32::from(ornament));
            }
            0x20..=0x5f => cursor.period = usize::from(cmd - 0x20),
            0x10..=0x1f => builder.set_volume(u32::from(cmd - 0x10)),
            0x0f => {
                let tempo = view.read_u8(cursor.offset)?;
                cursor.offset += 1;
                require(tempo != 0, "zero tempo")?;
                builder.set_tempo(u32::from(tempo));
            }
            0x0e => {
                let step = view.read_i8(cursor.offset)?;
                cursor.offset += 1;
                builder.set_glissade(i16::from(step));
            }
            0x0d => {
                let step = view.read_i8(cursor.offset)?;
                let limit = view.read_le16(cursor.offset + 1)? as i16;
                cursor.offset += 3;
                builder.set_note_slide(u16::from(step.unsigned_abs()), limit);
            }
            0x0c => builder.set_no_glissade(),
            0x01..=0x0b => {
                let addon = view.read_i8(cursor.offset)?;
                cursor.offset += 1;
                builder.set_noise_addon(addon);
            }
            PATTERN_END => return Err("unexpected pattern end".into()),
        }
    }
    cursor.counter = cursor.period;
    Ok(())
}

fn parse_pattern<B: ProTracker2Builder>(
    view: &ByteView<'_>,
    index: usize,
    offsets: [usize; CHANNELS],
    extent: &mut Extent,
    usage: &mut Usage,
    builder: &mut B,
) -> Result<()> {
    let mut cursors = offsets.map(|offset| ChannelCursor {
        offset,
        ..ChannelCursor::default()
    });
    builder.start_pattern(index);
    let mut line = 0;
    while line < MAX_PATTERN_SIZE {
        if cursors[0].counter == 0 && view.read_u8(cursors[0].offset)? == PATTERN_END {
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
            parse_channel(view, cursor, usage, builder)?;
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
pub fn parse<B: ProTracker2Builder>(data: &[u8], builder: &mut B) -> Result<usize> {
    let view = ByteView::new(data);
    let header = Header::read(&view)?;
    let mut extent = Extent::new(HEADER_SIZE);

    builder.meta().set_program(EDITOR);
    builder
        .meta()
        .set_title(&fixed_string(view.slice(NAME_OFFSET, NAME_SIZE)?));
    builder.set_initial_tempo(u32::from(header.tempo));

    let mut positions = Vec::with_capacity(header.length);
    let mut offset = POSITIONS_OFFSET;
    loop {
        let entry = view.read_u8(offset)?;
        offset += 1;
        if entry == POSITIONS_END {
            break;
        }
        require(
            usize::from(entry) < MAX_PATTERNS_COUNT,
            "invalid pattern in positions",
        )?;
        positions.push(usize::from(entry));
    }
    extent.touch(offset);
    require(!positions.is_empty(), "no positions")?;
    positions.truncate(header.length);

    let mut usage = Usage {
        samples: 0,
        ornaments: 1,
    };
    let mut parsed = 0u32;
    for &pattern in &positions {
        if parsed & 1 << pattern != 0 {
            continue;
        }
        parsed |= 1 << pattern;
        let descriptor = header.patterns + pattern * PATTERN_DESCRIPTOR_SIZE;
        let channels = [
            usize::from(view.read_le16(descriptor)?),
            usize::from(view.read_le16(descriptor + 2)?),
            usize::from(view.read_le16(descriptor + 4)?),
        ];
        extent.touch(descriptor + PATTERN_DESCRIPTOR_SIZE);
        parse_pattern(&view, pattern, channels, &mut extent, &mut usage, builder)?;
    }
    builder.set_positions(positions, header.loop_position);

    for index in 0..MAX_SAMPLES_COUNT {
        if usage.samples & 1 << index == 0 {
            continue;
        }
        let offset = usize::from(view.read_le16(SAMPLES_OFFSETS + index * 2)?);
        builder.set_sample(index, parse_sample(&view, offset, &mut extent)?);
    }
    for index in 0..MAX_ORNAMENTS_COUNT {
        if usage.ornaments & 1 << index == 0 {
            continue;
        }
        let offset = usize::from(view.read_le16(ORNAMENTS_OFFSETS + index * 2)?);
        builder.set_ornament(index, parse_ornament(&view, offset, &mut extent)?);
    }
    Ok(extent.end())
}

/// PT2 decoder
#[derive(Debug)]
pub struct Pt2Decoder {
    format: Format,
}

impl Pt2Decoder {
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
            fixed_checksum: Some(crc32(&data[POSITIONS_OFFSET..used_size])),
        })
    }
}

impl Default for Pt2Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Pt2Decoder {
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
        report("PT2", self.decode_module(data, meta))
    }
}
