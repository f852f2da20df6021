//! Uncompiled SoundTracker 1.x modules
//!
//! Fixed 3009-byte header (15 samples, 256 positions, 17 ornaments, tempo,
//! pattern size) followed by up to 32 patterns of 64 lines. Every channel
//! cell is 3 bytes:
//!
//! ```text
//! RNNNN OOO   rest bit, halftone, octave
//! SSSS EEEE   sample, effect
//! PPPPPPPP    effect parameter (ornament for effect 15)
//! ```

use aym_common::MetaBuilder;

use super::{
    SoundTrackerBuilder, EDITOR, MAX_PATTERNS_COUNT, MAX_PATTERN_SIZE, SAMPLE_ORNAMENT_SIZE,
};
use crate::binary::Format;
use crate::catalog::{report, Content, Decoded, Decoder};
use crate::chiptune::ModelBuilder;
use crate::io::{crc32, ByteView};
use crate::track::{Ornament, Position, Sample, SampleLine, CHANNELS};
use crate::{require, FormatError, Result};

const SAMPLES_COUNT: usize = 15;
const SAMPLE_SIZE: usize = 130;
const SAMPLE_NOISE_OFFSET: usize = 32;
const SAMPLE_EFFECT_OFFSET: usize = 64;
const SAMPLE_LOOP_OFFSET: usize = 128;
const SAMPLE_LOOP_SIZE_OFFSET: usize = 129;

const POSITIONS_OFFSET: usize = 1950;
const LENGTH_OFFSET: usize = 2462;
const ORNAMENTS_OFFSET: usize = 2463;
const ORNAMENTS_COUNT: usize = 17;
const TEMPO_OFFSET: usize = 3007;
const PATTERNS_SIZE_OFFSET: usize = 3008;
const PATTERNS_OFFSET: usize = 3009;

const CHANNEL_SIZE: usize = 3;
const LINE_SIZE: usize = CHANNEL_SIZE * CHANNELS;
const PATTERN_SIZE: usize = LINE_SIZE * MAX_PATTERN_SIZE;

/// Header plus the first pattern
pub const HEADER_SIZE: usize = PATTERNS_OFFSET + PATTERN_SIZE;

/// Space for an optional player header in front of the module
const MAX_SEARCH_WINDOW: usize = 48 + HEADER_SIZE + (MAX_PATTERNS_COUNT - 1) * PATTERN_SIZE;

const FORMAT: &str = concat!(
    // samples: levels, noises, additions, loop and loop size
    "(00-0f{32} ?{32} (?00-1f){32} 00-1f{2}){15}",
    // positions
    "(01-20?){256}",
    // length
    "00-7f",
    // ornaments
    "(?{32}){17}",
    // tempo
    "02-0f",
    // pattern size
    "20-40"
);

/// Semitone for each halftone field value, `None` for unused codes
const HALFTONES: [Option<u32>; 16] = [
    None,
    None,
    Some(9),
    Some(10),
    Some(11),
    None,
    Some(0),
    Some(1),
    Some(2),
    Some(3),
    Some(4),
    None,
    Some(5),
    Some(6),
    Some(7),
    Some(8),
];

const NOTES_PER_OCTAVE: u32 = 12;

#[derive(Debug, Clone, Copy)]
struct Channel {
    note: u8,
    effect_sample: u8,
    effect_param: u8,
}

impl Channel {
    fn read(bytes: &[u8]) -> Self {
        Self {
            note: bytes[0],
            effect_sample: bytes[1],
            effect_param: bytes[2],
        }
    }

    fn is_empty(&self) -> bool {
        !self.is_rest() && !self.has_note() && self.effect_sample == 0
    }

    fn is_rest(&self) -> bool {
        self.note & 0x80 != 0
    }

    fn has_note(&self) -> bool {
        self.note & 0x78 != 0
    }

    fn effect(&self) -> u8 {
        self.effect_sample & 0x0f
    }

    fn sample(&self) -> u32 {
        u32::from(self.effect_sample >> 4)
    }

    fn ornament(&self) -> u32 {
        u32::from(self.effect_param & 0x0f)
    }

    fn note_value(&self) -> Result<u32> {
        let octave = u32::from(self.note & 0x07);
        let halftone = usize::from((self.note & 0x78) >> 3);
        HALFTONES[halftone]
            .map(|semitone| semitone + NOTES_PER_OCTAVE * octave)
            .ok_or_else(|| FormatError::from(format!("invalid note 0x{:02x}", self.note)))
    }
}

/// Values already emitted on a channel within the current pattern
#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    sample: u32,
    ornament: u32,
    env_type: u8,
    env_tone: u8,
}

fn line_channels(line: &[u8]) -> [Channel; CHANNELS] {
    [
        Channel::read(&line[0..CHANNEL_SIZE]),
        Channel::read(&line[CHANNEL_SIZE..2 * CHANNEL_SIZE]),
        Channel::read(&line[2 * CHANNEL_SIZE..LINE_SIZE]),
    ]
}

fn line_is_empty(line: &[u8]) -> bool {
    line_channels(line).iter().all(Channel::is_empty)
}

struct Layout<'a> {
    view: ByteView<'a>,
    patterns_count: usize,
    patterns_available: usize,
    patterns_size: usize,
}

impl<'a> Layout<'a> {
    fn new(data: &'a [u8]) -> Result<Self> {
        let view = ByteView::new(data);
        view.ensure_range(0, HEADER_SIZE)?;
        let positions = usize::from(view.read_u8(LENGTH_OFFSET)?) + 1;
        let mut patterns_count = 0;
        for idx in 0..positions {
            let raw = usize::from(view.read_u8(POSITIONS_OFFSET + idx * 2)?);
            patterns_count = patterns_count.max(raw);
        }
        let patterns_available =
            (1 + (data.len() - HEADER_SIZE) / PATTERN_SIZE).min(MAX_PATTERNS_COUNT);
        let patterns_size = usize::from(view.read_u8(PATTERNS_SIZE_OFFSET)?);
        Ok(Self {
            view,
            patterns_count,
            patterns_available,
            patterns_size,
        })
    }

    fn patterns_to_parse(&self) -> usize {
        self.patterns_count.min(self.patterns_available)
    }

    fn pattern_line(&self, pattern: usize, line: usize) -> Result<&'a [u8]> {
        self.view
            .slice(PATTERNS_OFFSET + pattern * PATTERN_SIZE + line * LINE_SIZE, LINE_SIZE)
    }

    /// Lines past the declared pattern size are empty
    fn is_consistent(&self) -> Result<bool> {
        if self.patterns_size > MAX_PATTERN_SIZE {
            return Ok(false);
        }
        for pattern in 0..self.patterns_to_parse() {
            for line in self.patterns_size..MAX_PATTERN_SIZE {
                if !line_is_empty(self.pattern_line(pattern, line)?) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

/// Structural check beyond the signature
pub fn check_module(data: &[u8]) -> bool {
    Layout::new(data)
        .and_then(|layout| layout.is_consistent())
        .unwrap_or(false)
}

fn parse_sample(view: &ByteView<'_>, offset: usize) -> Result<Sample> {
    let mut lines = Vec::with_capacity(SAMPLE_ORNAMENT_SIZE);
    for idx in 0..SAMPLE_ORNAMENT_SIZE {
        let level = view.read_u8(offset + idx)?;
        let noise = view.read_u8(offset + SAMPLE_NOISE_OFFSET + idx)?;
        let effect = view.read_le16(offset + SAMPLE_EFFECT_OFFSET + idx * 2)?;
        let magnitude = i32::from(effect & 0x0fff);
        lines.push(SampleLine {
            level,
            noise: noise & 0x1f,
            noise_masked: noise & 0x80 != 0,
            tone_masked: noise & 0x40 != 0,
            tone_offset: if effect & 0x1000 != 0 {
                magnitude
            } else {
                -magnitude
            },
        });
    }
    let loop_start = usize::from(view.read_u8(offset + SAMPLE_LOOP_OFFSET)?);
    let loop_size = usize::from(view.read_u8(offset + SAMPLE_LOOP_SIZE_OFFSET)?);
    Ok(Sample::new(lines, loop_start, loop_start + loop_size + 1))
}

fn parse_ornament(view: &ByteView<'_>, offset: usize) -> Result<Ornament> {
    let lines = view
        .slice(offset, SAMPLE_ORNAMENT_SIZE)?
        .iter()
        .map(|b| i32::from(*b as i8))
        .collect();
    Ok(Ornament::new(lines, 0))
}

fn parse_channel<B: SoundTrackerBuilder>(
    channel: &Channel,
    state: &mut ChannelState,
    builder: &mut B,
) -> Result<()> {
    if channel.is_rest() {
        builder.set_rest();
        return Ok(());
    }
    if !channel.has_note() {
        return Ok(());
    }
    builder.set_note(channel.note_value()?);
    let sample = channel.sample();
    if sample != 0 && sample != state.sample {
        builder.set_sample_number(sample);
    }
    state.sample = sample;
    match channel.effect() {
        15 => {
            let ornament = channel.ornament();
            if ornament != state.ornament {
                builder.set_ornament_number(ornament);
                state.ornament = ornament;
            }
            builder.set_no_envelope();
            state.env_type = 0;
        }
        env_type @ (8 | 10 | 12 | 14) => {
            let env_tone = channel.effect_param;
            if env_type != state.env_type || env_tone != state.env_tone {
                builder.set_ornament_number(0);
                builder.set_envelope(env_type, u16::from(env_tone));
                state.ornament = 0;
                state.env_type = env_type;
                state.env_tone = env_tone;
            }
        }
        effect => {
            state.env_type = effect;
            builder.set_no_envelope();
        }
    }
    Ok(())
}

fn parse_pattern<B: SoundTrackerBuilder>(
    layout: &Layout<'_>,
    index: usize,
    builder: &mut B,
) -> Result<()> {
    builder.start_pattern(index);
    let mut states = [ChannelState::default(); CHANNELS];
    for line in 0..layout.patterns_size {
        let channels = line_channels(layout.pattern_line(index, line)?);
        if channels.iter().all(Channel::is_empty) {
            continue;
        }
        builder.start_line(line);
        for (chan, (channel, state)) in channels.iter().zip(states.iter_mut()).enumerate() {
            if channel.is_empty() {
                continue;
            }
            builder.start_channel(chan);
            parse_channel(channel, state, builder)?;
        }
    }
    builder.finish_pattern(layout.patterns_size);
    Ok(())
}

/// Parse a module into `builder`, returning the used size
pub fn parse<B: SoundTrackerBuilder>(data: &[u8], builder: &mut B) -> Result<usize> {
    let layout = Layout::new(data)?;
    require(layout.is_consistent()?, "data after pattern end")?;
    let view = &layout.view;

    builder.meta().set_program(EDITOR);
    builder.set_initial_tempo(u32::from(view.read_u8(TEMPO_OFFSET)?));

    for idx in 0..SAMPLES_COUNT {
        let sample = parse_sample(view, idx * SAMPLE_SIZE)?;
        builder.set_sample(idx + 1, sample);
    }
    for idx in 0..ORNAMENTS_COUNT {
        let ornament = parse_ornament(view, ORNAMENTS_OFFSET + idx * SAMPLE_ORNAMENT_SIZE)?;
        builder.set_ornament(idx, ornament);
    }

    let count = usize::from(view.read_u8(LENGTH_OFFSET)?) + 1;
    let mut positions = Vec::with_capacity(count);
    for idx in 0..count {
        let raw = usize::from(view.read_u8(POSITIONS_OFFSET + idx * 2)?);
        require(
            (1..=MAX_PATTERNS_COUNT).contains(&raw),
            "invalid pattern in positions",
        )?;
        positions.push(Position {
            pattern: raw - 1,
            transposition: i32::from(view.read_i8(POSITIONS_OFFSET + idx * 2 + 1)?),
        });
    }
    builder.set_positions(positions);

    let to_parse = layout.patterns_to_parse();
    for index in 0..to_parse {
        parse_pattern(&layout, index, builder)?;
    }
    for index in to_parse..layout.patterns_count {
        builder.start_pattern(index);
        builder.finish_pattern(layout.patterns_size);
    }
    Ok(HEADER_SIZE + (to_parse - 1) * PATTERN_SIZE)
}

/// ST1 decoder
#[derive(Debug)]
pub struct St1Decoder {
    format: Format,
}

impl St1Decoder {
    /// Decoder with the compiled signature
    pub fn new() -> Self {
        Self {
            format: Format::from_static(FORMAT).with_search_window(MAX_SEARCH_WINDOW),
        }
    }

    fn decode_module(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Result<Decoded> {
        let mut builder = ModelBuilder::new(meta);
        let used_size = parse(data, &mut builder)?;
        Ok(Decoded {
            content: Content::Track(builder.build()),
            used_size,
            fixed_checksum: Some(crc32(&data[PATTERNS_OFFSET..used_size])),
        })
    }
}

impl Default for St1Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for St1Decoder {
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
        report("ST1", self.decode_module(data, meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Command;

    fn module(patterns: usize) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE + (patterns - 1) * PATTERN_SIZE];
        for idx in 0..256 {
            data[POSITIONS_OFFSET + idx * 2] = 1;
        }
        data[TEMPO_OFFSET] = 3;
        data[PATTERNS_SIZE_OFFSET] = 0x40;
        data
    }

    #[test]
    fn test_note_conversion() {
        let channel = |note| Channel {
            note,
            effect_sample: 0,
            effect_param: 0,
        };
        // C-1
        assert_eq!(channel(0x30).note_value().unwrap(), 0);
        // A-2
        assert_eq!(channel(0x11).note_value().unwrap(), 21);
        // G#8
        assert_eq!(channel(0x7f).note_value().unwrap(), 8 + 84);
        assert!(channel(0x08).note_value().is_err());
        assert!(channel(0x28).note_value().is_err());
    }

    #[test]
    fn test_signature_and_check() {
        let decoder = St1Decoder::new();
        let data = module(1);
        assert!(decoder.check(&data));
        assert!(!decoder.check(&data[..HEADER_SIZE - 1]));

        let mut broken = data.clone();
        broken[PATTERNS_SIZE_OFFSET] = 0x20;
        // note in line 32 with a 32-line pattern size
        broken[PATTERNS_OFFSET + 32 * LINE_SIZE] = 0x30;
        assert!(!decoder.check(&broken));
        assert!(decoder.decode(&broken, &mut ()).is_none());
        assert!(decoder.decode(&data[..HEADER_SIZE - 1], &mut ()).is_none());
        assert!(decoder.decode(&data, &mut ()).is_some());
    }

    #[test]
    fn test_sample_effect_sign() {
        let mut data = module(1);
        // sample 1, line 0: positive 0x123; line 1: negative 0x045
        data[SAMPLE_EFFECT_OFFSET..SAMPLE_EFFECT_OFFSET + 4]
            .copy_from_slice(&[0x23, 0x11, 0x45, 0x00]);
        data[SAMPLE_NOISE_OFFSET] = 0xc5;
        data[SAMPLE_LOOP_OFFSET] = 30;
        data[SAMPLE_LOOP_SIZE_OFFSET] = 10;
        let sample = parse_sample(&ByteView::new(&data), 0).unwrap();
        assert_eq!(sample.line(0).tone_offset, 0x123);
        assert_eq!(sample.line(1).tone_offset, -0x45);
        assert_eq!(sample.line(0).noise, 5);
        assert!(sample.line(0).noise_masked && sample.line(0).tone_masked);
        assert_eq!((sample.loop_start(), sample.loop_limit()), (30, 32));
    }

    #[test]
    fn test_running_state_emits_changes_only() {
        let mut data = module(1);
        let line = |idx: usize| PATTERNS_OFFSET + idx * LINE_SIZE;
        // line 0: C-1, sample 2, ornament 3
        data[line(0)..line(0) + 3].copy_from_slice(&[0x30, 0x2f, 0x03]);
        // line 1: same sample and ornament
        data[line(1)..line(1) + 3].copy_from_slice(&[0x31, 0x2f, 0x03]);
        // line 2: envelope 10 with tone 0x20
        data[line(2)..line(2) + 3].copy_from_slice(&[0x32, 0x2a, 0x20]);
        // line 4: rest
        data[line(4)] = 0x80;

        let mut meta = ();
        let decoded = St1Decoder::new().decode(&data, &mut meta).unwrap();
        let Content::Track(model) = decoded.content else {
            panic!("track expected");
        };
        let pattern = model.patterns.get(0);
        assert_eq!(pattern.size(), 64);

        let first = &pattern.line(0).channels[0];
        assert_eq!((first.note, first.sample, first.ornament), (Some(0), Some(2), Some(3)));
        let second = &pattern.line(1).channels[0];
        assert_eq!((second.note, second.sample, second.ornament), (Some(12), None, None));
        let third = &pattern.line(2).channels[0];
        assert_eq!(third.ornament, Some(0));
        let envelope = Command::Envelope {
            shape: 10,
            period: 0x20,
        };
        assert!(third.find_command(|c| *c == envelope).is_some());
        assert!(pattern.line(3).is_empty());
        assert_eq!(pattern.line(4).channels[0].enabled, Some(false));
        assert_eq!(decoded.used_size, HEADER_SIZE);
    }
}
