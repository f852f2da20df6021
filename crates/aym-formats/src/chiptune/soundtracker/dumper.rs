//! Text dump of SoundTracker patterns for diagnostics.
//!
//! Every pattern line is printed as the line number followed by one
//! `nn C-1 soETT` field per channel: note, sample, ornament, envelope type
//! and envelope tone.

use std::fmt::Write as _;

use aym_common::{BasicMetadata, MetaBuilder};

use super::SoundTrackerBuilder;
use crate::track::{Ornament, Position, Sample, CHANNELS};

const CHANNEL_WIDTH: usize = 10;
const CHANNELS_OFFSET: usize = 3;
const LINE_WIDTH: usize = CHANNELS_OFFSET + CHANNELS * CHANNEL_WIDTH;

const NOTES: &[u8; 24] = b"C-C#D-D#E-F-F#G-G#A-A#B-";
const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

fn hex(value: u32) -> u8 {
    HEX_DIGITS[(value & 0x0f) as usize]
}

/// [`SoundTrackerBuilder`] writing a text listing
#[derive(Debug, Default)]
pub struct PatternDumper {
    meta: BasicMetadata,
    output: String,
    line: Option<[u8; LINE_WIDTH]>,
    channel: Option<usize>,
}

impl PatternDumper {
    /// Empty dumper
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata reported so far
    pub fn metadata(&self) -> &BasicMetadata {
        &self.meta
    }

    /// Listing text
    pub fn into_text(mut self) -> String {
        self.flush_line();
        self.output
    }

    fn flush_line(&mut self) {
        if let Some(line) = self.line.take() {
            let text: String = line.iter().map(|b| char::from(*b)).collect();
            self.output.push_str(text.trim_end());
            self.output.push('\n');
        }
        self.channel = None;
    }

    fn field(&mut self, offset: usize, bytes: &[u8]) {
        if let (Some(line), Some(channel)) = (self.line.as_mut(), self.channel) {
            let start = CHANNELS_OFFSET + channel * CHANNEL_WIDTH + offset;
            line[start..start + bytes.len()].copy_from_slice(bytes);
        }
    }
}

impl SoundTrackerBuilder for PatternDumper {
    fn meta(&mut self) -> &mut dyn MetaBuilder {
        &mut self.meta
    }

    fn set_initial_tempo(&mut self, tempo: u32) {
        let _ = writeln!(self.output, "Tempo: {tempo}");
    }

    fn set_sample(&mut self, index: usize, sample: Sample) {
        let _ = writeln!(
            self.output,
            "Sample{index}: {} lines, loop {}..{}",
            sample.len(),
            sample.loop_start(),
            sample.loop_limit()
        );
    }

    fn set_ornament(&mut self, index: usize, ornament: Ornament) {
        let _ = writeln!(self.output, "Ornament{index}: {} lines", ornament.len());
    }

    fn set_positions(&mut self, positions: Vec<Position>) {
        let list: Vec<String> = positions
            .iter()
            .map(|p| format!("{}({})", p.pattern, p.transposition))
            .collect();
        let _ = writeln!(self.output, "Positions: {}", list.join(" "));
    }

    fn start_pattern(&mut self, index: usize) {
        self.flush_line();
        let _ = writeln!(self.output, "\nPattern{index}:");
    }

    fn finish_pattern(&mut self, size: usize) {
        self.flush_line();
        let _ = writeln!(self.output, "{size} lines");
    }

    fn start_line(&mut self, index: usize) {
        self.flush_line();
        let mut line = [b' '; LINE_WIDTH];
        line[0] = b'0' + (index / 10 % 10) as u8;
        line[1] = b'0' + (index % 10) as u8;
        self.line = Some(line);
    }

    fn start_channel(&mut self, index: usize) {
        self.channel = (index < CHANNELS).then_some(index);
    }

    fn set_rest(&mut self) {
        self.field(0, b"R--");
    }

    fn set_note(&mut self, note: u32) {
        let halftone = (note % 12) as usize * 2;
        let octave = b'1' + (note / 12 % 10) as u8;
        let text = [NOTES[halftone], NOTES[halftone + 1], octave];
        self.field(0, &text);
    }

    fn set_sample_number(&mut self, sample: u32) {
        self.field(4, &[hex(sample)]);
    }

    fn set_ornament_number(&mut self, ornament: u32) {
        self.field(5, &[hex(ornament)]);
    }

    fn set_envelope(&mut self, shape: u8, period: u16) {
        let period = u32::from(period);
        self.field(6, &[hex(u32::from(shape)), hex(period >> 4), hex(period)]);
    }

    fn set_no_envelope(&mut self) {
        self.field(6, b"0");
    }
}
