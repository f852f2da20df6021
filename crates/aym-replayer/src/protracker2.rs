//! ProTracker 2 playback
//!
//! Differences from SoundTracker: independent sample and ornament positions,
//! per-channel volume scaling the sample level, a noise offset and pitch
//! slides. A note slide with a note glides from the playing note to the new
//! one and switches to it on arrival; without a note it stops at the given
//! tone offset.

use std::sync::Arc;

use aym_formats::track::{Cell, Command, CHANNELS};
use aym_formats::TrackModel;

use crate::builder::AymTrackBuilder;
use crate::player::{DataRenderer, PlaybackInfo};
use crate::state::TrackStateIterator;
use crate::tables::PROTRACKER2;
use crate::Result;

const MAX_VOLUME: u32 = 15;

/// Sample `level` scaled by channel `volume`, both 0..=15
pub fn volume_level(volume: u32, level: u32) -> u32 {
    let volume = volume.min(MAX_VOLUME);
    let scale = volume * 17 + u32::from(volume > 7);
    (scale * level.min(MAX_VOLUME) + 128) / 256
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slide {
    /// Tone offset to stop at
    limit: i32,
    /// Note to switch to once the limit is reached
    target: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
struct ChannelState {
    enabled: bool,
    envelope: bool,
    note: u32,
    sample: usize,
    pos_in_sample: usize,
    ornament: usize,
    pos_in_ornament: usize,
    volume: u32,
    noise_addon: i32,
    sliding: i32,
    glissade: i32,
    slide: Option<Slide>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            enabled: false,
            envelope: false,
            note: 0,
            sample: 0,
            pos_in_sample: 0,
            ornament: 0,
            pos_in_ornament: 0,
            volume: MAX_VOLUME,
            noise_addon: 0,
            sliding: 0,
            glissade: 0,
            slide: None,
        }
    }
}

impl ChannelState {
    fn apply(&mut self, cell: &Cell, builder: &mut AymTrackBuilder) {
        if let Some(enabled) = cell.enabled {
            self.enabled = enabled;
            self.pos_in_sample = 0;
            self.pos_in_ornament = 0;
        }
        let note_slide = cell.commands.iter().find_map(|command| match *command {
            Command::NoteSlide { step, .. } => Some(i32::from(step)),
            _ => None,
        });
        if let Some(note) = cell.note {
            match note_slide {
                Some(step) => {
                    let limit = PROTRACKER2.sliding_difference(self.note as i32, note as i32);
                    self.glissade = if limit < 0 { -step } else { step };
                    self.slide = Some(Slide {
                        limit,
                        target: Some(note),
                    });
                }
                None => {
                    self.note = note;
                    self.sliding = 0;
                    self.glissade = 0;
                    self.slide = None;
                }
            }
            self.pos_in_sample = 0;
            self.pos_in_ornament = 0;
        }
        if let Some(sample) = cell.sample {
            self.sample = sample as usize;
        }
        if let Some(ornament) = cell.ornament {
            self.ornament = ornament as usize;
            self.pos_in_ornament = 0;
        }
        if let Some(volume) = cell.volume {
            self.volume = volume.min(MAX_VOLUME);
        }
        for command in &cell.commands {
            match *command {
                Command::Envelope { shape, period } => {
                    builder.set_envelope_type(shape);
                    builder.set_envelope_tone(period);
                    self.envelope = true;
                }
                Command::NoEnvelope => self.envelope = false,
                Command::Glissade(step) => {
                    self.glissade = i32::from(step);
                    self.slide = None;
                }
                Command::NoteSlide { step, limit } if cell.note.is_none() => {
                    let limit = i32::from(limit);
                    let step = i32::from(step);
                    self.glissade = if limit < 0 { -step } else { step };
                    self.slide = Some(Slide {
                        limit,
                        target: None,
                    });
                }
                Command::NoteSlide { .. } => {}
                Command::NoGlissade => {
                    self.glissade = 0;
                    self.slide = None;
                }
                Command::NoiseAddon(addon) => self.noise_addon = i32::from(addon),
            }
        }
    }

    fn update_sliding(&mut self) {
        if self.glissade == 0 {
            return;
        }
        self.sliding += self.glissade;
        let Some(slide) = self.slide else {
            return;
        };
        let arrived = if self.glissade < 0 {
            self.sliding <= slide.limit
        } else {
            self.sliding >= slide.limit
        };
        if arrived {
            match slide.target {
                Some(note) => {
                    self.note = note;
                    self.sliding = 0;
                }
                None => self.sliding = slide.limit,
            }
            self.glissade = 0;
            self.slide = None;
        }
    }
}

/// Register synthesis for ProTracker 2 songs
#[derive(Debug, Clone)]
pub struct ProTracker2Renderer {
    iter: TrackStateIterator,
    channels: [ChannelState; CHANNELS],
}

impl ProTracker2Renderer {
    /// Renderer positioned at the first frame of `model`
    pub fn new(model: Arc<TrackModel>) -> Result<Self> {
        Ok(Self {
            iter: TrackStateIterator::new(model)?,
            channels: [ChannelState::default(); CHANNELS],
        })
    }

    /// Song cursor
    pub fn iterator(&self) -> &TrackStateIterator {
        &self.iter
    }

    fn synthesize_channel(&mut self, chan: usize, builder: &mut AymTrackBuilder) {
        let model = self.iter.model();
        let transposition = self.iter.transposition();
        let state = &mut self.channels[chan];
        let mut channel = builder.channel(chan);
        if !state.enabled {
            channel.set_level(0);
            return;
        }

        let sample = model.samples.get(state.sample);
        let line = sample.line(state.pos_in_sample);
        let ornament = model.ornaments.get(state.ornament);
        let note = state.note as i32 + ornament.line(state.pos_in_ornament) + transposition;

        channel.set_level(volume_level(state.volume, u32::from(line.level)) as i32);
        if state.envelope {
            channel.enable_envelope();
        }
        channel.set_tone(PROTRACKER2.tone(note, line.tone_offset + state.sliding));
        if line.tone_masked {
            channel.disable_tone();
        }
        if line.noise_masked {
            channel.disable_noise();
        } else {
            let noise = (i32::from(line.noise) + state.noise_addon) & 0x1f;
            builder.set_noise(noise as u8);
        }

        state.update_sliding();

        state.pos_in_ornament += 1;
        if state.pos_in_ornament >= ornament.len() {
            state.pos_in_ornament = ornament.loop_position();
        }
        state.pos_in_sample += 1;
        if state.pos_in_sample >= sample.loop_limit() {
            if sample.loop_start() < sample.loop_limit() {
                state.pos_in_sample = sample.loop_start();
            } else {
                state.enabled = false;
            }
        }
    }
}

impl DataRenderer for ProTracker2Renderer {
    fn synthesize(&mut self, builder: &mut AymTrackBuilder) {
        if let Some(line) = self.iter.line() {
            for (state, cell) in self.channels.iter_mut().zip(&line.channels) {
                state.apply(cell, builder);
            }
        }
        for chan in 0..CHANNELS {
            self.synthesize_channel(chan, builder);
        }
    }

    fn advance(&mut self, looped: bool) -> bool {
        self.iter.next_frame(looped)
    }

    fn reset(&mut self) {
        self.iter.reset();
        self.channels = [ChannelState::default(); CHANNELS];
    }

    fn frame(&self) -> usize {
        self.iter.state().frame
    }

    fn info(&self) -> PlaybackInfo {
        self.iter.info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aym::Register;
    use aym_formats::track::{Position, Sample, SampleLine, TrackModelBuilder};

    const LEVEL: SampleLine = SampleLine {
        level: 15,
        noise: 5,
        noise_masked: false,
        tone_masked: false,
        tone_offset: 0,
    };

    /// Channel A cells on rows 0.., tempo 1, sample 1 looping forever
    fn renderer(cells: Vec<Cell>, sample: Sample) -> ProTracker2Renderer {
        let mut builder = TrackModelBuilder::new();
        builder.set_initial_tempo(1);
        builder.set_sample(1, sample);
        let patterns = builder.patterns();
        patterns.set_pattern(0);
        for (row, cell) in cells.into_iter().enumerate() {
            patterns.set_line(row);
            patterns.set_channel(0);
            *patterns.channel() = cell;
        }
        patterns.finish(8);
        builder.set_positions(vec![Position::default()], 0);
        ProTracker2Renderer::new(Arc::new(builder.build())).unwrap()
    }

    fn note(note: u32, commands: Vec<Command>) -> Cell {
        Cell {
            enabled: Some(true),
            note: Some(note),
            sample: Some(1),
            commands,
            ..Cell::default()
        }
    }

    fn looped() -> Sample {
        Sample::new(vec![LEVEL], 0, 1)
    }

    fn frame(renderer: &mut ProTracker2Renderer) -> [u8; 14] {
        let mut builder = AymTrackBuilder::new(None);
        renderer.synthesize(&mut builder);
        renderer.advance(false);
        *builder.registers()
    }

    fn tone_a(regs: &[u8; 14]) -> u16 {
        u16::from_le_bytes([regs[Register::ToneALo as usize], regs[Register::ToneAHi as usize]])
    }

    #[test]
    fn test_volume_table() {
        assert_eq!(volume_level(15, 12), 12);
        assert_eq!(volume_level(0, 15), 0);
        assert_eq!(volume_level(8, 15), 8);
        assert_eq!(volume_level(7, 15), 7);
        assert_eq!(volume_level(20, 20), 15);
    }

    #[test]
    fn test_volume_scales_level() {
        let mut cell = note(0, Vec::new());
        cell.volume = Some(8);
        let mut renderer = renderer(vec![cell], looped());
        assert_eq!(frame(&mut renderer)[Register::VolumeA as usize], 8);
    }

    #[test]
    fn test_glissade_accumulates() {
        let mut renderer = renderer(vec![note(24, vec![Command::Glissade(-4)])], looped());
        let base = PROTRACKER2.tone(24, 0);
        assert_eq!(tone_a(&frame(&mut renderer)), base);
        assert_eq!(tone_a(&frame(&mut renderer)), base - 4);
        assert_eq!(tone_a(&frame(&mut renderer)), base - 8);
    }

    #[test]
    fn test_note_slide_switches_note_on_arrival() {
        let slide = Command::NoteSlide {
            step: 0x400,
            limit: 0,
        };
        let mut renderer = renderer(vec![note(0, Vec::new()), note(12, vec![slide])], looped());
        assert_eq!(tone_a(&frame(&mut renderer)), 0xef8);
        // slide starts from the playing note
        assert_eq!(tone_a(&frame(&mut renderer)), 0xef8);
        assert_eq!(tone_a(&frame(&mut renderer)), 0xef8 - 0x400);
        // passing the target snaps to the new note
        assert_eq!(tone_a(&frame(&mut renderer)), 0x77c);
        assert_eq!(tone_a(&frame(&mut renderer)), 0x77c);
    }

    #[test]
    fn test_slide_without_note_stops_at_limit() {
        let slide = Command::NoteSlide {
            step: 3,
            limit: 5,
        };
        let empty = Cell {
            commands: vec![slide],
            ..Cell::default()
        };
        let mut renderer = renderer(vec![note(0, Vec::new()), empty], looped());
        frame(&mut renderer);
        let tones: Vec<u16> = (0..4).map(|_| tone_a(&frame(&mut renderer))).collect();
        assert_eq!(tones, vec![0xef8, 0xef8 + 3, 0xef8 + 5, 0xef8 + 5]);
    }

    #[test]
    fn test_noise_addon_wraps() {
        let mut renderer = renderer(vec![note(0, vec![Command::NoiseAddon(-7)])], looped());
        assert_eq!(frame(&mut renderer)[Register::Noise as usize], 30);
    }

    #[test]
    fn test_unlooped_sample_disables_channel() {
        let sample = Sample::new(vec![LEVEL, LEVEL], 2, 2);
        let mut renderer = renderer(vec![note(0, Vec::new())], sample);
        assert_eq!(frame(&mut renderer)[Register::VolumeA as usize], 15);
        assert_eq!(frame(&mut renderer)[Register::VolumeA as usize], 15);
        assert_eq!(frame(&mut renderer)[Register::VolumeA as usize], 0);
    }
}
