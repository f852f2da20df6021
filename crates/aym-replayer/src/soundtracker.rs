//! SoundTracker (ST1/STC) playback
//!
//! Sample and ornament share a single position counter. A sample without a
//! loop (`loop_start == 0`) silences its channel once played out.

use std::sync::Arc;

use aym_formats::track::{Cell, Command, CHANNELS};
use aym_formats::TrackModel;

use crate::builder::AymTrackBuilder;
use crate::player::{DataRenderer, PlaybackInfo};
use crate::state::TrackStateIterator;
use crate::tables::SOUNDTRACKER;
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    enabled: bool,
    envelope: bool,
    note: u32,
    sample: usize,
    ornament: usize,
    position: usize,
}

impl ChannelState {
    fn apply(&mut self, cell: &Cell, builder: &mut AymTrackBuilder) {
        if let Some(enabled) = cell.enabled {
            self.enabled = enabled;
            self.position = 0;
        }
        if let Some(note) = cell.note {
            self.note = note;
            self.position = 0;
        }
        if let Some(sample) = cell.sample {
            self.sample = sample as usize;
            self.position = 0;
        }
        if let Some(ornament) = cell.ornament {
            self.ornament = ornament as usize;
            self.position = 0;
        }
        for command in &cell.commands {
            match *command {
                Command::Envelope { shape, period } => {
                    builder.set_envelope_type(shape);
                    builder.set_envelope_tone(period);
                    self.envelope = true;
                }
                Command::NoEnvelope => self.envelope = false,
                _ => {}
            }
        }
    }
}

/// Register synthesis for SoundTracker songs
#[derive(Debug, Clone)]
pub struct SoundTrackerRenderer {
    iter: TrackStateIterator,
    channels: [ChannelState; CHANNELS],
}

impl SoundTrackerRenderer {
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
        let line = sample.line(state.position);
        let ornament = model.ornaments.get(state.ornament).line(state.position);
        let note = state.note as i32 + ornament + transposition;

        channel.set_level(i32::from(line.level));
        if state.envelope {
            channel.enable_envelope();
        }
        channel.set_tone(SOUNDTRACKER.tone(note, line.tone_offset));
        if line.tone_masked {
            channel.disable_tone();
        }
        if line.noise_masked {
            channel.disable_noise();
        } else {
            builder.set_noise(line.noise);
        }

        state.position += 1;
        let limit = if sample.loop_start() != 0 {
            sample.loop_limit()
        } else {
            sample.len()
        };
        if state.position >= limit {
            if sample.loop_start() != 0 {
                state.position = sample.loop_start();
            } else {
                state.enabled = false;
            }
        }
    }
}

impl DataRenderer for SoundTrackerRenderer {
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
    use aym::{MixerFlags, Register};
    use aym_formats::track::{Ornament, Position, Sample, SampleLine, TrackModelBuilder};

    fn line(level: u8, tone_offset: i32) -> SampleLine {
        SampleLine {
            level,
            noise: 5,
            noise_masked: true,
            tone_masked: false,
            tone_offset,
        }
    }

    /// Channel A plays note 12 with sample 1, channel B gets an envelope
    fn renderer(sample: Sample) -> SoundTrackerRenderer {
        let mut builder = TrackModelBuilder::new();
        builder.set_initial_tempo(1);
        builder.set_sample(1, sample);
        builder.set_ornament(0, Ornament::new(vec![0, 12], 0));
        let patterns = builder.patterns();
        patterns.set_pattern(0);
        patterns.set_line(0);
        patterns.set_channel(0);
        patterns.channel().set_enabled(true);
        patterns.channel().set_note(12);
        patterns.channel().set_sample(1);
        patterns.set_channel(1);
        patterns.channel().add_command(Command::Envelope {
            shape: 8,
            period: 0x120,
        });
        patterns.finish(4);
        builder.set_positions(
            vec![Position {
                pattern: 0,
                transposition: 1,
            }],
            0,
        );
        SoundTrackerRenderer::new(Arc::new(builder.build())).unwrap()
    }

    fn frame(renderer: &mut SoundTrackerRenderer) -> [u8; 14] {
        let mut builder = AymTrackBuilder::new(None);
        renderer.synthesize(&mut builder);
        renderer.advance(false);
        *builder.registers()
    }

    #[test]
    fn test_note_with_ornament_and_transposition() {
        let sample = Sample::new(vec![line(15, 0), line(10, 2), line(5, 0)], 0, 3);
        let mut renderer = renderer(sample);
        assert_eq!(renderer.info().frames, 4);

        let regs = frame(&mut renderer);
        let tone = SOUNDTRACKER.tone(13, 0);
        assert_eq!(regs[Register::ToneALo as usize], tone.to_le_bytes()[0]);
        assert_eq!(regs[Register::ToneAHi as usize], tone.to_le_bytes()[1]);
        assert_eq!(regs[Register::VolumeA as usize], 15);
        assert_eq!(regs[Register::EnvelopeShape as usize], 8);
        assert_eq!(regs[Register::EnvelopeLo as usize], 0x20);
        assert_eq!(
            regs[Register::Mixer as usize] & MixerFlags::NOISE_A.bits(),
            MixerFlags::NOISE_A.bits()
        );

        // ornament shifts an octave up on the second frame
        let regs = frame(&mut renderer);
        let tone = SOUNDTRACKER.tone(25, 2);
        assert_eq!(regs[Register::ToneALo as usize], tone.to_le_bytes()[0]);
        assert_eq!(regs[Register::VolumeA as usize], 10);
    }

    #[test]
    fn test_unlooped_sample_silences_channel() {
        let sample = Sample::new(vec![line(15, 0), line(12, 0)], 0, 2);
        let mut renderer = renderer(sample);
        assert_eq!(frame(&mut renderer)[Register::VolumeA as usize], 15);
        assert_eq!(frame(&mut renderer)[Register::VolumeA as usize], 12);
        assert_eq!(frame(&mut renderer)[Register::VolumeA as usize], 0);
        assert_eq!(frame(&mut renderer)[Register::VolumeA as usize], 0);
    }

    #[test]
    fn test_looped_sample_repeats() {
        let lines = vec![line(15, 0), line(12, 0), line(9, 0)];
        let mut renderer = renderer(Sample::new(lines, 1, 3));
        let levels: Vec<u8> = (0..4)
            .map(|_| frame(&mut renderer)[Register::VolumeA as usize])
            .collect();
        assert_eq!(levels, vec![15, 12, 9, 12]);

        renderer.reset();
        assert_eq!(renderer.frame(), 0);
        assert_eq!(frame(&mut renderer)[Register::VolumeA as usize], 15);
    }
}
