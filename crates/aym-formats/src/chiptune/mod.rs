//! Chiptune module decoders
//!
//! Each submodule exposes a parser writing into a format-facing builder
//! trait plus a [`Decoder`](crate::Decoder) wrapping that parser for the
//! catalog. Track formats share [`ModelBuilder`], which turns builder calls
//! into a [`TrackModel`].

pub mod ayc;
pub mod fym;
pub mod protracker2;
pub mod psg;
pub mod soundtracker;
pub mod ym;

use aym_common::MetaBuilder;

use crate::track::{Cell, Command, Ornament, Position, Sample, TrackModel, TrackModelBuilder};
use protracker2::ProTracker2Builder;
use soundtracker::SoundTrackerBuilder;

/// Highest end offset touched while parsing
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Extent(usize);

impl Extent {
    pub(crate) fn new(end: usize) -> Self {
        Self(end)
    }

    pub(crate) fn touch(&mut self, end: usize) {
        self.0 = self.0.max(end);
    }

    pub(crate) fn end(&self) -> usize {
        self.0
    }
}

/// Track builder producing a [`TrackModel`] from any tracker parser
pub struct ModelBuilder<'a> {
    meta: &'a mut dyn MetaBuilder,
    track: TrackModelBuilder,
}

impl<'a> ModelBuilder<'a> {
    /// New builder reporting metadata into `meta`
    pub fn new(meta: &'a mut dyn MetaBuilder) -> Self {
        Self {
            meta,
            track: TrackModelBuilder::new(),
        }
    }

    /// Finish the model
    pub fn build(self) -> TrackModel {
        self.track.build()
    }

    fn cell(&mut self) -> &mut Cell {
        self.track.patterns().channel()
    }

    fn open_pattern(&mut self, index: usize) {
        self.track.patterns().set_pattern(index);
    }

    fn close_pattern(&mut self, size: usize) {
        self.track.patterns().finish(size);
    }

    fn open_line(&mut self, index: usize) {
        self.track.patterns().set_line(index);
    }

    fn open_channel(&mut self, index: usize) {
        self.track.patterns().set_channel(index);
    }

    fn put_rest(&mut self) {
        self.cell().set_enabled(false);
    }

    fn put_note(&mut self, note: u32) {
        let cell = self.cell();
        cell.set_enabled(true);
        cell.set_note(note);
    }
}

impl SoundTrackerBuilder for ModelBuilder<'_> {
    fn meta(&mut self) -> &mut dyn MetaBuilder {
        &mut *self.meta
    }

    fn set_initial_tempo(&mut self, tempo: u32) {
        self.track.set_initial_tempo(tempo);
    }

    fn set_sample(&mut self, index: usize, sample: Sample) {
        self.track.set_sample(index, sample);
    }

    fn set_ornament(&mut self, index: usize, ornament: Ornament) {
        self.track.set_ornament(index, ornament);
    }

    fn set_positions(&mut self, positions: Vec<Position>) {
        self.track.set_positions(positions, 0);
    }

    fn start_pattern(&mut self, index: usize) {
        self.open_pattern(index);
    }

    fn finish_pattern(&mut self, size: usize) {
        self.close_pattern(size);
    }

    fn start_line(&mut self, index: usize) {
        self.open_line(index);
    }

    fn start_channel(&mut self, index: usize) {
        self.open_channel(index);
    }

    fn set_rest(&mut self) {
        self.put_rest();
    }

    fn set_note(&mut self, note: u32) {
        self.put_note(note);
    }

    fn set_sample_number(&mut self, sample: u32) {
        self.cell().set_sample(sample);
    }

    fn set_ornament_number(&mut self, ornament: u32) {
        self.cell().set_ornament(ornament);
    }

    fn set_envelope(&mut self, shape: u8, period: u16) {
        self.cell().add_command(Command::Envelope { shape, period });
    }

    fn set_no_envelope(&mut self) {
        self.cell().add_command(Command::NoEnvelope);
    }
}

impl ProTracker2Builder for ModelBuilder<'_> {
    fn meta(&mut self) -> &mut dyn MetaBuilder {
        &mut *self.meta
    }

    fn set_initial_tempo(&mut self, tempo: u32) {
        self.track.set_initial_tempo(tempo);
    }

    fn set_sample(&mut self, index: usize, sample: Sample) {
        self.track.set_sample(index, sample);
    }

    fn set_ornament(&mut self, index: usize, ornament: Ornament) {
        self.track.set_ornament(index, ornament);
    }

    fn set_positions(&mut self, positions: Vec<usize>, loop_position: usize) {
        let positions = positions
            .into_iter()
            .map(|pattern| Position {
                pattern,
                transposition: 0,
            })
            .collect();
        self.track.set_positions(positions, loop_position);
    }

    fn start_pattern(&mut self, index: usize) {
        self.open_pattern(index);
    }

    fn finish_pattern(&mut self, size: usize) {
        self.close_pattern(size);
    }

    fn start_line(&mut self, index: usize) {
        self.open_line(index);
    }

    fn set_tempo(&mut self, tempo: u32) {
        self.track.patterns().set_tempo(tempo);
    }

    fn start_channel(&mut self, index: usize) {
        self.open_channel(index);
    }

    fn set_rest(&mut self) {
        self.put_rest();
    }

    fn set_note(&mut self, note: u32) {
        self.put_note(note);
    }

    fn set_sample_number(&mut self, sample: u32) {
        self.cell().set_sample(sample);
    }

    fn set_ornament_number(&mut self, ornament: u32) {
        self.cell().set_ornament(ornament);
    }

    fn set_volume(&mut self, volume: u32) {
        self.cell().set_volume(volume);
    }

    fn set_glissade(&mut self, step: i16) {
        self.cell().add_command(Command::Glissade(step));
    }

    fn set_note_slide(&mut self, step: u16, limit: i16) {
        self.cell().add_command(Command::NoteSlide { step, limit });
    }

    fn set_no_glissade(&mut self) {
        self.cell().add_command(Command::NoGlissade);
    }

    fn set_noise_addon(&mut self, addon: i8) {
        self.cell().add_command(Command::NoiseAddon(addon));
    }

    fn set_envelope(&mut self, shape: u8, period: u16) {
        self.cell().add_command(Command::Envelope { shape, period });
    }

    fn set_no_envelope(&mut self) {
        self.cell().add_command(Command::NoEnvelope);
    }
}
