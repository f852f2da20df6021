//! SoundTracker family (uncompiled ST1 and compiled STC)

pub mod dumper;
pub mod st1;
pub mod stc;

use aym_common::MetaBuilder;

use crate::track::{Ornament, Position, Sample};

/// Program name reported for SoundTracker modules
pub const EDITOR: &str = "SoundTracker v1.x";

/// Lines per sample and per ornament
pub const SAMPLE_ORNAMENT_SIZE: usize = 32;

/// Maximum lines per pattern
pub const MAX_PATTERN_SIZE: usize = 64;

/// Maximum patterns in a module
pub const MAX_PATTERNS_COUNT: usize = 32;

/// Maximum sample index
pub const MAX_SAMPLES_COUNT: usize = 16;

/// Maximum ornament index
pub const MAX_ORNAMENTS_COUNT: usize = 16;

/// Builder receiving SoundTracker modules
pub trait SoundTrackerBuilder {
    /// Metadata sink
    fn meta(&mut self) -> &mut dyn MetaBuilder;
    /// Frames per line
    fn set_initial_tempo(&mut self, tempo: u32);
    /// Sample `index`
    fn set_sample(&mut self, index: usize, sample: Sample);
    /// Ornament `index`
    fn set_ornament(&mut self, index: usize, ornament: Ornament);
    /// Song order
    fn set_positions(&mut self, positions: Vec<Position>);

    /// Begin pattern `index`
    fn start_pattern(&mut self, index: usize);
    /// End the current pattern, `size` lines long
    fn finish_pattern(&mut self, size: usize);
    /// Begin line `index` of the current pattern
    fn start_line(&mut self, index: usize);
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
    /// Hardware envelope
    fn set_envelope(&mut self, shape: u8, period: u16);
    /// Hardware envelope off
    fn set_no_envelope(&mut self);
}
