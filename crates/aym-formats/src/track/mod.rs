//! Format-agnostic tracker song model
//!
//! Patterns are stored sparsely: a pattern keeps only the rows that were
//! written, and a lookup of any other row yields an empty [`Line`] instead of
//! a missing value. The same stub-over-missing policy applies to patterns,
//! samples and ornaments via [`SparseStorage`].
//!
//! Cell fields are `Option`s: `None` means "keep the channel's previous
//! state", not "reset to zero".

use std::collections::BTreeMap;

mod builder;

pub use builder::{PatternsBuilder, TrackModelBuilder};

/// Channels per track line
pub const CHANNELS: usize = 3;

/// Index to object mapping returning a stub for unknown indices.
///
/// Only written indices are allocated; [`len`](SparseStorage::len) is the
/// logical size, at least the highest written index + 1.
#[derive(Debug, Clone, Default)]
pub struct SparseStorage<T> {
    objects: BTreeMap<usize, T>,
    size: usize,
    stub: T,
}

impl<T: Default> SparseStorage<T> {
    /// Empty storage
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            size: 0,
            stub: T::default(),
        }
    }

    /// Object at `idx`, or the default stub
    pub fn get(&self, idx: usize) -> &T {
        self.objects.get(&idx).unwrap_or(&self.stub)
    }

    /// Mutable object at `idx`, inserting a default one
    pub fn get_mut(&mut self, idx: usize) -> &mut T {
        self.size = self.size.max(idx + 1);
        self.objects.entry(idx).or_default()
    }

    /// Store `obj` at `idx`
    pub fn add(&mut self, idx: usize, obj: T) -> &mut T {
        let slot = self.get_mut(idx);
        *slot = obj;
        slot
    }

    /// Grow the logical size to `size`; never shrinks
    pub fn resize(&mut self, size: usize) {
        self.size = self.size.max(size);
    }

    /// Logical size
    pub fn len(&self) -> usize {
        self.size
    }

    /// Zero logical size
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of allocated objects
    pub fn stored(&self) -> usize {
        self.objects.len()
    }

    /// Allocated objects in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.objects.iter().map(|(idx, obj)| (*idx, obj))
    }
}

/// Per-cell effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Hardware envelope with shape and period
    Envelope {
        /// Envelope shape register value
        shape: u8,
        /// Envelope period
        period: u16,
    },
    /// Disable hardware envelope
    NoEnvelope,
    /// Continuous pitch slide per frame
    Glissade(i16),
    /// Pitch slide by `step` per frame. Together with a note it glides from
    /// the playing note to the new one; alone it stops at tone offset `limit`
    NoteSlide {
        /// Absolute slide speed
        step: u16,
        /// Tone offset limit
        limit: i16,
    },
    /// Stop any slide
    NoGlissade,
    /// Noise period offset
    NoiseAddon(i8),
}

/// One channel of a track line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    /// Channel on/off (rest = `Some(false)`)
    pub enabled: Option<bool>,
    /// Note index (semitones from the lowest C)
    pub note: Option<u32>,
    /// Sample index
    pub sample: Option<u32>,
    /// Ornament index
    pub ornament: Option<u32>,
    /// Channel volume
    pub volume: Option<u32>,
    /// Effects in order of appearance
    pub commands: Vec<Command>,
}

impl Cell {
    /// Cell carries any field or command
    pub fn has_data(&self) -> bool {
        self.enabled.is_some()
            || self.note.is_some()
            || self.sample.is_some()
            || self.ornament.is_some()
            || self.volume.is_some()
            || !self.commands.is_empty()
    }

    /// Mark the cell as a rest
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = Some(enabled);
    }

    /// Set note
    pub fn set_note(&mut self, note: u32) {
        self.note = Some(note);
    }

    /// Set sample index
    pub fn set_sample(&mut self, sample: u32) {
        self.sample = Some(sample);
    }

    /// Set ornament index
    pub fn set_ornament(&mut self, ornament: u32) {
        self.ornament = Some(ornament);
    }

    /// Set volume
    pub fn set_volume(&mut self, volume: u32) {
        self.volume = Some(volume);
    }

    /// Append a command
    pub fn add_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// First command matching `pred`
    pub fn find_command(&self, pred: impl Fn(&Command) -> bool) -> Option<&Command> {
        self.commands.iter().find(|c| pred(c))
    }
}

/// Pattern row: one cell per channel plus optional tempo change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    /// Per-channel cells
    pub channels: [Cell; CHANNELS],
    /// Frames per line from this row on
    pub tempo: Option<u32>,
}

impl Line {
    /// Cell of channel `idx`, if populated
    pub fn channel(&self, idx: usize) -> Option<&Cell> {
        self.channels.get(idx).filter(|c| c.has_data())
    }

    /// Populated cells count
    pub fn active_channels(&self) -> usize {
        self.channels.iter().filter(|c| c.has_data()).count()
    }

    /// Line has no data at all
    pub fn is_empty(&self) -> bool {
        self.tempo.is_none() && self.active_channels() == 0
    }
}

/// Sparse row to line mapping
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    lines: SparseStorage<Line>,
}

impl Pattern {
    /// Line at `row`; empty line for unpopulated rows
    pub fn line(&self, row: usize) -> &Line {
        self.lines.get(row)
    }

    /// Mutable line at `row`, extending the pattern
    pub fn line_mut(&mut self, row: usize) -> &mut Line {
        self.lines.get_mut(row)
    }

    /// Rows count
    pub fn size(&self) -> usize {
        self.lines.len()
    }

    /// Extend pattern to `size` rows
    pub fn set_size(&mut self, size: usize) {
        self.lines.resize(size);
    }

    /// Pattern has no rows
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Sparse index to pattern mapping
#[derive(Debug, Clone, Default)]
pub struct PatternsSet {
    patterns: SparseStorage<Pattern>,
}

impl PatternsSet {
    /// Pattern at `idx`; empty pattern for unknown indices
    pub fn get(&self, idx: usize) -> &Pattern {
        self.patterns.get(idx)
    }

    /// Mutable pattern at `idx`
    pub fn get_mut(&mut self, idx: usize) -> &mut Pattern {
        self.patterns.get_mut(idx)
    }

    /// Non-empty patterns count
    pub fn size(&self) -> usize {
        self.patterns.iter().filter(|(_, p)| !p.is_empty()).count()
    }
}

/// Order list entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Pattern index
    pub pattern: usize,
    /// Semitone offset applied to notes
    pub transposition: i32,
}

/// Song order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderList {
    /// Positions in play order
    pub positions: Vec<Position>,
    /// Position to restart from after the last one
    pub loop_position: usize,
}

impl OrderList {
    /// Build order list; `loop_position` is clamped into range
    pub fn new(positions: Vec<Position>, loop_position: usize) -> Self {
        let loop_position = loop_position.min(positions.len().saturating_sub(1));
        Self {
            positions,
            loop_position,
        }
    }

    /// Positions count
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// No positions
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position at `idx`
    pub fn get(&self, idx: usize) -> Option<&Position> {
        self.positions.get(idx)
    }
}

/// One tick of a sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleLine {
    /// Volume 0..=15
    pub level: u8,
    /// Noise period
    pub noise: u8,
    /// Noise disabled on this tick
    pub noise_masked: bool,
    /// Tone disabled on this tick
    pub tone_masked: bool,
    /// Tone period offset
    pub tone_offset: i32,
}

/// Sequence of per-tick channel settings with a loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample {
    lines: Vec<SampleLine>,
    loop_start: usize,
    loop_limit: usize,
}

impl Sample {
    /// Create sample, clamping so that `loop_start <= loop_limit <= len`
    pub fn new(lines: Vec<SampleLine>, loop_start: usize, loop_limit: usize) -> Self {
        let loop_limit = loop_limit.min(lines.len());
        let loop_start = loop_start.min(loop_limit);
        Self {
            lines,
            loop_start,
            loop_limit,
        }
    }

    /// Ticks count
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// No ticks
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// First tick of the loop
    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    /// Tick after the last one of the loop
    pub fn loop_limit(&self) -> usize {
        self.loop_limit
    }

    /// Line at `pos`; silent line when out of range
    pub fn line(&self, pos: usize) -> SampleLine {
        self.lines.get(pos).copied().unwrap_or_default()
    }
}

/// Sequence of semitone offsets with a loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ornament {
    lines: Vec<i32>,
    loop_position: usize,
}

impl Ornament {
    /// Create ornament; `loop_position` is clamped to the size
    pub fn new(lines: Vec<i32>, loop_position: usize) -> Self {
        let loop_position = loop_position.min(lines.len());
        Self {
            lines,
            loop_position,
        }
    }

    /// Offsets count
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// No offsets
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Loop position
    pub fn loop_position(&self) -> usize {
        self.loop_position
    }

    /// Offset at `pos`, 0 when out of range
    pub fn line(&self, pos: usize) -> i32 {
        self.lines.get(pos).copied().unwrap_or(0)
    }
}

/// Decoded tracker song
#[derive(Debug, Clone, Default)]
pub struct TrackModel {
    /// Frames per line at song start
    pub initial_tempo: u32,
    /// Song order
    pub order: OrderList,
    /// Patterns
    pub patterns: PatternsSet,
    /// Samples by index
    pub samples: SparseStorage<Sample>,
    /// Ornaments by index
    pub ornaments: SparseStorage<Ornament>,
}

impl TrackModel {
    /// Pattern played at order position `pos`
    pub fn pattern_at(&self, pos: usize) -> Option<&Pattern> {
        self.order.get(pos).map(|p| self.patterns.get(p.pattern))
    }
}
