use super::{Cell, Line, OrderList, Ornament, PatternsSet, Position, Sample, TrackModel};

/// Cursor-based writer for a [`PatternsSet`].
///
/// Calls made without a selected pattern, line or channel write into a stub
/// that is discarded.
#[derive(Debug, Default)]
pub struct PatternsBuilder {
    patterns: PatternsSet,
    pattern: Option<usize>,
    line: Option<usize>,
    channel: Option<usize>,
    stub_line: Line,
    stub_cell: Cell,
}

impl PatternsBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Select pattern `idx`, creating it if needed
    pub fn set_pattern(&mut self, idx: usize) {
        self.patterns.get_mut(idx);
        self.pattern = Some(idx);
        self.line = None;
        self.channel = None;
    }

    /// Select row `row` of the current pattern
    pub fn set_line(&mut self, row: usize) {
        if let Some(pattern) = self.pattern {
            self.patterns.get_mut(pattern).line_mut(row);
            self.line = Some(row);
        }
        self.channel = None;
    }

    /// Select channel `idx` of the current line
    pub fn set_channel(&mut self, idx: usize) {
        self.channel = (self.line.is_some() && idx < super::CHANNELS).then_some(idx);
    }

    /// Close the current pattern with `size` rows
    pub fn finish(&mut self, size: usize) {
        if let Some(pattern) = self.pattern.take() {
            self.patterns.get_mut(pattern).set_size(size);
        }
        self.line = None;
        self.channel = None;
    }

    /// Current line
    pub fn line(&mut self) -> &mut Line {
        match (self.pattern, self.line) {
            (Some(pattern), Some(row)) => self.patterns.get_mut(pattern).line_mut(row),
            _ => {
                self.stub_line = Line::default();
                &mut self.stub_line
            }
        }
    }

    /// Current cell
    pub fn channel(&mut self) -> &mut Cell {
        match self.channel {
            Some(chan) => &mut self.line().channels[chan],
            None => {
                self.stub_cell = Cell::default();
                &mut self.stub_cell
            }
        }
    }

    /// Set tempo of the current line
    pub fn set_tempo(&mut self, tempo: u32) {
        self.line().tempo = Some(tempo);
    }

    /// Take the built patterns
    pub fn into_patterns(self) -> PatternsSet {
        self.patterns
    }
}

/// Accumulates all parts of a [`TrackModel`]
#[derive(Debug, Default)]
pub struct TrackModelBuilder {
    initial_tempo: u32,
    order: OrderList,
    samples: super::SparseStorage<Sample>,
    ornaments: super::SparseStorage<Ornament>,
    patterns: PatternsBuilder,
}

impl TrackModelBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames per line at start
    pub fn set_initial_tempo(&mut self, tempo: u32) {
        self.initial_tempo = tempo;
    }

    /// Store sample `idx`
    pub fn set_sample(&mut self, idx: usize, sample: Sample) {
        self.samples.add(idx, sample);
    }

    /// Store ornament `idx`
    pub fn set_ornament(&mut self, idx: usize, ornament: Ornament) {
        self.ornaments.add(idx, ornament);
    }

    /// Set song order
    pub fn set_positions(&mut self, positions: Vec<Position>, loop_position: usize) {
        self.order = OrderList::new(positions, loop_position);
    }

    /// Pattern writer
    pub fn patterns(&mut self) -> &mut PatternsBuilder {
        &mut self.patterns
    }

    /// Finish the model
    pub fn build(self) -> TrackModel {
        TrackModel {
            initial_tempo: self.initial_tempo,
            order: self.order,
            patterns: self.patterns.into_patterns(),
            samples: self.samples,
            ornaments: self.ornaments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_writes() {
        let mut builder = PatternsBuilder::new();
        builder.set_pattern(1);
        builder.set_line(4);
        builder.set_channel(2);
        builder.channel().set_note(30);
        builder.set_tempo(5);
        builder.finish(64);

        let patterns = builder.into_patterns();
        let pattern = patterns.get(1);
        assert_eq!(pattern.size(), 64);
        assert_eq!(pattern.line(4).channels[2].note, Some(30));
        assert_eq!(pattern.line(4).tempo, Some(5));
        assert!(pattern.line(3).is_empty());
        assert_eq!(patterns.size(), 1);
    }

    #[test]
    fn test_cursorless_calls_hit_stub() {
        let mut builder = PatternsBuilder::new();
        builder.channel().set_note(1);
        builder.set_tempo(3);
        builder.set_pattern(0);
        builder.channel().set_note(2);
        builder.set_line(0);
        builder.set_channel(7);
        builder.channel().set_note(3);
        builder.finish(1);
        let patterns = builder.into_patterns();
        assert!(patterns.get(0).line(0).is_empty());
    }

    #[test]
    fn test_model_builder() {
        let mut builder = TrackModelBuilder::new();
        builder.set_initial_tempo(6);
        builder.set_positions(
            vec![
                Position {
                    pattern: 0,
                    transposition: 0,
                },
                Position {
                    pattern: 1,
                    transposition: -2,
                },
            ],
            5,
        );
        builder.set_ornament(2, Ornament::new(vec![0, 12], 0));
        let model = builder.build();
        assert_eq!(model.initial_tempo, 6);
        assert_eq!(model.order.loop_position, 1);
        assert_eq!(model.ornaments.get(2).line(1), 12);
        assert!(model.ornaments.get(1).is_empty());
        assert!(model.samples.get(0).is_empty());
    }
}
