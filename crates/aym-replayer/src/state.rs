//! Frame-by-frame walk over a tracker song
//!
//! A line lasts `tempo` frames; `quirk` counts the frames already spent on
//! the current line, so a line's cells are due exactly when `quirk == 0`.

use std::sync::Arc;

use aym_formats::track::Line;
use aym_formats::TrackModel;

use crate::player::PlaybackInfo;
use crate::{ReplayerError, Result};

/// Playback cursor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackState {
    /// Order list index
    pub position: usize,
    /// Pattern played at `position`
    pub pattern: usize,
    /// Row inside the pattern
    pub line: usize,
    /// Frames spent on the current line
    pub quirk: u32,
    /// Frames per line
    pub tempo: u32,
    /// Frames since start
    pub frame: usize,
}

/// Cursor over the frames of a [`TrackModel`]
#[derive(Debug, Clone)]
pub struct TrackStateIterator {
    model: Arc<TrackModel>,
    state: TrackState,
    info: PlaybackInfo,
}

impl TrackStateIterator {
    /// Iterator positioned at the first frame
    ///
    /// Fails for songs without positions.
    pub fn new(model: Arc<TrackModel>) -> Result<Self> {
        if model.order.is_empty() {
            return Err(ReplayerError::InvalidTrack("empty order list".into()));
        }
        let mut iter = Self {
            model,
            state: TrackState::default(),
            info: PlaybackInfo::default(),
        };
        iter.info = iter.simulate();
        iter.reset();
        Ok(iter)
    }

    /// Current cursor
    pub fn state(&self) -> &TrackState {
        &self.state
    }

    /// Iterated song
    pub fn model(&self) -> &TrackModel {
        &self.model
    }

    /// Song duration and loop frame
    pub fn info(&self) -> PlaybackInfo {
        self.info
    }

    /// Back to the first frame
    pub fn reset(&mut self) {
        self.state = TrackState {
            tempo: self.model.initial_tempo.max(1),
            ..TrackState::default()
        };
        self.enter_position(0);
    }

    /// Semitone offset of the current position
    pub fn transposition(&self) -> i32 {
        self.model
            .order
            .get(self.state.position)
            .map_or(0, |p| p.transposition)
    }

    /// Line due on this frame
    pub fn line(&self) -> Option<&Line> {
        if self.state.quirk == 0 {
            Some(self.model.patterns.get(self.state.pattern).line(self.state.line))
        } else {
            None
        }
    }

    /// Move to the next frame; at the end of the order list either restart
    /// from the loop position or report the end with `false`
    pub fn next_frame(&mut self, looped: bool) -> bool {
        if self.step() {
            return true;
        }
        if !looped {
            return false;
        }
        self.state.frame = self.info.loop_frame;
        self.enter_position(self.model.order.loop_position);
        true
    }

    fn step(&mut self) -> bool {
        self.state.frame += 1;
        self.state.quirk += 1;
        if self.state.quirk < self.state.tempo {
            return true;
        }
        self.state.quirk = 0;
        self.state.line += 1;
        let size = self.model.patterns.get(self.state.pattern).size().max(1);
        if self.state.line < size {
            self.apply_tempo();
            return true;
        }
        let position = self.state.position + 1;
        if position >= self.model.order.len() {
            return false;
        }
        self.enter_position(position);
        true
    }

    fn enter_position(&mut self, position: usize) {
        self.state.position = position;
        self.state.pattern = self.model.order.get(position).map_or(0, |p| p.pattern);
        self.state.line = 0;
        self.state.quirk = 0;
        self.apply_tempo();
    }

    fn apply_tempo(&mut self) {
        let line = self.model.patterns.get(self.state.pattern).line(self.state.line);
        if let Some(tempo) = line.tempo {
            self.state.tempo = tempo.max(1);
        }
    }

    /// Play the song once from the start, counting frames
    fn simulate(&mut self) -> PlaybackInfo {
        self.reset();
        let loop_position = self.model.order.loop_position;
        let mut loop_frame = None;
        loop {
            let state = self.state;
            let at_loop = state.position == loop_position && state.line == 0 && state.quirk == 0;
            if at_loop && loop_frame.is_none() {
                loop_frame = Some(state.frame);
            }
            if !self.step() {
                break;
            }
        }
        PlaybackInfo {
            frames: self.state.frame,
            loop_frame: loop_frame.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aym_formats::track::{Position, TrackModelBuilder};

    /// Patterns 0 (2 rows) and 1 (3 rows, tempo 1 from row 1)
    fn model(order: &[usize], loop_position: usize) -> Arc<TrackModel> {
        let mut builder = TrackModelBuilder::new();
        builder.set_initial_tempo(2);
        let patterns = builder.patterns();
        patterns.set_pattern(0);
        patterns.set_line(0);
        patterns.set_channel(0);
        patterns.channel().set_note(10);
        patterns.finish(2);
        patterns.set_pattern(1);
        patterns.set_line(1);
        patterns.set_tempo(1);
        patterns.finish(3);
        let positions = order
            .iter()
            .map(|&pattern| Position {
                pattern,
                transposition: 0,
            })
            .collect();
        builder.set_positions(positions, loop_position);
        Arc::new(builder.build())
    }

    #[test]
    fn test_empty_order_rejected() {
        let result = TrackStateIterator::new(Arc::new(TrackModel::default()));
        assert!(matches!(result, Err(ReplayerError::InvalidTrack(_))));
    }

    #[test]
    fn test_frames_and_lines() {
        let mut iter = TrackStateIterator::new(model(&[0, 1], 1)).unwrap();
        // pattern 0: 2 rows * 2 frames, pattern 1: 2 frames + 2 rows * 1
        assert_eq!(
            iter.info(),
            PlaybackInfo {
                frames: 8,
                loop_frame: 4
            }
        );

        assert_eq!(iter.line().unwrap().channels[0].note, Some(10));
        assert!(iter.next_frame(false));
        assert!(iter.line().is_none());
        assert_eq!(iter.state().quirk, 1);

        let mut lines = 1;
        while iter.next_frame(false) {
            if iter.line().is_some() {
                lines += 1;
            }
        }
        assert_eq!(lines, 5);
        assert_eq!(iter.state().frame, 8);
    }

    #[test]
    fn test_loop_restarts_at_loop_position() {
        let mut iter = TrackStateIterator::new(model(&[0, 1], 1)).unwrap();
        for _ in 0..7 {
            assert!(iter.next_frame(true));
        }
        assert_eq!(iter.state().position, 1);
        assert!(iter.next_frame(true));
        let state = *iter.state();
        assert_eq!((state.position, state.pattern, state.line), (1, 1, 0));
        assert_eq!(state.frame, 4);
        // tempo changed to 1 inside pattern 1 and persists over the loop
        assert_eq!(state.tempo, 1);
    }

    #[test]
    fn test_reset_restores_initial_tempo() {
        let mut iter = TrackStateIterator::new(model(&[1], 0)).unwrap();
        while iter.next_frame(false) {}
        assert_eq!(iter.state().tempo, 1);
        iter.reset();
        let expected = TrackState {
            tempo: 2,
            pattern: 1,
            ..TrackState::default()
        };
        assert_eq!(*iter.state(), expected);
        // missing pattern plays as a single empty line
        let mut iter = TrackStateIterator::new(model(&[5], 0)).unwrap();
        assert_eq!(iter.info().frames, 2);
        assert!(iter.next_frame(false));
        assert!(!iter.next_frame(false));
    }
}
