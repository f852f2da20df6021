//! Register stream playback

use std::sync::Arc;

use aym::Register;
use aym_formats::stream::ENVELOPE_SHAPE;
use aym_formats::StreamModel;

use crate::builder::AymTrackBuilder;
use crate::player::{DataRenderer, PlaybackInfo};

/// Replays a [`StreamModel`] frame by frame
///
/// The envelope shape is only sent on frames that wrote it, since every
/// write restarts the envelope.
#[derive(Debug, Clone)]
pub struct StreamRenderer {
    model: Arc<StreamModel>,
    frame: usize,
}

impl StreamRenderer {
    /// Renderer positioned at the first frame
    pub fn new(model: Arc<StreamModel>) -> Self {
        Self { model, frame: 0 }
    }

    /// Replayed stream
    pub fn model(&self) -> &StreamModel {
        &self.model
    }
}

impl DataRenderer for StreamRenderer {
    fn synthesize(&mut self, builder: &mut AymTrackBuilder) {
        let Some(frame) = self.model.frames.get(self.frame) else {
            return;
        };
        for reg in Register::ALL {
            let value = frame.registers[reg as usize];
            if reg as usize == ENVELOPE_SHAPE {
                if frame.is_written(ENVELOPE_SHAPE) {
                    builder.set_envelope_type(value);
                }
            } else {
                builder.set_register(reg, value);
            }
        }
    }

    fn advance(&mut self, looped: bool) -> bool {
        self.frame += 1;
        if self.frame < self.model.len() {
            return true;
        }
        if looped && !self.model.is_empty() {
            self.frame = self.model.loop_frame.min(self.model.len() - 1);
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.frame = 0;
    }

    fn frame(&self) -> usize {
        self.frame
    }

    fn info(&self) -> PlaybackInfo {
        PlaybackInfo {
            frames: self.model.len(),
            loop_frame: self.model.loop_frame,
        }
    }
}
