//! Register stream model
//!
//! Stream formats store the chip registers frame by frame. Every
//! [`StreamFrame`] holds a full snapshot plus the set of registers the file
//! actually wrote in that frame, so that repeated envelope-shape writes
//! (which retrigger the envelope) are distinguishable from held values.

use aym_common::MetaBuilder;

/// Registers per frame
pub const REGISTERS: usize = 14;

/// Envelope shape register index
pub const ENVELOPE_SHAPE: usize = 13;

/// Envelope shape value meaning "not written" in stream formats
pub const NO_ENVELOPE_WRITE: u8 = 0xff;

/// One frame of register state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFrame {
    /// Register snapshot
    pub registers: [u8; REGISTERS],
    /// Bit `n` set when register `n` was written in this frame
    pub written: u16,
}

impl StreamFrame {
    /// Register `reg` was written in this frame
    pub fn is_written(&self, reg: usize) -> bool {
        reg < REGISTERS && self.written & (1 << reg) != 0
    }

    /// Write a register value
    pub fn set(&mut self, reg: usize, value: u8) {
        if reg < REGISTERS {
            self.registers[reg] = value;
            self.written |= 1 << reg;
        }
    }
}

/// Decoded register stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamModel {
    /// Frames in play order
    pub frames: Vec<StreamFrame>,
    /// Frame to restart from
    pub loop_frame: usize,
    /// Chip clock the stream was recorded for
    pub clock_rate: Option<u64>,
    /// Frames per second
    pub frame_rate: Option<u32>,
}

impl StreamModel {
    /// Frames count
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// No frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Target of stream format parsers.
///
/// Column-oriented formats (AYC, interleaved YM) call [`set_frames`] once
/// and then deliver each register with [`start_channel`] + [`add_values`];
/// frame-oriented formats (PSG) use [`add_frame`] + [`set_register`].
///
/// [`set_frames`]: StreamBuilder::set_frames
/// [`start_channel`]: StreamBuilder::start_channel
/// [`add_values`]: StreamBuilder::add_values
/// [`add_frame`]: StreamBuilder::add_frame
/// [`set_register`]: StreamBuilder::set_register
pub trait StreamBuilder {
    /// Metadata sink
    fn meta(&mut self) -> &mut dyn MetaBuilder;

    /// Total frames for column delivery
    fn set_frames(&mut self, count: usize);

    /// Start delivering values of register `register`
    fn start_channel(&mut self, register: usize);

    /// Next values of the current register
    fn add_values(&mut self, values: &[u8]);

    /// Start a new frame
    fn add_frame(&mut self) {}

    /// Write a register in the current frame
    fn set_register(&mut self, _register: usize, _value: u8) {}

    /// Loop frame
    fn set_loop(&mut self, _frame: usize) {}

    /// Chip clock in Hz
    fn set_clock_rate(&mut self, _hz: u64) {}

    /// Frames per second
    fn set_frame_rate(&mut self, _hz: u32) {}
}

/// [`StreamBuilder`] producing a [`StreamModel`]
pub struct StreamModelBuilder<'a> {
    meta: &'a mut dyn MetaBuilder,
    model: StreamModel,
    channel: usize,
    cursor: usize,
}

impl<'a> StreamModelBuilder<'a> {
    /// New builder reporting metadata into `meta`
    pub fn new(meta: &'a mut dyn MetaBuilder) -> Self {
        Self {
            meta,
            model: StreamModel::default(),
            channel: 0,
            cursor: 0,
        }
    }

    /// Finish the model: registers not written in a frame take the value of
    /// the previous frame
    pub fn build(self) -> StreamModel {
        let mut model = self.model;
        let mut state = [0u8; REGISTERS];
        for frame in &mut model.frames {
            for (reg, value) in state.iter_mut().enumerate() {
                if frame.is_written(reg) {
                    *value = frame.registers[reg];
                } else {
                    frame.registers[reg] = *value;
                }
            }
        }
        if model.loop_frame >= model.frames.len() {
            model.loop_frame = 0;
        }
        model
    }
}

impl StreamBuilder for StreamModelBuilder<'_> {
    fn meta(&mut self) -> &mut dyn MetaBuilder {
        &mut *self.meta
    }

    fn set_frames(&mut self, count: usize) {
        self.model.frames = vec![StreamFrame::default(); count];
    }

    fn start_channel(&mut self, register: usize) {
        self.channel = register;
        self.cursor = 0;
    }

    fn add_values(&mut self, values: &[u8]) {
        let reg = self.channel;
        let frames = self.model.frames.iter_mut().skip(self.cursor);
        for (frame, value) in frames.zip(values) {
            if reg != ENVELOPE_SHAPE || *value != NO_ENVELOPE_WRITE {
                frame.set(reg, *value);
            }
        }
        self.cursor += values.len();
    }

    fn add_frame(&mut self) {
        self.model.frames.push(StreamFrame::default());
    }

    fn set_register(&mut self, register: usize, value: u8) {
        if let Some(frame) = self.model.frames.last_mut() {
            frame.set(register, value);
        }
    }

    fn set_loop(&mut self, frame: usize) {
        self.model.loop_frame = frame;
    }

    fn set_clock_rate(&mut self, hz: u64) {
        self.model.clock_rate = Some(hz);
    }

    fn set_frame_rate(&mut self, hz: u32) {
        self.model.frame_rate = Some(hz);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_delivery() {
        let mut meta = ();
        let mut builder = StreamModelBuilder::new(&mut meta);
        builder.set_frames(3);
        builder.start_channel(0);
        builder.add_values(&[1, 2]);
        builder.add_values(&[3]);
        builder.start_channel(ENVELOPE_SHAPE);
        builder.add_values(&[8, NO_ENVELOPE_WRITE, 10]);
        let model = builder.build();

        let tone: Vec<u8> = model.frames.iter().map(|f| f.registers[0]).collect();
        assert_eq!(tone, vec![1, 2, 3]);
        assert!(model.frames[0].is_written(ENVELOPE_SHAPE));
        assert!(!model.frames[1].is_written(ENVELOPE_SHAPE));
        assert_eq!(model.frames[1].registers[ENVELOPE_SHAPE], 8);
        assert_eq!(model.frames[2].registers[ENVELOPE_SHAPE], 10);
    }

    #[test]
    fn test_frame_delivery_carries_state() {
        let mut meta = ();
        let mut builder = StreamModelBuilder::new(&mut meta);
        builder.add_frame();
        builder.set_register(7, 0x38);
        builder.add_frame();
        builder.add_frame();
        builder.set_register(8, 15);
        builder.set_loop(10);
        let model = builder.build();
        assert_eq!(model.len(), 3);
        assert_eq!(model.frames[2].registers[7], 0x38);
        assert_eq!(model.frames[2].written, 1 << 8);
        assert_eq!(model.loop_frame, 0);
    }
}
