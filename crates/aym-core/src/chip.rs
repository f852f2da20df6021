//! AY/YM chip: PSG, interpolation and clock source glued together

use crate::backend::AymDevice;
use crate::clock::ClockSource;
use crate::config::ChipParameters;
use crate::psg::{ChannelsState, Interpolator, PsgRenderer};
use crate::receiver::Receiver;
use crate::registers::{DataChunk, REGISTERS_COUNT};

/// Sound chip emulator
///
/// Parameters are re-read on every [`Chip::render_data`] call, so settings
/// shared through [`crate::SharedParameters`] apply from the next chunk on.
/// Rendered samples are pushed to the receiver `R`.
///
/// # Example
///
/// ```
/// use aym::{AymConfig, Chip, DataChunk, MultiSample, Register};
///
/// let mut chip = Chip::new(AymConfig::default(), Vec::<MultiSample>::new());
/// let mut chunk = DataChunk::new(35_468);
/// chunk.set(Register::Mixer, 0x3e);
/// chunk.set(Register::VolumeA, 15);
/// chunk.set(Register::ToneALo, 0xfc);
/// chip.render_data(&chunk);
/// assert_eq!(chip.receiver().len(), 882);
/// ```
#[derive(Debug)]
pub struct Chip<P, R> {
    params: P,
    target: R,
    psg: PsgRenderer,
    interpolator: Interpolator,
    clock: ClockSource,
}

impl<P: ChipParameters, R: Receiver> Chip<P, R> {
    /// Create a chip in power-on state
    pub fn new(params: P, target: R) -> Self {
        Self {
            params,
            target,
            psg: PsgRenderer::new(),
            interpolator: Interpolator::default(),
            clock: ClockSource::new(),
        }
    }

    /// Apply `chunk` and render samples up to its tick
    pub fn render_data(&mut self, chunk: &DataChunk) {
        self.apply_parameters();
        self.psg.apply_data(chunk);
        self.clock
            .apply_frame(chunk.tick, self.params.clock_freq(), self.params.sound_freq());
        if self.params.interpolate() {
            while self.clock.in_frame() {
                self.interpolator.tick(&mut self.psg);
                if self.clock.tick() {
                    let levels = self.interpolator.levels();
                    self.target.apply_data(&levels);
                }
            }
        } else {
            while self.clock.in_frame() {
                self.psg.tick();
                if self.clock.tick() {
                    let levels = self.psg.levels();
                    self.target.apply_data(&levels);
                }
            }
        }
    }

    /// Analyzer snapshot of current state
    pub fn state(&self) -> ChannelsState {
        self.psg.analyze(self.params.clock_freq())
    }

    /// Back to power-on state
    pub fn reset(&mut self) {
        self.psg.reset();
        self.interpolator.reset();
        self.clock.reset();
    }

    /// Chip ticks rendered so far
    pub fn current_tick(&self) -> u64 {
        self.clock.current_tick()
    }

    /// Parameters accessor
    pub fn params(&self) -> &P {
        &self.params
    }

    /// Sample receiver
    pub fn receiver(&self) -> &R {
        &self.target
    }

    /// Mutable sample receiver
    pub fn receiver_mut(&mut self) -> &mut R {
        &mut self.target
    }

    /// Destroy the chip, returning its receiver
    pub fn into_receiver(self) -> R {
        self.target
    }

    fn apply_parameters(&mut self) {
        self.psg.set_type(self.params.is_ym());
        self.psg
            .set_duty_cycle(self.params.duty_cycle_value(), self.params.duty_cycle_mask());
    }
}

impl<P: ChipParameters, R: Receiver> AymDevice for Chip<P, R> {
    fn render_data(&mut self, chunk: &DataChunk) {
        Chip::render_data(self, chunk);
    }

    fn reset(&mut self) {
        Chip::reset(self);
    }

    fn dump_registers(&self) -> [u8; REGISTERS_COUNT] {
        *self.psg.registers()
    }

    fn flush(&mut self) {
        self.target.flush();
    }
}
