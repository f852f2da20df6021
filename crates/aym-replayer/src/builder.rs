//! Frame register composition
//!
//! Renderers describe a frame through [`AymTrackBuilder`]: per-channel tone,
//! level and mixer switches plus the shared noise and envelope registers.
//! [`AymTrackBuilder::finish`] turns the result into a [`DataChunk`] that
//! carries only the registers differing from the previous frame.

use aym::registers::volume;
use aym::{DataChunk, MixerFlags, Register, RegisterMask, REGISTERS_COUNT};

const TONE_LO: [Register; 3] = [Register::ToneALo, Register::ToneBLo, Register::ToneCLo];
const TONE_HI: [Register; 3] = [Register::ToneAHi, Register::ToneBHi, Register::ToneCHi];
const VOLUME: [Register; 3] = [Register::VolumeA, Register::VolumeB, Register::VolumeC];

/// Register file of a frame under construction
#[derive(Debug, Clone)]
pub struct AymTrackBuilder {
    registers: [u8; REGISTERS_COUNT],
    envelope_written: bool,
}

impl AymTrackBuilder {
    /// Start from `previous` registers with every source enabled and all
    /// levels at zero
    pub fn new(previous: Option<&[u8; REGISTERS_COUNT]>) -> Self {
        let mut registers = previous.copied().unwrap_or([0; REGISTERS_COUNT]);
        registers[Register::Mixer as usize] = 0;
        for reg in VOLUME {
            registers[reg as usize] = 0;
        }
        Self {
            registers,
            envelope_written: false,
        }
    }

    /// Builder of channel `chan` (0..3)
    pub fn channel(&mut self, chan: usize) -> ChannelBuilder<'_> {
        ChannelBuilder {
            chan: chan.min(TONE_LO.len() - 1),
            registers: &mut self.registers,
        }
    }

    /// Noise period
    pub fn set_noise(&mut self, period: u8) {
        self.set_register(Register::Noise, period);
    }

    /// Envelope shape; restarts the envelope even when unchanged
    pub fn set_envelope_type(&mut self, shape: u8) {
        self.set_register(Register::EnvelopeShape, shape);
        self.envelope_written = true;
    }

    /// Envelope period
    pub fn set_envelope_tone(&mut self, period: u16) {
        let [lo, hi] = period.to_le_bytes();
        self.set_register(Register::EnvelopeLo, lo);
        self.set_register(Register::EnvelopeHi, hi);
    }

    /// Raw register write, truncated to the register width
    pub fn set_register(&mut self, reg: Register, value: u8) {
        self.registers[reg as usize] = value & reg.width_mask();
    }

    /// Current register file
    pub fn registers(&self) -> &[u8; REGISTERS_COUNT] {
        &self.registers
    }

    /// Chunk ending at `tick` with registers changed since `previous`
    pub fn finish(self, tick: u64, previous: Option<&[u8; REGISTERS_COUNT]>) -> DataChunk {
        let mut chunk = DataChunk::from_registers(tick, self.registers);
        if let Some(previous) = previous {
            chunk.mask = RegisterMask::empty();
            for reg in Register::ALL {
                let idx = reg as usize;
                if previous[idx] != self.registers[idx] {
                    chunk.mask |= reg.mask();
                }
            }
            if self.envelope_written {
                chunk.mask |= RegisterMask::ENVELOPE_SHAPE;
            }
        }
        chunk
    }
}

/// Channel view over an [`AymTrackBuilder`]
#[derive(Debug)]
pub struct ChannelBuilder<'a> {
    chan: usize,
    registers: &'a mut [u8; REGISTERS_COUNT],
}

impl ChannelBuilder<'_> {
    /// Tone period (12 bits)
    pub fn set_tone(&mut self, period: u16) {
        let [lo, hi] = period.to_le_bytes();
        self.registers[TONE_LO[self.chan] as usize] = lo;
        self.registers[TONE_HI[self.chan] as usize] = hi & 0x0f;
    }

    /// Fixed level, clamped to 0..=15
    pub fn set_level(&mut self, level: i32) {
        let reg = &mut self.registers[VOLUME[self.chan] as usize];
        *reg = (*reg & !volume::LEVEL) | level.clamp(0, 15) as u8;
    }

    /// Take the level from the envelope generator
    pub fn enable_envelope(&mut self) {
        self.registers[VOLUME[self.chan] as usize] |= volume::ENVELOPE;
    }

    /// Mute tone
    pub fn disable_tone(&mut self) {
        self.registers[Register::Mixer as usize] |= MixerFlags::tone(self.chan).bits();
    }

    /// Mute noise
    pub fn disable_noise(&mut self) {
        self.registers[Register::Mixer as usize] |= MixerFlags::noise(self.chan).bits();
    }
}
