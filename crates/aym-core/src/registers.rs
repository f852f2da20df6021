//! AY/YM Register Definitions
//!
//! Defines the 14 sound registers (R0-R13) and the [`DataChunk`] used to
//! deliver masked register updates to the chip.

use bitflags::bitflags;
use std::fmt;

/// Number of sound registers carried by a [`DataChunk`].
pub const REGISTERS_COUNT: usize = 14;

/// AY/YM register address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Channel A tone period (low byte) - R0
    ToneALo = 0x00,
    /// Channel A tone period (high nibble) - R1
    ToneAHi = 0x01,
    /// Channel B tone period (low byte) - R2
    ToneBLo = 0x02,
    /// Channel B tone period (high nibble) - R3
    ToneBHi = 0x03,
    /// Channel C tone period (low byte) - R4
    ToneCLo = 0x04,
    /// Channel C tone period (high nibble) - R5
    ToneCHi = 0x05,
    /// Noise period - R6
    Noise = 0x06,
    /// Mixer control - R7
    Mixer = 0x07,
    /// Channel A volume - R8
    VolumeA = 0x08,
    /// Channel B volume - R9
    VolumeB = 0x09,
    /// Channel C volume - R10
    VolumeC = 0x0A,
    /// Envelope period (low byte) - R11
    EnvelopeLo = 0x0B,
    /// Envelope period (high byte) - R12
    EnvelopeHi = 0x0C,
    /// Envelope shape - R13
    EnvelopeShape = 0x0D,
}

impl Register {
    /// All sound registers in address order.
    pub const ALL: [Register; REGISTERS_COUNT] = [
        Register::ToneALo,
        Register::ToneAHi,
        Register::ToneBLo,
        Register::ToneBHi,
        Register::ToneCLo,
        Register::ToneCHi,
        Register::Noise,
        Register::Mixer,
        Register::VolumeA,
        Register::VolumeB,
        Register::VolumeC,
        Register::EnvelopeLo,
        Register::EnvelopeHi,
        Register::EnvelopeShape,
    ];

    /// Convert a raw register number to Register enum
    pub fn from_addr(addr: u8) -> Option<Self> {
        Self::ALL.get(addr as usize).copied()
    }

    /// Get the register address value
    pub fn addr(&self) -> u8 {
        *self as u8
    }

    /// Change mask bit for this register.
    pub fn mask(&self) -> RegisterMask {
        RegisterMask::from_bits_truncate(1 << self.addr())
    }

    /// Valid bits of the register; anything above is dropped on write.
    pub fn width_mask(&self) -> u8 {
        match self {
            Register::ToneAHi | Register::ToneBHi | Register::ToneCHi | Register::EnvelopeShape => {
                0x0f
            }
            Register::Noise | Register::VolumeA | Register::VolumeB | Register::VolumeC => 0x1f,
            _ => 0xff,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::ToneALo => "Channel A Tone Low",
            Register::ToneAHi => "Channel A Tone High",
            Register::ToneBLo => "Channel B Tone Low",
            Register::ToneBHi => "Channel B Tone High",
            Register::ToneCLo => "Channel C Tone Low",
            Register::ToneCHi => "Channel C Tone High",
            Register::Noise => "Noise Period",
            Register::Mixer => "Mixer Control",
            Register::VolumeA => "Channel A Volume",
            Register::VolumeB => "Channel B Volume",
            Register::VolumeC => "Channel C Volume",
            Register::EnvelopeLo => "Envelope Period Low",
            Register::EnvelopeHi => "Envelope Period High",
            Register::EnvelopeShape => "Envelope Shape",
        };
        write!(f, "R{} ({})", self.addr(), name)
    }
}

bitflags! {
    /// Set of registers carried by a [`DataChunk`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegisterMask: u16 {
        /// R0
        const TONE_A_LO = 1 << 0;
        /// R1
        const TONE_A_HI = 1 << 1;
        /// R2
        const TONE_B_LO = 1 << 2;
        /// R3
        const TONE_B_HI = 1 << 3;
        /// R4
        const TONE_C_LO = 1 << 4;
        /// R5
        const TONE_C_HI = 1 << 5;
        /// R6
        const NOISE = 1 << 6;
        /// R7
        const MIXER = 1 << 7;
        /// R8
        const VOLUME_A = 1 << 8;
        /// R9
        const VOLUME_B = 1 << 9;
        /// R10
        const VOLUME_C = 1 << 10;
        /// R11
        const ENVELOPE_LO = 1 << 11;
        /// R12
        const ENVELOPE_HI = 1 << 12;
        /// R13
        const ENVELOPE_SHAPE = 1 << 13;

        /// Both bytes of channel A period
        const TONE_A = Self::TONE_A_LO.bits() | Self::TONE_A_HI.bits();
        /// Both bytes of channel B period
        const TONE_B = Self::TONE_B_LO.bits() | Self::TONE_B_HI.bits();
        /// Both bytes of channel C period
        const TONE_C = Self::TONE_C_LO.bits() | Self::TONE_C_HI.bits();
        /// Both bytes of envelope period
        const ENVELOPE = Self::ENVELOPE_LO.bits() | Self::ENVELOPE_HI.bits();
    }
}

bitflags! {
    /// Mixer Control Register (R7) bitflags
    ///
    /// A set bit disables the corresponding source.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MixerFlags: u8 {
        /// Channel A tone off
        const TONE_A = 0x01;
        /// Channel B tone off
        const TONE_B = 0x02;
        /// Channel C tone off
        const TONE_C = 0x04;
        /// Channel A noise off
        const NOISE_A = 0x08;
        /// Channel B noise off
        const NOISE_B = 0x10;
        /// Channel C noise off
        const NOISE_C = 0x20;
    }
}

impl MixerFlags {
    /// Tone-off bit of channel `chan` (0..3).
    pub fn tone(chan: usize) -> Self {
        Self::from_bits_truncate(Self::TONE_A.bits() << chan)
    }

    /// Noise-off bit of channel `chan` (0..3).
    pub fn noise(chan: usize) -> Self {
        Self::from_bits_truncate(Self::NOISE_A.bits() << chan)
    }
}

/// Volume register bits
pub mod volume {
    /// Fixed level bits
    pub const LEVEL: u8 = 0x0f;
    /// Take level from envelope generator
    pub const ENVELOPE: u8 = 0x10;
}

/// Masked register update stamped with the chip tick it must be rendered up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataChunk {
    /// Absolute chip clock tick at which this chunk's frame ends
    pub tick: u64,
    /// Registers carrying new values
    pub mask: RegisterMask,
    /// Register values, indexed by [`Register`] address
    pub data: [u8; REGISTERS_COUNT],
}

impl DataChunk {
    /// Create an empty chunk for the given tick.
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    /// Store a register value and mark it as changed.
    pub fn set(&mut self, reg: Register, value: u8) {
        self.data[reg as usize] = value;
        self.mask |= reg.mask();
    }

    /// Value of the register if it is part of this chunk.
    pub fn get(&self, reg: Register) -> Option<u8> {
        if self.mask.contains(reg.mask()) {
            Some(self.data[reg as usize])
        } else {
            None
        }
    }

    /// Build a chunk carrying all registers.
    pub fn from_registers(tick: u64, data: [u8; REGISTERS_COUNT]) -> Self {
        Self {
            tick,
            mask: RegisterMask::from_bits_truncate((1 << REGISTERS_COUNT) - 1),
            data,
        }
    }
}
