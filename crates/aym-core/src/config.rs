//! Chip and playback configuration
//!
//! [`AymConfig`] holds every tunable the emulator and the replayer consume.
//! The chip reads it through the [`ChipParameters`] accessor trait on each
//! render call, so [`SharedParameters`] can be used to change settings while
//! a chip is running.

use bitflags::bitflags;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

use crate::generators::{MAX_DUTY_CYCLE, NO_DUTY_CYCLE};
use crate::{AymError, Result};

/// ZX Spectrum 128 AY clock
pub const DEFAULT_CLOCK_FREQ: u64 = 1_773_400;

/// Default output sample rate
pub const DEFAULT_SOUND_FREQ: u32 = 44_100;

/// Default frame duration: 20ms (50Hz)
pub const DEFAULT_FRAME_DURATION_US: u32 = 20_000;

/// Shortest accepted frame duration
pub const MIN_FRAME_DURATION_US: u32 = 1_000;

/// Longest accepted frame duration
pub const MAX_FRAME_DURATION_US: u32 = 1_000_000;

bitflags! {
    /// Generators affected by a non-default duty cycle
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DutyCycleMask: u8 {
        /// Channel A tone
        const A = 0x01;
        /// Channel B tone
        const B = 0x02;
        /// Channel C tone
        const C = 0x04;
        /// Noise
        const N = 0x08;
        /// Envelope
        const E = 0x10;
    }
}

impl Serialize for DutyCycleMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DutyCycleMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        u8::deserialize(deserializer).map(Self::from_bits_truncate)
    }
}

/// Volume response of the emulated chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipType {
    /// AY-3-8910/8912, 16 volume steps
    #[default]
    Ay,
    /// YM2149, 32 volume steps
    Ym,
}

/// Read-only accessor for chip settings
pub trait ChipParameters {
    /// Chip clock in Hz
    fn clock_freq(&self) -> u64;
    /// Output sample rate in Hz
    fn sound_freq(&self) -> u32;
    /// Use YM volume table
    fn is_ym(&self) -> bool;
    /// Average output over all ticks between samples
    fn interpolate(&self) -> bool;
    /// Duty cycle in percents for generators selected by [`Self::duty_cycle_mask`]
    fn duty_cycle_value(&self) -> u32;
    /// Generators using [`Self::duty_cycle_value`]
    fn duty_cycle_mask(&self) -> DutyCycleMask;
}

/// Emulation and playback settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AymConfig {
    /// Chip clock in Hz
    pub clock_freq: u64,
    /// Output sample rate in Hz
    pub sound_freq: u32,
    /// Emulated chip
    pub chip_type: ChipType,
    /// Box-filter interpolation between output samples
    pub interpolate: bool,
    /// Duty cycle in percents (1..=99)
    pub duty_cycle: u32,
    /// Generators the duty cycle applies to
    pub duty_cycle_mask: DutyCycleMask,
    /// Duration of a single player frame in microseconds
    pub frame_duration_us: u32,
    /// Restart from the loop point after the end
    pub looped: bool,
}

impl Default for AymConfig {
    fn default() -> Self {
        Self {
            clock_freq: DEFAULT_CLOCK_FREQ,
            sound_freq: DEFAULT_SOUND_FREQ,
            chip_type: ChipType::Ay,
            interpolate: false,
            duty_cycle: NO_DUTY_CYCLE,
            duty_cycle_mask: DutyCycleMask::empty(),
            frame_duration_us: DEFAULT_FRAME_DURATION_US,
            looped: false,
        }
    }
}

impl AymConfig {
    /// Check ranges of every field
    pub fn validate(&self) -> Result<()> {
        if self.clock_freq == 0 {
            return Err(AymError::ConfigError("clock frequency must be positive".into()));
        }
        if self.sound_freq == 0 {
            return Err(AymError::ConfigError("sound frequency must be positive".into()));
        }
        if self.duty_cycle == 0 || self.duty_cycle >= MAX_DUTY_CYCLE {
            return Err(AymError::ConfigError(format!(
                "duty cycle {} outside 1..={}",
                self.duty_cycle,
                MAX_DUTY_CYCLE - 1
            )));
        }
        if !(MIN_FRAME_DURATION_US..=MAX_FRAME_DURATION_US).contains(&self.frame_duration_us) {
            return Err(AymError::ConfigError(format!(
                "frame duration {}us outside {}..={}",
                self.frame_duration_us, MIN_FRAME_DURATION_US, MAX_FRAME_DURATION_US
            )));
        }
        Ok(())
    }

    /// Chip clocks per player frame
    pub fn clocks_per_frame(&self) -> u64 {
        self.clock_freq * u64::from(self.frame_duration_us) / 1_000_000
    }

    /// Player frames per second
    pub fn frame_rate(&self) -> u32 {
        1_000_000 / self.frame_duration_us.max(1)
    }

    /// Output samples per player frame
    pub fn samples_per_frame(&self) -> u32 {
        (u64::from(self.sound_freq) * u64::from(self.frame_duration_us) / 1_000_000) as u32
    }
}

impl ChipParameters for AymConfig {
    fn clock_freq(&self) -> u64 {
        self.clock_freq
    }

    fn sound_freq(&self) -> u32 {
        self.sound_freq
    }

    fn is_ym(&self) -> bool {
        self.chip_type == ChipType::Ym
    }

    fn interpolate(&self) -> bool {
        self.interpolate
    }

    fn duty_cycle_value(&self) -> u32 {
        self.duty_cycle
    }

    fn duty_cycle_mask(&self) -> DutyCycleMask {
        self.duty_cycle_mask
    }
}

/// Configuration shared between a running chip and its controller
#[derive(Debug, Clone, Default)]
pub struct SharedParameters(Arc<RwLock<AymConfig>>);

impl SharedParameters {
    /// Wrap a configuration
    pub fn new(config: AymConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    /// Copy of current configuration
    pub fn snapshot(&self) -> AymConfig {
        self.0.read().clone()
    }

    /// Modify configuration in place; the chip picks it up on the next render
    pub fn update<F: FnOnce(&mut AymConfig)>(&self, f: F) {
        f(&mut *self.0.write());
    }
}

impl ChipParameters for SharedParameters {
    fn clock_freq(&self) -> u64 {
        self.0.read().clock_freq
    }

    fn sound_freq(&self) -> u32 {
        self.0.read().sound_freq
    }

    fn is_ym(&self) -> bool {
        self.0.read().chip_type == ChipType::Ym
    }

    fn interpolate(&self) -> bool {
        self.0.read().interpolate
    }

    fn duty_cycle_value(&self) -> u32 {
        self.0.read().duty_cycle
    }

    fn duty_cycle_mask(&self) -> DutyCycleMask {
        self.0.read().duty_cycle_mask
    }
}
