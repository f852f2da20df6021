//! AY-3-8910 / YM2149 PSG Emulator
//!
//! Emulates the programmable sound generator found in the ZX Spectrum 128,
//! Amstrad CPC, MSX and Atari ST. The chip is driven by [`DataChunk`]s: masked
//! register updates stamped with the chip clock tick their frame ends at.
//! Rendered samples are pushed into a caller-supplied [`Receiver`].
//!
//! # Features
//! - Square pulse generators with configurable duty cycle
//! - 17-bit noise LFSR and 16 envelope shapes
//! - AY and YM volume tables
//! - Drift-free chip clock to sample rate conversion with optional interpolation
//! - Channel analyzer for visualization
//! - FYM register dumps
//!
//! # Crate feature flags
//! - `export-wav` (optional): [`export::WavReceiver`] writing WAV files via `hound`
//!
//! # Quick start
//! ```
//! use aym::{AymConfig, Chip, DataChunk, Layout, Register, SampleBuffer};
//!
//! let config = AymConfig::default();
//! let frame = config.clocks_per_frame();
//! let mut chip = Chip::new(config, SampleBuffer::new(Layout::Mono));
//!
//! let mut chunk = DataChunk::new(frame);
//! chunk.set(Register::ToneALo, 0xfc); // ~440Hz on a ZX Spectrum clock
//! chunk.set(Register::Mixer, 0x3e); // tone A only
//! chunk.set(Register::VolumeA, 0x0f);
//! chip.render_data(&chunk);
//!
//! assert_eq!(chip.receiver().len(), 882);
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod chip;
pub mod clock;
pub mod config;
pub mod fym;
pub mod generators;
pub mod psg;
pub mod receiver;
pub mod registers;
pub mod tables;

#[cfg(feature = "export-wav")]
pub mod export;

/// Error types for chip emulator operations
#[derive(thiserror::Error, Debug)]
pub enum AymError {
    /// IO error from filesystem or compression stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio file output error
    #[error("Audio file error: {0}")]
    AudioFileError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for AymError {
    /// Converts a String into `AymError::Other`.
    ///
    /// Prefer the specific variants (`ConfigError`, `AudioFileError`) where
    /// the error kind is known.
    fn from(msg: String) -> Self {
        AymError::Other(msg)
    }
}

impl From<&str> for AymError {
    fn from(msg: &str) -> Self {
        AymError::Other(msg.to_string())
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, AymError>;

// Public API exports
pub use backend::AymDevice;
pub use chip::Chip;
pub use config::{AymConfig, ChipParameters, ChipType, DutyCycleMask, SharedParameters};
pub use fym::{FymDumper, FymParameters};
pub use psg::{ChannelState, ChannelsState, MultiSample, AYM_CLOCK_DIVISOR, CHANNELS};
pub use receiver::{Layout, Mixer, Receiver, SampleBuffer};
pub use registers::{DataChunk, MixerFlags, Register, RegisterMask, REGISTERS_COUNT};
