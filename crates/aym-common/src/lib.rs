//! Types shared by the AY/YM format decoders and replayers
//!
//! - [`MetaBuilder`]: sink filled with title, author and program while a
//!   module is decoded
//! - [`MetadataFields`] / [`BasicMetadata`]: metadata as seen by a player
//! - [`ChiptunePlayer`] / [`ChiptunePlayerBase`]: playback control and sample
//!   generation

#![warn(missing_docs)]

mod metadata;
mod player;

pub use metadata::{BasicMetadata, MetaBuilder, MetadataFields, PlaybackMetadata};
pub use player::{ChiptunePlayer, ChiptunePlayerBase, PlaybackState};

/// Output sample rate used when a player has no own setting
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// PAL interrupt frequency
pub const FRAME_RATE_PAL: u32 = 50;

/// Atari ST YM2149 clock
pub const ATARI_ST_CLOCK: u32 = 2_000_000;
