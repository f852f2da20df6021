//! Chiptune Replayers for the AY/YM Emulator
//!
//! Turns decoded models from `aym-formats` into per-frame register updates
//! and plays them through an [`aym::Chip`]:
//!
//! - [`TrackStateIterator`] walks order list, patterns, lines and frames of a
//!   [`TrackModel`](aym_formats::TrackModel)
//! - [`SoundTrackerRenderer`] and [`ProTracker2Renderer`] synthesize the
//!   registers of every frame with tracker-specific semantics
//! - [`StreamRenderer`] replays register streams (AYC, PSG, YM, FYM)
//! - [`Player`] owns a renderer and a chip and implements
//!   [`aym_common::ChiptunePlayer`]
//!
//! # Quick start
//! ```
//! use aym::AymConfig;
//! use aym_common::ChiptunePlayerBase;
//! use aym_replayer::Player;
//!
//! let data = b"PSG\x1a\0\0\0\0\0\0\0\0\0\0\0\0\xff\x00\xfc\x07\x3e\x08\x0f\xff\xfd";
//! let mut player = Player::load(data, AymConfig::default()).unwrap();
//! assert_eq!(player.info().frames, 2);
//!
//! player.play();
//! let samples = player.generate_samples(882);
//! assert_eq!(samples.len(), 882);
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod player;
pub mod protracker2;
pub mod soundtracker;
pub mod state;
pub mod stream;
pub mod tables;

/// Error type for replayer operations
#[derive(thiserror::Error, Debug)]
pub enum ReplayerError {
    /// No decoder recognized the data
    #[error("unrecognized module data")]
    Unrecognized,

    /// Data was decoded but cannot be played
    #[error("unsupported content: {0}")]
    UnsupportedContent(String),

    /// Decoded track cannot be iterated
    #[error("invalid track: {0}")]
    InvalidTrack(String),

    /// Chip configuration or emulation error
    #[error("chip error: {0}")]
    Chip(#[from] aym::AymError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ReplayerError {
    fn from(msg: String) -> Self {
        ReplayerError::Other(msg)
    }
}

impl From<&str> for ReplayerError {
    fn from(msg: &str) -> Self {
        ReplayerError::Other(msg.to_string())
    }
}

/// Result type for replayer operations
pub type Result<T> = std::result::Result<T, ReplayerError>;

// Public API exports
pub use builder::{AymTrackBuilder, ChannelBuilder};
pub use player::{render_to_device, DataRenderer, PlaybackInfo, Player};
pub use protracker2::ProTracker2Renderer;
pub use soundtracker::SoundTrackerRenderer;
pub use state::{TrackState, TrackStateIterator};
pub use stream::StreamRenderer;
pub use tables::FrequencyTable;
