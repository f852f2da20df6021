//! Player control interface
//!
//! [`ChiptunePlayerBase`] carries everything usable through a trait object;
//! [`ChiptunePlayer`] adds typed access to the song metadata.

use crate::PlaybackMetadata;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// At the start, or past the end of a non-looped song
    #[default]
    Stopped,
    /// Producing samples
    Playing,
    /// Position kept, producing silence
    Paused,
}

/// Playback control and sample generation, usable as `Box<dyn ChiptunePlayerBase>`
pub trait ChiptunePlayerBase: Send {
    /// Start, resume, or restart after the end
    fn play(&mut self);

    /// Hold the current position
    fn pause(&mut self);

    /// Rewind to the start
    fn stop(&mut self);

    /// Transport state
    fn state(&self) -> PlaybackState;

    /// Shorthand for `state() == Playing`
    fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Fill `buffer` with interleaved samples; whatever cannot be played
    /// (paused, stopped, song over) is zeroed
    fn generate_samples_into(&mut self, buffer: &mut [f32]);

    /// [`Self::generate_samples_into`] over a fresh buffer of `count` samples
    fn generate_samples(&mut self, count: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; count];
        self.generate_samples_into(&mut buffer);
        buffer
    }

    /// Output rate in Hz
    fn sample_rate(&self) -> u32 {
        crate::DEFAULT_SAMPLE_RATE
    }

    /// Interleaved channels per sample frame
    fn output_channels(&self) -> usize {
        1
    }

    /// Position within the song, 0.0 to 1.0
    fn playback_position(&self) -> f32 {
        0.0
    }

    /// Song length in seconds; 0.0 when unknown
    fn duration_seconds(&self) -> f32 {
        0.0
    }

    /// Played time in seconds
    fn elapsed_seconds(&self) -> f32 {
        self.playback_position() * self.duration_seconds()
    }
}

/// [`ChiptunePlayerBase`] with typed metadata
pub trait ChiptunePlayer: ChiptunePlayerBase {
    /// Metadata type
    type Metadata: PlaybackMetadata;

    /// Song metadata
    fn metadata(&self) -> &Self::Metadata;
}
