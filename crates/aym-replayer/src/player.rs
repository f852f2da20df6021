//! Playback driver
//!
//! A [`DataRenderer`] produces the registers of one frame at a time; the
//! [`Player`] stamps each frame with its chip tick, feeds it to an
//! [`aym::Chip`] and hands out the rendered samples.

use std::sync::Arc;

use aym::{
    AymConfig, AymDevice, Chip, DataChunk, Layout, SampleBuffer, SharedParameters,
    REGISTERS_COUNT,
};
use aym_common::{BasicMetadata, ChiptunePlayer, ChiptunePlayerBase, PlaybackState};
use aym_formats::catalog::{self, Content};

use crate::builder::AymTrackBuilder;
use crate::protracker2::ProTracker2Renderer;
use crate::soundtracker::SoundTrackerRenderer;
use crate::stream::StreamRenderer;
use crate::{ReplayerError, Result};

/// Song length and loop point in frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackInfo {
    /// Frames of a single pass
    pub frames: usize,
    /// Frame playback restarts from when looping
    pub loop_frame: usize,
}

/// Source of per-frame register updates
pub trait DataRenderer: Send {
    /// Write the registers of the current frame into `builder`
    fn synthesize(&mut self, builder: &mut AymTrackBuilder);

    /// Move to the next frame; `false` once the song is over and `looped`
    /// is not set
    fn advance(&mut self, looped: bool) -> bool;

    /// Back to the first frame
    fn reset(&mut self);

    /// Current frame number
    fn frame(&self) -> usize;

    /// Song length and loop point
    fn info(&self) -> PlaybackInfo;
}

/// Registers of the renderer's current frame as a chunk ending at `tick`
fn next_chunk<R: DataRenderer + ?Sized>(
    renderer: &mut R,
    previous: &mut Option<[u8; REGISTERS_COUNT]>,
    tick: u64,
) -> DataChunk {
    let mut builder = AymTrackBuilder::new(previous.as_ref());
    renderer.synthesize(&mut builder);
    let registers = *builder.registers();
    let chunk = builder.finish(tick, previous.as_ref());
    *previous = Some(registers);
    chunk
}

/// Render a single pass of `renderer` into `device`, returning the frames
/// count
///
/// Both are reset first. Used to convert songs into register dumps such as
/// [`aym::FymDumper`].
pub fn render_to_device<R, D>(renderer: &mut R, device: &mut D, clocks_per_frame: u64) -> usize
where
    R: DataRenderer + ?Sized,
    D: AymDevice + ?Sized,
{
    renderer.reset();
    device.reset();
    if renderer.info().frames == 0 {
        return 0;
    }
    let mut previous = None;
    let mut tick = 0;
    let mut frames = 0;
    loop {
        tick += clocks_per_frame;
        device.render_data(&next_chunk(renderer, &mut previous, tick));
        frames += 1;
        if !renderer.advance(false) {
            break;
        }
    }
    device.flush();
    frames
}

/// Chiptune player over any [`DataRenderer`]
///
/// Settings are shared with the chip through [`SharedParameters`]: changes
/// made via [`Player::parameters`] apply from the next frame on.
///
/// # Example
/// ```
/// use aym::AymConfig;
/// use aym_common::{ChiptunePlayerBase, PlaybackState};
/// use aym_replayer::Player;
///
/// let data = b"PSG\x1a\0\0\0\0\0\0\0\0\0\0\0\0\xff\x07\x3e\x08\x0f\xfd";
/// let mut player = Player::load(data, AymConfig::default()).unwrap();
/// player.play();
/// let _ = player.generate_samples(4096);
/// assert_eq!(player.state(), PlaybackState::Stopped);
/// ```
pub struct Player {
    renderer: Box<dyn DataRenderer>,
    chip: Chip<SharedParameters, SampleBuffer>,
    params: SharedParameters,
    previous: Option<[u8; REGISTERS_COUNT]>,
    tick: u64,
    state: PlaybackState,
    metadata: BasicMetadata,
    info: PlaybackInfo,
    finished: bool,
}

impl Player {
    /// Player over `renderer` with mono output
    pub fn new(
        renderer: Box<dyn DataRenderer>,
        metadata: BasicMetadata,
        config: AymConfig,
    ) -> Result<Self> {
        config.validate()?;
        let info = renderer.info();
        if info.frames == 0 {
            return Err(ReplayerError::UnsupportedContent("song has no frames".into()));
        }
        let metadata = BasicMetadata {
            frame_count: Some(info.frames),
            frame_rate: config.frame_rate(),
            loop_frame: Some(info.loop_frame),
            ..metadata
        };
        let params = SharedParameters::new(config);
        Ok(Self {
            renderer,
            chip: Chip::new(params.clone(), SampleBuffer::new(Layout::Mono)),
            params,
            previous: None,
            tick: 0,
            state: PlaybackState::Stopped,
            metadata,
            info,
            finished: false,
        })
    }

    /// Detect the format of `data` and create a player for it
    ///
    /// Streams carrying their own chip clock or frame rate override the
    /// corresponding `config` fields.
    pub fn load(data: &[u8], config: AymConfig) -> Result<Self> {
        let mut metadata = BasicMetadata::new();
        let (descriptor, decoded) =
            catalog::detect(data, &mut metadata).ok_or(ReplayerError::Unrecognized)?;
        let mut config = config;
        let renderer: Box<dyn DataRenderer> = match decoded.content {
            Content::Track(model) => {
                let model = Arc::new(model);
                match descriptor.id {
                    "PT2" => Box::new(ProTracker2Renderer::new(model)?),
                    "ST1" | "STC" => Box::new(SoundTrackerRenderer::new(model)?),
                    id => {
                        return Err(ReplayerError::UnsupportedContent(format!(
                            "no renderer for {id} tracks"
                        )))
                    }
                }
            }
            Content::Stream(model) => {
                if let Some(clock) = model.clock_rate {
                    config.clock_freq = clock;
                }
                if let Some(rate) = model.frame_rate {
                    config.frame_duration_us = 1_000_000 / rate.max(1);
                }
                Box::new(StreamRenderer::new(Arc::new(model)))
            }
            Content::Packed(_) => {
                return Err(ReplayerError::UnsupportedContent(format!(
                    "{} holds packed data",
                    descriptor.id
                )))
            }
            Content::Catalogue(files) => {
                return Err(ReplayerError::UnsupportedContent(format!(
                    "{} is a catalogue of {} files",
                    descriptor.id,
                    files.len()
                )))
            }
        };
        log::debug!(
            "loaded {} module: {} frames, loop at {}",
            descriptor.id,
            renderer.info().frames,
            renderer.info().loop_frame
        );
        Self::new(renderer, metadata, config)
    }

    /// Switch the output channel layout; drops samples not yet consumed
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.chip = Chip::new(self.params.clone(), SampleBuffer::new(layout));
        self.rewind();
        self
    }

    /// Song length and loop point
    pub fn info(&self) -> PlaybackInfo {
        self.info
    }

    /// Settings shared with the chip
    pub fn parameters(&self) -> SharedParameters {
        self.params.clone()
    }

    /// Emulated chip, e.g. for channel analysis
    pub fn chip(&self) -> &Chip<SharedParameters, SampleBuffer> {
        &self.chip
    }

    /// Frame played next
    pub fn current_frame(&self) -> usize {
        self.renderer.frame()
    }

    fn rewind(&mut self) {
        self.renderer.reset();
        self.chip.reset();
        self.chip.receiver_mut().clear();
        self.previous = None;
        self.tick = 0;
        self.finished = false;
    }

    fn render_frame(&mut self) {
        let config = self.params.snapshot();
        self.tick += config.clocks_per_frame();
        let chunk = next_chunk(self.renderer.as_mut(), &mut self.previous, self.tick);
        self.chip.render_data(&chunk);

        let frame = self.renderer.frame();
        if !self.renderer.advance(config.looped) {
            log::debug!("playback finished after {} frames", frame + 1);
            self.finished = true;
        } else if self.renderer.frame() <= frame {
            log::trace!("looped from frame {frame} to {}", self.renderer.frame());
        }
    }
}

impl ChiptunePlayerBase for Player {
    fn play(&mut self) {
        if self.finished {
            self.rewind();
        }
        self.state = PlaybackState::Playing;
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    fn stop(&mut self) {
        self.rewind();
        self.state = PlaybackState::Stopped;
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn generate_samples_into(&mut self, buffer: &mut [f32]) {
        if self.state != PlaybackState::Playing {
            buffer.fill(0.0);
            return;
        }
        let mut written = 0;
        while written < buffer.len() {
            if self.chip.receiver().is_empty() {
                if self.finished {
                    self.state = PlaybackState::Stopped;
                    buffer[written..].fill(0.0);
                    return;
                }
                self.render_frame();
                if self.chip.receiver().is_empty() {
                    buffer[written..].fill(0.0);
                    return;
                }
            }
            written += self.chip.receiver_mut().drain_into(&mut buffer[written..]);
        }
    }

    fn sample_rate(&self) -> u32 {
        self.params.snapshot().sound_freq
    }

    fn output_channels(&self) -> usize {
        self.chip.receiver().channels()
    }

    fn playback_position(&self) -> f32 {
        if self.info.frames == 0 {
            return 0.0;
        }
        (self.renderer.frame() as f32 / self.info.frames as f32).min(1.0)
    }

    fn duration_seconds(&self) -> f32 {
        self.info.frames as f32 / self.params.snapshot().frame_rate() as f32
    }
}

impl ChiptunePlayer for Player {
    type Metadata = BasicMetadata;

    fn metadata(&self) -> &Self::Metadata {
        &self.metadata
    }
}
