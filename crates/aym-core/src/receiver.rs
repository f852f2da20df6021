//! Sample sinks fed by the chip
//!
//! The chip pushes every rendered [`MultiSample`] into a [`Receiver`].
//! [`Mixer`] folds the three channels into mono or stereo frames and
//! [`SampleBuffer`] collects them as normalized `f32` values.

use crate::psg::{MultiSample, CHANNELS};
use serde::{Deserialize, Serialize};

/// Consumer of rendered chip samples
pub trait Receiver {
    /// Accept one sample of all channels
    fn apply_data(&mut self, sample: &MultiSample);

    /// Called when the producer has no more data for now
    fn flush(&mut self) {}
}

impl Receiver for Vec<MultiSample> {
    fn apply_data(&mut self, sample: &MultiSample) {
        self.push(*sample);
    }
}

impl<R: Receiver + ?Sized> Receiver for &mut R {
    fn apply_data(&mut self, sample: &MultiSample) {
        (**self).apply_data(sample);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

impl<R: Receiver + ?Sized> Receiver for Box<R> {
    fn apply_data(&mut self, sample: &MultiSample) {
        (**self).apply_data(sample);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// Placement of channels A, B, C in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// All channels in the center
    Mono,
    /// A left, B center, C right
    #[default]
    Abc,
    /// A left, C center, B right
    Acb,
}

/// Per-channel gains for left and right outputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mixer {
    left: [f32; CHANNELS],
    right: [f32; CHANNELS],
    channels: usize,
}

impl Mixer {
    /// Build gains for `layout`
    pub fn new(layout: Layout) -> Self {
        const SIDE: f32 = 1.0 / 1.5;
        const CENTER: f32 = 0.5 / 1.5;
        match layout {
            Layout::Mono => Self {
                left: [1.0 / 3.0; CHANNELS],
                right: [1.0 / 3.0; CHANNELS],
                channels: 1,
            },
            Layout::Abc => Self {
                left: [SIDE, CENTER, 0.0],
                right: [0.0, CENTER, SIDE],
                channels: 2,
            },
            Layout::Acb => Self {
                left: [SIDE, 0.0, CENTER],
                right: [0.0, SIDE, CENTER],
                channels: 2,
            },
        }
    }

    /// Output channels count (1 or 2)
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Mix a chip sample into `[left, right]` in the `0.0..=1.0` range
    pub fn mix(&self, sample: &MultiSample) -> [f32; 2] {
        let mut out = [0.0f32; 2];
        for (chan, &level) in sample.iter().enumerate() {
            let level = f32::from(level) / f32::from(u16::MAX);
            out[0] += level * self.left[chan];
            out[1] += level * self.right[chan];
        }
        out
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(Layout::default())
    }
}

/// Receiver collecting mixed, interleaved `f32` frames
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    mixer: Mixer,
    samples: Vec<f32>,
}

impl SampleBuffer {
    /// Empty buffer mixing with `layout`
    pub fn new(layout: Layout) -> Self {
        Self {
            mixer: Mixer::new(layout),
            samples: Vec::new(),
        }
    }

    /// Output channels count
    pub fn channels(&self) -> usize {
        self.mixer.channels()
    }

    /// Collected interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Move out up to `out.len()` collected samples, returns the count moved
    pub fn drain_into(&mut self, out: &mut [f32]) -> usize {
        let count = out.len().min(self.samples.len());
        out[..count].copy_from_slice(&self.samples[..count]);
        self.samples.drain(..count);
        count
    }

    /// Drop collected samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of collected samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// No samples collected
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Receiver for SampleBuffer {
    fn apply_data(&mut self, sample: &MultiSample) {
        let [left, right] = self.mixer.mix(sample);
        self.samples.push(left);
        if self.mixer.channels() == 2 {
            self.samples.push(right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mono_mix() {
        let mixer = Mixer::new(Layout::Mono);
        let [l, r] = mixer.mix(&[u16::MAX, u16::MAX, u16::MAX]);
        assert_relative_eq!(l, 1.0, epsilon = 1e-6);
        assert_relative_eq!(r, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_abc_panning() {
        let mixer = Mixer::new(Layout::Abc);
        let [l, r] = mixer.mix(&[u16::MAX, 0, 0]);
        assert!(l > 0.6);
        assert_relative_eq!(r, 0.0);
        let [l, r] = mixer.mix(&[u16::MAX, u16::MAX, u16::MAX]);
        assert_relative_eq!(l, 1.0, epsilon = 1e-6);
        assert_relative_eq!(r, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sample_buffer_drain() {
        let mut buffer = SampleBuffer::new(Layout::Acb);
        buffer.apply_data(&[0, u16::MAX, 0]);
        buffer.apply_data(&[0, 0, 0]);
        assert_eq!(buffer.len(), 4);
        assert_relative_eq!(buffer.samples()[0], 0.0);
        assert!(buffer.samples()[1] > 0.6);

        let mut out = [1.0f32; 3];
        assert_eq!(buffer.drain_into(&mut out), 3);
        assert_eq!(buffer.len(), 1);
    }
}
