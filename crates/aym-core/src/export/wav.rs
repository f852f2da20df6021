//! WAV file export functionality

use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::psg::MultiSample;
use crate::receiver::{Layout, Mixer, Receiver};
use crate::{AymError, Result};

/// Receiver writing mixed 16-bit PCM to a WAV file
///
/// Write errors cannot be reported from [`Receiver::apply_data`]; the first
/// one is kept and returned by [`WavReceiver::finalize`].
pub struct WavReceiver {
    writer: Option<WavWriter<BufWriter<File>>>,
    mixer: Mixer,
    error: Option<hound::Error>,
    written: u64,
}

impl WavReceiver {
    /// Create `path` for `sample_rate` output with the given channel layout
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32, layout: Layout) -> Result<Self> {
        let mixer = Mixer::new(layout);
        let spec = WavSpec {
            channels: mixer.channels() as u16,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path.as_ref(), spec).map_err(|e| {
            AymError::AudioFileError(format!(
                "Failed to create WAV file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Self {
            writer: Some(writer),
            mixer,
            error: None,
            written: 0,
        })
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.written
    }

    /// Finish the file, reporting any error met while writing
    pub fn finalize(mut self) -> Result<()> {
        if let Some(e) = self.error.take() {
            return Err(AymError::AudioFileError(format!("WAV write failed: {}", e)));
        }
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| AymError::AudioFileError(format!("WAV finalize failed: {}", e)))?;
        }
        Ok(())
    }
}

fn to_pcm(value: f32) -> i16 {
    (value.clamp(0.0, 1.0) * f32::from(i16::MAX)) as i16
}

impl Receiver for WavReceiver {
    fn apply_data(&mut self, sample: &MultiSample) {
        if self.error.is_some() {
            return;
        }
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let [left, right] = self.mixer.mix(sample);
        let mut result = writer.write_sample(to_pcm(left));
        if result.is_ok() && self.mixer.channels() == 2 {
            result = writer.write_sample(to_pcm(right));
        }
        match result {
            Ok(()) => self.written += 1,
            Err(e) => self.error = Some(e),
        }
    }

    fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                self.error.get_or_insert(e);
            }
        }
    }
}
