//! PSG core: register state, generators and level computation
//!
//! [`PsgRenderer`] owns the register file and the five generators. It is
//! ticked once per [`AYM_CLOCK_DIVISOR`] chip clocks and exposes the
//! current per-channel output through [`PsgRenderer::levels`].

use crate::generators::{EnvelopeGenerator, Generator, NoiseGenerator, HIGH_LEVEL, NO_DUTY_CYCLE};
use crate::registers::{volume, DataChunk, MixerFlags, Register, RegisterMask, REGISTERS_COUNT};
use crate::tables::{VolumeTable, AY_VOLUME_TABLE, FREQ_MULTIPLIER, NOTE_FREQUENCIES, YM_VOLUME_TABLE};
use crate::DutyCycleMask;

/// Number of tone channels
pub const CHANNELS: usize = 3;

/// Chip clocks per generator step
pub const AYM_CLOCK_DIVISOR: u64 = 8;

/// Output levels of channels A, B and C
pub type MultiSample = [u16; CHANNELS];

/// Analyzer snapshot of a single channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    /// Channel name: `A`, `B`, `C`, `N` (noise) or `E` (envelope)
    pub name: char,
    /// Channel is audible
    pub enabled: bool,
    /// Index in the note frequency table (0..108)
    pub band: usize,
    /// Output level in percents
    pub level: u32,
}

impl ChannelState {
    fn new(name: char) -> Self {
        Self {
            name,
            enabled: false,
            band: 0,
            level: 0,
        }
    }
}

/// Tone channels followed by the synthetic noise and envelope channels
pub type ChannelsState = [ChannelState; CHANNELS + 2];

/// Register file plus generators of a single chip
#[derive(Clone, Debug)]
pub struct PsgRenderer {
    regs: [u8; REGISTERS_COUNT],
    tones: [Generator; CHANNELS],
    noise: NoiseGenerator,
    envelope: EnvelopeGenerator,
    volume_table: &'static VolumeTable,
}

impl PsgRenderer {
    /// Create a renderer in power-on state
    pub fn new() -> Self {
        let mut psg = Self {
            regs: [0; REGISTERS_COUNT],
            tones: Default::default(),
            noise: NoiseGenerator::new(),
            envelope: EnvelopeGenerator::new(),
            volume_table: &AY_VOLUME_TABLE,
        };
        psg.reset();
        psg
    }

    /// Select AY (`false`) or YM (`true`) volume response
    pub fn set_type(&mut self, is_ym: bool) {
        self.volume_table = if is_ym {
            &YM_VOLUME_TABLE
        } else {
            &AY_VOLUME_TABLE
        };
    }

    /// Apply `value` duty cycle to generators selected by `mask`, others get 50%
    pub fn set_duty_cycle(&mut self, value: u32, mask: DutyCycleMask) {
        let duty = |flag: DutyCycleMask| {
            if mask.contains(flag) {
                value
            } else {
                NO_DUTY_CYCLE
            }
        };
        self.tones[0].set_duty_cycle(duty(DutyCycleMask::A));
        self.tones[1].set_duty_cycle(duty(DutyCycleMask::B));
        self.tones[2].set_duty_cycle(duty(DutyCycleMask::C));
        self.noise.set_duty_cycle(duty(DutyCycleMask::N));
        self.envelope.set_duty_cycle(duty(DutyCycleMask::E));
    }

    /// Back to power-on state: registers cleared, all mixer sources off
    pub fn reset(&mut self) {
        self.regs = [0; REGISTERS_COUNT];
        self.regs[Register::Mixer as usize] = 0xff;
        for tone in &mut self.tones {
            tone.reset();
            tone.set_period(0);
        }
        self.noise.reset();
        self.envelope.reset();
    }

    /// Write registers present in `chunk`, clamping them to their width
    pub fn apply_data(&mut self, chunk: &DataChunk) {
        for reg in Register::ALL {
            if !chunk.mask.contains(reg.mask()) {
                continue;
            }
            let value = chunk.data[reg as usize] & reg.width_mask();
            if reg == Register::EnvelopeShape {
                self.envelope.set_shape(value);
            }
            self.regs[reg as usize] = value;
        }
        for (chan, tone_mask) in [RegisterMask::TONE_A, RegisterMask::TONE_B, RegisterMask::TONE_C]
            .into_iter()
            .enumerate()
        {
            if chunk.mask.intersects(tone_mask) {
                self.tones[chan].set_period(self.tone_period(chan));
            }
        }
        if chunk.mask.contains(RegisterMask::NOISE) {
            self.noise.set_period(self.noise_period());
        }
        if chunk.mask.intersects(RegisterMask::ENVELOPE) {
            self.envelope.set_period(self.envelope_period());
        }
    }

    /// Advance all generators one step, returns `true` if any output changed
    #[inline]
    pub fn tick(&mut self) -> bool {
        let mut changed = false;
        for tone in &mut self.tones {
            changed |= tone.tick();
        }
        changed |= self.noise.tick();
        changed |= self.envelope.tick();
        changed
    }

    /// Current output of all tone channels
    pub fn levels(&self) -> MultiSample {
        let mixer = self.regs[Register::Mixer as usize];
        let noise = self.noise.level();
        let envelope = self.envelope.level();
        let mut result = [0; CHANNELS];
        for (chan, out) in result.iter_mut().enumerate() {
            let vol = self.regs[Register::VolumeA as usize + chan];
            let tone_bit = if mixer & MixerFlags::tone(chan).bits() != 0 {
                HIGH_LEVEL
            } else {
                self.tones[chan].level()
            };
            let noise_bit = if mixer & MixerFlags::noise(chan).bits() != 0 {
                HIGH_LEVEL
            } else {
                noise
            };
            let level = if vol & volume::ENVELOPE != 0 {
                envelope
            } else {
                (u32::from(vol & volume::LEVEL) << 1) | 1
            };
            *out = self.volume_table[(tone_bit & noise_bit & level) as usize];
        }
        result
    }

    /// Analyzer snapshot for a chip running at `ticks_per_sec`
    pub fn analyze(&self, ticks_per_sec: u64) -> ChannelsState {
        const MAX_LEVEL: u32 = 100;
        let mut noise = ChannelState::new('N');
        noise.band = band_by_period(ticks_per_sec, self.noise_period());
        let mut envelope = ChannelState::new('E');
        envelope.band = band_by_period(ticks_per_sec, 16 * self.envelope_period());

        let enabled = !self.regs[Register::Mixer as usize];
        let mut state = [ChannelState::new('A'); CHANNELS + 2];
        for chan in 0..CHANNELS {
            let vol = self.regs[Register::VolumeA as usize + chan];
            if enabled & MixerFlags::noise(chan).bits() != 0 {
                noise.enabled = true;
                noise.level += MAX_LEVEL / CHANNELS as u32;
            }
            if vol & volume::ENVELOPE != 0 {
                envelope.enabled = true;
                envelope.level += MAX_LEVEL / CHANNELS as u32;
            }
            let channel = &mut state[chan];
            channel.name = (b'A' + chan as u8) as char;
            if enabled & MixerFlags::tone(chan).bits() != 0 {
                channel.enabled = true;
                channel.level = u32::from(vol & volume::LEVEL) * MAX_LEVEL / 15;
                channel.band = band_by_period(ticks_per_sec, self.tone_period(chan));
            }
        }
        state[CHANNELS] = noise;
        state[CHANNELS + 1] = envelope;
        state
    }

    /// Current register file
    pub fn registers(&self) -> &[u8; REGISTERS_COUNT] {
        &self.regs
    }

    fn tone_period(&self, chan: usize) -> u32 {
        let lo = self.regs[Register::ToneALo as usize + chan * 2];
        let hi = self.regs[Register::ToneAHi as usize + chan * 2];
        256 * u32::from(hi) + u32::from(lo)
    }

    fn noise_period(&self) -> u32 {
        2 * u32::from(self.regs[Register::Noise as usize])
    }

    fn envelope_period(&self) -> u32 {
        256 * u32::from(self.regs[Register::EnvelopeHi as usize])
            + u32::from(self.regs[Register::EnvelopeLo as usize])
    }
}

impl Default for PsgRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest note band for a generator period
pub fn band_by_period(ticks_per_sec: u64, period: u32) -> usize {
    let freq = ticks_per_sec * FREQ_MULTIPLIER / (2 * AYM_CLOCK_DIVISOR * u64::from(period.max(1)));
    let band = NOTE_FREQUENCIES.partition_point(|&f| u64::from(f) < freq);
    band.min(NOTE_FREQUENCIES.len() - 1)
}

/// Box filter over all ticks between two output samples
#[derive(Clone, Debug, Default)]
pub struct Interpolator {
    levels: MultiSample,
    accumulators: [u32; CHANNELS],
    samples: u32,
}

impl Interpolator {
    /// Drop accumulated state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Tick `psg` and accumulate its output
    pub fn tick(&mut self, psg: &mut PsgRenderer) {
        if psg.tick() {
            self.levels = psg.levels();
        }
        for (acc, level) in self.accumulators.iter_mut().zip(self.levels) {
            *acc += u32::from(level);
        }
        self.samples += 1;
    }

    /// Average since the previous call
    pub fn levels(&mut self) -> MultiSample {
        let samples = self.samples.max(1);
        let mut result = [0; CHANNELS];
        for (out, acc) in result.iter_mut().zip(self.accumulators) {
            *out = (acc / samples) as u16;
        }
        self.accumulators = [0; CHANNELS];
        self.samples = 0;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(values: &[(Register, u8)]) -> DataChunk {
        let mut chunk = DataChunk::new(0);
        for &(reg, value) in values {
            chunk.set(reg, value);
        }
        chunk
    }

    #[test]
    fn test_registers_are_clamped() {
        let mut psg = PsgRenderer::new();
        psg.apply_data(&chunk(&[
            (Register::ToneAHi, 0xff),
            (Register::Noise, 0xff),
            (Register::VolumeB, 0xff),
            (Register::ToneALo, 0xff),
        ]));
        let regs = psg.registers();
        assert_eq!(regs[Register::ToneAHi as usize], 0x0f);
        assert_eq!(regs[Register::Noise as usize], 0x1f);
        assert_eq!(regs[Register::VolumeB as usize], 0x1f);
        assert_eq!(regs[Register::ToneALo as usize], 0xff);
        assert_eq!(regs[Register::Mixer as usize], 0xff);
    }

    #[test]
    fn test_unmasked_registers_untouched() {
        let mut psg = PsgRenderer::new();
        let mut data = chunk(&[(Register::VolumeA, 5)]);
        data.data[Register::VolumeB as usize] = 9;
        psg.apply_data(&data);
        assert_eq!(psg.registers()[Register::VolumeA as usize], 5);
        assert_eq!(psg.registers()[Register::VolumeB as usize], 0);
    }

    #[test]
    fn test_levels_with_mixer_off() {
        let mut psg = PsgRenderer::new();
        psg.apply_data(&chunk(&[(Register::VolumeA, 15), (Register::VolumeC, 7)]));
        let levels = psg.levels();
        assert_eq!(levels[0], AY_VOLUME_TABLE[31]);
        assert_eq!(levels[1], AY_VOLUME_TABLE[1]);
        assert_eq!(levels[2], AY_VOLUME_TABLE[15]);

        psg.set_type(true);
        assert_eq!(psg.levels()[2], YM_VOLUME_TABLE[15]);
    }

    #[test]
    fn test_envelope_volume() {
        let mut psg = PsgRenderer::new();
        psg.apply_data(&chunk(&[
            (Register::VolumeA, volume::ENVELOPE),
            (Register::EnvelopeShape, 0x0e),
        ]));
        assert_eq!(psg.levels()[0], AY_VOLUME_TABLE[0]);
        psg.apply_data(&chunk(&[(Register::EnvelopeShape, 0x08)]));
        assert_eq!(psg.levels()[0], AY_VOLUME_TABLE[31]);
    }

    #[test]
    fn test_band_by_period() {
        // 1773400 Hz clock, period 252 gives about 440 Hz (A4)
        assert_eq!(band_by_period(1_773_400, 252), 45);
        assert_eq!(band_by_period(1_773_400, 0), 107);
        assert_eq!(band_by_period(1_773_400, 4095), 0);
    }

    #[test]
    fn test_analyze() {
        let mut psg = PsgRenderer::new();
        psg.apply_data(&chunk(&[
            (Register::Mixer, 0b0011_0110),
            (Register::VolumeA, 15),
            (Register::VolumeB, volume::ENVELOPE),
            (Register::ToneALo, 252),
        ]));
        let state = psg.analyze(1_773_400);
        assert!(state[0].enabled);
        assert_eq!(state[0].level, 100);
        assert_eq!(state[0].band, 45);
        assert!(!state[1].enabled);
        assert_eq!(state[1].name, 'B');
        assert!(state[3].enabled);
        assert_eq!(state[3].name, 'N');
        assert_eq!(state[3].level, 33);
        assert!(state[4].enabled);
        assert_eq!(state[4].level, 33);
    }

    #[test]
    fn test_interpolator_average() {
        let mut psg = PsgRenderer::new();
        psg.apply_data(&chunk(&[
            (Register::Mixer, 0b0011_1110),
            (Register::VolumeA, 15),
            (Register::ToneALo, 1),
        ]));
        let mut interp = Interpolator::default();
        for _ in 0..4 {
            interp.tick(&mut psg);
        }
        let avg = interp.levels()[0];
        assert_eq!(avg, AY_VOLUME_TABLE[31] / 2);
    }
}
