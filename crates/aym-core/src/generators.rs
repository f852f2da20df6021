//! Sound generators for the AY/YM PSG
//!
//! This module contains the individual generator components:
//! - [`Generator`]: square pulse counter shared by every source
//! - [`NoiseGenerator`]: 17-bit LFSR clocked by a generator
//! - [`EnvelopeGenerator`]: 5-bit volume ramp with 16 hardware shapes

/// Maximal duty cycle value (exclusive).
pub const MAX_DUTY_CYCLE: u32 = 100;

/// Symmetric square wave.
pub const NO_DUTY_CYCLE: u32 = MAX_DUTY_CYCLE / 2;

/// Output level of a generator in the high state.
pub const HIGH_LEVEL: u32 = !0;

/// Square pulse generator
///
/// Output flips once the counter reaches `duty_cycle` percents of the full
/// period and again at its end. With duty cycle 25:
///
/// ```text
///     ___     ___
///    |   |   |   |
/// ___|   |___|   |
///  1   3   1   3
/// ```
#[derive(Clone, Debug)]
pub struct Generator {
    counter: u32,
    level: u32,
    duty_cycle: u32,
    half_period: u32,
    full_period: u32,
}

impl Generator {
    /// Create a generator with symmetric duty cycle and minimal period
    pub fn new() -> Self {
        let mut gen = Self {
            counter: 0,
            level: 0,
            duty_cycle: NO_DUTY_CYCLE,
            half_period: 0,
            full_period: 0,
        };
        gen.set_period(0);
        gen
    }

    /// Reset counter and output level, keeping period and duty cycle
    pub fn reset(&mut self) {
        self.counter = 0;
        self.level = 0;
    }

    /// Advance one step, returns `true` when the output level changed
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.full_period {
            self.counter = 0;
            self.level = !self.level;
            true
        } else if self.counter == self.half_period {
            self.level = !self.level;
            true
        } else {
            false
        }
    }

    /// Current output level, either 0 or [`HIGH_LEVEL`]
    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Set pulse width in percents of the period
    ///
    /// # Panics
    ///
    /// Panics if `duty_cycle` is outside `1..=99`.
    pub fn set_duty_cycle(&mut self, duty_cycle: u32) {
        assert!(
            duty_cycle > 0 && duty_cycle < MAX_DUTY_CYCLE,
            "duty cycle {duty_cycle} out of range"
        );
        self.duty_cycle = duty_cycle;
        self.update_half_period();
    }

    /// Set period in generator steps. Zero period is treated as 1.
    pub fn set_period(&mut self, period: u32) {
        self.full_period = period.max(1) * 2;
        self.update_half_period();
    }

    /// Full period (both halves) in steps
    pub fn full_period(&self) -> u32 {
        self.full_period
    }

    fn update_half_period(&mut self) {
        self.half_period = self.duty_cycle * self.full_period / MAX_DUTY_CYCLE;
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance the noise LFSR by one step.
///
/// Feedback taps are bits 16 and 13; state is kept to 17 bits.
#[inline]
pub fn next_noise(state: u32) -> u32 {
    ((state * 2 + 1) ^ (((state >> 16) ^ (state >> 13)) & 1)) & 0x1ffff
}

/// Noise generator using 17-bit LFSR
#[derive(Clone, Debug, Default)]
pub struct NoiseGenerator {
    gen: Generator,
    lfsr: u32,
}

impl NoiseGenerator {
    /// Create a new noise generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Period in generator steps (twice the R6 value)
    pub fn set_period(&mut self, period: u32) {
        self.gen.set_period(period);
    }

    /// Set pulse width of the clocking generator
    pub fn set_duty_cycle(&mut self, duty_cycle: u32) {
        self.gen.set_duty_cycle(duty_cycle);
    }

    /// Tick the generator; LFSR advances on every generator edge
    #[inline]
    pub fn tick(&mut self) -> bool {
        if self.gen.tick() {
            self.lfsr = next_noise(self.lfsr);
            true
        } else {
            false
        }
    }

    /// Current output level, either 0 or [`HIGH_LEVEL`]
    #[inline]
    pub fn level(&self) -> u32 {
        if self.lfsr & 0x10000 != 0 {
            HIGH_LEVEL
        } else {
            0
        }
    }

    /// Reset to initial state
    pub fn reset(&mut self) {
        self.gen.reset();
        self.gen.set_period(0);
        self.lfsr = 0;
    }
}

/// Envelope generator with 16 hardware shapes
#[derive(Clone, Debug, Default)]
pub struct EnvelopeGenerator {
    gen: Generator,
    shape: u8,
    level: i32,
    decay: i32,
}

impl EnvelopeGenerator {
    /// Create a new envelope generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Period in generator steps (R11/R12)
    pub fn set_period(&mut self, period: u32) {
        self.gen.set_period(period);
    }

    /// Set pulse width of the clocking generator
    pub fn set_duty_cycle(&mut self, duty_cycle: u32) {
        self.gen.set_duty_cycle(duty_cycle);
    }

    /// Restart envelope with a new shape (R13 write)
    ///
    /// Shapes with bit 2 set (attack) start from 0 and rise, others start
    /// from 31 and fall.
    pub fn set_shape(&mut self, shape: u8) {
        self.gen.reset();
        self.shape = shape & 0x0f;
        if self.shape & 4 != 0 {
            self.level = 0;
            self.decay = 1;
        } else {
            self.level = 31;
            self.decay = -1;
        }
    }

    /// Tick the generator, returns `true` on envelope step
    #[inline]
    pub fn tick(&mut self) -> bool {
        if !self.gen.tick() {
            return false;
        }
        self.level += self.decay;
        if !(0..=31).contains(&self.level) {
            match self.shape {
                0..=7 | 9 | 15 => {
                    self.level = 0;
                    self.decay = 0;
                }
                8 | 12 => {
                    self.level &= 31;
                }
                10 | 14 => {
                    self.decay = -self.decay;
                    self.level += self.decay;
                }
                _ => {
                    // 11, 13
                    self.level = 31;
                    self.decay = 0;
                }
            }
        }
        true
    }

    /// Current envelope level (0-31)
    #[inline]
    pub fn level(&self) -> u32 {
        self.level as u32
    }

    /// Reset to initial state
    pub fn reset(&mut self) {
        self.gen.reset();
        self.gen.set_period(0);
        self.shape = 0;
        self.level = 0;
        self.decay = 0;
    }
}
