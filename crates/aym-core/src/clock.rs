//! Chip clock to output sample rate conversion

use crate::psg::AYM_CLOCK_DIVISOR;

/// Tracks chip ticks against output sample ticks
///
/// The next sample tick is always derived from the render start and the
/// number of samples produced so far, so rounding errors never accumulate.
#[derive(Clone, Debug, Default)]
pub struct ClockSource {
    current_tick: u64,
    next_sound_tick: u64,
    last_tick: u64,
    ticks_per_sec: u64,
    render_start_tick: u64,
    sound_freq: u32,
    samples_done: u64,
}

impl ClockSource {
    /// Create a stopped clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to tick 0
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start a new frame ending at `last_tick`
    ///
    /// Changing clock or sound frequency restarts sample accounting from the
    /// current tick.
    pub fn apply_frame(&mut self, last_tick: u64, ticks_per_sec: u64, sound_freq: u32) {
        if self.ticks_per_sec != ticks_per_sec || self.sound_freq != sound_freq {
            self.render_start_tick = self.current_tick;
            self.ticks_per_sec = ticks_per_sec;
            self.sound_freq = sound_freq;
            self.samples_done = 1;
            self.calc_next_sound_tick();
        }
        self.last_tick = last_tick;
    }

    /// Advance by one generator step, returns `true` if a sample is due
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.current_tick += AYM_CLOCK_DIVISOR;
        if self.current_tick >= self.next_sound_tick {
            self.samples_done += 1;
            self.calc_next_sound_tick();
            true
        } else {
            false
        }
    }

    /// Current frame is not finished yet
    #[inline]
    pub fn in_frame(&self) -> bool {
        self.current_tick < self.last_tick
    }

    /// Chip ticks rendered so far
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    fn calc_next_sound_tick(&mut self) {
        self.next_sound_tick = self.render_start_tick
            + self.ticks_per_sec * self.samples_done / u64::from(self.sound_freq.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_per_second() {
        let mut clock = ClockSource::new();
        clock.apply_frame(1_773_400, 1_773_400, 44_100);
        let mut samples = 0;
        while clock.in_frame() {
            if clock.tick() {
                samples += 1;
            }
        }
        assert_eq!(samples, 44_100);
    }

    #[test]
    fn test_no_drift_across_frames() {
        let mut clock = ClockSource::new();
        let mut samples = 0;
        for frame in 1..=50u64 {
            clock.apply_frame(frame * 35_468, 1_773_400, 44_100);
            while clock.in_frame() {
                if clock.tick() {
                    samples += 1;
                }
            }
        }
        assert_eq!(samples, 44_100);
    }
}
