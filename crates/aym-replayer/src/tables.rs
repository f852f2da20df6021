//! Note to tone period tables
//!
//! Trackers store notes as semitone indices; the player converts them into
//! 12-bit tone periods through a fixed 96-entry (8 octaves) table.

/// Notes in a frequency table
pub const NOTES_COUNT: usize = 96;

/// Highest tone period value
const MAX_PERIOD: i32 = 0x0fff;

/// Tone periods indexed by note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyTable {
    periods: [u16; NOTES_COUNT],
}

impl FrequencyTable {
    /// Table over `periods`
    pub const fn new(periods: [u16; NOTES_COUNT]) -> Self {
        Self { periods }
    }

    /// Period of `note`, clamped into the table
    pub fn period(&self, note: i32) -> i32 {
        let idx = note.clamp(0, NOTES_COUNT as i32 - 1) as usize;
        i32::from(self.periods[idx])
    }

    /// Period of `note` shifted by `offset`, wrapped to the 12-bit register
    pub fn tone(&self, note: i32, offset: i32) -> u16 {
        ((self.period(note) + offset) & MAX_PERIOD) as u16
    }

    /// Period distance from note `from` to note `to`
    pub fn sliding_difference(&self, from: i32, to: i32) -> i32 {
        self.period(to) - self.period(from)
    }
}

/// SoundTracker table
pub const SOUNDTRACKER: FrequencyTable = FrequencyTable::new([
    0xef8, 0xe10, 0xd60, 0xc80, 0xbd8, 0xb28, 0xa88, 0x9f0, 0x960, 0x8e0, 0x858, 0x7e0,
    0x77c, 0x708, 0x6b0, 0x640, 0x5ec, 0x594, 0x544, 0x4f8, 0x4b0, 0x470, 0x42c, 0x3f0,
    0x3be, 0x384, 0x358, 0x320, 0x2f6, 0x2ca, 0x2a2, 0x27c, 0x258, 0x238, 0x216, 0x1f8,
    0x1df, 0x1c2, 0x1ac, 0x190, 0x17b, 0x165, 0x151, 0x13e, 0x12c, 0x11c, 0x10b, 0x0fc,
    0x0ef, 0x0e1, 0x0d6, 0x0c8, 0x0bd, 0x0b2, 0x0a8, 0x09f, 0x096, 0x08e, 0x085, 0x07e,
    0x077, 0x070, 0x06b, 0x064, 0x05e, 0x059, 0x054, 0x04f, 0x04b, 0x047, 0x042, 0x03f,
    0x03b, 0x038, 0x035, 0x032, 0x02f, 0x02c, 0x02a, 0x027, 0x025, 0x023, 0x021, 0x01f,
    0x01d, 0x01c, 0x01a, 0x019, 0x017, 0x016, 0x015, 0x013, 0x012, 0x011, 0x010, 0x00f,
]);

/// ProTracker 2 table
pub const PROTRACKER2: FrequencyTable = FrequencyTable::new([
    0xef8, 0xe10, 0xd60, 0xc80, 0xbd8, 0xb28, 0xa88, 0x9f0, 0x960, 0x8e0, 0x858, 0x7e0,
    0x77c, 0x708, 0x6b0, 0x640, 0x5ec, 0x594, 0x544, 0x4f8, 0x4b0, 0x470, 0x42c, 0x3fd,
    0x3be, 0x384, 0x358, 0x320, 0x2f6, 0x2ca, 0x2a2, 0x27c, 0x258, 0x238, 0x216, 0x1f8,
    0x1df, 0x1c2, 0x1ac, 0x190, 0x17b, 0x165, 0x151, 0x13e, 0x12c, 0x11c, 0x10a, 0x0fc,
    0x0ef, 0x0e1, 0x0d6, 0x0c8, 0x0bd, 0x0b2, 0x0a8, 0x09f, 0x096, 0x08e, 0x085, 0x07e,
    0x077, 0x070, 0x06b, 0x064, 0x05e, 0x059, 0x054, 0x04f, 0x04b, 0x047, 0x042, 0x03f,
    0x03b, 0x038, 0x035, 0x032, 0x02f, 0x02c, 0x02a, 0x027, 0x025, 0x023, 0x021, 0x01f,
    0x01d, 0x01c, 0x01a, 0x019, 0x017, 0x016, 0x015, 0x013, 0x012, 0x011, 0x010, 0x00f,
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_descend() {
        for table in [SOUNDTRACKER, PROTRACKER2] {
            for note in 1..NOTES_COUNT as i32 {
                assert!(table.period(note) < table.period(note - 1));
            }
        }
    }

    #[test]
    fn test_period_clamped() {
        assert_eq!(SOUNDTRACKER.period(-5), 0xef8);
        assert_eq!(SOUNDTRACKER.period(200), 0x00f);
        // octave up halves the period
        assert_eq!(SOUNDTRACKER.period(12) * 2, 0xef8);
    }

    #[test]
    fn test_tone_wraps_to_register_width() {
        assert_eq!(SOUNDTRACKER.tone(0, 0x10), 0xf08);
        assert_eq!(SOUNDTRACKER.tone(0, 0x200), 0x0f8);
        assert_eq!(SOUNDTRACKER.tone(95, -0x10), 0xfff);
    }

    #[test]
    fn test_sliding_difference() {
        assert_eq!(PROTRACKER2.sliding_difference(0, 12), 0x77c - 0xef8);
        assert_eq!(PROTRACKER2.sliding_difference(12, 0), 0xef8 - 0x77c);
        assert_eq!(PROTRACKER2.sliding_difference(5, 5), 0);
    }
}
