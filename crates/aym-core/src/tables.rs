//! Chip-specific lookup tables

/// Output level for each of 32 volume steps.
pub type VolumeTable = [u16; 32];

/// AY-3-8910 volume table. The chip has only 16 steps, each is doubled.
pub const AY_VOLUME_TABLE: VolumeTable = [
    0x0000, 0x0000, 0x0340, 0x0340, 0x04C0, 0x04C0, 0x06F2, 0x06F2, 0x0A44, 0x0A44, 0x0F13,
    0x0F13, 0x1510, 0x1510, 0x227E, 0x227E, 0x289F, 0x289F, 0x414E, 0x414E, 0x5B21, 0x5B21,
    0x7258, 0x7258, 0x905E, 0x905E, 0xB550, 0xB550, 0xD7A0, 0xD7A0, 0xFFFF, 0xFFFF,
];

/// YM2149 volume table (32 steps).
pub const YM_VOLUME_TABLE: VolumeTable = [
    0x0000, 0x0000, 0x00EF, 0x01D0, 0x0290, 0x032A, 0x03EE, 0x04D2, 0x0611, 0x0782, 0x0912,
    0x0A36, 0x0C31, 0x0EB6, 0x1130, 0x13A0, 0x1751, 0x1BF5, 0x20E2, 0x2594, 0x2CA1, 0x357F,
    0x3E45, 0x475E, 0x5502, 0x6620, 0x7730, 0x8844, 0xA1D2, 0xC102, 0xE0A2, 0xFFFF,
];

/// Multiplier applied to frequencies in [`NOTE_FREQUENCIES`].
pub const FREQ_MULTIPLIER: u64 = 100;

/// Equal-tempered note frequencies over 9 octaves, in Hz * [`FREQ_MULTIPLIER`].
pub const NOTE_FREQUENCIES: [u32; 108] = [
    // octave 1
    3270, 3465, 3671, 3889, 4120, 4365, 4625, 4900, 5191, 5500, 5827, 6173,
    // octave 2
    6541, 6929, 7342, 7778, 8241, 8730, 9250, 9800, 10382, 11000, 11654, 12346,
    // octave 3
    13082, 13858, 14684, 15556, 16482, 17460, 18500, 19600, 20764, 22000, 23308, 24692,
    // octave 4
    26164, 27716, 29368, 31112, 32964, 34920, 37000, 39200, 41528, 44000, 46616, 49384,
    // octave 5
    52328, 55432, 58736, 62224, 65928, 69840, 74000, 78400, 83056, 88000, 93232, 98768,
    // octave 6
    104650, 110860, 117470, 124450, 131860, 139680, 148000, 156800, 166110, 176000, 186460,
    197540,
    // octave 7
    209310, 221720, 234940, 248890, 263710, 279360, 296000, 313600, 332220, 352000, 372930,
    395070,
    // octave 8
    418620, 443460, 469890, 497790, 527420, 558720, 592000, 627200, 664450, 704000, 745860,
    790140,
    // octave 9
    837200, 886980, 939730, 995610, 1054800, 1117500, 1184000, 1254400, 1329000, 1408000,
    1491700, 1580400,
];
