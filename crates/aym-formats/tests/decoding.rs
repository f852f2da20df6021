use std::io::Write;

use aym_common::{BasicMetadata, MetaBuilder};
use aym_formats::catalog::{self, Content};
use aym_formats::chiptune::ayc;
use aym_formats::packed::hobeta::header_checksum;
use aym_formats::stream::{StreamBuilder, ENVELOPE_SHAPE, REGISTERS};
use aym_formats::Location;
use flate2::write::DeflateEncoder;
use flate2::Compression;

const ST1_PATTERNS_OFFSET: usize = 3009;
const ST1_PATTERN_SIZE: usize = 64 * 9;

/// Minimal ST1 module whose order list references patterns 3 and 1
fn st1_module() -> Vec<u8> {
    let mut data = vec![0u8; ST1_PATTERNS_OFFSET + 3 * ST1_PATTERN_SIZE];
    for idx in 0..256 {
        data[1950 + idx * 2] = 1;
    }
    data[1950] = 3;
    data[1952] = 1;
    data[1953] = 0xfe;
    // two positions
    data[2462] = 1;
    data[3007] = 3;
    data[3008] = 0x40;
    // pattern 2 (third), line 5, channel B: D-2 with sample 1
    let cell = ST1_PATTERNS_OFFSET + 2 * ST1_PATTERN_SIZE + 5 * 9 + 3;
    data[cell..cell + 3].copy_from_slice(&[0x41, 0x1f, 0x00]);
    data
}

/// AYC stream of `frames` literal values per register; value of register
/// `r` at frame `f` is `r * 16 + f`
fn ayc_stream(frames: usize) -> Vec<u8> {
    let mut data = vec![0xff; 50];
    data[0..2].copy_from_slice(&(frames as u16).to_le_bytes());
    for reg in 0..REGISTERS {
        let pos = 2 + reg * 3;
        let relative = data.len() - reg * 3 - 4;
        data[pos] = 1;
        data[pos + 1..pos + 3].copy_from_slice(&(relative as u16).to_le_bytes());
        for frame in 0..frames {
            // the first literal uses the preset control bit, then one
            // all-literal control byte per 8 values
            if frame % 8 == 1 {
                data.push(0x00);
            }
            data.push((reg * 16 + frame) as u8);
        }
    }
    data
}

/// AYC column token
enum Token {
    Literal(u8),
    Copy { run: usize, source: usize },
}

/// Pack one AYC column: the first literal uses the preset control bit,
/// then one control byte precedes every group of eight tokens
fn ayc_column(tokens: &[Token], word: bool) -> Vec<u8> {
    let Some((Token::Literal(first), rest)) = tokens.split_first() else {
        panic!("column must start with a literal");
    };
    let mut out = vec![*first];
    for group in rest.chunks(8) {
        let control = group.iter().enumerate().fold(0u8, |acc, (idx, token)| match token {
            Token::Copy { .. } => acc | 0x80u8 >> idx,
            Token::Literal(_) => acc,
        });
        out.push(control);
        for token in group {
            match *token {
                Token::Literal(value) => out.push(value),
                Token::Copy { run, source } => {
                    out.push((run as u8).wrapping_neg());
                    if word {
                        out.extend_from_slice(&(source as u16).to_le_bytes());
                    } else {
                        out.push(source as u8);
                    }
                }
            }
        }
    }
    out
}

/// AYC stream from `(size class, packed column)` per register
fn ayc_file(frames: u16, columns: &[(u8, Vec<u8>)]) -> Vec<u8> {
    let mut data = vec![0xff; 50];
    data[0..2].copy_from_slice(&frames.to_le_bytes());
    for (reg, (size_class, column)) in columns.iter().enumerate() {
        let pos = 2 + reg * 3;
        let relative = data.len() - reg * 3 - 4;
        data[pos] = *size_class;
        data[pos + 1..pos + 3].copy_from_slice(&(relative as u16).to_le_bytes());
        data.extend_from_slice(column);
    }
    data
}

/// Counts values delivered per register
#[derive(Default)]
struct ValueCounter {
    meta: (),
    register: usize,
    counts: [usize; REGISTERS],
}

impl StreamBuilder for ValueCounter {
    fn meta(&mut self) -> &mut dyn MetaBuilder {
        &mut self.meta
    }

    fn set_frames(&mut self, _count: usize) {}

    fn start_channel(&mut self, register: usize) {
        self.register = register;
    }

    fn add_values(&mut self, values: &[u8]) {
        self.counts[self.register] += values.len();
    }
}

/// ZXZip entry holding `payload` deflated
fn zxzip_entry(name: &[u8; 8], kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    let packed = encoder.finish().unwrap();
    let mut crc = flate2::Crc::new();
    crc.update(payload);

    let mut data = name.to_vec();
    data.extend_from_slice(&[kind, 0, 0]);
    data.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    data.push(payload.len().div_ceil(256) as u8);
    data.extend_from_slice(&(packed.len() as u16).to_le_bytes());
    data.extend_from_slice(&crc.sum().to_le_bytes());
    data.extend_from_slice(&[3, 0]);
    data.extend_from_slice(&packed);
    data
}

fn hobeta(payload: &[u8]) -> Vec<u8> {
    let sectors = payload.len().div_ceil(256);
    let mut data = b"TUNE    C".to_vec();
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    data.extend_from_slice(&[0, sectors as u8]);
    let checksum = header_checksum(&data);
    data.extend_from_slice(&checksum.to_le_bytes());
    data.extend_from_slice(payload);
    data.resize(17 + sectors * 256, 0);
    data
}

#[test]
fn st1_pattern_count_follows_positions() {
    let data = st1_module();
    let mut meta = BasicMetadata::new();
    let (descriptor, decoded) = catalog::detect(&data, &mut meta).unwrap();
    assert_eq!(descriptor.id, "ST1");
    assert_eq!(decoded.used_size, data.len());
    assert!(decoded.fixed_checksum.is_some());
    assert_eq!(meta.program, "SoundTracker v1.x");

    let Content::Track(model) = decoded.content else {
        panic!("track expected");
    };
    assert_eq!(model.initial_tempo, 3);
    assert_eq!(model.order.len(), 2);
    assert_eq!(model.order.positions[0].pattern, 2);
    assert_eq!(model.order.positions[1].transposition, -2);
    assert_eq!(model.patterns.size(), 3);
    assert!(model.patterns.get(3).is_empty());

    let pattern = model.pattern_at(0).unwrap();
    assert_eq!(pattern.size(), 64);
    let cell = pattern.line(5).channel(1).unwrap();
    assert_eq!(cell.note, Some(14));
    assert_eq!(cell.sample, Some(1));
    assert!(pattern.line(5).channel(0).is_none());
}

#[test]
fn st1_trailing_patterns_are_not_used() {
    let mut data = st1_module();
    // only pattern 1 is referenced now
    data[1950] = 1;
    data.extend_from_slice(&[0xaa; 100]);
    let mut meta = ();
    let decoded = catalog::find("st1")
        .unwrap()
        .try_decode(&data, &mut meta)
        .unwrap();
    assert_eq!(decoded.used_size, ST1_PATTERNS_OFFSET + ST1_PATTERN_SIZE);
    let Content::Track(model) = decoded.content else {
        panic!("track expected");
    };
    assert_eq!(model.patterns.size(), 1);
}

#[test]
fn ayc_registers_get_exactly_duration_values() {
    let frames = 20;
    let data = ayc_stream(frames);
    let mut meta = BasicMetadata::new();
    let decoded = catalog::find("AYC")
        .unwrap()
        .try_decode(&data, &mut meta)
        .unwrap();
    assert_eq!(decoded.used_size, data.len());
    assert_eq!(meta.program, "AY Chip Compiler");

    let Content::Stream(model) = decoded.content else {
        panic!("stream expected");
    };
    assert_eq!(model.len(), frames);
    assert_eq!(model.clock_rate, Some(1_000_000));
    for (idx, frame) in model.frames.iter().enumerate() {
        for reg in 0..REGISTERS {
            assert_eq!(usize::from(frame.registers[reg]), reg * 16 + idx);
        }
        assert!(frame.is_written(ENVELOPE_SHAPE));
    }
}

#[test]
fn ayc_duration_100_with_back_references() {
    use Token::{Copy, Literal};

    // word distances: a periodic run, a copy wrapping from the window end to
    // its start, then an overlapping copy
    let mut word: Vec<Token> = (10..20).map(Literal).collect();
    word.push(Copy { run: 30, source: 0 });
    word.push(Copy { run: 3, source: 0x3ff });
    word.push(Copy { run: 57, source: 40 });
    let wrapped = [
        Literal(7),
        Literal(8),
        Copy { run: 2, source: 0xff },
        Copy { run: 96, source: 0 },
    ];
    let mut columns = vec![(4, ayc_column(&word, true)), (1, ayc_column(&wrapped, false))];
    for reg in 2..REGISTERS {
        let tokens = [Literal(reg as u8), Copy { run: 99, source: 0 }];
        columns.push((1, ayc_column(&tokens, false)));
    }
    let data = ayc_file(100, &columns);

    let mut counter = ValueCounter::default();
    let (begin, end) = ayc::parse(&data, &mut counter).unwrap();
    assert_eq!((begin, end), (50, data.len()));
    assert_eq!(counter.counts, [100; REGISTERS]);

    let mut meta = ();
    let decoded = catalog::find("AYC")
        .unwrap()
        .try_decode(&data, &mut meta)
        .unwrap();
    let Content::Stream(model) = decoded.content else {
        panic!("stream expected");
    };
    assert_eq!(model.len(), 100);
    for (idx, frame) in model.frames.iter().enumerate() {
        let expected = if idx < 40 {
            10 + idx % 10
        } else {
            [0, 10, 11][(idx - 40) % 3]
        };
        assert_eq!(usize::from(frame.registers[0]), expected, "frame {idx}");
        assert_eq!(frame.registers[1], [7, 8, 0, 7][idx % 4], "frame {idx}");
        for reg in 2..REGISTERS {
            assert_eq!(usize::from(frame.registers[reg]), reg);
        }
    }
}

#[test]
fn ayc_truncated_column_rejected() {
    let mut data = ayc_stream(20);
    data.truncate(data.len() - 1);
    let mut meta = ();
    assert!(catalog::find("AYC")
        .unwrap()
        .try_decode(&data, &mut meta)
        .is_none());
}

#[test]
fn location_opens_packed_module() {
    let psg = b"PSG\x1a\0\0\0\0\0\0\0\0\0\0\0\0\xff\x00\x10\x07\x38\xff\x00\x20\xfd";
    let mut location = Location::new(hobeta(psg));
    let root = location.root();
    let mut meta = ();
    assert_eq!(
        catalog::detect(location.data(root), &mut meta).map(|(d, _)| d.id),
        Some("HOBETA")
    );

    let node = location.open_path(root, "HOBETA").unwrap();
    assert_eq!(location.data(node), &psg[..]);
    assert_eq!(location.path(node), "HOBETA");

    let mut meta = BasicMetadata::new();
    let (descriptor, decoded) = catalog::detect(location.data(node), &mut meta).unwrap();
    assert_eq!(descriptor.id, "PSG");
    let Content::Stream(model) = decoded.content else {
        panic!("stream expected");
    };
    assert_eq!(model.len(), 2);
    assert_eq!(model.frames[0].registers[0], 0x10);
    assert_eq!(model.frames[1].registers[0], 0x20);
    assert_eq!(model.frames[1].registers[7], 0x38);
}

#[test]
fn location_opens_zxzip_entry() {
    let psg = b"PSG\x1a\0\0\0\0\0\0\0\0\0\0\0\0\xff\x00\x10\xfe\x20\xfd";
    let mut archive = zxzip_entry(b"TUNE    ", b'C', psg);
    archive.extend(zxzip_entry(b"TUNE    ", b'C', &[0x55; 300]));
    let mut meta = ();
    let (descriptor, decoded) = catalog::detect(&archive, &mut meta).unwrap();
    assert_eq!(descriptor.id, "ZXZIP");
    assert_eq!(decoded.used_size, archive.len());

    let mut location = Location::new(archive);
    let root = location.root();
    let node = location.open_path(root, "TUNE.C").unwrap();
    assert_eq!(location.data(node), &psg[..]);
    let other = location.open_path(root, "TUNE.C~1").unwrap();
    assert_eq!(location.data(other), &[0x55; 300][..]);

    let (descriptor, decoded) = catalog::detect(location.data(node), &mut meta).unwrap();
    assert_eq!(descriptor.id, "PSG");
    let Content::Stream(model) = decoded.content else {
        panic!("stream expected");
    };
    assert_eq!(model.len(), 129);
}

#[test]
fn detect_rejects_noise() {
    let data: Vec<u8> = (0..4096u32).map(|v| (v * 7919 % 251) as u8).collect();
    let mut meta = ();
    assert!(catalog::detect(&data, &mut meta).is_none());
    assert!(catalog::detect(&[], &mut meta).is_none());
}
