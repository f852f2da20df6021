use aym::tables::{AY_VOLUME_TABLE, YM_VOLUME_TABLE};
use aym::{
    AymConfig, AymDevice, Chip, ChipType, DataChunk, DutyCycleMask, MultiSample, Register,
    SharedParameters, AYM_CLOCK_DIVISOR,
};

/// One output sample per generator step
fn per_step_config() -> AymConfig {
    AymConfig {
        clock_freq: 800_000,
        sound_freq: 100_000,
        ..Default::default()
    }
}

fn tone_a_chunk(tick: u64, period: u16) -> DataChunk {
    let mut chunk = DataChunk::new(tick);
    chunk.set(Register::Mixer, 0x3e);
    chunk.set(Register::VolumeA, 15);
    chunk.set(Register::ToneALo, (period & 0xff) as u8);
    chunk.set(Register::ToneAHi, (period >> 8) as u8);
    chunk
}

fn edges(samples: &[MultiSample]) -> (usize, usize) {
    let mut rises = 0;
    let mut falls = 0;
    for pair in samples.windows(2) {
        if pair[1][0] > pair[0][0] {
            rises += 1;
        } else if pair[1][0] < pair[0][0] {
            falls += 1;
        }
    }
    (rises, falls)
}

#[test]
fn period_256_gives_single_cycle() {
    let mut chip = Chip::new(per_step_config(), Vec::<MultiSample>::new());
    chip.render_data(&tone_a_chunk(2 * 256 * AYM_CLOCK_DIVISOR, 0x100));

    let samples = chip.receiver();
    assert_eq!(samples.len(), 512);
    assert_eq!(samples[0][0], 0);
    assert_eq!(edges(samples), (1, 1));
    assert_eq!(samples[300][0], AY_VOLUME_TABLE[31]);
    assert_eq!(samples[511][0], 0);
}

#[test]
fn duty_cycle_changes_pulse_width() {
    let config = AymConfig {
        duty_cycle: 25,
        duty_cycle_mask: DutyCycleMask::A,
        ..per_step_config()
    };
    let mut chip = Chip::new(config, Vec::<MultiSample>::new());
    chip.render_data(&tone_a_chunk(2 * 100 * AYM_CLOCK_DIVISOR, 100));
    let high = chip
        .receiver()
        .iter()
        .filter(|s| s[0] == AY_VOLUME_TABLE[31])
        .count();
    assert_eq!(high, 150);
}

#[test]
fn live_parameter_change_applies_on_next_chunk() {
    let shared = SharedParameters::new(AymConfig {
        chip_type: ChipType::Ay,
        ..per_step_config()
    });
    let mut chip = Chip::new(shared.clone(), Vec::<MultiSample>::new());
    let mut chunk = DataChunk::new(80);
    chunk.set(Register::VolumeA, 7);
    chip.render_data(&chunk);
    assert_eq!(chip.receiver().last().unwrap()[0], AY_VOLUME_TABLE[15]);

    shared.update(|c| c.chip_type = ChipType::Ym);
    chip.render_data(&DataChunk::new(160));
    assert_eq!(chip.receiver().last().unwrap()[0], YM_VOLUME_TABLE[15]);
    assert_eq!(chip.receiver().len(), 20);
}

#[test]
fn reset_restores_power_on_state() {
    let mut chip = Chip::new(per_step_config(), Vec::<MultiSample>::new());
    chip.render_data(&tone_a_chunk(800, 10));
    assert_eq!(chip.dump_registers()[Register::VolumeA as usize], 15);

    AymDevice::reset(&mut chip);
    assert_eq!(chip.current_tick(), 0);
    let regs = chip.dump_registers();
    assert_eq!(regs[Register::VolumeA as usize], 0);
    assert_eq!(regs[Register::Mixer as usize], 0xff);
}

#[test]
fn interpolation_keeps_sample_count() {
    let config = AymConfig {
        interpolate: true,
        ..AymConfig::default()
    };
    let frame = config.clocks_per_frame();
    let mut chip = Chip::new(config, Vec::<MultiSample>::new());
    chip.render_data(&tone_a_chunk(frame, 1));
    assert_eq!(chip.receiver().len(), 882);
    // period 1 toggles every step, averaged output sits halfway
    let mid = chip.receiver()[500][0];
    assert!(mid > AY_VOLUME_TABLE[31] / 3 && mid < AY_VOLUME_TABLE[31] / 3 * 2);
}
