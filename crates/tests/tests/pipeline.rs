//! Integration tests for the capture pipeline
//!
//! These tests drive `MicPipeline` the way the network capture path does:
//! fixed-size blocks of 16-bit PCM, DC removal and gating before the
//! pitch pass.

use proptest::prelude::*;
use vocalis_core::domain::dsp::params::{
    NOISE_GATE_CLOSE_FRAME_DELAY, NUMBER_OF_NOISE_SAMPLE_FRAMES, TMAX, TMIN,
};
use vocalis_core::domain::{
    Effect, GateMode, MicPipeline, NoiseGate, PitchShiftControl, PitchShifter, PresetManager,
    VocalisConfig,
};
use vocalis_tests::{
    generate_hiss, generate_pulse_train, generate_sine_wave, measure_period, run_blocks,
    NETWORK_BLOCK,
};

fn warm_up_floor(pipeline: &mut MicPipeline, level: i16) {
    let hiss = generate_hiss(level, NETWORK_BLOCK);
    for _ in 0..NUMBER_OF_NOISE_SAMPLE_FRAMES {
        pipeline.process(&mut hiss.clone());
    }
}

// ============================================================================
// GATE TESTS
// ============================================================================

#[test]
fn test_silence_reports_closed_gate() {
    let mut pipeline = MicPipeline::new();
    let output = run_blocks(&mut pipeline, &vec![0; 20 * NETWORK_BLOCK], NETWORK_BLOCK);

    assert!(output.iter().all(|&s| s == 0));
    assert_eq!(pipeline.last_loudness(), 0.0);
    assert!(!pipeline.did_clip_in_last_frame());
    assert!(!pipeline.is_open());
}

#[test]
fn test_full_scale_block_clips() {
    let mut pipeline = MicPipeline::new();
    pipeline.process(&mut generate_hiss(i16::MAX, NETWORK_BLOCK));
    assert!(pipeline.did_clip_in_last_frame());
    assert!(pipeline.is_open());
}

#[test]
fn test_floor_tracks_constant_loudness() {
    let mut pipeline = MicPipeline::new();
    warm_up_floor(&mut pipeline, 1000);
    assert_eq!(pipeline.measured_floor(), 1000.0);
}

#[test]
fn test_gate_hysteresis() {
    let mut pipeline = MicPipeline::new();
    warm_up_floor(&mut pipeline, 10);
    assert_eq!(pipeline.measured_floor(), 10.0);

    let hiss = generate_hiss(10, NETWORK_BLOCK);
    for _ in 0..2 * NOISE_GATE_CLOSE_FRAME_DELAY {
        pipeline.process(&mut hiss.clone());
    }
    assert!(!pipeline.is_open());

    // three full cycles per block, so the DC estimate stays put
    pipeline.process(&mut generate_sine_wave(80.0, NETWORK_BLOCK, 6000.0));
    assert!(pipeline.is_open());

    for _ in 0..NOISE_GATE_CLOSE_FRAME_DELAY - 1 {
        pipeline.process(&mut hiss.clone());
        assert!(pipeline.is_open());
    }
    pipeline.process(&mut hiss.clone());
    assert!(!pipeline.is_open());
}

#[test]
fn test_enforcing_gate_silences_output() {
    let config = VocalisConfig {
        gate: vocalis_core::domain::GateConfig {
            enabled: true,
            mode: GateMode::Enforcing,
        },
        ..VocalisConfig::default()
    };
    let mut pipeline = config.build_pipeline();
    warm_up_floor(&mut pipeline, 10);

    let hiss = generate_hiss(10, NETWORK_BLOCK);
    let mut last = Vec::new();
    for _ in 0..15 {
        last = hiss.clone();
        pipeline.process(&mut last);
    }

    assert!(!pipeline.is_open());
    assert_eq!(pipeline.last_loudness(), 0.0);
    assert!(last.iter().all(|&s| s == 0));
}

#[test]
fn test_dc_offset_converges_to_bias() {
    let mut pipeline = MicPipeline::new();
    pipeline.shifter_mut().set_bypass(true);

    let sine = generate_sine_wave(80.0, NETWORK_BLOCK, 3000.0);
    let biased = |bias: i16| sine.iter().map(|&s| s + bias).collect::<Vec<i16>>();

    for _ in 0..10 {
        pipeline.process(&mut biased(100));
    }
    let mut block = Vec::new();
    for _ in 0..600 {
        block = biased(500);
        pipeline.process(&mut block);
    }

    assert!((pipeline.gate().dc_offset() - 500.0).abs() < 2.0);
    let mean = block.iter().map(|&s| s as f32).sum::<f32>() / block.len() as f32;
    assert!(mean.abs() < 2.0, "residual DC {}", mean);
}

// ============================================================================
// PITCH TESTS
// ============================================================================

#[test]
fn test_period_estimate_through_pipeline() {
    for period in [48.0, 100.0, 200.0] {
        let mut pipeline = MicPipeline::new();
        run_blocks(
            &mut pipeline,
            &generate_sine_wave(period, 16 * TMAX, 10000.0),
            NETWORK_BLOCK,
        );
        let estimated = pipeline.shifter().period() as f32;
        assert!(
            (estimated - period).abs() <= 1.0,
            "period {} estimated as {}",
            period,
            estimated
        );
    }
}

#[test]
fn test_period_estimate_at_range_edges() {
    for period in [TMIN, TMIN + 1, TMAX - 1, TMAX] {
        let mut pipeline = MicPipeline::new();
        run_blocks(
            &mut pipeline,
            &generate_sine_wave(period as f32, 16 * TMAX, 10000.0),
            NETWORK_BLOCK,
        );
        let estimated = pipeline.shifter().period();
        assert!(
            estimated.abs_diff(period) <= 1,
            "period {} estimated as {}",
            period,
            estimated
        );
    }
}

#[test]
fn test_unity_shift_is_delayed_dc_corrected_input() {
    let input = generate_sine_wave(80.0, 60 * TMAX, 8000.0);

    let mut reference = input.clone();
    let mut dc = NoiseGate::default();
    for block in reference.chunks_mut(NETWORK_BLOCK) {
        dc.remove_dc_offset(block);
    }

    let mut pipeline = MicPipeline::new();
    let output = run_blocks(&mut pipeline, &input, NETWORK_BLOCK);

    let latency = pipeline.shifter().latency();
    assert_eq!(latency.fract(), 0.0);
    let latency = latency as usize;

    for n in 30 * TMAX..output.len() {
        let expected = reference[n - latency] as i32;
        assert!(
            (output[n] as i32 - expected).abs() <= 1,
            "sample {}: {} vs {}",
            n,
            output[n],
            expected
        );
    }
}

#[test]
fn test_octave_up_halves_period() {
    let input = generate_pulse_train(160, 40 * TMAX, 16000.0, 2.0);
    assert_eq!(measure_period(&input), 160);

    let mut pipeline = MicPipeline::new();
    pipeline.gate_mut().set_bypass(true);
    pipeline.set_pitch_shift(2.0);
    let output = run_blocks(&mut pipeline, &input, NETWORK_BLOCK);

    assert_eq!(pipeline.shifter().period(), 160);
    let measured = measure_period(&output[20 * TMAX..]) as i32;
    assert!((measured - 80).abs() <= 2, "re-measured period {}", measured);
}

#[test]
fn test_octave_down_doubles_period() {
    let input = generate_pulse_train(60, 40 * TMAX, 16000.0, 2.0);

    let mut pipeline = MicPipeline::new();
    pipeline.gate_mut().set_bypass(true);
    pipeline.set_pitch_shift(0.5);
    let output = run_blocks(&mut pipeline, &input, NETWORK_BLOCK);

    let measured = measure_period(&output[20 * TMAX..]) as i32;
    assert!((measured - 120).abs() <= 2, "re-measured period {}", measured);
}

#[test]
fn test_shift_from_another_thread() {
    let mut pipeline = MicPipeline::new();
    let control: PitchShiftControl = pipeline.pitch_control();

    std::thread::spawn(move || control.set(1.5))
        .join()
        .unwrap();

    pipeline.process(&mut vec![0; NETWORK_BLOCK]);
    assert_eq!(pipeline.shifter().pitch_shift(), 1.5);
}

#[test]
fn test_reset_restores_fresh_behavior() {
    let input = generate_sine_wave(80.0, 8 * TMAX, 8000.0);

    let mut used = MicPipeline::new();
    run_blocks(&mut used, &generate_pulse_train(100, 20 * TMAX, 9000.0, 3.0), NETWORK_BLOCK);
    used.reset();

    let mut fresh = MicPipeline::new();
    assert_eq!(
        run_blocks(&mut used, &input, NETWORK_BLOCK),
        run_blocks(&mut fresh, &input, NETWORK_BLOCK)
    );
}

// ============================================================================
// CONFIG TESTS
// ============================================================================

#[tokio::test]
async fn test_preset_drives_pipeline() {
    let dir = tempfile::TempDir::new().unwrap();
    let presets = PresetManager::new(dir.path().to_path_buf());

    let mut config = VocalisConfig::factory_default();
    config.pitch.shift = 2.0;
    config.gate.enabled = false;
    presets.save_preset("octave-up", &config).await.unwrap();

    let loaded = presets.load_preset("octave-up").await.unwrap();
    let mut pipeline = loaded.build_pipeline();
    let output = run_blocks(
        &mut pipeline,
        &generate_pulse_train(160, 40 * TMAX, 16000.0, 2.0),
        loaded.stream.block_size,
    );

    let measured = measure_period(&output[20 * TMAX..]) as i32;
    assert!((measured - 80).abs() <= 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_shifter_output_ignores_block_partition(
        block_size in 1usize..600,
        shift in 0.5f32..2.0,
    ) {
        let input = generate_pulse_train(90, 12 * TMAX, 12000.0, 2.5);

        let mut reference = PitchShifter::new();
        reference.set_pitch_shift(shift);
        let mut expected = input.clone();
        reference.process(&mut expected);

        let mut pipeline = MicPipeline::new();
        pipeline.gate_mut().set_bypass(true);
        pipeline.set_pitch_shift(shift);
        let output = run_blocks(&mut pipeline, &input, block_size);

        prop_assert_eq!(output, expected);
    }
}
