//! Signal generators and helpers shared by the integration tests

use vocalis_core::domain::audio::to_float;
use vocalis_core::domain::{MicPipeline, PitchShifter};

/// Block size of the network capture path (10ms at 24kHz)
pub const NETWORK_BLOCK: usize = 240;

/// Sine of the given period in samples, starting at phase zero
pub fn generate_sine_wave(period: f32, len: usize, amplitude: f32) -> Vec<i16> {
    (0..len)
        .map(|n| (amplitude * (2.0 * std::f32::consts::PI * n as f32 / period).sin()) as i16)
        .collect()
}

/// Train of narrow Gaussian pulses, one every `period` samples
///
/// Unlike a sine this keeps energy in every harmonic, which is what a
/// glottal source looks like to the pitch shifter.
pub fn generate_pulse_train(period: usize, len: usize, amplitude: f32, sigma: f32) -> Vec<i16> {
    (0..len)
        .map(|n| {
            let phase = n % period;
            let distance = phase.min(period - phase) as f32;
            (amplitude * (-(distance * distance) / (2.0 * sigma * sigma)).exp()) as i16
        })
        .collect()
}

/// Zero-mean square wave at `level`, so DC removal leaves it alone
pub fn generate_hiss(level: i16, len: usize) -> Vec<i16> {
    (0..len)
        .map(|n| if n % 2 == 0 { level } else { -level })
        .collect()
}

/// Run `samples` through the pipeline in blocks, returning the processed copy
pub fn run_blocks(pipeline: &mut MicPipeline, samples: &[i16], block_size: usize) -> Vec<i16> {
    let mut output = samples.to_vec();
    for block in output.chunks_mut(block_size) {
        pipeline.process(block);
    }
    output
}

/// Period a fresh unity shifter reports for the last full macro-block of `samples`
pub fn measure_period(samples: &[i16]) -> usize {
    let mut shifter = PitchShifter::new();
    for &s in samples {
        shifter.process_sample(to_float(s));
    }
    shifter.period()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_train_peaks() {
        let pulses = generate_pulse_train(100, 300, 10000.0, 2.0);
        assert_eq!(pulses[0], 10000);
        assert_eq!(pulses[100], 10000);
        assert_eq!(pulses[50], 0);
        assert_eq!(pulses[99], pulses[1]);
    }

    #[test]
    fn test_hiss_is_zero_mean() {
        let hiss = generate_hiss(25, 240);
        assert_eq!(hiss.iter().map(|&s| s as i32).sum::<i32>(), 0);
    }

    #[test]
    fn test_measure_period_of_sine() {
        let sine = generate_sine_wave(120.0, 8 * 256, 12000.0);
        let period = measure_period(&sine) as i32;
        assert!((period - 120).abs() <= 1);
    }
}
