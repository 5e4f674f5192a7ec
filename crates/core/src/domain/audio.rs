//! Sample format glue
//!
//! The microphone stream is fixed-rate mono signed 16-bit PCM. The pitch
//! shifter works on normalized floats, so every stage that crosses the
//! boundary goes through [`to_float`] / [`to_pcm`].

/// Largest representable sample magnitude, used for clip detection
pub const MAX_SAMPLE_VALUE: i16 = i16::MAX;

/// Most negative representable sample
pub const MIN_SAMPLE_VALUE: i16 = i16::MIN;

/// Scale between i16 samples and normalized floats
pub const SAMPLE_SCALE: f32 = 32768.0;

/// Convert a PCM sample to a float in [-1.0, 1.0)
#[inline]
pub fn to_float(sample: i16) -> f32 {
    sample as f32 * (1.0 / SAMPLE_SCALE)
}

/// Convert a normalized float back to PCM
///
/// The scaled value is hard-clamped to the i16 range and then truncated
/// toward zero.
#[inline]
pub fn to_pcm(value: f32) -> i16 {
    let x = (SAMPLE_SCALE * value).clamp(MIN_SAMPLE_VALUE as f32, MAX_SAMPLE_VALUE as f32);
    x as i16
}

/// Decode little-endian 16-bit PCM bytes
///
/// A trailing odd byte is ignored.
pub fn decode_pcm16_le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode samples as little-endian 16-bit PCM bytes
pub fn encode_pcm16_le(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
