//! Adaptive noise gate and DC-offset remover
//!
//! The gate measures the background loudness seen at the microphone and
//! opens when enough samples in a block rise well above that floor. It is
//! a classifier first: in [`GateMode::Advisory`] it only reports
//! open/closed, loudness and clipping, and never touches the audio.

use super::params::{
    CLIPPING_THRESHOLD, DC_OFFSET_AVERAGING, FRAMES_FOR_NOISE_DETECTION,
    NOISE_GATE_CLOSE_FRAME_DELAY, NOISE_GATE_FRAMES_TO_AVERAGE, NOISE_GATE_HEIGHT,
    NOISE_GATE_WIDTH, NUMBER_OF_NOISE_SAMPLE_FRAMES,
};
use super::Effect;
use crate::domain::audio::MAX_SAMPLE_VALUE;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the gate does to the audio while closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    /// Report only; samples pass through untouched
    #[default]
    Advisory,
    /// Zero the block and report zero loudness while closed
    Enforcing,
}

/// Gate metrics exposed to the rest of the client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateSnapshot {
    pub is_open: bool,
    pub last_loudness: f32,
    pub did_clip: bool,
    pub measured_floor: f32,
    pub quietest_frame: f32,
    pub loudest_frame: f32,
}

/// Noise gate with adaptive floor and close hysteresis
#[derive(Debug, Clone)]
pub struct NoiseGate {
    bypass: bool,
    mode: GateMode,
    // DC removal
    dc_offset: f32,
    // Floor estimation
    measured_floor: f32,
    sample_frames: Vec<f32>,
    sample_counter: usize,
    // Rolling extrema
    input_frame_counter: u32,
    quietest_frame: f32,
    loudest_frame: f32,
    // Per-block outputs
    last_loudness: f32,
    did_clip_in_last_frame: bool,
    // Hysteresis
    is_open: bool,
    frames_to_close: u32,
}

impl NoiseGate {
    /// Create a closed gate with no floor measured yet
    pub fn new(mode: GateMode) -> Self {
        Self {
            bypass: false,
            mode,
            dc_offset: 0.0,
            measured_floor: 0.0,
            sample_frames: vec![0.0; NUMBER_OF_NOISE_SAMPLE_FRAMES],
            sample_counter: 0,
            input_frame_counter: 0,
            quietest_frame: f32::MAX,
            loudest_frame: 0.0,
            last_loudness: 0.0,
            did_clip_in_last_frame: false,
            is_open: false,
            frames_to_close: 0,
        }
    }

    /// Remove the trailing DC offset from a block, in place
    ///
    /// The previously measured offset is subtracted from every sample, then
    /// the estimate is blended toward this block's mean. The first non-zero
    /// measurement is copied over directly.
    pub fn remove_dc_offset(&mut self, samples: &mut [i16]) {
        if samples.is_empty() {
            return;
        }

        let bias = self.dc_offset as i16;
        let mut measured = 0.0f32;
        for sample in samples.iter_mut() {
            measured += *sample as f32;
            *sample = sample.saturating_sub(bias);
        }
        measured /= samples.len() as f32;

        if self.dc_offset == 0.0 {
            self.dc_offset = measured;
        } else {
            self.dc_offset =
                DC_OFFSET_AVERAGING * self.dc_offset + (1.0 - DC_OFFSET_AVERAGING) * measured;
        }
    }

    /// Update loudness, clipping, floor and open/closed state from a block
    ///
    /// Samples are only modified in [`GateMode::Enforcing`] while closed.
    pub fn gate_samples(&mut self, samples: &mut [i16]) {
        if samples.is_empty() {
            return;
        }

        let clip_level = MAX_SAMPLE_VALUE as f32 * CLIPPING_THRESHOLD;
        let gate_level = self.measured_floor * NOISE_GATE_HEIGHT;

        self.did_clip_in_last_frame = false;
        let mut loudness = 0.0f32;
        let mut samples_over_gate = 0usize;

        for &sample in samples.iter() {
            let magnitude = (sample as i32).abs() as f32;
            if magnitude >= clip_level {
                self.did_clip_in_last_frame = true;
            }
            loudness += magnitude;
            if magnitude > gate_level {
                samples_over_gate += 1;
            }
        }

        self.last_loudness = (loudness / samples.len() as f32).abs();
        self.track_extrema();
        self.track_floor();

        if samples_over_gate > NOISE_GATE_WIDTH {
            self.is_open = true;
            self.frames_to_close = NOISE_GATE_CLOSE_FRAME_DELAY;
        } else if self.frames_to_close > 0 {
            self.frames_to_close -= 1;
            if self.frames_to_close == 0 {
                self.is_open = false;
            }
        }

        if self.mode == GateMode::Enforcing && !self.is_open {
            samples.fill(0);
            self.last_loudness = 0.0;
        }
    }

    fn track_extrema(&mut self) {
        self.quietest_frame = self.quietest_frame.min(self.last_loudness);
        self.loudest_frame = self.loudest_frame.max(self.last_loudness);

        let elapsed = self.input_frame_counter;
        self.input_frame_counter += 1;
        if elapsed > FRAMES_FOR_NOISE_DETECTION {
            debug!(
                quietest = self.quietest_frame,
                loudest = self.loudest_frame,
                "Resetting loudness extrema"
            );
            self.quietest_frame = f32::MAX;
            self.loudest_frame = 0.0;
            self.input_frame_counter = 0;
        }
    }

    fn track_floor(&mut self) {
        self.sample_frames[self.sample_counter] = self.last_loudness;
        self.sample_counter += 1;

        if self.sample_counter == NUMBER_OF_NOISE_SAMPLE_FRAMES {
            // The quietest run of frames wins, so short loud transients
            // cannot drag the floor up.
            let floor = self
                .sample_frames
                .chunks_exact(NOISE_GATE_FRAMES_TO_AVERAGE)
                .map(|group| group.iter().sum::<f32>() / NOISE_GATE_FRAMES_TO_AVERAGE as f32)
                .fold(f32::MAX, f32::min);
            let average =
                self.sample_frames.iter().sum::<f32>() / NUMBER_OF_NOISE_SAMPLE_FRAMES as f32;

            debug!(floor, average, previous = self.measured_floor, "Noise floor updated");
            self.measured_floor = floor;
            self.sample_counter = 0;
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Mean absolute sample magnitude of the last block
    pub fn last_loudness(&self) -> f32 {
        self.last_loudness
    }

    pub fn did_clip_in_last_frame(&self) -> bool {
        self.did_clip_in_last_frame
    }

    pub fn measured_floor(&self) -> f32 {
        self.measured_floor
    }

    /// Quietest block loudness in the current detection window
    pub fn quietest_frame(&self) -> f32 {
        self.quietest_frame
    }

    /// Loudest block loudness in the current detection window
    pub fn loudest_frame(&self) -> f32 {
        self.loudest_frame
    }

    pub fn dc_offset(&self) -> f32 {
        self.dc_offset
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: GateMode) {
        self.mode = mode;
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            is_open: self.is_open,
            last_loudness: self.last_loudness,
            did_clip: self.did_clip_in_last_frame,
            measured_floor: self.measured_floor,
            quietest_frame: self.quietest_frame,
            loudest_frame: self.loudest_frame,
        }
    }
}

impl Default for NoiseGate {
    fn default() -> Self {
        Self::new(GateMode::default())
    }
}

impl Effect for NoiseGate {
    fn process(&mut self, buffer: &mut [i16]) {
        if self.bypass {
            return;
        }
        self.remove_dc_offset(buffer);
        self.gate_samples(buffer);
    }

    fn reset(&mut self) {
        *self = Self {
            bypass: self.bypass,
            ..Self::new(self.mode)
        };
    }

    fn is_bypassed(&self) -> bool {
        self.bypass
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    fn name(&self) -> &str {
        "NoiseGate"
    }
}
