//! Digital Signal Processing for the microphone path
//!
//! This module provides the capture-side stages:
//! - DC-offset removal
//! - Adaptive noise gate (loudness, clipping and open/closed detection)
//! - Formant-preserving pitch shifter (difference-function tracker + PSOLA)
//!
//! All stages work in place on blocks of mono 16-bit PCM and never
//! allocate in the hot path.

pub mod fifo;
pub mod noise_gate;
pub mod pitch;

pub use fifo::SampleFifo;
pub use noise_gate::{GateMode, GateSnapshot, NoiseGate};
pub use pitch::{PitchShifter, PitchTracker};

use atomic_float::AtomicF32;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::trace;

/// Core trait for the capture stages
///
/// Stages process blocks of PCM samples in place. Processing has no
/// failure modes; numeric edge cases are clamped instead.
pub trait Effect: Send {
    /// Process a block of samples in place
    ///
    /// Blocks may have any length, including zero.
    fn process(&mut self, buffer: &mut [i16]);

    /// Reset stage state to initial conditions
    fn reset(&mut self);

    /// Check if the stage is bypassed
    fn is_bypassed(&self) -> bool;

    /// Toggle bypass state
    fn set_bypass(&mut self, bypass: bool);

    /// Get stage name for debugging/display
    fn name(&self) -> &str;
}

/// Behavioral constants
///
/// These are part of the processing contract and are not configurable.
pub mod params {
    /// Fraction of full scale at which a sample counts as clipped
    pub const CLIPPING_THRESHOLD: f32 = 0.90;

    /// Gate opens on samples louder than this multiple of the floor
    pub const NOISE_GATE_HEIGHT: f32 = 7.0;
    /// Samples over the gate level needed (strictly more than) to open
    pub const NOISE_GATE_WIDTH: usize = 5;
    /// Quiet blocks before an open gate closes
    pub const NOISE_GATE_CLOSE_FRAME_DELAY: u32 = 5;
    /// Group size when averaging blocks for the floor
    pub const NOISE_GATE_FRAMES_TO_AVERAGE: usize = 5;
    /// Blocks per floor recomputation
    pub const NUMBER_OF_NOISE_SAMPLE_FRAMES: usize = 300;
    /// Blocks between resets of the quietest/loudest trackers
    pub const FRAMES_FOR_NOISE_DETECTION: u32 = 400;

    /// Smoothing factor for the running DC estimate
    pub const DC_OFFSET_AVERAGING: f32 = 0.99;

    /// Shortest detectable pitch period, in samples
    pub const TMIN: usize = 32;
    /// Longest detectable pitch period and macro-block length, in samples
    pub const TMAX: usize = 256;
    /// Normalized difference below which a lag is accepted as the period
    pub const YIN_THRESHOLD: f32 = 0.1;
    /// Length of the pitch shifter's history rings
    pub const FIFO_LEN: usize = 3 * TMAX;

    /// Smallest accepted pitch shift factor (two octaves down)
    pub const PITCH_SHIFT_MIN: f32 = 0.25;
    /// Largest accepted pitch shift factor (two octaves up)
    pub const PITCH_SHIFT_MAX: f32 = 4.0;
}

// ============================================================================
// PITCH SHIFT CONTROL
// ============================================================================

/// Shared handle to the requested pitch shift factor
///
/// Any thread may `set` the factor; the audio thread reads it once per
/// block. Values are validated by the shifter when applied.
#[derive(Debug, Clone)]
pub struct PitchShiftControl {
    shift: Arc<AtomicF32>,
}

impl PitchShiftControl {
    pub fn new(shift: f32) -> Self {
        Self {
            shift: Arc::new(AtomicF32::new(shift)),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.shift.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, shift: f32) {
        self.shift.store(shift, Ordering::Relaxed);
    }
}

impl Default for PitchShiftControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

// ============================================================================
// MIC PIPELINE
// ============================================================================

/// Metrics for one processed block
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub gate: GateSnapshot,
    pub pitch_shift: f32,
    pub period: usize,
    pub latency: f32,
}

/// DC removal, noise gate and pitch shifter for one capture stream
///
/// Bypassed stages are skipped.
#[derive(Debug, Clone)]
pub struct MicPipeline {
    gate: NoiseGate,
    shifter: PitchShifter,
    control: PitchShiftControl,
}

impl MicPipeline {
    /// Create a pipeline with an advisory gate and unity shift
    pub fn new() -> Self {
        Self::from_parts(NoiseGate::default(), PitchShifter::new(), PitchShiftControl::default())
    }

    /// Assemble a pipeline from preconfigured stages
    ///
    /// The control's current value wins over the shifter's on the next block.
    pub fn from_parts(gate: NoiseGate, shifter: PitchShifter, control: PitchShiftControl) -> Self {
        Self {
            gate,
            shifter,
            control,
        }
    }

    /// Subtract the running DC estimate from a block
    pub fn remove_dc_offset(&mut self, samples: &mut [i16]) {
        if !self.gate.is_bypassed() {
            self.gate.remove_dc_offset(samples);
        }
    }

    /// Gate bookkeeping followed by the pitch pass
    pub fn gate_samples(&mut self, samples: &mut [i16]) {
        if !self.gate.is_bypassed() {
            self.gate.gate_samples(samples);
        }

        let requested = self.control.get();
        if requested != self.shifter.pitch_shift() {
            trace!(requested, "Applying pitch shift from control");
            self.shifter.set_pitch_shift(requested);
        }
        self.shifter.process(samples);
    }

    /// Run the full capture chain on one block
    pub fn process(&mut self, samples: &mut [i16]) {
        self.remove_dc_offset(samples);
        self.gate_samples(samples);
    }

    /// Request a new shift factor, applied on the next block
    pub fn set_pitch_shift(&mut self, shift: f32) {
        self.control.set(shift);
    }

    /// A handle other threads can use to steer the shift
    pub fn pitch_control(&self) -> PitchShiftControl {
        self.control.clone()
    }

    pub fn is_open(&self) -> bool {
        self.gate.is_open()
    }

    pub fn last_loudness(&self) -> f32 {
        self.gate.last_loudness()
    }

    pub fn did_clip_in_last_frame(&self) -> bool {
        self.gate.did_clip_in_last_frame()
    }

    pub fn measured_floor(&self) -> f32 {
        self.gate.measured_floor()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            gate: self.gate.snapshot(),
            pitch_shift: self.shifter.pitch_shift(),
            period: self.shifter.period(),
            latency: self.shifter.latency(),
        }
    }

    pub fn gate(&self) -> &NoiseGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut NoiseGate {
        &mut self.gate
    }

    pub fn shifter(&self) -> &PitchShifter {
        &self.shifter
    }

    pub fn shifter_mut(&mut self) -> &mut PitchShifter {
        &mut self.shifter
    }

    /// Reset both stages; the requested shift is kept
    pub fn reset(&mut self) {
        self.gate.reset();
        self.shifter.reset();
    }
}

impl Default for MicPipeline {
    fn default() -> Self {
        Self::new()
    }
}
