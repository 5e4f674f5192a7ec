//! Formant-preserving pitch shifter
//!
//! Every `TMAX` samples the shifter estimates the pitch period of the newest
//! macro-block with a YIN-style difference function, then resynthesizes the
//! signal by overlap-adding period-aligned, raised-cosine windowed grains at
//! a stride of `period * ratio`. Grains keep their spectral envelope, so the
//! formants stay put while the perceived pitch moves by `1 / ratio`.
//!
//! The shifter is a one-sample-in, one-sample-out stream with a fixed
//! pipeline delay (see [`PitchShifter::latency`]).

use super::fifo::SampleFifo;
use super::params::{FIFO_LEN, PITCH_SHIFT_MAX, PITCH_SHIFT_MIN, TMAX, TMIN, YIN_THRESHOLD};
use super::Effect;
use crate::domain::audio::{to_float, to_pcm};
use tracing::trace;

// ============================================================================
// PITCH TRACKER
// ============================================================================

/// Difference-function pitch tracker over lags `1..=TMAX`
#[derive(Debug, Clone)]
pub struct PitchTracker {
    /// Squared difference per lag, indexed by lag
    difference: Vec<f32>,
    /// Cumulative-mean normalized difference, indexed by lag
    normalized: Vec<f32>,
}

impl PitchTracker {
    pub fn new() -> Self {
        Self {
            difference: vec![0.0; TMAX + 1],
            normalized: vec![1.0; TMAX + 1],
        }
    }

    /// Start a new macro-block
    pub fn clear(&mut self) {
        self.difference.fill(0.0);
    }

    /// Accumulate one sample against its history
    ///
    /// `history[0]` must be `x_t` itself and `history[d]` the sample `d` steps back.
    #[inline]
    pub fn accumulate(&mut self, x_t: f32, history: &[f32]) {
        for (d, &x_t_d) in history.iter().enumerate().take(TMAX + 1).skip(1) {
            let coeff = x_t - x_t_d;
            self.difference[d] += coeff * coeff;
        }
    }

    /// Pick the period from the accumulated difference function
    ///
    /// The curve is normalized by the running sum from lag 1, so `TMIN` is a
    /// real candidate. Returns the first dip in `TMIN..=TMAX` under
    /// [`YIN_THRESHOLD`], otherwise the deepest dip found, otherwise `TMAX`.
    pub fn estimate(&mut self) -> usize {
        let mut cumulative = 0.0f32;
        for d in 1..=TMAX {
            cumulative += self.difference[d];
            self.normalized[d] = if cumulative > 0.0 {
                self.difference[d] * d as f32 / cumulative
            } else {
                1.0
            };
        }

        let dpt = &self.normalized;
        let mut alt_pitch = TMAX;

        let interior = (TMIN..TMAX).filter(|&c| dpt[c] < dpt[c - 1] && dpt[c + 1] > dpt[c]);
        let endpoint = (dpt[TMAX] < dpt[TMAX - 1]).then_some(TMAX);

        for candidate in interior.chain(endpoint) {
            if dpt[candidate] < YIN_THRESHOLD {
                return candidate;
            }
            if dpt[candidate] < dpt[alt_pitch] {
                alt_pitch = candidate;
            }
        }

        alt_pitch
    }

    /// Normalized difference at `lag`, valid for `TMIN..=TMAX` after [`estimate`](Self::estimate)
    pub fn normalized(&self, lag: usize) -> Option<f32> {
        (TMIN..=TMAX).contains(&lag).then(|| self.normalized[lag])
    }
}

impl Default for PitchTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PITCH SHIFTER
// ============================================================================

/// Streaming pitch shifter (one instance per audio stream)
#[derive(Debug, Clone)]
pub struct PitchShifter {
    bypass: bool,
    shift: f32,
    period_ratio: f32,
    // Histories
    input_history: SampleFifo,
    output_history: SampleFifo,
    // Staging for the current macro-block
    input_frames: Vec<f32>,
    output_frames: Vec<f32>,
    frame_index: usize,
    // Analysis / synthesis state
    tracker: PitchTracker,
    period: usize,
    window: Vec<f32>,
    input_ptr: i32,
    output_ptr: f32,
}

impl PitchShifter {
    /// Create a shifter at unity shift
    pub fn new() -> Self {
        Self {
            bypass: false,
            shift: 1.0,
            period_ratio: 1.0,
            input_history: SampleFifo::new(FIFO_LEN),
            output_history: SampleFifo::new(FIFO_LEN),
            input_frames: vec![0.0; TMAX],
            output_frames: vec![0.0; TMAX],
            frame_index: 0,
            tracker: PitchTracker::new(),
            period: TMAX,
            window: Vec::with_capacity(2 * TMAX),
            input_ptr: 0,
            output_ptr: 0.0,
        }
    }

    /// Set the pitch shift factor
    ///
    /// `1.0` leaves pitch unchanged, `2.0` raises it an octave. Non-positive
    /// or non-finite factors fall back to unity; others are clamped to
    /// [`PITCH_SHIFT_MIN`, `PITCH_SHIFT_MAX`].
    pub fn set_pitch_shift(&mut self, factor: f32) {
        let shift = if factor.is_finite() && factor > 0.0 {
            factor.clamp(PITCH_SHIFT_MIN, PITCH_SHIFT_MAX)
        } else {
            1.0
        };

        if shift != self.shift {
            trace!(requested = factor, shift, "Pitch shift updated");
        }
        self.shift = shift;
        self.period_ratio = 1.0 / shift;
    }

    /// Effective shift factor after clamping
    pub fn pitch_shift(&self) -> f32 {
        self.shift
    }

    /// Ratio between synthesis and analysis stride
    pub fn period_ratio(&self) -> f32 {
        self.period_ratio
    }

    /// Period estimated for the last completed macro-block, in samples
    pub fn period(&self) -> usize {
        self.period
    }

    /// The tracker of the last completed macro-block
    pub fn tracker(&self) -> &PitchTracker {
        &self.tracker
    }

    /// Current input-to-output delay in samples
    ///
    /// Constant while the shift is unity; with other shifts the grain
    /// placement drifts around this value.
    pub fn latency(&self) -> f32 {
        (TMAX + FIFO_LEN) as f32 - (self.input_ptr as f32 - self.output_ptr)
    }

    /// Process one normalized sample, returning one resynthesized sample
    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        self.input_frames[self.frame_index] = input;
        let sample = self.output_frames[self.frame_index];
        self.frame_index += 1;

        if self.frame_index == TMAX {
            self.frame_index = 0;
            self.process_macro_block();
        }

        sample
    }

    /// Estimate the period of the staged block and resynthesize it
    fn process_macro_block(&mut self) {
        self.tracker.clear();
        for &x_t in &self.input_frames {
            self.input_history.push(x_t);
            self.tracker.accumulate(x_t, self.input_history.window());
        }

        self.period = self.tracker.estimate().clamp(TMIN, TMAX);
        trace!(period = self.period, "Pitch period estimated");

        for out in self.output_frames.iter_mut() {
            *out = self.output_history.push(0.0);
        }

        self.build_window();
        self.overlap_add();

        self.input_ptr -= TMAX as i32;
        self.output_ptr -= TMAX as f32;
    }

    /// Raised-cosine window of `2 * period` samples centred on zero lag
    fn build_window(&mut self) {
        let period = self.period.max(1) as i32;
        self.window.clear();
        self.window.extend((-period..period).map(|n| {
            (1.0 + (n as f32 * std::f32::consts::PI / period as f32).cos()) / 2.0
        }));
    }

    /// Compress or expand the staged block into the output history
    ///
    /// Positions are block-relative sample times; time `t` lives at age
    /// `TMAX - 1 - t` in both histories.
    fn overlap_add(&mut self) {
        let tmax = TMAX as i32;
        let period = self.period as i32;
        let stride = self.period as f32 * self.period_ratio;
        let gain = self.period_ratio.min(1.0);

        while self.input_ptr < tmax - period {
            while self.output_ptr < self.input_ptr as f32 {
                let base = self.output_ptr.floor();
                let frac1 = self.output_ptr - base;
                let frac0 = 1.0 - frac1;

                let read_age = tmax - 1 - (self.input_ptr - period);
                let write_age = tmax - 1 - (base as i32 - period);

                for (j, &w) in self.window.iter().enumerate() {
                    let j = j as i32;
                    let x = usize::try_from(read_age - j)
                        .ok()
                        .and_then(|age| self.input_history.window().get(age).copied())
                        .unwrap_or(0.0)
                        * w
                        * gain;

                    if let Ok(age) = usize::try_from(write_age - j) {
                        self.output_history.accumulate(age, frac0 * x);
                    }
                    if let Ok(age) = usize::try_from(write_age - j - 1) {
                        self.output_history.accumulate(age, frac1 * x);
                    }
                }

                self.output_ptr += stride;
            }
            self.input_ptr += period;
        }
    }
}

impl Default for PitchShifter {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for PitchShifter {
    fn process(&mut self, buffer: &mut [i16]) {
        if self.bypass {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample = to_pcm(self.process_sample(to_float(*sample)));
        }
    }

    fn reset(&mut self) {
        let shift = self.shift;
        let bypass = self.bypass;
        *self = Self::new();
        self.set_pitch_shift(shift);
        self.bypass = bypass;
    }

    fn is_bypassed(&self) -> bool {
        self.bypass
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    fn name(&self) -> &str {
        "PitchShifter"
    }
}

// ============================================================================
// TESTS
// ============================================================================
