//! Domain entities and processing rules

pub mod audio;
pub mod dsp;
pub mod config;

pub use audio::{to_float, to_pcm, MAX_SAMPLE_VALUE, MIN_SAMPLE_VALUE, SAMPLE_SCALE};
pub use config::*;
pub use dsp::*;
