//! Vocalis core: the microphone processing chain applied before transmission.
//!
//! See [`domain::dsp`] for the DC-offset remover, noise gate and pitch shifter,
//! and [`domain::config`] for the TOML-backed settings that build a pipeline.

pub mod domain;
