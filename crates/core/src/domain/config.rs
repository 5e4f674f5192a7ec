//! Configuration management for Vocalis
//!
//! This module provides:
//! - Configuration structs for the capture stream, noise gate and pitch shifter
//! - Voice preset system with TOML serialization
//! - A manager for the main config file with corrupt-file recovery
//!
//! The behavioral constants in [`crate::domain::dsp::params`] are not
//! configurable; only the stage switches and user-facing knobs are.

use crate::domain::dsp::params::{PITCH_SHIFT_MAX, PITCH_SHIFT_MIN};
use crate::domain::dsp::{
    Effect, GateMode, MicPipeline, NoiseGate, PitchShiftControl, PitchShifter,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// Largest block the pipeline accepts from a config file
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Capture stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Sample rate in Hz (informational; processing is rate-agnostic)
    pub sample_rate: u32,

    /// Samples per processed block
    pub block_size: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            block_size: 240,
        }
    }
}

/// Noise gate settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub enabled: bool,
    pub mode: GateMode,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: GateMode::Advisory,
        }
    }
}

/// Pitch shifter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub enabled: bool,

    /// Shift factor (1.0 = unchanged, 2.0 = one octave up)
    pub shift: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shift: 1.0,
        }
    }
}

/// Complete Vocalis configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VocalisConfig {
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub pitch: PitchConfig,
}

impl VocalisConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Create factory default configuration
    pub fn factory_default() -> Self {
        Self::default()
    }

    /// Check user-facing values
    pub fn validate(&self) -> Result<()> {
        if self.stream.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be non-zero".to_string()));
        }

        if self.stream.block_size == 0 || self.stream.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "block_size must be in 1..={}, got {}",
                MAX_BLOCK_SIZE, self.stream.block_size
            )));
        }

        let shift = self.pitch.shift;
        if !shift.is_finite() || !(PITCH_SHIFT_MIN..=PITCH_SHIFT_MAX).contains(&shift) {
            return Err(ConfigError::Invalid(format!(
                "pitch shift must be in {}..={}, got {}",
                PITCH_SHIFT_MIN, PITCH_SHIFT_MAX, shift
            )));
        }

        Ok(())
    }

    /// Build a pipeline with the configured stages
    ///
    /// Disabled stages are bypassed rather than removed.
    pub fn build_pipeline(&self) -> MicPipeline {
        let mut gate = NoiseGate::new(self.gate.mode);
        gate.set_bypass(!self.gate.enabled);

        let mut shifter = PitchShifter::new();
        shifter.set_pitch_shift(self.pitch.shift);
        shifter.set_bypass(!self.pitch.enabled);

        MicPipeline::from_parts(gate, shifter, PitchShiftControl::new(self.pitch.shift))
    }
}

/// Voice preset manager
///
/// Presets are complete configs stored as `<name>.toml` in one directory.
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    /// Create a new preset manager
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    fn preset_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ConfigError::Invalid(format!("invalid preset name: {:?}", name)));
        }
        Ok(self.preset_dir.join(format!("{}.toml", name)))
    }

    /// List all available presets
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "toml").unwrap_or(false) {
                if let Some(name_str) = path.file_stem().and_then(|n| n.to_str()) {
                    presets.push(name_str.to_string());
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    /// Load a preset by name
    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<VocalisConfig> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        VocalisConfig::load_from_file(&path).await
    }

    /// Save a preset by name
    #[instrument(skip(self, config))]
    pub async fn save_preset(&self, name: &str, config: &VocalisConfig) -> Result<()> {
        config.validate()?;
        let path = self.preset_path(name)?;
        config.save_to_file(&path).await
    }

    /// Delete a preset by name
    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    /// Check if a preset exists
    pub async fn preset_exists(&self, name: &str) -> bool {
        self.preset_path(name).map(|p| p.exists()).unwrap_or(false)
    }
}

/// Configuration manager for the main Vocalis config
///
/// Manages the main configuration file at `~/.config/vocalis/config.toml`.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager rooted at `config_dir`
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");

        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/vocalis` on Linux, the platform equivalent elsewhere.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("vocalis"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    /// Get the config file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Directory voice presets live in
    pub fn preset_dir(&self) -> PathBuf {
        self.config_dir.join("presets")
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, writes and returns factory default.
    /// If the config file is corrupt, backs it up and returns factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> VocalisConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = VocalisConfig::factory_default();

            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }

            return config;
        }

        match VocalisConfig::load_from_file(&self.config_path).await {
            Ok(config) => {
                info!(
                    path = %self.config_path.display(),
                    "Configuration loaded successfully"
                );
                config
            }
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                VocalisConfig::factory_default()
            }
        }
    }

    /// Save configuration to file
    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &VocalisConfig) -> Result<()> {
        config.validate()?;
        fs::create_dir_all(&self.config_dir).await?;

        config.save_to_file(&self.config_path).await
    }

    /// Clear configuration (delete config file)
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.config_path.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(
                path = %self.config_path.display(),
                "Configuration cleared"
            );
        }

        Ok(())
    }

    /// Check if config file exists
    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
