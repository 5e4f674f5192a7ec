//! Vocalis CLI Application
//!
//! Runs the microphone pipeline offline over raw mono s16le PCM files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use vocalis_core::domain::audio::{decode_pcm16_le, encode_pcm16_le};
use vocalis_core::domain::{ConfigManager, GateMode, MicPipeline, VocalisConfig};

#[derive(Parser)]
#[command(name = "vocalis")]
#[command(about = "Microphone noise gate and pitch shifter", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a raw mono s16le PCM file
    Process {
        /// Input PCM file
        #[arg(short, long)]
        input: PathBuf,

        /// Output PCM file
        #[arg(short, long)]
        output: PathBuf,

        /// Config file (defaults to the user config, if any)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pitch shift factor (overrides config)
        #[arg(long)]
        shift: Option<f32>,

        /// Gate mode (overrides config)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Samples per block (overrides config)
        #[arg(long)]
        block_size: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the factory default config
    InitConfig {
        /// Destination (defaults to the user config path)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Advisory,
    Enforcing,
}

impl From<ModeArg> for GateMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Advisory => GateMode::Advisory,
            ModeArg::Enforcing => GateMode::Enforcing,
        }
    }
}

/// Summary of an offline processing run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
struct ProcessReport {
    samples: usize,
    blocks: usize,
    open_blocks: usize,
    clipped_blocks: usize,
    measured_floor: f32,
    period: usize,
    pitch_shift: f32,
    latency: f32,
}

/// Run the pipeline over `samples` in place, block by block
///
/// The final block may be short.
fn process_samples(
    pipeline: &mut MicPipeline,
    samples: &mut [i16],
    block_size: usize,
) -> ProcessReport {
    let mut report = ProcessReport {
        samples: samples.len(),
        ..ProcessReport::default()
    };

    for block in samples.chunks_mut(block_size) {
        pipeline.process(block);

        report.blocks += 1;
        if pipeline.is_open() {
            report.open_blocks += 1;
        }
        if pipeline.did_clip_in_last_frame() {
            report.clipped_blocks += 1;
        }
    }

    let snapshot = pipeline.snapshot();
    report.measured_floor = snapshot.gate.measured_floor;
    report.period = snapshot.period;
    report.pitch_shift = snapshot.pitch_shift;
    report.latency = snapshot.latency;
    report
}

async fn resolve_config(path: Option<&Path>) -> Result<VocalisConfig> {
    if let Some(path) = path {
        return VocalisConfig::load_from_file(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    match ConfigManager::default_config_dir() {
        Ok(dir) => {
            let manager = ConfigManager::new(dir);
            if manager.exists() {
                Ok(manager.load().await)
            } else {
                debug!("No user config, using factory default");
                Ok(VocalisConfig::factory_default())
            }
        }
        Err(_) => Ok(VocalisConfig::factory_default()),
    }
}

async fn run_process(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    shift: Option<f32>,
    mode: Option<ModeArg>,
    block_size: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut config = resolve_config(config).await?;
    if let Some(shift) = shift {
        config.pitch.shift = shift;
    }
    if let Some(mode) = mode {
        config.gate.mode = mode.into();
    }
    if let Some(block_size) = block_size {
        config.stream.block_size = block_size;
    }
    config.validate().context("invalid settings")?;

    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let mut samples = decode_pcm16_le(&bytes);
    info!(
        path = %input.display(),
        samples = samples.len(),
        block_size = config.stream.block_size,
        shift = config.pitch.shift,
        "Processing"
    );

    let mut pipeline = config.build_pipeline();
    let report = process_samples(&mut pipeline, &mut samples, config.stream.block_size);

    tokio::fs::write(output, encode_pcm16_le(&samples))
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            path = %output.display(),
            blocks = report.blocks,
            open_blocks = report.open_blocks,
            clipped_blocks = report.clipped_blocks,
            measured_floor = report.measured_floor,
            period = report.period,
            latency = report.latency,
            "Done"
        );
    }

    Ok(())
}

async fn run_init_config(path: Option<PathBuf>) -> Result<()> {
    let config = VocalisConfig::factory_default();

    match path {
        Some(path) => config
            .save_to_file(&path)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let manager = ConfigManager::new(ConfigManager::default_config_dir()?);
            manager.save(&config).await?;
            info!(path = %manager.config_path().display(), "Config written");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Process {
            input,
            output,
            config,
            shift,
            mode,
            block_size,
            json,
        } => {
            run_process(
                &input,
                &output,
                config.as_deref(),
                shift,
                mode,
                block_size,
                json,
            )
            .await
        }
        Command::InitConfig { path } => run_init_config(path).await,
    }
}
