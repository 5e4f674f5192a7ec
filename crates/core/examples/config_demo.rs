//! Example demonstrating the configuration and voice preset system
//!
//! Run with: cargo run --package vocalis-core --example config_demo

use vocalis_core::domain::{GateMode, PresetManager, VocalisConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("vocalis_core=debug,info")
        .init();

    println!("=== Vocalis Configuration Demo ===\n");

    let work_dir = std::env::temp_dir().join("vocalis_config_demo");

    // 1. Create factory default configuration
    println!("1. Creating factory default configuration...");
    let config = VocalisConfig::factory_default();
    println!(
        "   Gate: {:?} ({}), shift: {}",
        config.gate.mode,
        if config.gate.enabled { "on" } else { "off" },
        config.pitch.shift
    );

    // 2. Save and reload
    println!("\n2. Saving configuration to file...");
    let config_path = work_dir.join("config.toml");
    config.save_to_file(&config_path).await?;
    let loaded = VocalisConfig::load_from_file(&config_path).await?;
    println!("   Round trip equal: {}", loaded == config);

    // 3. Voice presets
    println!("\n3. Saving voice presets...");
    let presets = PresetManager::new(work_dir.join("presets"));
    for (name, shift) in [("deep", 0.7), ("natural", 1.0), ("chipmunk", 1.8)] {
        let mut preset = VocalisConfig::factory_default();
        preset.pitch.shift = shift;
        preset.gate.mode = GateMode::Enforcing;
        presets.save_preset(name, &preset).await?;
    }
    println!("   Available: {:?}", presets.list_presets().await?);

    // 4. Build a pipeline from a preset and run some silence through it
    println!("\n4. Building pipeline from 'chipmunk'...");
    let preset = presets.load_preset("chipmunk").await?;
    let mut pipeline = preset.build_pipeline();
    let mut block = vec![0i16; preset.stream.block_size];
    for _ in 0..10 {
        pipeline.process(&mut block);
    }
    let snapshot = pipeline.snapshot();
    println!(
        "   shift {} | gate open: {} | latency {} samples",
        snapshot.pitch_shift, snapshot.gate.is_open, snapshot.latency
    );

    // 5. Cleanup
    presets.delete_preset("chipmunk").await?;
    tokio::fs::remove_dir_all(&work_dir).await?;
    println!("\n=== Demo complete ===");

    Ok(())
}
