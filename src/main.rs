//! Drive a virtual gamepad or keyboard with your body, seen through a webcam.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use pose_drive::{
    app::PoseDriveApp,
    config::{AppConfig, SinkKind, EXAMPLE_CONFIG},
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Camera index to use
    #[arg(long)]
    cam: Option<i32>,

    /// Directory holding preset JSON files
    #[arg(long)]
    presets: Option<PathBuf>,

    /// Preset to apply at startup
    #[arg(short, long)]
    preset: Option<String>,

    /// Where control output goes
    #[arg(short, long, value_enum)]
    sink: Option<SinkKind>,

    /// Pose landmark ONNX model
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Run without the overlay window
    #[arg(long)]
    headless: bool,

    /// Show the live parameter trackbars
    #[arg(short, long)]
    tuning: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Write an example configuration file and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

impl Args {
    /// Command line flags take precedence over the file
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(cam) = self.cam {
            config.camera.index = cam;
        }
        if let Some(dir) = &self.presets {
            config.preferences.presets_dir.clone_from(dir);
        }
        if let Some(preset) = &self.preset {
            config.preferences.default_preset.clone_from(preset);
        }
        if let Some(sink) = self.sink {
            config.input.sink = sink;
        }
        if let Some(model) = &self.model {
            config.detector.model_path.clone_from(model);
        }
        if self.headless {
            config.window.enabled = false;
        }
        if self.tuning {
            config.tuning.enabled = true;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if let Some(path) = &args.write_default_config {
        std::fs::write(path, EXAMPLE_CONFIG)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    info!("pose-drive {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            AppConfig::from_file(path).unwrap_or_else(|e| {
                warn!("Failed to load config file: {e}. Using defaults.");
                AppConfig::default()
            })
        }
        None => AppConfig::default(),
    };
    args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;

    let mut app = PoseDriveApp::new(config)?;
    let result = app.run();
    app.shutdown();
    result?;

    Ok(())
}
