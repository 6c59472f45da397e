//! Configuration management for the pose-drive application

use crate::{
    constants::{DEFAULT_FPS, DEFAULT_PRESET_NAME},
    keyboard::KeyBindings,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera capture settings
    pub camera: CameraConfig,

    /// Overlay window settings
    pub window: WindowConfig,

    /// Preset storage
    pub preferences: PreferencesConfig,

    /// Pose landmark model
    pub detector: DetectorConfig,

    /// Where control output goes
    pub input: InputConfig,

    /// Live parameter panel
    pub tuning: TuningConfig,
}

/// Camera capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Video device index
    pub index: i32,

    /// Requested frame width
    pub width: u32,

    /// Requested frame height
    pub height: u32,

    /// Target frame rate of the loop
    pub fps: u32,

    /// Mirror the displayed frame
    pub mirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: DEFAULT_FPS,
            mirror: true,
        }
    }
}

/// Overlay window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Show the overlay window; headless when false
    pub enabled: bool,

    /// Window title
    pub caption: String,

    /// Append the smoothed FPS to the title
    pub show_caption_fps: bool,

    /// Frames averaged per FPS refresh
    pub smooth_fps_accum_frames: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            caption: "pose-drive".to_string(),
            show_caption_fps: true,
            smooth_fps_accum_frames: 10,
        }
    }
}

/// Preset storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// Directory scanned for `*.json` presets
    pub presets_dir: PathBuf,

    /// Preset applied after loading
    pub default_preset: String,

    /// Write the live parameters back into the active preset on exit
    pub save_preset_on_close: bool,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            presets_dir: PathBuf::from("Presets"),
            default_preset: DEFAULT_PRESET_NAME.to_string(),
            save_preset_on_close: false,
        }
    }
}

/// Pose landmark model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Path to the `ONNX` landmark model
    pub model_path: PathBuf,

    /// Minimum pose presence score (0.0-1.0)
    pub min_detection_confidence: f32,

    /// Frames whose mean upper-body visibility falls below this count as no detection
    pub min_visibility: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/pose_landmark.onnx"),
            min_detection_confidence: 0.5,
            min_visibility: 0.0,
        }
    }
}

/// Kind of input sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Virtual gamepad through uinput
    #[default]
    Gamepad,
    /// Held keys through X11 XTest
    Keyboard,
    /// Discard all output
    None,
}

/// Where control output goes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Sink kind
    pub sink: SinkKind,

    /// Keys used by the keyboard sink
    pub keys: KeyBindings,

    /// Stick deflection that holds a steering key
    pub axis_threshold: f64,

    /// Trigger pressure that holds throttle or brake
    pub trigger_threshold: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            keys: KeyBindings::default(),
            axis_threshold: 0.3,
            trigger_threshold: 0.3,
        }
    }
}

/// Live parameter panel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Show the trackbar window
    pub enabled: bool,
}

impl AppConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.camera.fps == 0 {
            return Err(Error::ConfigError("Camera FPS must be greater than 0".to_string()));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigError("Camera resolution must be non-zero".to_string()));
        }
        if self.window.smooth_fps_accum_frames == 0 {
            return Err(Error::ConfigError(
                "smooth_fps_accum_frames must be greater than 0".to_string(),
            ));
        }
        if self.preferences.default_preset.trim().is_empty() {
            return Err(Error::ConfigError("Default preset name must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.detector.min_detection_confidence) {
            return Err(Error::ConfigError(
                "Detection confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.min_visibility) {
            return Err(Error::ConfigError("Minimum visibility must be between 0.0 and 1.0".to_string()));
        }
        if !(0.0..1.0).contains(&self.input.axis_threshold) {
            return Err(Error::ConfigError("Axis threshold must be in [0.0, 1.0)".to_string()));
        }
        if !(0.0..1.0).contains(&self.input.trigger_threshold) {
            return Err(Error::ConfigError("Trigger threshold must be in [0.0, 1.0)".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# pose-drive configuration

camera:
  index: 0
  width: 640
  height: 480
  fps: 30
  mirror: true

window:
  enabled: true
  caption: "pose-drive"
  show_caption_fps: true
  smooth_fps_accum_frames: 10

preferences:
  presets_dir: "Presets"
  default_preset: "default"
  save_preset_on_close: false

detector:
  model_path: "assets/pose_landmark.onnx"
  min_detection_confidence: 0.5
  min_visibility: 0.0

# sink: gamepad | keyboard | none
input:
  sink: gamepad
  axis_threshold: 0.3
  trigger_threshold: 0.3
  keys:
    steer_left: "a"
    steer_right: "d"
    throttle: "w"
    brake: "s"
    buttons:
      a: "return"
      y: "space"
      start: "escape"

tuning:
  enabled: false
"#;
