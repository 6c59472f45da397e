//! Gesture-controlled game input from body-pose landmarks.
//!
//! This library turns webcam frames into virtual controller input using:
//! - ONNX Runtime for body landmark inference
//! - `OpenCV` for capture, overlays and the live tuning window
//! - `evdev` uinput or X11 `XTest` for the emitted input
//!
//! The pipeline for each frame is:
//! 1. Landmark detection finds 33 body keypoints
//! 2. The mapper derives steering, throttle, brake and button conditions
//! 3. Edge-triggered controls are dispatched to an input sink
//! 4. The overlay shows what was recognised
//!
//! Thresholds live in a shared [`params::ParamStore`] and are swapped as a
//! whole when the [`presets::PresetManager`] applies a preset.
//!
//! # Examples
//!
//! ## Mapping one pose
//!
//! ```
//! use pose_drive::{
//!     input_sink::NullSink,
//!     landmarks::{Landmark, PoseLandmarks},
//!     mapping::PoseControlMapper,
//!     params::ParamStore,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut mapper = PoseControlMapper::new(ParamStore::new())?;
//!
//! // Every landmark at the same spot: hands level, nothing pressed
//! let pose = PoseLandmarks::new([Landmark::new(0.5, 0.5, 0.0); 33]);
//! let feature = *mapper.extract_features(Some(&pose));
//! assert_eq!(feature.left_pressure, 0.0);
//! assert_eq!(feature.right_pressure, 0.0);
//!
//! let output = mapper.trigger_control(&mut NullSink)?;
//! println!("steering {:.2}", output.steering);
//! # Ok(())
//! # }
//! ```
//!
//! ## Presets driving the mapper
//!
//! ```no_run
//! use pose_drive::{mapping::PoseControlMapper, params::ParamStore, presets::PresetManager};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let params = ParamStore::new();
//! let mapper = PoseControlMapper::new(params.clone())?;
//!
//! let mut presets = PresetManager::new("Presets", "racing");
//! presets.register_update_callback(mapper.preset_callback());
//! let report = presets.load_presets()?;
//! println!("loaded {:?}, active {:?}", report.loaded, presets.active_name());
//! # Ok(())
//! # }
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

/// Body landmark types and skeleton connections
pub mod landmarks;

/// Live-tunable parameter store
pub mod params;

/// Named presets and the preset manager
pub mod presets;

/// Pose-to-control feature extraction and dispatch
pub mod mapping;

/// Input sink trait, buttons and edge triggering
pub mod input_sink;

/// Virtual gamepad through Linux uinput
pub mod gamepad;

/// Keyboard emulation sink and X11 key injection
pub mod keyboard;

/// Body landmark detection with an ONNX pose model
pub mod pose_detection;

/// Overlay window and headless display
pub mod display;

/// Trackbar window for live parameter editing
pub mod tuning;

/// Utility functions: FPS smoothing, colours and checked casts
pub mod utils;

/// Main application module
pub mod app;

pub use error::{Error, Result};
