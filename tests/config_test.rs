//! Configuration file round trips

use pose_drive::{
    config::{AppConfig, SinkKind, EXAMPLE_CONFIG},
    input_sink::Button,
    Error,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_to_file_then_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pose-drive.yaml");

    let mut config = AppConfig::default();
    config.camera.index = 2;
    config.input.sink = SinkKind::Keyboard;
    config.input.keys.buttons.insert(Button::B, "backspace".to_string());
    config.preferences.presets_dir = PathBuf::from("/tmp/presets");
    config.tuning.enabled = true;
    config.to_file(&path).unwrap();

    let loaded = AppConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_example_config_file_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("example.yaml");
    fs::write(&path, EXAMPLE_CONFIG).unwrap();
    assert_eq!(AppConfig::from_file(&path).unwrap(), AppConfig::default());
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "camera: [unterminated").unwrap();
    assert!(matches!(AppConfig::from_file(&path), Err(Error::ConfigError(_))));
}

#[test]
fn test_unknown_sink_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sink.yaml");
    fs::write(&path, "input:\n  sink: joystick\n").unwrap();
    assert!(matches!(AppConfig::from_file(&path), Err(Error::ConfigError(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = AppConfig::from_file(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_validate_thresholds() {
    let mut config = AppConfig::default();
    config.input.axis_threshold = 1.0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.detector.min_visibility = 1.5;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.preferences.default_preset = "  ".to_string();
    assert!(config.validate().is_err());
}
