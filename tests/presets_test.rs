//! Preset loading, saving and activation against a real directory

use pose_drive::{
    constants::{
        PARAM_FIST_THRESH, PARAM_MAX_PITCH, PARAM_STEERING_LEFT_BORDER, PARAM_STEERING_SAFE_ANGLE, VISUAL_SHOW_FPS,
    },
    mapping::PoseControlMapper,
    params::{ParamStore, ParamValue},
    presets::{Preset, PresetManager},
    Error,
};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn write_preset(dir: &TempDir, name: &str, body: &str) {
    fs::write(dir.path().join(format!("{name}.json")), body).unwrap();
}

#[test]
fn test_save_and_reload_preserves_values() {
    let dir = TempDir::new().unwrap();
    let mut mgr = PresetManager::new(dir.path(), "default");

    let mut drift = Preset::named("drift");
    drift.mapping.insert(PARAM_MAX_PITCH.to_string(), ParamValue::Float(0.75));
    drift.visual.insert(VISUAL_SHOW_FPS.to_string(), ParamValue::Bool(false));
    mgr.register("drift", drift.clone());
    assert!(mgr.apply("drift"));

    let path = mgr.save_active("drift").unwrap().unwrap();
    assert_eq!(path, dir.path().join("drift.json"));

    let mut reloaded = PresetManager::new(dir.path(), "drift");
    let report = reloaded.load_presets().unwrap();
    assert_eq!(report.loaded, vec!["drift".to_string()]);
    assert!(report.failed.is_empty());
    assert_eq!(reloaded.active_name(), Some("drift"));
    assert_eq!(reloaded.get("drift"), Some(&drift));
}

#[test]
fn test_partial_file_overrides_only_given_keys() {
    let dir = TempDir::new().unwrap();
    write_preset(&dir, "wide", r#"{"mapping": {"steering_safe_angle": 15.0}}"#);

    let mut mgr = PresetManager::new(dir.path(), "wide");
    mgr.load_presets().unwrap();

    let wide = mgr.get("wide").unwrap();
    assert_eq!(wide.mapping.get(PARAM_STEERING_SAFE_ANGLE), Some(&ParamValue::Float(15.0)));
    assert_eq!(wide.visual, Preset::default_visual());
    assert_eq!(
        wide.mapping.get(PARAM_MAX_PITCH),
        Preset::default_mapping().get(PARAM_MAX_PITCH)
    );
}

#[test]
fn test_malformed_file_is_skipped_and_reported() {
    let dir = TempDir::new().unwrap();
    write_preset(&dir, "good", r#"{"mapping": {"max_pitch": 0.5}}"#);
    write_preset(&dir, "broken", r#"{"mapping": {"max_pitch": "#);
    fs::write(dir.path().join("notes.txt"), "not a preset").unwrap();

    let mut mgr = PresetManager::new(dir.path(), "default");
    let report = mgr.load_presets().unwrap();

    assert_eq!(report.loaded, vec!["good".to_string()]);
    assert_eq!(report.failed.len(), 1);
    let (path, err) = &report.failed[0];
    assert_eq!(path, &dir.path().join("broken.json"));
    assert!(matches!(err, Error::PresetParse { .. }));
    assert_eq!(mgr.list(), vec!["default".to_string(), "good".to_string()]);
}

#[test]
fn test_unknown_default_falls_back() {
    let dir = TempDir::new().unwrap();
    let mut mgr = PresetManager::new(dir.path(), "does-not-exist");
    mgr.load_presets().unwrap();
    assert_eq!(mgr.active_name(), Some("default"));
}

#[test]
fn test_missing_directory_is_an_error_but_default_still_applies() {
    let dir = TempDir::new().unwrap();
    let mut mgr = PresetManager::new(dir.path().join("absent"), "racing");
    assert!(mgr.load_presets().is_err());
    assert_eq!(mgr.apply_default(), "default");
    assert_eq!(mgr.active_name(), Some("default"));
}

#[test]
fn test_default_preset_is_never_saved() {
    let dir = TempDir::new().unwrap();
    let mgr = PresetManager::new(dir.path(), "default");
    assert_eq!(mgr.save_active("default").unwrap(), None);
    assert_eq!(mgr.save_active_in_place().unwrap(), None);
    assert!(!dir.path().join("default.json").exists());
}

#[test]
fn test_save_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("nested").join("presets");
    let mgr = PresetManager::new(&nested, "default");
    let path = mgr.save_active("copy").unwrap().unwrap();
    assert!(path.starts_with(&nested));

    let text = fs::read_to_string(path).unwrap();
    let parsed = Preset::from_json("copy", &text).unwrap();
    assert_eq!(parsed.mapping, Preset::default_mapping());
}

#[test]
fn test_unregister_active_leaves_nothing_active() {
    let mut mgr = PresetManager::new("unused", "default");
    mgr.register("race", Preset::default());
    mgr.apply("race");
    mgr.unregister("race");
    mgr.unregister("race");
    assert_eq!(mgr.active_name(), None);
    assert!(mgr.active().is_none());
    assert_eq!(mgr.save_active_in_place().unwrap(), None);
}

#[test]
fn test_capture_params_copies_live_values() {
    let params = ParamStore::new();
    let _mapper = PoseControlMapper::new(params.clone()).unwrap();
    params.set_param(PARAM_MAX_PITCH, &ParamValue::Float(0.9));

    let mut mgr = PresetManager::new("unused", "default");
    let copied = mgr.capture_params(&params);

    assert_eq!(copied, 1);
    let active = mgr.active().unwrap();
    assert_eq!(active.mapping.get(PARAM_MAX_PITCH), Some(&ParamValue::Float(0.9)));
    // Visual keys are not in the store and keep their values
    assert_eq!(active.visual, Preset::default_visual());
}

#[test]
fn test_loaded_preset_reaches_subscribers() {
    let dir = TempDir::new().unwrap();
    write_preset(&dir, "race", r#"{"mapping": {"max_pitch": 1.2}}"#);

    let params = ParamStore::new();
    let mapper = PoseControlMapper::new(params.clone()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut mgr = PresetManager::new(dir.path(), "race");
    mgr.register_update_callback(mapper.preset_callback());
    let log = Arc::clone(&seen);
    mgr.register_update_callback(move |p: &Preset| log.lock().unwrap().push(p.name.clone()));
    mgr.load_presets().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["race".to_string()]);
    assert_eq!(params.get_param(PARAM_MAX_PITCH), Some(ParamValue::Float(1.2)));
}

#[test]
fn test_out_of_range_values_survive_save_on_close() {
    let dir = TempDir::new().unwrap();
    write_preset(
        &dir,
        "wide",
        r#"{"mapping": {"max_pitch": 2.0, "steering_left_border_angle": 240.0, "steering_safe_angle": -5.0}}"#,
    );

    let params = ParamStore::new();
    let mapper = PoseControlMapper::new(params.clone()).unwrap();
    let mut mgr = PresetManager::new(dir.path(), "wide");
    mgr.register_update_callback(mapper.preset_callback());
    mgr.load_presets().unwrap();

    // The store runs on the clamped values
    assert_eq!(params.get_param(PARAM_MAX_PITCH), Some(ParamValue::Float(1.5)));
    assert_eq!(params.get_param(PARAM_STEERING_LEFT_BORDER), Some(ParamValue::Float(180.0)));
    assert_eq!(params.get_param(PARAM_STEERING_SAFE_ANGLE), Some(ParamValue::Float(-5.0)));

    // A value edited live is still captured
    params.set_param(PARAM_FIST_THRESH, &ParamValue::Float(0.1));
    assert_eq!(mgr.capture_params(&params), 1);
    mgr.save_active_in_place().unwrap();

    let text = fs::read_to_string(dir.path().join("wide.json")).unwrap();
    let saved = Preset::from_json("wide", &text).unwrap();
    assert_eq!(saved.mapping.get(PARAM_MAX_PITCH), Some(&ParamValue::Float(2.0)));
    assert_eq!(saved.mapping.get(PARAM_STEERING_LEFT_BORDER), Some(&ParamValue::Float(240.0)));
    assert_eq!(saved.mapping.get(PARAM_STEERING_SAFE_ANGLE), Some(&ParamValue::Float(-5.0)));
    assert_eq!(saved.mapping.get(PARAM_FIST_THRESH), Some(&ParamValue::Float(0.1)));
}
