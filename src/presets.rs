//! Named configuration presets and the manager that activates them.
//!
//! A [`Preset`] bundles display toggles (`visual`) and control thresholds
//! (`mapping`). The [`PresetManager`] owns every registered preset, tracks
//! which one is active, persists presets as JSON files and notifies
//! subscribers synchronously, in registration order, whenever a preset is
//! applied.

use crate::{
    constants::{
        DEFAULT_BEHIND_THRESH, DEFAULT_FIST_THRESH, DEFAULT_JOYSTICK_DEADZONE, DEFAULT_MAX_PITCH,
        DEFAULT_PRESET_NAME, DEFAULT_STEERING_BORDER_ANGLE, DEFAULT_STEERING_SAFE_ANGLE,
        DEFAULT_STEERING_SCALE, PARAM_BEHIND_THRESH, PARAM_FIST_THRESH, PARAM_JOYSTICK_DEADZONE,
        PARAM_MAX_PITCH, PARAM_STEERING_LEFT_BORDER, PARAM_STEERING_RIGHT_BORDER,
        PARAM_STEERING_SAFE_ANGLE, PARAM_STEERING_SCALE, PRESET_FILE_EXTENSION, VISUAL_FIST_CIRCLE_COLOR,
        VISUAL_FIST_CIRCLE_RADIUS, VISUAL_SHOW_CAM_CAPTURE, VISUAL_SHOW_FPS, VISUAL_SHOW_POSE_ESTIMATION,
    },
    params::{ParamStore, ParamValue},
    Error, Result,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Named setting values of one preset section
pub type Settings = BTreeMap<String, ParamValue>;

/// Preference preset
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    /// Preset name
    pub name: String,
    /// Display toggles
    pub visual: Settings,
    /// Control mapping thresholds
    pub mapping: Settings,
}

impl Preset {
    /// Built-in visual settings
    #[must_use]
    pub fn default_visual() -> Settings {
        Settings::from([
            (VISUAL_SHOW_FPS.to_string(), ParamValue::Bool(true)),
            (VISUAL_SHOW_CAM_CAPTURE.to_string(), ParamValue::Bool(true)),
            (VISUAL_SHOW_POSE_ESTIMATION.to_string(), ParamValue::Bool(true)),
            (VISUAL_FIST_CIRCLE_RADIUS.to_string(), ParamValue::Int(-1)),
            (VISUAL_FIST_CIRCLE_COLOR.to_string(), ParamValue::from("#ffffff")),
        ])
    }

    /// Built-in mapping settings
    #[must_use]
    pub fn default_mapping() -> Settings {
        Settings::from([
            (PARAM_MAX_PITCH.to_string(), ParamValue::Float(DEFAULT_MAX_PITCH)),
            (PARAM_FIST_THRESH.to_string(), ParamValue::Float(DEFAULT_FIST_THRESH)),
            (PARAM_BEHIND_THRESH.to_string(), ParamValue::Float(DEFAULT_BEHIND_THRESH)),
            (PARAM_JOYSTICK_DEADZONE.to_string(), ParamValue::Float(DEFAULT_JOYSTICK_DEADZONE)),
            (PARAM_STEERING_SCALE.to_string(), ParamValue::Float(DEFAULT_STEERING_SCALE)),
            (PARAM_STEERING_SAFE_ANGLE.to_string(), ParamValue::Float(DEFAULT_STEERING_SAFE_ANGLE)),
            (PARAM_STEERING_LEFT_BORDER.to_string(), ParamValue::Float(DEFAULT_STEERING_BORDER_ANGLE)),
            (PARAM_STEERING_RIGHT_BORDER.to_string(), ParamValue::Float(DEFAULT_STEERING_BORDER_ANGLE)),
        ])
    }

    /// Preset with built-in defaults under the given name
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            visual: Self::default_visual(),
            mapping: Self::default_mapping(),
        }
    }

    /// Parse preset JSON, keeping defaults for every key the document omits
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid preset document
    pub fn from_json(name: &str, text: &str) -> std::result::Result<Self, serde_json::Error> {
        let file: PresetFile = serde_json::from_str(text)?;
        let mut preset = Self::named(name);
        preset.visual.extend(file.visual.unwrap_or_default());
        preset.mapping.extend(file.mapping.unwrap_or_default());
        Ok(preset)
    }

    /// Serialize the `visual` and `mapping` sections with 2-space indentation
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        let file = PresetFileRef {
            visual: &self.visual,
            mapping: &self.mapping,
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::named(DEFAULT_PRESET_NAME)
    }
}

/// On-disk layout, both sections optional
#[derive(Debug, Deserialize)]
struct PresetFile {
    visual: Option<Settings>,
    mapping: Option<Settings>,
}

#[derive(Serialize)]
struct PresetFileRef<'a> {
    visual: &'a Settings,
    mapping: &'a Settings,
}

/// Identifies a registered preset-update callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Callback invoked with the newly active preset
pub type PresetCallback = Box<dyn FnMut(&Preset) + Send>;

/// Outcome of scanning a preset directory
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Names registered from files, in scan order
    pub loaded: Vec<String>,
    /// Files that failed to load and why
    pub failed: Vec<(PathBuf, Error)>,
}

/// Neighbour of `current` in `names`, wrapping around at either end
///
/// With no current name, or one not in the list, the first (forward) or
/// last (backward) name is picked.
#[must_use]
pub fn next_preset<'a>(names: &'a [String], current: Option<&str>, forward: bool) -> Option<&'a str> {
    if names.is_empty() {
        return None;
    }
    let len = names.len();
    let index = match current.and_then(|c| names.iter().position(|n| n == c)) {
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
        None if forward => 0,
        None => len - 1,
    };
    Some(names[index].as_str())
}

/// Stores presets, tracks the active one and notifies subscribers
pub struct PresetManager {
    presets_dir: PathBuf,
    default_preset: String,
    presets: HashMap<String, Preset>,
    active: Option<String>,
    callbacks: Vec<(CallbackId, PresetCallback)>,
    next_callback_id: u64,
}

impl PresetManager {
    /// Create a manager holding only the built-in default preset, which is active
    pub fn new<P: AsRef<Path>>(presets_dir: P, default_preset: &str) -> Self {
        let mut presets = HashMap::new();
        presets.insert(DEFAULT_PRESET_NAME.to_string(), Preset::default());
        Self {
            presets_dir: presets_dir.as_ref().to_path_buf(),
            default_preset: default_preset.to_string(),
            presets,
            active: Some(DEFAULT_PRESET_NAME.to_string()),
            callbacks: Vec::new(),
            next_callback_id: 0,
        }
    }

    /// Directory presets are loaded from and saved to
    #[must_use]
    pub fn presets_dir(&self) -> &Path {
        &self.presets_dir
    }

    /// Insert or replace a preset
    pub fn register(&mut self, name: &str, mut preset: Preset) {
        preset.name = name.to_string();
        self.presets.insert(name.to_string(), preset);
    }

    /// Remove a preset; removing the active one leaves nothing active
    pub fn unregister(&mut self, name: &str) {
        if self.presets.remove(name).is_some() && self.active.as_deref() == Some(name) {
            info!("Unregistered active preset {name}");
            self.active = None;
        }
    }

    /// Subscribe to preset activation
    pub fn register_update_callback<F>(&mut self, callback: F) -> CallbackId
    where
        F: FnMut(&Preset) + Send + 'static,
    {
        let id = CallbackId(self.next_callback_id);
        self.next_callback_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Unsubscribe; unknown ids are ignored
    pub fn unregister_update_callback(&mut self, id: CallbackId) {
        self.callbacks.retain(|(cb_id, _)| *cb_id != id);
    }

    /// Registered preset names in sorted order
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.presets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Preset by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    /// Name of the active preset
    #[must_use]
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Active preset
    #[must_use]
    pub fn active(&self) -> Option<&Preset> {
        self.active.as_deref().and_then(|name| self.presets.get(name))
    }

    /// Mutable access to the active preset for explicit field writes
    pub fn active_mut(&mut self) -> Option<&mut Preset> {
        let name = self.active.as_deref()?;
        self.presets.get_mut(name)
    }

    /// Activate a preset and notify every subscriber in registration order
    ///
    /// Returns `false` without changing anything when the name is unknown.
    pub fn apply(&mut self, name: &str) -> bool {
        let Some(preset) = self.presets.get(name) else {
            warn!("Not found preset named {name}");
            return false;
        };
        self.active = Some(name.to_string());
        info!("Applied preset: {name}");
        for (_, callback) in &mut self.callbacks {
            callback(preset);
        }
        true
    }

    /// Apply the preset after (or before) the active one in name order
    ///
    /// Returns the name applied.
    pub fn cycle(&mut self, forward: bool) -> Option<String> {
        let names = self.list();
        let next = next_preset(&names, self.active_name(), forward)?.to_string();
        self.apply(&next).then_some(next)
    }

    /// Load one preset file and register it under the file's base name
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a parse error
    /// scoped to this file if its JSON is malformed
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<String> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(DEFAULT_PRESET_NAME)
            .to_string();
        let text = fs::read_to_string(path)?;
        let preset = Preset::from_json(&name, &text).map_err(|source| Error::PresetParse {
            path: path.to_path_buf(),
            source,
        })?;
        self.register(&name, preset);
        Ok(name)
    }

    /// Load every `.json` preset in `dir`, then apply the configured default
    ///
    /// A file that fails to load is recorded in the report and skipped. The
    /// configured default falls back to `"default"` when it is not registered.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be listed
    pub fn load_all<P: AsRef<Path>>(&mut self, dir: P) -> Result<LoadReport> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some(PRESET_FILE_EXTENSION)
            })
            .collect();
        paths.sort();

        let mut report = LoadReport::default();
        for path in paths {
            match self.load_file(&path) {
                Ok(name) => report.loaded.push(name),
                Err(e) => {
                    warn!("Skipping preset file {}: {e}", path.display());
                    report.failed.push((path, e));
                }
            }
        }
        info!("Loaded {} presets", report.loaded.len());

        self.apply_default();
        Ok(report)
    }

    /// Apply the configured default preset, falling back to `"default"`
    ///
    /// Returns the name that was applied.
    pub fn apply_default(&mut self) -> String {
        let mut default_name = self.default_preset.clone();
        if self.get(&default_name).is_none() {
            warn!("Invalid preset {default_name}, using {DEFAULT_PRESET_NAME}");
            default_name = DEFAULT_PRESET_NAME.to_string();
        }
        self.apply(&default_name);
        default_name
    }

    /// Load from the manager's own presets directory
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be listed
    pub fn load_presets(&mut self) -> Result<LoadReport> {
        let dir = self.presets_dir.clone();
        self.load_all(dir)
    }

    /// Write the active preset to `<presets_dir>/<name>.json`
    ///
    /// Returns the written path, or `None` when `name` is `"default"` or
    /// nothing is active.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be written
    pub fn save_active(&self, name: &str) -> Result<Option<PathBuf>> {
        if name == DEFAULT_PRESET_NAME {
            return Ok(None);
        }
        let Some(preset) = self.active() else {
            warn!("No active preset to save as {name}");
            return Ok(None);
        };
        fs::create_dir_all(&self.presets_dir)?;
        let path = self.presets_dir.join(format!("{name}.{PRESET_FILE_EXTENSION}"));
        fs::write(&path, preset.to_json()?)?;
        info!("Saved preset: {name}");
        Ok(Some(path))
    }

    /// Write the active preset back to its own file
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written
    pub fn save_active_in_place(&self) -> Result<Option<PathBuf>> {
        match self.active.as_deref() {
            Some(name) => self.save_active(name),
            None => Ok(None),
        }
    }

    /// Copy live parameter values into the active preset
    ///
    /// Only keys already present in the preset's sections are updated. A
    /// preset value the store merely clamped or rounded is kept as written.
    /// Returns the number of values changed.
    pub fn capture_params(&mut self, params: &ParamStore) -> usize {
        let live = params.dump_to_dict();
        let Some(preset) = self.active_mut() else {
            return 0;
        };
        let mut copied = 0;
        for section in [&mut preset.visual, &mut preset.mapping] {
            for (key, value) in section.iter_mut() {
                let Some(current) = live.get(key) else { continue };
                if params.normalized(key, value).as_ref() == Some(current) {
                    continue;
                }
                *value = current.clone();
                copied += 1;
            }
        }
        copied
    }
}
