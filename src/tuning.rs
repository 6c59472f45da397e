//! Live parameter editing through an `OpenCV` trackbar window.
//!
//! Each registered parameter gets one trackbar. Moving a trackbar writes the
//! store from the highgui event callback; [`TuningPanel::refresh`] moves the
//! trackbars back in line after the store changed elsewhere, e.g. when a
//! preset was applied.

use crate::{
    params::{ParamKind, ParamSpec, ParamStore, ParamValue},
    utils::safe_cast::f64_to_i32_clamp,
    Result,
};
use log::{debug, info, warn};
use opencv::highgui::{self, WINDOW_NORMAL};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Trackbar resolution for continuous parameters
pub const FLOAT_STEPS: i32 = 1000;

const MAX_INT_STEPS: i32 = 10_000;

/// Highest trackbar position for a parameter
#[must_use]
pub fn trackbar_count(spec: &ParamSpec) -> i32 {
    match spec.kind {
        ParamKind::Bool => 1,
        ParamKind::Float => FLOAT_STEPS,
        ParamKind::Int => f64_to_i32_clamp(spec.max - spec.min, 1, MAX_INT_STEPS),
    }
}

/// Parameter value for a trackbar position
#[must_use]
pub fn position_to_value(spec: &ParamSpec, pos: i32) -> ParamValue {
    let count = trackbar_count(spec);
    let pos = pos.clamp(0, count);
    match spec.kind {
        ParamKind::Bool => ParamValue::Bool(pos > 0),
        ParamKind::Float | ParamKind::Int => {
            let fraction = f64::from(pos) / f64::from(count);
            let value = spec.min + fraction * (spec.max - spec.min);
            if spec.kind == ParamKind::Int {
                ParamValue::Float(value.round())
            } else {
                ParamValue::Float(value)
            }
        }
    }
}

/// Trackbar position closest to a parameter value
#[must_use]
pub fn value_to_position(spec: &ParamSpec, value: &ParamValue) -> i32 {
    let count = trackbar_count(spec);
    if spec.kind == ParamKind::Bool {
        return i32::from(value.as_bool().unwrap_or(false));
    }
    let span = spec.max - spec.min;
    if span <= 0.0 {
        return 0;
    }
    let v = value.as_f64().unwrap_or(spec.min);
    f64_to_i32_clamp((v - spec.min) / span * f64::from(count), 0, count)
}

/// Trackbar window bound to a [`ParamStore`]
pub struct TuningPanel {
    window: String,
    store: ParamStore,
    names: Vec<String>,
    syncing: Arc<AtomicBool>,
    open: bool,
}

impl TuningPanel {
    /// Open the window with one trackbar per parameter
    ///
    /// # Errors
    ///
    /// Returns an error if the window or a trackbar cannot be created
    pub fn new(store: ParamStore, window: &str) -> Result<Self> {
        highgui::named_window(window, WINDOW_NORMAL)?;
        let syncing = Arc::new(AtomicBool::new(false));
        let mut names = Vec::new();

        for name in store.names() {
            let Some(spec) = store.spec(&name) else { continue };
            let target = store.clone();
            let param = name.clone();
            let guard = Arc::clone(&syncing);
            highgui::create_trackbar(
                &name,
                window,
                None,
                trackbar_count(&spec),
                Some(Box::new(move |pos| {
                    if guard.load(Ordering::Acquire) {
                        return;
                    }
                    let value = position_to_value(&spec, pos);
                    debug!("tuning: {param} = {value:?}");
                    target.set_param(&param, &value);
                })),
            )?;
            names.push(name);
        }
        info!("Tuning panel '{window}' with {} parameters", names.len());

        let panel = Self {
            window: window.to_string(),
            store,
            names,
            syncing,
            open: true,
        };
        panel.refresh()?;
        Ok(panel)
    }

    /// Move every trackbar to the store's current value
    ///
    /// # Errors
    ///
    /// Returns an error if a trackbar position cannot be set
    pub fn refresh(&self) -> Result<()> {
        self.syncing.store(true, Ordering::Release);
        let result = self.names.iter().try_for_each(|name| {
            let (Some(spec), Some(value)) = (self.store.spec(name), self.store.get_param(name)) else {
                return Ok(());
            };
            highgui::set_trackbar_pos(name, &self.window, value_to_position(&spec, &value))
        });
        self.syncing.store(false, Ordering::Release);
        Ok(result?)
    }

    /// Close the window
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(e) = highgui::destroy_window(&self.window) {
            warn!("Failed to close tuning panel: {e}");
        }
    }
}

impl Drop for TuningPanel {
    fn drop(&mut self) {
        self.close();
    }
}
