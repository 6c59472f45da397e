//! Keyboard emulation sink.
//!
//! Games without gamepad support are driven with held keys instead: stick
//! deflection past a threshold holds the steering key, trigger pressure
//! past a threshold holds throttle or brake, and buttons map onto bound
//! keys. Keys are only sent on a change of held state.

use crate::{
    input_sink::{clamp_axis, clamp_trigger, Button, InputSink},
    Error, Result,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use x11rb::{
    connection::Connection,
    protocol::{
        xproto::{ConnectionExt as _, Window, KEY_PRESS_EVENT, KEY_RELEASE_EVENT},
        xtest::ConnectionExt as _,
    },
    rust_connection::RustConnection,
};

/// Something that can press and release keys by name
pub trait KeyEmitter {
    /// Press a key
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or cannot be injected
    fn key_down(&mut self, key: &str) -> Result<()>;

    /// Release a key
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or cannot be injected
    fn key_up(&mut self, key: &str) -> Result<()>;
}

/// Key names bound to each control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    /// Held while steering left
    pub steer_left: String,
    /// Held while steering right
    pub steer_right: String,
    /// Held while the throttle trigger is pressed
    pub throttle: String,
    /// Held while the brake trigger is pressed
    pub brake: String,
    /// Keys for discrete buttons
    pub buttons: BTreeMap<Button, String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            steer_left: "a".to_string(),
            steer_right: "d".to_string(),
            throttle: "w".to_string(),
            brake: "s".to_string(),
            buttons: BTreeMap::from([
                (Button::A, "return".to_string()),
                (Button::Y, "space".to_string()),
                (Button::Start, "escape".to_string()),
            ]),
        }
    }
}

/// Input sink that translates controller input into held keys
pub struct KeyboardEmulator<E: KeyEmitter> {
    emitter: E,
    bindings: KeyBindings,
    axis_threshold: f64,
    trigger_threshold: f64,
    held: BTreeSet<String>,
}

impl<E: KeyEmitter> KeyboardEmulator<E> {
    /// Create an emulator over an emitter
    pub fn new(emitter: E, bindings: KeyBindings, axis_threshold: f64, trigger_threshold: f64) -> Self {
        info!(
            "Keyboard emulation: steer {}/{}, throttle {}, brake {}",
            bindings.steer_left, bindings.steer_right, bindings.throttle, bindings.brake
        );
        Self {
            emitter,
            bindings,
            axis_threshold: axis_threshold.abs(),
            trigger_threshold: trigger_threshold.abs(),
            held: BTreeSet::new(),
        }
    }

    /// Keys currently held down
    pub fn held_keys(&self) -> impl Iterator<Item = &str> {
        self.held.iter().map(String::as_str)
    }

    fn set_held(&mut self, key: &str, down: bool) -> Result<()> {
        if key.is_empty() {
            return Ok(());
        }
        if down && !self.held.contains(key) {
            self.emitter.key_down(key)?;
            self.held.insert(key.to_string());
        } else if !down && self.held.remove(key) {
            self.emitter.key_up(key)?;
        }
        Ok(())
    }

    fn button_key(&self, button: Button) -> Option<String> {
        self.bindings.buttons.get(&button).cloned()
    }
}

impl<E: KeyEmitter> InputSink for KeyboardEmulator<E> {
    fn left_joystick(&mut self, x: f64, _y: f64) -> Result<()> {
        let x = clamp_axis(x);
        let (left, right) = (self.bindings.steer_left.clone(), self.bindings.steer_right.clone());
        // Lift before press so a reversal never holds both keys at once
        if x < -self.axis_threshold {
            self.set_held(&right, false)?;
            self.set_held(&left, true)
        } else if x > self.axis_threshold {
            self.set_held(&left, false)?;
            self.set_held(&right, true)
        } else {
            self.set_held(&left, false)?;
            self.set_held(&right, false)
        }
    }

    fn right_joystick(&mut self, _x: f64, _y: f64) -> Result<()> {
        Ok(())
    }

    fn left_trigger(&mut self, value: f64) -> Result<()> {
        let key = self.bindings.brake.clone();
        self.set_held(&key, clamp_trigger(value) > self.trigger_threshold)
    }

    fn right_trigger(&mut self, value: f64) -> Result<()> {
        let key = self.bindings.throttle.clone();
        self.set_held(&key, clamp_trigger(value) > self.trigger_threshold)
    }

    fn press_button(&mut self, button: Button) -> Result<()> {
        match self.button_key(button) {
            Some(key) => self.set_held(&key, true),
            None => {
                debug!("No key bound to {button:?}");
                Ok(())
            }
        }
    }

    fn release_button(&mut self, button: Button) -> Result<()> {
        match self.button_key(button) {
            Some(key) => self.set_held(&key, false),
            None => Ok(()),
        }
    }

    fn release(&mut self) -> Result<()> {
        let mut first_error = None;
        for key in std::mem::take(&mut self.held) {
            if let Err(e) = self.emitter.key_up(&key) {
                warn!("Failed to release key '{key}': {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn name(&self) -> &str {
        "keyboard"
    }
}

impl<E: KeyEmitter> Drop for KeyboardEmulator<E> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release keyboard emulator: {e}");
        }
    }
}

/// Resolve a key name to an X keysym
#[must_use]
pub fn keysym_for(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let mut chars = lower.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return (c.is_ascii_graphic()).then_some(u32::from(c));
    }
    let keysym = match lower.as_str() {
        "space" => 0x0020,
        "escape" | "esc" => 0xff1b,
        "return" | "enter" => 0xff0d,
        "tab" => 0xff09,
        "backspace" => 0xff08,
        "shift" => 0xffe1,
        "ctrl" | "control" => 0xffe3,
        "alt" => 0xffe9,
        "left" => 0xff51,
        "up" => 0xff52,
        "right" => 0xff53,
        "down" => 0xff54,
        _ => {
            let n: u32 = lower.strip_prefix('f')?.parse().ok()?;
            return (1..=12).contains(&n).then(|| 0xffbe + n - 1);
        }
    };
    Some(keysym)
}

fn x11_error(e: impl std::fmt::Display) -> Error {
    Error::X11(e.to_string())
}

/// Key emitter injecting synthetic events through the X11 XTest extension
pub struct X11KeyEmitter {
    connection: RustConnection,
    root: Window,
    keycodes: HashMap<u32, u8>,
}

impl X11KeyEmitter {
    /// Connect to the X server and load its keyboard mapping
    ///
    /// # Errors
    ///
    /// Returns an error if the display cannot be opened, XTest is missing or
    /// the keyboard mapping cannot be read
    pub fn new() -> Result<Self> {
        info!("Initializing X11 keyboard emitter");

        let (connection, screen_num) =
            RustConnection::connect(None).map_err(|e| Error::X11(format!("Failed to connect to X11: {e}")))?;

        let root = connection
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| Error::X11("Failed to get screen".to_string()))?
            .root;

        let version = connection
            .xtest_get_version(2, 2)
            .map_err(x11_error)?
            .reply()
            .map_err(|e| Error::X11(format!("XTest extension unavailable: {e}")))?;
        debug!("XTest {}.{}", version.major_version, version.minor_version);

        let min_keycode = connection.setup().min_keycode;
        let max_keycode = connection.setup().max_keycode;
        let count = max_keycode.saturating_sub(min_keycode).saturating_add(1);
        let mapping = connection
            .get_keyboard_mapping(min_keycode, count)
            .map_err(x11_error)?
            .reply()
            .map_err(|e| Error::X11(format!("Failed to read keyboard mapping: {e}")))?;

        let per_keycode = usize::from(mapping.keysyms_per_keycode).max(1);
        let mut keycodes = HashMap::new();
        for (offset, syms) in mapping.keysyms.chunks(per_keycode).enumerate() {
            let Ok(offset) = u8::try_from(offset) else { break };
            let keycode = min_keycode.saturating_add(offset);
            for &sym in syms.iter().filter(|&&s| s != 0) {
                keycodes.entry(sym).or_insert(keycode);
            }
        }
        info!("Loaded {} keysyms from the X keyboard mapping", keycodes.len());

        Ok(Self { connection, root, keycodes })
    }

    fn keycode(&self, key: &str) -> Result<u8> {
        let keysym = keysym_for(key).ok_or_else(|| Error::InputSink(format!("Unknown key name '{key}'")))?;
        self.keycodes
            .get(&keysym)
            .copied()
            .ok_or_else(|| Error::InputSink(format!("Key '{key}' is not on the current keyboard layout")))
    }

    fn fake_key(&self, key: &str, event: u8) -> Result<()> {
        let keycode = self.keycode(key)?;
        self.connection
            .xtest_fake_input(event, keycode, x11rb::CURRENT_TIME, self.root, 0, 0, 0)
            .map_err(x11_error)?;
        self.connection
            .flush()
            .map_err(|e| Error::X11(format!("Failed to flush connection: {e}")))
    }
}

impl KeyEmitter for X11KeyEmitter {
    fn key_down(&mut self, key: &str) -> Result<()> {
        debug!("key down {key}");
        self.fake_key(key, KEY_PRESS_EVENT)
    }

    fn key_up(&mut self, key: &str) -> Result<()> {
        debug!("key up {key}");
        self.fake_key(key, KEY_RELEASE_EVENT)
    }
}
