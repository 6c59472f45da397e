//! Keyboard emulation against a recording key emitter

use pose_drive::{
    input_sink::{Button, InputSink},
    keyboard::{KeyBindings, KeyEmitter, KeyboardEmulator},
    Error, Result,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Key {
    Down(String),
    Up(String),
}

#[derive(Clone, Default)]
struct RecordingEmitter {
    log: Arc<Mutex<Vec<Key>>>,
    fail_up: bool,
}

impl RecordingEmitter {
    fn events(&self) -> Vec<Key> {
        self.log.lock().unwrap().clone()
    }
}

impl KeyEmitter for RecordingEmitter {
    fn key_down(&mut self, key: &str) -> Result<()> {
        self.log.lock().unwrap().push(Key::Down(key.to_string()));
        Ok(())
    }

    fn key_up(&mut self, key: &str) -> Result<()> {
        self.log.lock().unwrap().push(Key::Up(key.to_string()));
        if self.fail_up {
            return Err(Error::InputSink(format!("cannot release {key}")));
        }
        Ok(())
    }
}

fn down(key: &str) -> Key {
    Key::Down(key.to_string())
}

fn up(key: &str) -> Key {
    Key::Up(key.to_string())
}

fn emulator() -> (KeyboardEmulator<RecordingEmitter>, RecordingEmitter) {
    let emitter = RecordingEmitter::default();
    (KeyboardEmulator::new(emitter.clone(), KeyBindings::default(), 0.3, 0.3), emitter)
}

#[test]
fn test_steering_holds_key_once() {
    let (mut kb, emitter) = emulator();
    kb.left_joystick(0.8, 0.0).unwrap();
    kb.left_joystick(0.9, 0.0).unwrap();
    kb.left_joystick(1.0, 0.0).unwrap();
    assert_eq!(emitter.events(), vec![down("d")]);
    assert_eq!(kb.held_keys().collect::<Vec<_>>(), vec!["d"]);
}

#[test]
fn test_steering_reversal_lifts_before_press() {
    let (mut kb, emitter) = emulator();
    kb.left_joystick(-0.8, 0.0).unwrap();
    kb.left_joystick(0.8, 0.0).unwrap();
    kb.left_joystick(0.1, 0.0).unwrap();
    assert_eq!(emitter.events(), vec![down("a"), up("a"), down("d"), up("d")]);
}

#[test]
fn test_thresholds_gate_keys() {
    let (mut kb, emitter) = emulator();
    kb.left_joystick(0.3, 0.0).unwrap();
    kb.right_trigger(0.2).unwrap();
    kb.left_trigger(0.3).unwrap();
    assert!(emitter.events().is_empty());

    kb.right_trigger(0.9).unwrap();
    kb.left_trigger(0.31).unwrap();
    assert_eq!(emitter.events(), vec![down("w"), down("s")]);
}

#[test]
fn test_buttons_use_bindings() {
    let (mut kb, emitter) = emulator();
    kb.press_button(Button::Y).unwrap();
    kb.press_button(Button::Y).unwrap();
    kb.release_button(Button::Y).unwrap();
    kb.press_button(Button::Guide).unwrap();
    kb.release_button(Button::Guide).unwrap();
    assert_eq!(emitter.events(), vec![down("space"), up("space")]);
}

#[test]
fn test_empty_binding_is_ignored() {
    let emitter = RecordingEmitter::default();
    let bindings = KeyBindings {
        brake: String::new(),
        ..KeyBindings::default()
    };
    let mut kb = KeyboardEmulator::new(emitter.clone(), bindings, 0.3, 0.3);
    kb.left_trigger(1.0).unwrap();
    assert!(emitter.events().is_empty());
}

#[test]
fn test_release_lifts_everything_held() {
    let (mut kb, emitter) = emulator();
    kb.left_joystick(-1.0, 0.0).unwrap();
    kb.right_trigger(1.0).unwrap();
    kb.press_button(Button::Start).unwrap();
    kb.release().unwrap();

    let ups: Vec<Key> = emitter
        .events()
        .into_iter()
        .filter(|k| matches!(k, Key::Up(_)))
        .collect();
    assert_eq!(ups.len(), 3);
    assert!(ups.contains(&up("a")));
    assert!(ups.contains(&up("w")));
    assert!(ups.contains(&up("escape")));
    assert_eq!(kb.held_keys().count(), 0);
}

#[test]
fn test_drop_releases_held_keys() {
    let (mut kb, emitter) = emulator();
    kb.right_trigger(1.0).unwrap();
    drop(kb);
    assert_eq!(emitter.events(), vec![down("w"), up("w")]);
}

#[test]
fn test_release_reports_failure_but_tries_all() {
    let emitter = RecordingEmitter {
        fail_up: true,
        ..RecordingEmitter::default()
    };
    let mut kb = KeyboardEmulator::new(emitter.clone(), KeyBindings::default(), 0.3, 0.3);
    kb.right_trigger(1.0).unwrap();
    kb.left_trigger(1.0).unwrap();

    assert!(kb.release().is_err());
    let ups = emitter.events().iter().filter(|k| matches!(k, Key::Up(_))).count();
    assert_eq!(ups, 2);
    assert_eq!(kb.held_keys().count(), 0);
}
