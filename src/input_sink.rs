//! Output side of the bridge: anything that can receive controller input.
//!
//! Axis values follow gamepad conventions: sticks in `[-1, 1]`, triggers in
//! `[0, 1]`. Implementations clamp out-of-range values instead of failing.

use crate::{Error, Result};
use log::trace;
use serde::{Deserialize, Serialize};

/// Discrete controller buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    /// Bottom face button
    A,
    /// Right face button
    B,
    /// Left face button
    X,
    /// Top face button
    Y,
    /// Menu button
    Start,
    /// View/back button
    Back,
    /// Guide/home button
    Guide,
}

impl Button {
    /// Every button, in a fixed order
    pub const ALL: [Self; 7] = [Self::A, Self::B, Self::X, Self::Y, Self::Start, Self::Back, Self::Guide];
}

/// A single button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Released to pressed
    Press,
    /// Pressed to released
    Release,
}

/// Turns a per-frame boolean condition into press/release transitions
///
/// Starts released. Emits exactly one event per change of the condition and
/// nothing while it holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeTrigger {
    pressed: bool,
}

impl EdgeTrigger {
    /// Create a released trigger
    #[must_use]
    pub const fn new() -> Self {
        Self { pressed: false }
    }

    /// Feed this frame's condition
    pub fn update(&mut self, condition: bool) -> Option<ButtonEvent> {
        match (self.pressed, condition) {
            (false, true) => {
                self.pressed = true;
                Some(ButtonEvent::Press)
            }
            (true, false) => {
                self.pressed = false;
                Some(ButtonEvent::Release)
            }
            _ => None,
        }
    }

    /// Current state
    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Force the released state, returning the release event if one is due
    pub fn reset(&mut self) -> Option<ButtonEvent> {
        self.update(false)
    }
}

/// Virtual controller or keyboard emulator
pub trait InputSink {
    /// Left stick position, both axes in `[-1, 1]`
    fn left_joystick(&mut self, x: f64, y: f64) -> Result<()>;

    /// Right stick position, both axes in `[-1, 1]`
    fn right_joystick(&mut self, x: f64, y: f64) -> Result<()>;

    /// Left trigger in `[0, 1]`
    fn left_trigger(&mut self, value: f64) -> Result<()>;

    /// Right trigger in `[0, 1]`
    fn right_trigger(&mut self, value: f64) -> Result<()>;

    /// Hold a button down
    fn press_button(&mut self, button: Button) -> Result<()>;

    /// Let a button go
    fn release_button(&mut self, button: Button) -> Result<()>;

    /// Return every axis and button to neutral
    fn release(&mut self) -> Result<()>;

    /// Human readable sink name for logs
    fn name(&self) -> &str;
}

/// Sink that accepts and discards everything (skip mode)
#[derive(Debug, Default)]
pub struct NullSink;

impl InputSink for NullSink {
    fn left_joystick(&mut self, x: f64, y: f64) -> Result<()> {
        trace!("null sink: left stick ({x:.3}, {y:.3})");
        Ok(())
    }

    fn right_joystick(&mut self, _x: f64, _y: f64) -> Result<()> {
        Ok(())
    }

    fn left_trigger(&mut self, _value: f64) -> Result<()> {
        Ok(())
    }

    fn right_trigger(&mut self, _value: f64) -> Result<()> {
        Ok(())
    }

    fn press_button(&mut self, button: Button) -> Result<()> {
        trace!("null sink: press {button:?}");
        Ok(())
    }

    fn release_button(&mut self, button: Button) -> Result<()> {
        trace!("null sink: release {button:?}");
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Sink standing in for one that could not be opened
///
/// Every control call fails with the recorded reason; `release` succeeds so
/// teardown stays quiet.
#[derive(Debug, Clone)]
pub struct UnavailableSink {
    reason: String,
}

impl UnavailableSink {
    /// Record why the real sink is missing
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    /// Why the sink is unavailable
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn fail(&self) -> Result<()> {
        Err(Error::Unavailable(format!("Input sink cannot send because {}", self.reason)))
    }
}

impl InputSink for UnavailableSink {
    fn left_joystick(&mut self, _x: f64, _y: f64) -> Result<()> {
        self.fail()
    }

    fn right_joystick(&mut self, _x: f64, _y: f64) -> Result<()> {
        self.fail()
    }

    fn left_trigger(&mut self, _value: f64) -> Result<()> {
        self.fail()
    }

    fn right_trigger(&mut self, _value: f64) -> Result<()> {
        self.fail()
    }

    fn press_button(&mut self, _button: Button) -> Result<()> {
        self.fail()
    }

    fn release_button(&mut self, _button: Button) -> Result<()> {
        self.fail()
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Clamp a stick value to `[-1, 1]`, mapping NaN to neutral
#[must_use]
pub fn clamp_axis(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// Clamp a trigger value to `[0, 1]`, mapping NaN to released
#[must_use]
pub fn clamp_trigger(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_trigger_sequence() {
        let mut trigger = EdgeTrigger::new();
        let events: Vec<ButtonEvent> = [false, false, true, true, false, true]
            .into_iter()
            .filter_map(|c| trigger.update(c))
            .collect();
        assert_eq!(events, vec![ButtonEvent::Press, ButtonEvent::Release, ButtonEvent::Press]);
        assert!(trigger.is_pressed());
    }

    #[test]
    fn test_edge_trigger_reset() {
        let mut trigger = EdgeTrigger::new();
        assert_eq!(trigger.reset(), None);
        trigger.update(true);
        assert_eq!(trigger.reset(), Some(ButtonEvent::Release));
        assert!(!trigger.is_pressed());
    }

    #[test]
    fn test_unavailable_sink_fails_on_use_only() {
        let mut sink = UnavailableSink::new("uinput is not writable");
        assert!(sink.release().is_ok());
        match sink.left_joystick(0.5, 0.0) {
            Err(Error::Unavailable(msg)) => assert!(msg.contains("uinput is not writable")),
            other => panic!("Expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_axis(3.0), 1.0);
        assert_eq!(clamp_axis(f64::NAN), 0.0);
        assert_eq!(clamp_trigger(-0.5), 0.0);
        assert_eq!(clamp_trigger(0.25), 0.25);
    }
}
