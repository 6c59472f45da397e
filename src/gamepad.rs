//! Virtual Xbox-style gamepad backed by a Linux uinput device.

use crate::{
    constants::{GAMEPAD_AXIS_MAX, GAMEPAD_TRIGGER_MAX},
    input_sink::{clamp_axis, clamp_trigger, Button, InputSink},
    utils::safe_cast::f64_to_i32,
    Error, Result,
};
use evdev::{
    uinput::VirtualDevice, AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventType, InputEvent, InputId,
    KeyCode, UinputAbsSetup,
};
use log::{debug, info, warn};

const DEVICE_NAME: &str = "pose-drive virtual gamepad";
const VENDOR_ID: u16 = 0x045e;
const PRODUCT_ID: u16 = 0x028e;

/// Map a button onto its evdev key code
#[must_use]
pub const fn key_code(button: Button) -> KeyCode {
    match button {
        Button::A => KeyCode::BTN_SOUTH,
        Button::B => KeyCode::BTN_EAST,
        Button::X => KeyCode::BTN_WEST,
        Button::Y => KeyCode::BTN_NORTH,
        Button::Start => KeyCode::BTN_START,
        Button::Back => KeyCode::BTN_SELECT,
        Button::Guide => KeyCode::BTN_MODE,
    }
}

/// Scale a stick value in `[-1, 1]` to the device range
#[must_use]
pub fn axis_to_raw(value: f64) -> i32 {
    f64_to_i32((clamp_axis(value) * f64::from(GAMEPAD_AXIS_MAX)).round()).unwrap_or(0)
}

/// Scale a trigger value in `[0, 1]` to the device range
#[must_use]
pub fn trigger_to_raw(value: f64) -> i32 {
    f64_to_i32((clamp_trigger(value) * f64::from(GAMEPAD_TRIGGER_MAX)).round()).unwrap_or(0)
}

fn uinput_error(e: impl std::fmt::Display) -> Error {
    Error::InputSink(format!("uinput: {e}"))
}

/// Gamepad exposed to the system through `/dev/uinput`
///
/// Sticks use `ABS_X/ABS_Y` and `ABS_RX/ABS_RY`, triggers `ABS_Z/ABS_RZ`.
/// All inputs are returned to neutral when the value is dropped.
pub struct VirtualGamepad {
    device: VirtualDevice,
}

impl VirtualGamepad {
    /// Create the virtual device
    ///
    /// # Errors
    ///
    /// Returns an error if `/dev/uinput` cannot be opened or the device
    /// cannot be registered
    pub fn new() -> Result<Self> {
        info!("Creating virtual gamepad");
        let stick = |code| UinputAbsSetup::new(code, AbsInfo::new(0, -GAMEPAD_AXIS_MAX, GAMEPAD_AXIS_MAX, 16, 128, 0));
        let trigger = |code| UinputAbsSetup::new(code, AbsInfo::new(0, 0, GAMEPAD_TRIGGER_MAX, 0, 0, 0));

        let mut keys = AttributeSet::<KeyCode>::new();
        for button in Button::ALL {
            keys.insert(key_code(button));
        }

        let mut builder = VirtualDevice::builder().map_err(uinput_error)?;
        builder = builder
            .name(DEVICE_NAME)
            .input_id(InputId::new(BusType::BUS_USB, VENDOR_ID, PRODUCT_ID, 0x0110));
        builder = builder.with_keys(&keys).map_err(uinput_error)?;
        for code in [
            AbsoluteAxisCode::ABS_X,
            AbsoluteAxisCode::ABS_Y,
            AbsoluteAxisCode::ABS_RX,
            AbsoluteAxisCode::ABS_RY,
        ] {
            builder = builder.with_absolute_axis(&stick(code)).map_err(uinput_error)?;
        }
        for code in [AbsoluteAxisCode::ABS_Z, AbsoluteAxisCode::ABS_RZ] {
            builder = builder.with_absolute_axis(&trigger(code)).map_err(uinput_error)?;
        }

        let device = builder.build().map_err(uinput_error)?;
        info!("Virtual gamepad '{DEVICE_NAME}' ready");
        Ok(Self { device })
    }

    fn emit(&mut self, events: &[InputEvent]) -> Result<()> {
        self.device.emit(events).map_err(uinput_error)
    }

    fn axes(&mut self, x_code: AbsoluteAxisCode, y_code: AbsoluteAxisCode, x: f64, y: f64) -> Result<()> {
        self.emit(&[
            InputEvent::new(EventType::ABSOLUTE.0, x_code.0, axis_to_raw(x)),
            InputEvent::new(EventType::ABSOLUTE.0, y_code.0, axis_to_raw(y)),
        ])
    }

    fn key(&mut self, button: Button, down: bool) -> Result<()> {
        debug!("gamepad {button:?} {}", if down { "down" } else { "up" });
        self.emit(&[InputEvent::new(EventType::KEY.0, key_code(button).0, i32::from(down))])
    }
}

impl InputSink for VirtualGamepad {
    fn left_joystick(&mut self, x: f64, y: f64) -> Result<()> {
        self.axes(AbsoluteAxisCode::ABS_X, AbsoluteAxisCode::ABS_Y, x, y)
    }

    fn right_joystick(&mut self, x: f64, y: f64) -> Result<()> {
        self.axes(AbsoluteAxisCode::ABS_RX, AbsoluteAxisCode::ABS_RY, x, y)
    }

    fn left_trigger(&mut self, value: f64) -> Result<()> {
        self.emit(&[InputEvent::new(
            EventType::ABSOLUTE.0,
            AbsoluteAxisCode::ABS_Z.0,
            trigger_to_raw(value),
        )])
    }

    fn right_trigger(&mut self, value: f64) -> Result<()> {
        self.emit(&[InputEvent::new(
            EventType::ABSOLUTE.0,
            AbsoluteAxisCode::ABS_RZ.0,
            trigger_to_raw(value),
        )])
    }

    fn press_button(&mut self, button: Button) -> Result<()> {
        self.key(button, true)
    }

    fn release_button(&mut self, button: Button) -> Result<()> {
        self.key(button, false)
    }

    fn release(&mut self) -> Result<()> {
        let mut events: Vec<InputEvent> = [
            AbsoluteAxisCode::ABS_X,
            AbsoluteAxisCode::ABS_Y,
            AbsoluteAxisCode::ABS_RX,
            AbsoluteAxisCode::ABS_RY,
            AbsoluteAxisCode::ABS_Z,
            AbsoluteAxisCode::ABS_RZ,
        ]
        .into_iter()
        .map(|code| InputEvent::new(EventType::ABSOLUTE.0, code.0, 0))
        .collect();
        events.extend(
            Button::ALL
                .into_iter()
                .map(|b| InputEvent::new(EventType::KEY.0, key_code(b).0, 0)),
        );
        self.emit(&events)
    }

    fn name(&self) -> &str {
        "gamepad"
    }
}

impl Drop for VirtualGamepad {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release virtual gamepad: {e}");
        }
    }
}
