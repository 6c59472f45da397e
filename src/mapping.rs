//! Pose-to-control mapping.
//!
//! Turns one frame of body landmarks into a [`ControlFeature`] and forwards
//! it to an [`InputSink`]. Every derived signal follows the same three
//! stages: a raw geometric metric, a threshold read from the live
//! [`ParamStore`], and a bounded output.
//!
//! All thresholds for one [`PoseControlMapper::extract_features`] call come
//! from a single [`ParamSnapshot`], so a preset applied from elsewhere is
//! seen either entirely or not at all.

use crate::{
    constants::{
        DEFAULT_BEHIND_THRESH, DEFAULT_FIST_THRESH, DEFAULT_JOYSTICK_DEADZONE, DEFAULT_MAX_PITCH,
        DEFAULT_STEERING_BORDER_ANGLE, DEFAULT_STEERING_SAFE_ANGLE, DEFAULT_STEERING_SCALE, HIP_INDICES,
        LEFT_FINGERTIPS, LEFT_HAND_INDICES, LEFT_WRIST, PARAM_BEHIND_THRESH, PARAM_FIST_THRESH,
        PARAM_JOYSTICK_DEADZONE, PARAM_MAX_PITCH, PARAM_STEERING_LEFT_BORDER, PARAM_STEERING_RIGHT_BORDER,
        PARAM_STEERING_SAFE_ANGLE, PARAM_STEERING_SCALE, RIGHT_FINGERTIPS, RIGHT_HAND_INDICES, RIGHT_WRIST,
        SHOULDER_INDICES,
    },
    input_sink::{clamp_axis, Button, ButtonEvent, EdgeTrigger, InputSink},
    landmarks::PoseLandmarks,
    params::{ParamSnapshot, ParamStore},
    presets::Preset,
    Result,
};
use log::debug;

/// Button held while both hands are swung behind the torso
pub const HANDBRAKE_BUTTON: Button = Button::Y;

/// Button held while either hand makes a fist
pub const MENU_BUTTON: Button = Button::Start;

/// A 2D point in display coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point2 {
    /// Horizontal, 0-1 left to right as displayed
    pub x: f64,
    /// Vertical, 0-1 top to bottom
    pub y: f64,
}

impl Point2 {
    /// Create a point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Midpoint between two points
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Control signals derived from one frame
///
/// `left_pressure` and `right_pressure` are never both nonzero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlFeature {
    /// Left hand centre, mirrored for display
    pub hand_left_center: Point2,
    /// Right hand centre, mirrored for display
    pub hand_right_center: Point2,
    /// Midpoint of both hand centres
    pub hands_center: Point2,
    /// Signed wheel angle in degrees, positive when the right hand is higher
    pub steer_angle: f64,
    /// Left steering strength in `[0, 1]`
    pub left_pressure: f64,
    /// Right steering strength in `[0, 1]`
    pub right_pressure: f64,
    /// Torso lean in radians, positive leaning towards the camera
    pub torso_pitch: f64,
    /// Brake strength in `[0, 1]` from leaning back
    pub brake_pressure: f64,
    /// Throttle strength in `[0, 1]` from leaning forward
    pub throttle_pressure: f64,
    /// Left hand is closed
    pub left_fist: bool,
    /// Right hand is closed
    pub right_fist: bool,
    /// Either hand is closed
    pub menu_active: bool,
    /// Both hands are behind the torso
    pub handbrake_active: bool,
}

/// Thresholds used by one mapping pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingThresholds {
    /// Torso pitch (radians) giving full throttle or brake
    pub max_pitch: f64,
    /// Fingertip-to-wrist distance under which a hand counts as a fist
    pub fist_thresh: f64,
    /// Depth behind the torso beyond which hands count as behind
    pub behind_thresh: f64,
    /// Stick values under this magnitude are sent as zero
    pub joystick_deadzone: f64,
    /// Gain on the steering axis
    pub steering_scale: f64,
    /// Wheel angle (degrees) around level that produces no steering
    pub steering_safe_angle: f64,
    /// Degrees past the safe angle for full left steering
    pub steering_left_border_angle: f64,
    /// Degrees past the safe angle for full right steering
    pub steering_right_border_angle: f64,
}

impl Default for MappingThresholds {
    fn default() -> Self {
        Self {
            max_pitch: DEFAULT_MAX_PITCH,
            fist_thresh: DEFAULT_FIST_THRESH,
            behind_thresh: DEFAULT_BEHIND_THRESH,
            joystick_deadzone: DEFAULT_JOYSTICK_DEADZONE,
            steering_scale: DEFAULT_STEERING_SCALE,
            steering_safe_angle: DEFAULT_STEERING_SAFE_ANGLE,
            steering_left_border_angle: DEFAULT_STEERING_BORDER_ANGLE,
            steering_right_border_angle: DEFAULT_STEERING_BORDER_ANGLE,
        }
    }
}

impl MappingThresholds {
    /// Read every threshold from one snapshot, defaulting missing entries
    #[must_use]
    pub fn from_snapshot(snapshot: &ParamSnapshot) -> Self {
        let d = Self::default();
        Self {
            max_pitch: snapshot.f64_or(PARAM_MAX_PITCH, d.max_pitch),
            fist_thresh: snapshot.f64_or(PARAM_FIST_THRESH, d.fist_thresh),
            behind_thresh: snapshot.f64_or(PARAM_BEHIND_THRESH, d.behind_thresh),
            joystick_deadzone: snapshot.f64_or(PARAM_JOYSTICK_DEADZONE, d.joystick_deadzone),
            steering_scale: snapshot.f64_or(PARAM_STEERING_SCALE, d.steering_scale),
            steering_safe_angle: snapshot.f64_or(PARAM_STEERING_SAFE_ANGLE, d.steering_safe_angle),
            steering_left_border_angle: snapshot.f64_or(PARAM_STEERING_LEFT_BORDER, d.steering_left_border_angle),
            steering_right_border_angle: snapshot.f64_or(PARAM_STEERING_RIGHT_BORDER, d.steering_right_border_angle),
        }
    }
}

/// Register every mapping threshold in the store with its tuning range
///
/// # Errors
///
/// Returns an error if any of the names is already registered
pub fn register_mapping_params(params: &ParamStore) -> Result<()> {
    let d = MappingThresholds::default();
    params.scalar(PARAM_MAX_PITCH, d.max_pitch, 0.05, 1.5)?;
    params.scalar(PARAM_FIST_THRESH, d.fist_thresh, 0.0, 0.3)?;
    params.scalar(PARAM_BEHIND_THRESH, d.behind_thresh, 0.0, 0.5)?;
    params.scalar(PARAM_JOYSTICK_DEADZONE, d.joystick_deadzone, 0.0, 0.5)?;
    params.scalar(PARAM_STEERING_SCALE, d.steering_scale, 0.1, 3.0)?;
    params.scalar(PARAM_STEERING_SAFE_ANGLE, d.steering_safe_angle, -45.0, 90.0)?;
    params.scalar(PARAM_STEERING_LEFT_BORDER, d.steering_left_border_angle, 0.0, 180.0)?;
    params.scalar(PARAM_STEERING_RIGHT_BORDER, d.steering_right_border_angle, 0.0, 180.0)?;
    Ok(())
}

/// Clip to `[0, 1]`; NaN maps to 0
#[must_use]
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Fold an angle in degrees into `(-180, 180]`
#[must_use]
pub fn wrap_degrees(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    // Normalises -0.0 so callers can compare against zero
    a + 0.0
}

/// Wheel angle between two hand centres in unmirrored camera coordinates
///
/// Computed as `-(degrees(atan2(dx, dy)) + 90)` folded into `(-180, 180]`,
/// with `dx`, `dy` the right-minus-left offsets. Level hands give 0; the
/// right hand higher gives a positive angle, reaching 90 when it is
/// directly above the left. Coincident hands give 0.
#[must_use]
pub fn steer_angle(left: (f64, f64), right: (f64, f64)) -> f64 {
    let dx = right.0 - left.0;
    let dy = right.1 - left.1;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    wrap_degrees(-(dx.atan2(dy).to_degrees() + 90.0))
}

/// Split a wheel angle into one-sided `(left, right)` pressures
///
/// Angles within `safe_angle` of level give zero; pressure then ramps
/// linearly and saturates at `safe_angle + border_angle`.
#[must_use]
pub fn steer_pressures(angle: f64, safe_angle: f64, left_border: f64, right_border: f64) -> (f64, f64) {
    if angle < 0.0 {
        (clamp01((-angle - safe_angle) / left_border), 0.0)
    } else if angle > 0.0 {
        (0.0, clamp01((angle - safe_angle) / right_border))
    } else {
        (0.0, 0.0)
    }
}

/// Scale a stick value, clamp it to `[-1, 1]` and zero it inside the dead-zone
#[must_use]
pub fn shape_axis(raw: f64, scale: f64, deadzone: f64) -> f64 {
    let value = clamp_axis(raw * scale);
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}

/// Torso lean from the hip midpoint to the shoulder midpoint
///
/// Positive when the shoulders are closer to the camera than the hips.
#[must_use]
pub fn torso_pitch(shoulders: (f64, f64, f64), hips: (f64, f64, f64)) -> f64 {
    // Image y grows downwards, so the upright torso length is hips minus shoulders
    let up = hips.1 - shoulders.1;
    let depth = shoulders.2 - hips.2;
    if up == 0.0 && depth == 0.0 {
        0.0
    } else {
        (-depth).atan2(up)
    }
}

/// Split a torso pitch into `(brake, throttle)` pressures
#[must_use]
pub fn pitch_pressures(pitch: f64, max_pitch: f64) -> (f64, f64) {
    if pitch > 0.0 {
        (0.0, clamp01(pitch / max_pitch))
    } else {
        (clamp01(-pitch / max_pitch), 0.0)
    }
}

/// What one `trigger_control` call sent to the sink
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlOutput {
    /// Left stick x value
    pub steering: f64,
    /// Right trigger value
    pub throttle: f64,
    /// Left trigger value
    pub brake: f64,
    /// Button transitions emitted this frame
    pub events: Vec<(Button, ButtonEvent)>,
}

/// Converts landmarks into control signals and dispatches them
pub struct PoseControlMapper {
    params: ParamStore,
    feature: ControlFeature,
    handbrake: EdgeTrigger,
    menu: EdgeTrigger,
}

impl PoseControlMapper {
    /// Create a mapper reading its thresholds from `params`
    ///
    /// The thresholds are registered in the store if they are not there yet.
    ///
    /// # Errors
    ///
    /// Returns an error if only some of the thresholds were registered before
    pub fn new(params: ParamStore) -> Result<Self> {
        if params.spec(PARAM_STEERING_SAFE_ANGLE).is_none() {
            register_mapping_params(&params)?;
        }
        Ok(Self {
            params,
            feature: ControlFeature::default(),
            handbrake: EdgeTrigger::new(),
            menu: EdgeTrigger::new(),
        })
    }

    /// The parameter store this mapper reads from
    #[must_use]
    pub const fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Features computed by the last successful extraction
    #[must_use]
    pub const fn feature(&self) -> &ControlFeature {
        &self.feature
    }

    /// Update features from this frame's landmarks
    ///
    /// With no detection the previous features are kept unchanged.
    pub fn extract_features(&mut self, landmarks: Option<&PoseLandmarks>) -> &ControlFeature {
        if let Some(landmarks) = landmarks {
            let thresholds = MappingThresholds::from_snapshot(&self.params.snapshot());
            self.feature = compute_features(landmarks, &thresholds);
            debug!(
                "steer {:.1} deg, L {:.2} R {:.2}, pitch {:.2}",
                self.feature.steer_angle, self.feature.left_pressure, self.feature.right_pressure, self.feature.torso_pitch
            );
        }
        &self.feature
    }

    /// Send the current features to a sink
    ///
    /// Buttons only receive an event when their condition changes.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the sink
    pub fn trigger_control(&mut self, sink: &mut dyn InputSink) -> Result<ControlOutput> {
        let snapshot = self.params.snapshot();
        let thresholds = MappingThresholds::from_snapshot(&snapshot);
        let f = self.feature;

        let steering = shape_axis(
            f.right_pressure - f.left_pressure,
            thresholds.steering_scale,
            thresholds.joystick_deadzone,
        );
        sink.left_joystick(steering, 0.0)?;
        sink.right_trigger(f.throttle_pressure)?;
        sink.left_trigger(f.brake_pressure)?;

        let mut events = Vec::new();
        for (trigger, condition, button) in [
            (&mut self.handbrake, f.handbrake_active, HANDBRAKE_BUTTON),
            (&mut self.menu, f.menu_active, MENU_BUTTON),
        ] {
            if let Some(event) = trigger.update(condition) {
                match event {
                    ButtonEvent::Press => sink.press_button(button)?,
                    ButtonEvent::Release => sink.release_button(button)?,
                }
                events.push((button, event));
            }
        }

        Ok(ControlOutput {
            steering,
            throttle: f.throttle_pressure,
            brake: f.brake_pressure,
            events,
        })
    }

    /// Push a preset's mapping values into the store in one write
    ///
    /// Returns the number of values applied.
    pub fn apply_preset(params: &ParamStore, preset: &Preset) -> usize {
        let applied = params.load_from_dict(&preset.mapping);
        debug!("Preset {} pushed {applied} mapping values", preset.name);
        applied
    }

    /// Callback for `PresetManager::register_update_callback`
    #[must_use]
    pub fn preset_callback(&self) -> impl FnMut(&Preset) + Send + 'static {
        let params = self.params.clone();
        move |preset: &Preset| {
            Self::apply_preset(&params, preset);
        }
    }

    /// Forget the last features and release every button
    pub fn reset(&mut self) {
        self.feature = ControlFeature::default();
        self.handbrake = EdgeTrigger::new();
        self.menu = EdgeTrigger::new();
    }
}

fn distance_2d(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Full feature extraction for one detected pose
#[must_use]
pub fn compute_features(landmarks: &PoseLandmarks, t: &MappingThresholds) -> ControlFeature {
    let (lx, ly, lz) = landmarks.centroid(&LEFT_HAND_INDICES);
    let (rx, ry, rz) = landmarks.centroid(&RIGHT_HAND_INDICES);

    let hand_left_center = Point2::new(1.0 - lx, ly);
    let hand_right_center = Point2::new(1.0 - rx, ry);

    let steer = steer_angle((lx, ly), (rx, ry));
    let (left_pressure, right_pressure) = steer_pressures(
        steer,
        t.steering_safe_angle,
        t.steering_left_border_angle,
        t.steering_right_border_angle,
    );

    let shoulders = landmarks.centroid(&SHOULDER_INDICES);
    let hips = landmarks.centroid(&HIP_INDICES);
    let pitch = torso_pitch(shoulders, hips);
    let (brake_pressure, throttle_pressure) = pitch_pressures(pitch, t.max_pitch);

    let fist = |tips: &[usize], wrist: usize| {
        let (tx, ty, _) = landmarks.centroid(tips);
        let (wx, wy, _) = landmarks.centroid(&[wrist]);
        distance_2d((tx, ty), (wx, wy)) < t.fist_thresh
    };
    let left_fist = fist(&LEFT_FINGERTIPS, LEFT_WRIST);
    let right_fist = fist(&RIGHT_FINGERTIPS, RIGHT_WRIST);

    let torso_mid_z = (shoulders.2 + hips.2) / 2.0;
    let handbrake_active = lz - torso_mid_z > t.behind_thresh && rz - torso_mid_z > t.behind_thresh;

    ControlFeature {
        hand_left_center,
        hand_right_center,
        hands_center: hand_left_center.midpoint(hand_right_center),
        steer_angle: steer,
        left_pressure,
        right_pressure,
        torso_pitch: pitch,
        brake_pressure,
        throttle_pressure,
        left_fist,
        right_fist,
        menu_active: left_fist || right_fist,
        handbrake_active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-2.0), 0.0);
        assert_eq!(clamp01(0.3), 0.3);
        assert_eq!(clamp01(7.0), 1.0);
        assert_eq!(clamp01(f64::INFINITY), 1.0);
        assert_eq!(clamp01(f64::NEG_INFINITY), 0.0);
        assert_eq!(clamp01(f64::NAN), 0.0);
    }

    #[test]
    fn test_clamp01_monotonic() {
        let mut last = 0.0;
        for i in -200..=200 {
            let v = clamp01(f64::from(i) * 0.01);
            assert!(v >= last);
            assert!((0.0..=1.0).contains(&v));
            last = v;
        }
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(270.0), -90.0);
        assert_eq!(wrap_degrees(-270.0), 90.0);
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(-0.0).to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn test_steer_angle_level_is_zero() {
        // Facing the camera the user's left hand appears at the larger x
        assert_eq!(steer_angle((0.7, 0.5), (0.3, 0.5)), 0.0);
    }

    #[test]
    fn test_steer_angle_vertical_right_above() {
        let angle = steer_angle((0.3, 0.5), (0.3, 0.3));
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_steer_angle_sign() {
        assert!(steer_angle((0.7, 0.5), (0.3, 0.4)) > 0.0);
        assert!(steer_angle((0.7, 0.4), (0.3, 0.5)) < 0.0);
    }

    #[test]
    fn test_steer_angle_coincident_hands() {
        assert_eq!(steer_angle((0.5, 0.5), (0.5, 0.5)), 0.0);
    }

    #[test]
    fn test_steer_pressures_dead_zone() {
        for angle in [-7.0, -3.5, 0.0, 3.5, 7.0] {
            assert_eq!(steer_pressures(angle, 7.0, 45.0, 45.0), (0.0, 0.0));
        }
    }

    #[test]
    fn test_steer_pressures_saturation() {
        assert_eq!(steer_pressures(52.0, 7.0, 45.0, 45.0), (0.0, 1.0));
        assert_eq!(steer_pressures(-52.0, 7.0, 45.0, 45.0), (1.0, 0.0));
        assert_eq!(steer_pressures(170.0, 7.0, 45.0, 45.0), (0.0, 1.0));
    }

    #[test]
    fn test_steer_pressures_degenerate_config() {
        let (l, r) = steer_pressures(10.0, -5.0, 0.0, 0.0);
        assert_eq!((l, r), (0.0, 1.0));
        let (l, r) = steer_pressures(5.0, 5.0, 0.0, 0.0);
        assert_eq!((l, r), (0.0, 0.0));
    }

    #[test]
    fn test_shape_axis() {
        assert_eq!(shape_axis(0.01, 1.0, 0.02), 0.0);
        assert_eq!(shape_axis(0.5, 3.0, 0.02), 1.0);
        assert_eq!(shape_axis(-0.25, 2.0, 0.02), -0.5);
    }

    #[test]
    fn test_torso_pitch() {
        assert_eq!(torso_pitch((0.5, 0.3, 0.0), (0.5, 0.6, 0.0)), 0.0);
        assert!(torso_pitch((0.5, 0.3, -0.2), (0.5, 0.6, 0.0)) > 0.0);
        assert!(torso_pitch((0.5, 0.3, 0.2), (0.5, 0.6, 0.0)) < 0.0);
        assert_eq!(torso_pitch((0.5, 0.5, 0.0), (0.5, 0.5, 0.0)), 0.0);
    }

    #[test]
    fn test_pitch_pressures() {
        assert_eq!(pitch_pressures(0.2, 0.4), (0.0, 0.5));
        assert_eq!(pitch_pressures(-0.8, 0.4), (1.0, 0.0));
        assert_eq!(pitch_pressures(0.0, 0.4), (0.0, 0.0));
    }
}
