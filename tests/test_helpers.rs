//! Helper functions and utilities for tests
#![allow(dead_code)]

use pose_drive::{
    constants::{
        LEFT_HIP, LEFT_INDEX, LEFT_PINKY, LEFT_SHOULDER, LEFT_THUMB, LEFT_WRIST, NUM_POSE_LANDMARKS, RIGHT_HIP,
        RIGHT_INDEX, RIGHT_PINKY, RIGHT_SHOULDER, RIGHT_THUMB, RIGHT_WRIST,
    },
    input_sink::{Button, InputSink},
    landmarks::{Landmark, PoseLandmarks},
    Result,
};

/// Builder for synthetic poses with an upright torso and open hands
#[derive(Debug, Clone)]
pub struct PoseBuilder {
    points: [Landmark; NUM_POSE_LANDMARKS],
}

impl PoseBuilder {
    /// Upright torso, hands level in front of the chest
    pub fn new() -> Self {
        let mut points = [Landmark::new(0.5, 0.5, 0.0); NUM_POSE_LANDMARKS];
        points[LEFT_SHOULDER] = Landmark::new(0.6, 0.3, 0.0);
        points[RIGHT_SHOULDER] = Landmark::new(0.4, 0.3, 0.0);
        points[LEFT_HIP] = Landmark::new(0.58, 0.7, 0.0);
        points[RIGHT_HIP] = Landmark::new(0.42, 0.7, 0.0);
        Self { points }.hands((0.7, 0.5), (0.3, 0.5))
    }

    /// Place both hand centres (camera coordinates) with open hands
    pub fn hands(mut self, left: (f64, f64), right: (f64, f64)) -> Self {
        Self::open_hand(&mut self.points, [LEFT_WRIST, LEFT_PINKY, LEFT_INDEX, LEFT_THUMB], left);
        Self::open_hand(&mut self.points, [RIGHT_WRIST, RIGHT_PINKY, RIGHT_INDEX, RIGHT_THUMB], right);
        self
    }

    /// Wrist below the fingers; the four points average to `center`
    fn open_hand(points: &mut [Landmark; NUM_POSE_LANDMARKS], [wrist, pinky, index, thumb]: [usize; 4], center: (f64, f64)) {
        let (x, y) = center;
        points[wrist] = Landmark::new(x, y + 0.06, 0.0);
        points[pinky] = Landmark::new(x, y - 0.02, 0.0);
        points[index] = Landmark::new(x, y - 0.02, 0.0);
        points[thumb] = Landmark::new(x, y - 0.02, 0.0);
    }

    /// Close the left hand: fingertips on the wrist
    pub fn left_fist(mut self) -> Self {
        let wrist = self.points[LEFT_WRIST];
        self.points[LEFT_INDEX] = wrist;
        self.points[LEFT_THUMB] = wrist;
        self
    }

    /// Close the right hand: fingertips on the wrist
    pub fn right_fist(mut self) -> Self {
        let wrist = self.points[RIGHT_WRIST];
        self.points[RIGHT_INDEX] = wrist;
        self.points[RIGHT_THUMB] = wrist;
        self
    }

    /// Move the shoulders towards (negative) or away from (positive) the camera
    pub fn shoulder_depth(mut self, z: f64) -> Self {
        self.points[LEFT_SHOULDER].z = z;
        self.points[RIGHT_SHOULDER].z = z;
        self
    }

    /// Push every hand point to the given depth
    pub fn hand_depth(mut self, z: f64) -> Self {
        for i in [
            LEFT_WRIST, LEFT_PINKY, LEFT_INDEX, LEFT_THUMB, RIGHT_WRIST, RIGHT_PINKY, RIGHT_INDEX, RIGHT_THUMB,
        ] {
            self.points[i].z = z;
        }
        self
    }

    pub fn build(self) -> PoseLandmarks {
        PoseLandmarks::new(self.points)
    }
}

impl Default for PoseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One call received by a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    LeftJoystick(f64, f64),
    RightJoystick(f64, f64),
    LeftTrigger(f64),
    RightTrigger(f64),
    Press(Button),
    Release(Button),
    ReleaseAll,
}

/// Sink that records every call
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Vec<SinkCall>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Button presses and releases only, in order
    pub fn button_calls(&self) -> Vec<SinkCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, SinkCall::Press(_) | SinkCall::Release(_)))
            .cloned()
            .collect()
    }

    /// Last horizontal stick value sent
    pub fn last_steering(&self) -> Option<f64> {
        self.calls.iter().rev().find_map(|c| match c {
            SinkCall::LeftJoystick(x, _) => Some(*x),
            _ => None,
        })
    }
}

impl InputSink for RecordingSink {
    fn left_joystick(&mut self, x: f64, y: f64) -> Result<()> {
        self.calls.push(SinkCall::LeftJoystick(x, y));
        Ok(())
    }

    fn right_joystick(&mut self, x: f64, y: f64) -> Result<()> {
        self.calls.push(SinkCall::RightJoystick(x, y));
        Ok(())
    }

    fn left_trigger(&mut self, value: f64) -> Result<()> {
        self.calls.push(SinkCall::LeftTrigger(value));
        Ok(())
    }

    fn right_trigger(&mut self, value: f64) -> Result<()> {
        self.calls.push(SinkCall::RightTrigger(value));
        Ok(())
    }

    fn press_button(&mut self, button: Button) -> Result<()> {
        self.calls.push(SinkCall::Press(button));
        Ok(())
    }

    fn release_button(&mut self, button: Button) -> Result<()> {
        self.calls.push(SinkCall::Release(button));
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.calls.push(SinkCall::ReleaseAll);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
