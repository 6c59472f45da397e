//! Constants used throughout the application

/// Number of body landmarks produced by the pose model
pub const NUM_POSE_LANDMARKS: usize = 33;

/// Values emitted per landmark by the pose model (x, y, z, visibility, presence)
pub const POSE_MODEL_VALUES_PER_LANDMARK: usize = 5;

/// Square input resolution of the pose landmark model
pub const POSE_MODEL_INPUT_SIZE: i32 = 256;

/// Landmark indices (`MediaPipe` Pose numbering)
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_PINKY: usize = 17;
pub const RIGHT_PINKY: usize = 18;
pub const LEFT_INDEX: usize = 19;
pub const RIGHT_INDEX: usize = 20;
pub const LEFT_THUMB: usize = 21;
pub const RIGHT_THUMB: usize = 22;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;

/// Landmarks averaged into each hand centre
pub const LEFT_HAND_INDICES: [usize; 4] = [LEFT_WRIST, LEFT_PINKY, LEFT_INDEX, LEFT_THUMB];
pub const RIGHT_HAND_INDICES: [usize; 4] = [RIGHT_WRIST, RIGHT_PINKY, RIGHT_INDEX, RIGHT_THUMB];

/// Fingertips used for fist detection
pub const LEFT_FINGERTIPS: [usize; 2] = [LEFT_INDEX, LEFT_THUMB];
pub const RIGHT_FINGERTIPS: [usize; 2] = [RIGHT_INDEX, RIGHT_THUMB];

/// Torso landmarks
pub const SHOULDER_INDICES: [usize; 2] = [LEFT_SHOULDER, RIGHT_SHOULDER];
pub const HIP_INDICES: [usize; 2] = [LEFT_HIP, RIGHT_HIP];

/// Name of the built-in preset; never written to disk
pub const DEFAULT_PRESET_NAME: &str = "default";

/// File extension of preset files
pub const PRESET_FILE_EXTENSION: &str = "json";

/// Mapping parameter names (shared by presets and the parameter store)
pub const PARAM_MAX_PITCH: &str = "max_pitch";
pub const PARAM_FIST_THRESH: &str = "fist_thresh";
pub const PARAM_BEHIND_THRESH: &str = "behind_thresh";
pub const PARAM_JOYSTICK_DEADZONE: &str = "joystick_deadzone";
pub const PARAM_STEERING_SCALE: &str = "steering_scale";
pub const PARAM_STEERING_SAFE_ANGLE: &str = "steering_safe_angle";
pub const PARAM_STEERING_LEFT_BORDER: &str = "steering_left_border_angle";
pub const PARAM_STEERING_RIGHT_BORDER: &str = "steering_right_border_angle";

/// Visual setting names
pub const VISUAL_SHOW_FPS: &str = "show_fps";
pub const VISUAL_SHOW_CAM_CAPTURE: &str = "show_cam_capture";
pub const VISUAL_SHOW_POSE_ESTIMATION: &str = "show_pose_estimation";
pub const VISUAL_FIST_CIRCLE_RADIUS: &str = "fist_center_circle_radius";
pub const VISUAL_FIST_CIRCLE_COLOR: &str = "fist_center_circle_color";

/// Default mapping values
pub const DEFAULT_MAX_PITCH: f64 = 0.4;
pub const DEFAULT_FIST_THRESH: f64 = 0.06;
pub const DEFAULT_BEHIND_THRESH: f64 = 0.08;
pub const DEFAULT_JOYSTICK_DEADZONE: f64 = 0.02;
pub const DEFAULT_STEERING_SCALE: f64 = 1.0;
pub const DEFAULT_STEERING_SAFE_ANGLE: f64 = 7.0;
pub const DEFAULT_STEERING_BORDER_ANGLE: f64 = 45.0;

/// Default frames per second assumption
pub const DEFAULT_FPS: u32 = 30;

/// Full-scale value of virtual gamepad sticks
pub const GAMEPAD_AXIS_MAX: i32 = 32767;

/// Full-scale value of virtual gamepad triggers
pub const GAMEPAD_TRIGGER_MAX: i32 = 255;

