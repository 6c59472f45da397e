//! Body landmark detection.
//!
//! [`PoseDetector`] is chosen once at startup: `Live` wraps an `ONNX` pose
//! landmark model, `Unavailable` records why the model could not be loaded
//! and fails with that reason only when a frame is actually submitted, so
//! the rest of the application stays usable without a model.
//!
//! The model is expected to follow the `BlazePose` landmark layout: an NHWC
//! `[1, 256, 256, 3]` RGB input scaled to `[0, 1]`, a first output holding
//! at least 33 × 5 values (x, y, z in input pixels, visibility logit,
//! presence logit) and an optional second output with a pose presence score.

use crate::{
    config::DetectorConfig,
    constants::{NUM_POSE_LANDMARKS, POSE_MODEL_INPUT_SIZE, POSE_MODEL_VALUES_PER_LANDMARK},
    landmarks::{Landmark, PoseLandmarks},
    utils::safe_cast::usize_to_i32,
    Error, Result,
};
use log::{debug, info, warn};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size, Vec3f, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Anything that turns a camera frame into body landmarks
pub trait LandmarkProvider {
    /// Detect the pose in a BGR frame, `None` when nobody is visible
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails, or if the
    /// provider is unavailable
    fn detect(&mut self, frame: &Mat) -> Result<Option<PoseLandmarks>>;

    /// Release model resources
    fn close(&mut self) {}
}

/// Landmark provider selected at startup
pub enum PoseDetector {
    /// Model loaded and ready
    Live(OnnxPoseModel),
    /// Model could not be loaded
    Unavailable {
        /// Why the model is missing
        reason: String,
    },
}

impl PoseDetector {
    /// Load the configured model, falling back to `Unavailable` on failure
    #[must_use]
    pub fn open(config: &DetectorConfig) -> Self {
        match OnnxPoseModel::new(&config.model_path, config.min_detection_confidence) {
            Ok(model) => Self::Live(model),
            Err(e) => {
                let reason = format!(
                    "pose model {} could not be loaded ({e}); download a BlazePose landmark ONNX model \
                     and point detector.model_path or --model at it",
                    config.model_path.display()
                );
                warn!("Pose detection disabled: {reason}");
                Self::Unavailable { reason }
            }
        }
    }

    /// Whether a model is loaded
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

impl LandmarkProvider for PoseDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Option<PoseLandmarks>> {
        match self {
            Self::Live(model) => model.detect(frame),
            Self::Unavailable { reason } => Err(Error::Unavailable(format!(
                "Pose detector cannot run because {reason}"
            ))),
        }
    }

    fn close(&mut self) {
        if let Self::Live(model) = self {
            model.close();
        }
    }
}

/// `BlazePose`-style landmark model run through `ONNX` Runtime
pub struct OnnxPoseModel {
    session: Option<Session>,
    input_size: i32,
    min_detection_confidence: f32,
}

impl OnnxPoseModel {
    /// Load a pose landmark model
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The model file does not exist or cannot be loaded
    /// - The `ONNX` runtime environment cannot be created
    /// - The model has no inputs or outputs
    pub fn new<P: AsRef<Path>>(model_path: P, min_detection_confidence: f32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(Error::ModelError(format!("model file not found: {}", model_path.display())));
        }
        info!("Initializing pose landmark model: {}", model_path.display());

        let environment = Arc::new(
            Environment::builder()
                .with_name("pose_landmarks")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelError("Model has no inputs".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(Error::ModelOutputError("Model has no outputs".to_string()));
        }

        Ok(Self {
            session: Some(session),
            input_size: POSE_MODEL_INPUT_SIZE,
            min_detection_confidence,
        })
    }

    /// Detect the pose in a BGR frame
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails, or the model
    /// has been closed
    pub fn detect(&mut self, frame: &Mat) -> Result<Option<PoseLandmarks>> {
        let input = self.preprocess(frame)?;
        let (raw, presence) = self.forward(input)?;
        if let Some(score) = presence {
            if score < self.min_detection_confidence {
                debug!("Pose presence {score:.2} below threshold");
                return Ok(None);
            }
        }
        decode_landmarks(&raw, self.input_size).map(Some)
    }

    /// Drop the inference session
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            info!("Pose landmark model released");
        }
    }

    /// Resize, convert to RGB and normalise into an NHWC tensor
    #[allow(clippy::cast_sign_loss)]
    fn preprocess(&self, frame: &Mat) -> Result<Array4<f32>> {
        let size = self.input_size as usize;
        let channels = 3;

        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb_image = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let mut data = vec![0.0f32; size * size * channels];
        for row in 0..size {
            for col in 0..size {
                let pixel = float_image.at_2d::<Vec3f>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                for ch in 0..channels {
                    data[(row * size + col) * channels + ch] = pixel[ch];
                }
            }
        }

        Array4::from_shape_vec((1, size, size, channels), data)
            .map_err(|e| Error::ModelDataFormatError(format!("Failed to create array: {e}")))
    }

    /// Run the model, returning the landmark tensor and the presence score
    fn forward(&self, input: Array4<f32>) -> Result<(Vec<f32>, Option<f32>)> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| Error::Unavailable("pose landmark model has been closed".to_string()))?;

        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(session.allocator(), &cow_array)?;
        let outputs = session.run(vec![input_tensor])?;

        let mut outputs = outputs.into_iter();
        let landmarks_output = outputs
            .next()
            .ok_or_else(|| Error::ModelOutputError("No output from model".to_string()))?;
        let landmarks_tensor = landmarks_output.try_extract::<f32>()?;
        let landmarks_view = landmarks_tensor.view();
        let raw = landmarks_view
            .as_slice()
            .ok_or_else(|| Error::ModelOutputError("Failed to get landmark data".to_string()))?
            .to_vec();

        let presence = match outputs.next() {
            Some(flag_output) => {
                let flag_tensor = flag_output.try_extract::<f32>()?;
                let flag_view = flag_tensor.view();
                flag_view.iter().next().copied()
            }
            None => None,
        };

        Ok((raw, presence))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Convert raw model output into normalised landmarks
///
/// # Errors
///
/// Returns an error if the output holds fewer than 33 landmarks
#[allow(clippy::cast_precision_loss)]
pub fn decode_landmarks(raw: &[f32], input_size: i32) -> Result<PoseLandmarks> {
    let needed = NUM_POSE_LANDMARKS * POSE_MODEL_VALUES_PER_LANDMARK;
    if raw.len() < needed {
        return Err(Error::ModelDataFormatError(format!(
            "Expected at least {needed} landmark values, got {}",
            raw.len()
        )));
    }
    let scale = f64::from(input_size);
    let points: Vec<Landmark> = raw
        .chunks_exact(POSE_MODEL_VALUES_PER_LANDMARK)
        .take(NUM_POSE_LANDMARKS)
        .map(|v| Landmark {
            x: f64::from(v[0]) / scale,
            y: f64::from(v[1]) / scale,
            z: f64::from(v[2]) / scale,
            visibility: f64::from(sigmoid(v[3])),
        })
        .collect();
    PoseLandmarks::from_slice(&points)
}
