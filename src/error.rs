//! Error types for the pose-to-controller bridge.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime inference failed
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A single preset file could not be parsed
    #[error("Failed to parse preset {}: {source}", path.display())]
    PresetParse {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying parser error
        source: serde_json::Error,
    },

    /// Parameter store misuse (duplicate name, unknown name)
    #[error("Parameter error: {0}")]
    ParamError(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model loading or inference error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Model output processing error
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// Model data shape or format error
    #[error("Model data format error: {0}")]
    ModelDataFormatError(String),

    /// Virtual controller or keyboard injection failed
    #[error("Input sink error: {0}")]
    InputSink(String),

    /// `X11` window system operation failed
    #[error("X11 error: {0}")]
    X11(String),

    /// A capability was requested that could not be initialised at startup
    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Application-specific error type (alias for main Error type)
pub type AppError = Error;

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
