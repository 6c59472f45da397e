//! Main application module: the capture → detect → map → dispatch → display loop.

use crate::{
    config::{AppConfig, InputConfig, SinkKind},
    constants::{HIP_INDICES, SHOULDER_INDICES},
    display::{visual_settings_callback, DisplayEvent, DisplaySink, HeadlessDisplay, OverlayWindow, SharedVisuals, VisualSettings},
    error::Result,
    gamepad::VirtualGamepad,
    input_sink::{InputSink, NullSink, UnavailableSink},
    keyboard::{KeyboardEmulator, X11KeyEmitter},
    landmarks::PoseLandmarks,
    mapping::PoseControlMapper,
    params::ParamStore,
    pose_detection::{LandmarkProvider, PoseDetector},
    presets::PresetManager,
    tuning::TuningPanel,
    utils::{safe_cast::u32_to_i32, FpsCounter},
};
use log::{debug, error, info, warn};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Consecutive failed reads after which the camera is considered gone
const MAX_MISSED_FRAMES: u32 = 100;

/// Title of the trackbar window
pub const TUNING_WINDOW: &str = "pose-drive tuning";

/// Open the configured input sink
///
/// A sink that cannot be opened is replaced by an [`UnavailableSink`]
/// carrying the reason, so the rest of the loop keeps running.
#[must_use]
pub fn open_sink(config: &InputConfig) -> Box<dyn InputSink> {
    match config.sink {
        SinkKind::None => {
            info!("Input sink disabled, control output is discarded");
            Box::new(NullSink)
        }
        SinkKind::Gamepad => match VirtualGamepad::new() {
            Ok(pad) => Box::new(pad),
            Err(e) => {
                let reason = format!("the virtual gamepad could not be created ({e}); check write access to /dev/uinput");
                warn!("Gamepad output disabled: {reason}");
                Box::new(UnavailableSink::new(reason))
            }
        },
        SinkKind::Keyboard => match X11KeyEmitter::new() {
            Ok(emitter) => Box::new(KeyboardEmulator::new(
                emitter,
                config.keys.clone(),
                config.axis_threshold,
                config.trigger_threshold,
            )),
            Err(e) => {
                let reason = format!("keyboard emulation needs an X11 display with XTest ({e})");
                warn!("Keyboard output disabled: {reason}");
                Box::new(UnavailableSink::new(reason))
            }
        },
    }
}

/// Treat poorly visible poses as no detection
#[must_use]
pub fn filter_visibility(landmarks: Option<PoseLandmarks>, min_visibility: f64) -> Option<PoseLandmarks> {
    landmarks.filter(|lm| {
        min_visibility <= 0.0
            || lm.mean_visibility(&[SHOULDER_INDICES[0], SHOULDER_INDICES[1], HIP_INDICES[0], HIP_INDICES[1]])
                >= min_visibility
    })
}

/// Log the first occurrence of a repeating failure as a warning, the rest at debug level
#[derive(Debug, Default)]
struct WarnOnce {
    warned: bool,
}

impl WarnOnce {
    fn report(&mut self, what: &str, e: &crate::Error) {
        if self.warned {
            debug!("{what}: {e}");
        } else {
            warn!("{what}: {e}");
            self.warned = true;
        }
    }
}

/// Main application struct
///
/// Owns every resource of a session. Dropping it releases the input sink,
/// the model, the windows and the camera, in that order, even if the loop
/// ended with an error.
pub struct PoseDriveApp {
    config: AppConfig,
    capture: VideoCapture,
    detector: PoseDetector,
    params: ParamStore,
    mapper: PoseControlMapper,
    presets: PresetManager,
    sink: Box<dyn InputSink>,
    display: Box<dyn DisplaySink>,
    tuning: Option<TuningPanel>,
    fps: FpsCounter,
    detect_failures: WarnOnce,
    sink_failures: WarnOnce,
    shut_down: bool,
}

impl PoseDriveApp {
    /// Create the application from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the camera cannot be opened, the parameters cannot
    /// be registered or a requested window cannot be created
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing pose-drive");

        let capture = Self::open_camera(&config)?;

        let params = ParamStore::new();
        let mapper = PoseControlMapper::new(params.clone())?;

        let visuals: SharedVisuals = Arc::new(RwLock::new(VisualSettings::default()));
        let mut presets = PresetManager::new(&config.preferences.presets_dir, &config.preferences.default_preset);
        presets.register_update_callback(mapper.preset_callback());
        presets.register_update_callback(visual_settings_callback(Arc::clone(&visuals)));
        match presets.load_presets() {
            Ok(report) => {
                for (path, e) in &report.failed {
                    warn!("Preset {} ignored: {e}", path.display());
                }
            }
            Err(e) => {
                warn!(
                    "Cannot read presets from {}: {e}; using built-in defaults",
                    presets.presets_dir().display()
                );
                presets.apply_default();
            }
        }

        let detector = PoseDetector::open(&config.detector);
        let sink = open_sink(&config.input);
        info!("Control output: {}", sink.name());

        let display: Box<dyn DisplaySink> = if config.window.enabled {
            Box::new(OverlayWindow::new(&config.window, config.camera.mirror, visuals)?)
        } else {
            info!("Running headless");
            Box::new(HeadlessDisplay::new())
        };

        let tuning = if config.tuning.enabled {
            match TuningPanel::new(params.clone(), TUNING_WINDOW) {
                Ok(panel) => Some(panel),
                Err(e) => {
                    warn!("Tuning panel unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let fps = FpsCounter::new(config.window.smooth_fps_accum_frames);

        Ok(Self {
            config,
            capture,
            detector,
            params,
            mapper,
            presets,
            sink,
            display,
            tuning,
            fps,
            detect_failures: WarnOnce::default(),
            sink_failures: WarnOnce::default(),
            shut_down: false,
        })
    }

    fn open_camera(config: &AppConfig) -> Result<VideoCapture> {
        info!("Opening camera {}", config.camera.index);
        let mut capture = VideoCapture::new(config.camera.index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(crate::Error::InvalidInput(format!(
                "Cannot open camera {}",
                config.camera.index
            )));
        }

        // Low latency over smoothness
        capture.set(CAP_PROP_BUFFERSIZE, 1.0)?;
        capture.set(CAP_PROP_FRAME_WIDTH, f64::from(u32_to_i32(config.camera.width)?))?;
        capture.set(CAP_PROP_FRAME_HEIGHT, f64::from(u32_to_i32(config.camera.height)?))?;
        Ok(capture)
    }

    /// Parameter store shared with the mapper and the tuning panel
    #[must_use]
    pub const fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Run the frame loop until the user quits or the camera is lost
    ///
    /// # Errors
    ///
    /// Returns an error if the camera or the display fails
    pub fn run(&mut self) -> Result<()> {
        info!("Starting main application loop");

        let frame_interval = Duration::from_secs_f64(1.0 / f64::from(self.config.camera.fps.max(1)));
        let mut missed = 0u32;
        let mut last_frame = Instant::now();

        loop {
            let started = Instant::now();

            let mut frame = Mat::default();
            if !self.capture.read(&mut frame)? || frame.empty() {
                missed += 1;
                if missed >= MAX_MISSED_FRAMES {
                    warn!("Camera delivered no frames {missed} times in a row, stopping");
                    break;
                }
                warn!("Failed to read frame, retrying...");
                std::thread::sleep(frame_interval);
                continue;
            }
            missed = 0;

            let landmarks = match self.detector.detect(&frame) {
                Ok(found) => filter_visibility(found, self.config.detector.min_visibility),
                Err(e) => {
                    self.detect_failures.report("Pose detection failed", &e);
                    None
                }
            };

            let feature = *self.mapper.extract_features(landmarks.as_ref());
            if let Err(e) = self.mapper.trigger_control(self.sink.as_mut()) {
                self.sink_failures.report("Control output failed", &e);
            }

            let fps = self.fps.tick(last_frame.elapsed());
            last_frame = Instant::now();

            match self.display.render(&frame, landmarks.as_ref(), &feature, fps)? {
                DisplayEvent::Quit => break,
                DisplayEvent::NextPreset => self.cycle_preset(true),
                DisplayEvent::PreviousPreset => self.cycle_preset(false),
                DisplayEvent::Continue => {}
            }

            // The window paces itself through wait_key
            if let Some(remaining) = frame_interval.checked_sub(started.elapsed()) {
                if !self.config.window.enabled {
                    std::thread::sleep(remaining);
                }
            }
        }

        info!("Application shutting down");
        Ok(())
    }

    /// Swap to the neighbouring preset without touching the capture
    fn cycle_preset(&mut self, forward: bool) {
        let Some(name) = self.presets.cycle(forward) else {
            warn!("No preset to switch to");
            return;
        };
        info!("Active preset: {name}");
        if let Some(panel) = &self.tuning {
            if let Err(e) = panel.refresh() {
                warn!("Failed to move tuning trackbars to the new preset: {e}");
            }
        }
    }

    /// Release every resource; errors are logged, never returned
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.config.preferences.save_preset_on_close {
            let copied = self.presets.capture_params(&self.params);
            debug!("Captured {copied} live values into the active preset");
            match self.presets.save_active_in_place() {
                Ok(Some(path)) => info!("Saved active preset to {}", path.display()),
                Ok(None) => info!("Active preset is the built-in default, not saved"),
                Err(e) => error!("Failed to save active preset: {e}"),
            }
        }

        self.mapper.reset();
        if let Err(e) = self.sink.release() {
            error!("Failed to release {} sink: {e}", self.sink.name());
        }
        self.detector.close();
        if let Some(panel) = &mut self.tuning {
            panel.close();
        }
        self.display.close();
        if let Err(e) = self.capture.release() {
            error!("Failed to release camera: {e}");
        }
        info!("Shutdown complete");
    }
}

impl Drop for PoseDriveApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}
