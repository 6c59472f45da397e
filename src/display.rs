//! On-screen feedback for the frame loop.

use crate::{
    config::WindowConfig,
    constants::{
        VISUAL_FIST_CIRCLE_COLOR, VISUAL_FIST_CIRCLE_RADIUS, VISUAL_SHOW_CAM_CAPTURE, VISUAL_SHOW_FPS,
        VISUAL_SHOW_POSE_ESTIMATION,
    },
    landmarks::{PoseLandmarks, UPPER_BODY_CONNECTIONS},
    mapping::{ControlFeature, Point2},
    presets::{Preset, Settings},
    utils::{parse_hex_color, safe_cast::f64_to_i32_clamp},
    Result,
};
use log::{debug, info, warn};
use opencv::{
    core::{self, Mat, Point, Rect, Scalar, CV_8UC3},
    highgui::{self, WINDOW_AUTOSIZE},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
};
use std::sync::{Arc, PoisonError, RwLock};

/// Frame shown when the camera delivers nothing
const FALLBACK_SIZE: (i32, i32) = (480, 640);

/// What the user asked for while a frame was on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    /// Keep going
    Continue,
    /// Stop the frame loop
    Quit,
    /// Activate the next preset in name order
    NextPreset,
    /// Activate the previous preset in name order
    PreviousPreset,
}

/// Translate a highgui key code; -1 (no key) and unbound keys continue
#[must_use]
pub fn key_event(key: i32) -> DisplayEvent {
    match key {
        27 => DisplayEvent::Quit,
        k if k == i32::from(b'q') => DisplayEvent::Quit,
        k if k == i32::from(b']') => DisplayEvent::NextPreset,
        k if k == i32::from(b'[') => DisplayEvent::PreviousPreset,
        _ => DisplayEvent::Continue,
    }
}

/// Something that presents a processed frame
pub trait DisplaySink {
    /// Show one frame and report what the user asked for
    ///
    /// # Errors
    ///
    /// Returns an error if drawing or the window system fails
    fn render(
        &mut self,
        frame: &Mat,
        landmarks: Option<&PoseLandmarks>,
        feature: &ControlFeature,
        fps: f64,
    ) -> Result<DisplayEvent>;

    /// Tear the display down
    fn close(&mut self) {}
}

/// Display toggles taken from the active preset's `visual` section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualSettings {
    /// Draw the FPS counter
    pub show_fps: bool,
    /// Draw the camera image, black background otherwise
    pub show_cam_capture: bool,
    /// Draw the upper-body skeleton
    pub show_pose_estimation: bool,
    /// Hand marker radius in pixels, negative for automatic
    pub fist_circle_radius: i32,
    /// Hand marker colour as `(r, g, b)`
    pub fist_circle_color: (u8, u8, u8),
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            show_fps: true,
            show_cam_capture: true,
            show_pose_estimation: true,
            fist_circle_radius: -1,
            fist_circle_color: (255, 255, 255),
        }
    }
}

impl VisualSettings {
    /// Read settings, keeping defaults for missing or malformed entries
    #[must_use]
    pub fn from_settings(visual: &Settings) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, fallback: bool| visual.get(key).and_then(|v| v.as_bool()).unwrap_or(fallback);

        let fist_circle_radius = visual
            .get(VISUAL_FIST_CIRCLE_RADIUS)
            .and_then(|v| v.as_f64())
            .map_or(defaults.fist_circle_radius, |r| f64_to_i32_clamp(r, -1, 500));

        let fist_circle_color = match visual.get(VISUAL_FIST_CIRCLE_COLOR).and_then(|v| v.as_str()) {
            Some(text) => parse_hex_color(text).unwrap_or_else(|e| {
                warn!("{e}; using white");
                defaults.fist_circle_color
            }),
            None => defaults.fist_circle_color,
        };

        Self {
            show_fps: flag(VISUAL_SHOW_FPS, defaults.show_fps),
            show_cam_capture: flag(VISUAL_SHOW_CAM_CAPTURE, defaults.show_cam_capture),
            show_pose_estimation: flag(VISUAL_SHOW_POSE_ESTIMATION, defaults.show_pose_estimation),
            fist_circle_radius,
            fist_circle_color,
        }
    }

    /// Marker radius for a frame of the given width
    #[must_use]
    pub fn circle_radius(&self, frame_width: i32) -> i32 {
        if self.fist_circle_radius >= 0 {
            self.fist_circle_radius
        } else {
            (frame_width / 40).max(4)
        }
    }

    fn circle_color(&self) -> Scalar {
        let (r, g, b) = self.fist_circle_color;
        Scalar::new(f64::from(b), f64::from(g), f64::from(r), 0.0)
    }
}

/// Visual settings shared between the window and the preset callback
pub type SharedVisuals = Arc<RwLock<VisualSettings>>;

/// Preset callback that refreshes shared visual settings
pub fn visual_settings_callback(shared: SharedVisuals) -> impl FnMut(&Preset) + Send + 'static {
    move |preset: &Preset| {
        let settings = VisualSettings::from_settings(&preset.visual);
        debug!("Visual settings from preset '{}': {settings:?}", preset.name);
        *shared.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }
}

/// Convert a normalised position to a pixel inside a `width` x `height` frame
#[must_use]
pub fn to_pixel(x: f64, y: f64, width: i32, height: i32) -> Point {
    Point::new(
        f64_to_i32_clamp(x * f64::from(width), 0, width.saturating_sub(1)),
        f64_to_i32_clamp(y * f64::from(height), 0, height.saturating_sub(1)),
    )
}

/// `OpenCV` window drawing the camera frame with control overlays
pub struct OverlayWindow {
    window_name: String,
    caption: String,
    show_caption_fps: bool,
    mirror: bool,
    visuals: SharedVisuals,
    open: bool,
}

impl OverlayWindow {
    /// Create the window
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be created
    pub fn new(config: &WindowConfig, mirror: bool, visuals: SharedVisuals) -> Result<Self> {
        let window_name = config.caption.clone();
        highgui::named_window(&window_name, WINDOW_AUTOSIZE)?;
        info!("Overlay window '{window_name}' opened");
        Ok(Self {
            window_name,
            caption: config.caption.clone(),
            show_caption_fps: config.show_caption_fps,
            mirror,
            visuals,
            open: true,
        })
    }

    fn visuals(&self) -> VisualSettings {
        *self.visuals.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Camera frame (mirrored if configured) or a black canvas
    fn canvas(&self, frame: &Mat, visuals: &VisualSettings) -> Result<Mat> {
        let (rows, cols) = if frame.empty() {
            FALLBACK_SIZE
        } else {
            (frame.rows(), frame.cols())
        };
        if !visuals.show_cam_capture || frame.empty() {
            return Ok(Mat::zeros(rows, cols, CV_8UC3)?.to_mat()?);
        }
        if self.mirror {
            let mut flipped = Mat::default();
            core::flip(frame, &mut flipped, 1)?;
            Ok(flipped)
        } else {
            Ok(frame.try_clone()?)
        }
    }

    /// Landmarks come in camera space, drawn mirrored when the frame is
    fn landmark_x(&self, x: f64) -> f64 {
        if self.mirror {
            1.0 - x
        } else {
            x
        }
    }

    /// Feature points are already mirrored
    fn feature_point(&self, p: Point2, width: i32, height: i32) -> Point {
        let x = if self.mirror { p.x } else { 1.0 - p.x };
        to_pixel(x, p.y, width, height)
    }

    fn draw_skeleton(&self, canvas: &mut Mat, landmarks: &PoseLandmarks) -> Result<()> {
        let (w, h) = (canvas.cols(), canvas.rows());
        let color = Scalar::new(0.0, 255.0, 0.0, 0.0);
        let pixel = |i: usize| {
            landmarks
                .get(i)
                .map(|lm| to_pixel(self.landmark_x(lm.x), lm.y, w, h))
        };
        for &(a, b) in &UPPER_BODY_CONNECTIONS {
            if let (Some(pa), Some(pb)) = (pixel(a), pixel(b)) {
                imgproc::line(canvas, pa, pb, color, 2, LINE_8, 0)?;
            }
        }
        for &(a, b) in &UPPER_BODY_CONNECTIONS {
            for p in [pixel(a), pixel(b)].into_iter().flatten() {
                imgproc::circle(canvas, p, 3, Scalar::new(0.0, 0.0, 255.0, 0.0), -1, LINE_8, 0)?;
            }
        }
        Ok(())
    }

    fn draw_hands(&self, canvas: &mut Mat, feature: &ControlFeature, visuals: &VisualSettings) -> Result<()> {
        let (w, h) = (canvas.cols(), canvas.rows());
        let radius = visuals.circle_radius(w);
        let color = visuals.circle_color();
        for (center, fist) in [
            (feature.hand_left_center, feature.left_fist),
            (feature.hand_right_center, feature.right_fist),
        ] {
            // Filled when the hand is closed
            let thickness = if fist { -1 } else { 2 };
            imgproc::circle(canvas, self.feature_point(center, w, h), radius, color, thickness, LINE_8, 0)?;
        }
        let mid = self.feature_point(feature.hands_center, w, h);
        imgproc::circle(canvas, mid, 3, color, -1, LINE_8, 0)?;
        Ok(())
    }

    fn draw_controls(canvas: &mut Mat, feature: &ControlFeature) -> Result<()> {
        let (w, h) = (canvas.cols(), canvas.rows());
        let white = Scalar::new(255.0, 255.0, 255.0, 0.0);

        // Steering bar along the bottom, growing from the centre
        let bar_y = h - 30;
        let half = w / 4;
        let center_x = w / 2;
        imgproc::rectangle(canvas, Rect::new(center_x - half, bar_y, half * 2, 12), white, 1, LINE_8, 0)?;
        let steer = feature.right_pressure - feature.left_pressure;
        let extent = f64_to_i32_clamp(steer * f64::from(half), -half, half);
        if extent != 0 {
            let x0 = center_x.min(center_x + extent);
            imgproc::rectangle(
                canvas,
                Rect::new(x0, bar_y, extent.abs(), 12),
                Scalar::new(255.0, 200.0, 0.0, 0.0),
                -1,
                LINE_8,
                0,
            )?;
        }

        // Throttle and brake as vertical bars on the right
        let bar_h = h / 3;
        let top = h - bar_h - 50;
        for (offset, value, color) in [
            (60, feature.throttle_pressure, Scalar::new(0.0, 200.0, 0.0, 0.0)),
            (35, feature.brake_pressure, Scalar::new(0.0, 0.0, 220.0, 0.0)),
        ] {
            let x = w - offset;
            imgproc::rectangle(canvas, Rect::new(x, top, 15, bar_h), white, 1, LINE_8, 0)?;
            let fill = f64_to_i32_clamp(value * f64::from(bar_h), 0, bar_h);
            if fill > 0 {
                imgproc::rectangle(canvas, Rect::new(x, top + bar_h - fill, 15, fill), color, -1, LINE_8, 0)?;
            }
        }

        let mut label_y = 30;
        for (active, label, color) in [
            (feature.handbrake_active, "HANDBRAKE", Scalar::new(0.0, 0.0, 255.0, 0.0)),
            (feature.menu_active, "MENU", Scalar::new(0.0, 255.0, 255.0, 0.0)),
        ] {
            if active {
                imgproc::put_text(
                    canvas,
                    label,
                    Point::new(w - 180, label_y),
                    FONT_HERSHEY_SIMPLEX,
                    0.7,
                    color,
                    2,
                    LINE_8,
                    false,
                )?;
                label_y += 30;
            }
        }
        Ok(())
    }
}

impl DisplaySink for OverlayWindow {
    fn render(
        &mut self,
        frame: &Mat,
        landmarks: Option<&PoseLandmarks>,
        feature: &ControlFeature,
        fps: f64,
    ) -> Result<DisplayEvent> {
        let visuals = self.visuals();
        let mut canvas = self.canvas(frame, &visuals)?;

        if visuals.show_pose_estimation {
            if let Some(landmarks) = landmarks {
                self.draw_skeleton(&mut canvas, landmarks)?;
            }
        }
        self.draw_hands(&mut canvas, feature, &visuals)?;
        Self::draw_controls(&mut canvas, feature)?;

        if visuals.show_fps {
            imgproc::put_text(
                &mut canvas,
                &format!("FPS: {fps:.1}"),
                Point::new(10, 30),
                FONT_HERSHEY_SIMPLEX,
                0.7,
                Scalar::new(0.0, 255.0, 0.0, 0.0),
                2,
                LINE_8,
                false,
            )?;
        }
        imgproc::put_text(
            &mut canvas,
            &format!("Steer: {:.1} deg", feature.steer_angle),
            Point::new(10, 60),
            FONT_HERSHEY_SIMPLEX,
            0.6,
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            1,
            LINE_8,
            false,
        )?;

        highgui::imshow(&self.window_name, &canvas)?;
        if self.show_caption_fps {
            highgui::set_window_title(&self.window_name, &format!("{}  FPS: {fps:.0}", self.caption))?;
        }

        let event = key_event(highgui::wait_key(1)?);
        if event == DisplayEvent::Quit {
            info!("Exit requested by user");
        }
        Ok(event)
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(e) = highgui::destroy_window(&self.window_name) {
            warn!("Failed to close window '{}': {e}", self.window_name);
        }
    }
}

impl Drop for OverlayWindow {
    fn drop(&mut self) {
        self.close();
    }
}

/// Display that shows nothing and never asks to quit
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    frames: u64,
}

impl HeadlessDisplay {
    /// Create a headless display
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: 0 }
    }

    /// Frames rendered so far
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }
}

impl DisplaySink for HeadlessDisplay {
    fn render(
        &mut self,
        _frame: &Mat,
        landmarks: Option<&PoseLandmarks>,
        feature: &ControlFeature,
        fps: f64,
    ) -> Result<DisplayEvent> {
        self.frames += 1;
        if self.frames % 100 == 0 {
            info!(
                "frame {} ({fps:.1} fps): pose {}, steer {:.1}, throttle {:.2}, brake {:.2}",
                self.frames,
                if landmarks.is_some() { "tracked" } else { "lost" },
                feature.steer_angle,
                feature.throttle_pressure,
                feature.brake_pressure
            );
        }
        Ok(DisplayEvent::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn test_visual_settings_from_default_preset() {
        let settings = VisualSettings::from_settings(&Preset::default().visual);
        assert_eq!(settings, VisualSettings::default());
    }

    #[test]
    fn test_visual_settings_overrides_and_bad_colour() {
        let mut visual = Preset::default_visual();
        visual.insert(VISUAL_SHOW_FPS.to_string(), ParamValue::Bool(false));
        visual.insert(VISUAL_FIST_CIRCLE_RADIUS.to_string(), ParamValue::Int(12));
        visual.insert(VISUAL_FIST_CIRCLE_COLOR.to_string(), ParamValue::from("not-a-colour"));
        let settings = VisualSettings::from_settings(&visual);
        assert!(!settings.show_fps);
        assert_eq!(settings.fist_circle_radius, 12);
        assert_eq!(settings.fist_circle_color, (255, 255, 255));
    }

    #[test]
    fn test_circle_radius_auto() {
        let settings = VisualSettings::default();
        assert_eq!(settings.circle_radius(640), 16);
        assert_eq!(settings.circle_radius(80), 4);
        let fixed = VisualSettings {
            fist_circle_radius: 9,
            ..VisualSettings::default()
        };
        assert_eq!(fixed.circle_radius(640), 9);
    }

    #[test]
    fn test_to_pixel_clamps_to_frame() {
        assert_eq!(to_pixel(0.5, 0.5, 640, 480), Point::new(320, 240));
        assert_eq!(to_pixel(1.5, -0.2, 640, 480), Point::new(639, 0));
    }

    #[test]
    fn test_visual_callback_updates_shared_settings() {
        let shared: SharedVisuals = Arc::new(RwLock::new(VisualSettings::default()));
        let mut callback = visual_settings_callback(Arc::clone(&shared));
        let mut preset = Preset::named("dark");
        preset
            .visual
            .insert(VISUAL_SHOW_CAM_CAPTURE.to_string(), ParamValue::Bool(false));
        callback(&preset);
        assert!(!shared.read().unwrap().show_cam_capture);
    }

    #[test]
    fn test_key_event() {
        assert_eq!(key_event(-1), DisplayEvent::Continue);
        assert_eq!(key_event(27), DisplayEvent::Quit);
        assert_eq!(key_event(i32::from(b'q')), DisplayEvent::Quit);
        assert_eq!(key_event(i32::from(b']')), DisplayEvent::NextPreset);
        assert_eq!(key_event(i32::from(b'[')), DisplayEvent::PreviousPreset);
        assert_eq!(key_event(i32::from(b'x')), DisplayEvent::Continue);
    }

    #[test]
    fn test_headless_display_never_quits() {
        let mut display = HeadlessDisplay::new();
        let frame = Mat::default();
        for _ in 0..3 {
            let event = display.render(&frame, None, &ControlFeature::default(), 30.0).unwrap();
            assert_eq!(event, DisplayEvent::Continue);
        }
        assert_eq!(display.frames(), 3);
    }
}
