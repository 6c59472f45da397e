//! Small helpers shared by the display and the frame loop.

pub mod safe_cast;

use crate::{Error, Result};
use std::time::Duration;

/// Frame-rate estimate averaged over a fixed number of frames
///
/// The value is only refreshed once every `accum_frames` ticks so the
/// caption does not flicker.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    accum_target: u32,
    accum_count: u32,
    accum_time: Duration,
    smoothed: f64,
}

impl FpsCounter {
    /// Create a counter refreshing every `accum_frames` frames
    #[must_use]
    pub fn new(accum_frames: u32) -> Self {
        Self {
            accum_target: accum_frames.max(1),
            accum_count: 0,
            accum_time: Duration::ZERO,
            smoothed: 0.0,
        }
    }

    /// Record one frame that took `delta`, returning the smoothed rate
    pub fn tick(&mut self, delta: Duration) -> f64 {
        self.accum_count += 1;
        self.accum_time += delta;
        if self.accum_count >= self.accum_target {
            let secs = self.accum_time.as_secs_f64();
            if secs > 0.0 {
                self.smoothed = f64::from(self.accum_count) / secs;
            }
            self.accum_count = 0;
            self.accum_time = Duration::ZERO;
        }
        self.smoothed
    }

    /// Last smoothed rate, 0 before the first refresh
    #[must_use]
    pub const fn fps(&self) -> f64 {
        self.smoothed
    }
}

/// Parse a `#rrggbb` colour into `(r, g, b)`
///
/// # Errors
///
/// Returns an error if the string is not six hex digits with an optional
/// leading `#`
pub fn parse_hex_color(text: &str) -> Result<(u8, u8, u8)> {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidInput(format!("Invalid colour '{text}', expected #rrggbb")));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|e| Error::InvalidInput(format!("Invalid colour '{text}': {e}")))
    };
    Ok((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_counter_refreshes_after_accumulation() {
        let mut counter = FpsCounter::new(4);
        for _ in 0..3 {
            assert_eq!(counter.tick(Duration::from_millis(50)), 0.0);
        }
        let fps = counter.tick(Duration::from_millis(50));
        assert!((fps - 20.0).abs() < 1e-9);
        assert!((counter.fps() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_fps_counter_zero_frames_clamped() {
        let mut counter = FpsCounter::new(0);
        let fps = counter.tick(Duration::from_millis(100));
        assert!((fps - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ffffff").unwrap(), (255, 255, 255));
        assert_eq!(parse_hex_color("00ff80").unwrap(), (0, 255, 128));
        assert!(parse_hex_color("#fff").is_err());
        assert!(parse_hex_color("#gggggg").is_err());
    }
}
