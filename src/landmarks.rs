//! Body landmark data produced by the pose model for a single frame.

use crate::{
    constants::{
        LEFT_ELBOW, LEFT_HIP, LEFT_SHOULDER, LEFT_WRIST, NUM_POSE_LANDMARKS, RIGHT_ELBOW, RIGHT_HIP,
        RIGHT_SHOULDER, RIGHT_WRIST,
    },
    Error, Result,
};

/// Upper-body skeleton edges drawn by the overlay (pairs of landmark indices)
pub const UPPER_BODY_CONNECTIONS: [(usize, usize); 8] = [
    (LEFT_SHOULDER, RIGHT_SHOULDER),
    (LEFT_SHOULDER, LEFT_ELBOW),
    (LEFT_ELBOW, LEFT_WRIST),
    (RIGHT_SHOULDER, RIGHT_ELBOW),
    (RIGHT_ELBOW, RIGHT_WRIST),
    (LEFT_SHOULDER, LEFT_HIP),
    (RIGHT_SHOULDER, RIGHT_HIP),
    (LEFT_HIP, RIGHT_HIP),
];

/// A single labelled body keypoint in camera-normalised coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    /// Horizontal position, 0-1 across the frame
    pub x: f64,
    /// Vertical position, 0-1 down the frame
    pub y: f64,
    /// Depth relative to the hips, smaller is closer to the camera
    pub z: f64,
    /// Confidence that the point is visible (0-1)
    pub visibility: f64,
}

impl Landmark {
    /// Create a fully visible landmark
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, visibility: 1.0 }
    }
}

/// The full set of 33 landmarks detected in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct PoseLandmarks {
    points: [Landmark; NUM_POSE_LANDMARKS],
}

impl PoseLandmarks {
    /// Wrap a complete landmark array
    #[must_use]
    pub const fn new(points: [Landmark; NUM_POSE_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Build from a slice, which must contain exactly 33 points
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not 33
    pub fn from_slice(points: &[Landmark]) -> Result<Self> {
        let points: [Landmark; NUM_POSE_LANDMARKS] = points.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Expected {NUM_POSE_LANDMARKS} landmarks, got {}",
                points.len()
            ))
        })?;
        Ok(Self { points })
    }

    /// Landmark by anatomical index, `None` when out of range
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    /// Mean position of the given landmarks, out-of-range indices ignored
    ///
    /// Returns the origin when none of the indices is valid.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self, indices: &[usize]) -> (f64, f64, f64) {
        let (count, sx, sy, sz) = indices
            .iter()
            .filter_map(|&i| self.points.get(i))
            .fold((0usize, 0.0, 0.0, 0.0), |(n, ax, ay, az), p| (n + 1, ax + p.x, ay + p.y, az + p.z));
        if count == 0 {
            return (0.0, 0.0, 0.0);
        }
        let n = count as f64;
        (sx / n, sy / n, sz / n)
    }

    /// Mean visibility of the given landmarks, 0 for an empty set
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_visibility(&self, indices: &[usize]) -> f64 {
        let visible: Vec<f64> = indices
            .iter()
            .filter_map(|&i| self.points.get(i))
            .map(|p| p.visibility)
            .collect();
        if visible.is_empty() {
            0.0
        } else {
            visible.iter().sum::<f64>() / visible.len() as f64
        }
    }
}

impl Default for PoseLandmarks {
    fn default() -> Self {
        Self {
            points: [Landmark::default(); NUM_POSE_LANDMARKS],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::LEFT_HAND_INDICES;

    #[test]
    fn test_from_slice_length() {
        assert!(PoseLandmarks::from_slice(&[Landmark::default(); 33]).is_ok());
        assert!(PoseLandmarks::from_slice(&[Landmark::default(); 32]).is_err());
    }

    #[test]
    fn test_centroid() {
        let mut points = [Landmark::default(); NUM_POSE_LANDMARKS];
        for (k, &i) in LEFT_HAND_INDICES.iter().enumerate() {
            points[i] = Landmark::new(0.1 * k as f64, 0.5, -0.2);
        }
        let lm = PoseLandmarks::new(points);
        let (x, y, z) = lm.centroid(&LEFT_HAND_INDICES);
        assert!((x - 0.15).abs() < 1e-12);
        assert!((y - 0.5).abs() < 1e-12);
        assert!((z + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_ignores_out_of_range_indices() {
        let mut points = [Landmark::default(); NUM_POSE_LANDMARKS];
        points[11] = Landmark::new(0.2, 0.4, 0.0);
        points[12] = Landmark::new(0.4, 0.6, 0.0);
        let lm = PoseLandmarks::new(points);
        let (x, y, _) = lm.centroid(&[11, 12, 99]);
        assert!((x - 0.3).abs() < 1e-12);
        assert!((y - 0.5).abs() < 1e-12);
        assert_eq!(lm.centroid(&[40, 50]), (0.0, 0.0, 0.0));
        assert_eq!(lm.centroid(&[]), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_mean_visibility() {
        let mut points = [Landmark::default(); NUM_POSE_LANDMARKS];
        points[11].visibility = 1.0;
        points[12].visibility = 0.5;
        let lm = PoseLandmarks::new(points);
        assert!((lm.mean_visibility(&[11, 12]) - 0.75).abs() < 1e-12);
        assert_eq!(lm.mean_visibility(&[]), 0.0);
    }

    #[test]
    fn test_connections_in_range() {
        for (a, b) in UPPER_BODY_CONNECTIONS {
            assert!(a < NUM_POSE_LANDMARKS);
            assert!(b < NUM_POSE_LANDMARKS);
        }
    }
}
