use std::time::Instant;

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct Frame {
    /// Packed RGB8 pixels. Empty for frames replayed from a trace.
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
    pub sequence: u64,
}

impl Frame {
    pub fn empty(sequence: u64, timestamp: Instant) -> Self {
        Self {
            rgb: Vec::new(),
            width: 0,
            height: 0,
            timestamp,
            sequence,
        }
    }
}

/// A point in normalized image coordinates, nominally in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn scaled(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k)
    }
}

/// Anatomical ids of the 21-point hand landmark model, in model output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

pub const LANDMARK_COUNT: usize = 21;

impl HandLandmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The three landmarks the pinch decision reads from a detected hand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandLandmarks {
    pub wrist: Point2,
    pub thumb_tip: Point2,
    pub index_finger_tip: Point2,
}

impl HandLandmarks {
    pub fn new(wrist: Point2, thumb_tip: Point2, index_finger_tip: Point2) -> Self {
        Self {
            wrist,
            thumb_tip,
            index_finger_tip,
        }
    }

    /// Picks the needed landmarks out of a full model output.
    pub fn from_points(points: &[Point2]) -> Result<Self> {
        if points.len() < LANDMARK_COUNT {
            return Err(Error::Landmarks(format!(
                "expected {LANDMARK_COUNT} points, got {}",
                points.len()
            )));
        }

        Ok(Self {
            wrist: points[HandLandmark::Wrist.index()],
            thumb_tip: points[HandLandmark::ThumbTip.index()],
            index_finger_tip: points[HandLandmark::IndexFingerTip.index()],
        })
    }

    pub fn scaled(self, k: f32) -> Self {
        Self {
            wrist: self.wrist.scaled(k),
            thumb_tip: self.thumb_tip.scaled(k),
            index_finger_tip: self.index_finger_tip.scaled(k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_reads_model_indices() {
        let points: Vec<Point2> = (0..LANDMARK_COUNT)
            .map(|i| Point2::new(i as f32, 0.0))
            .collect();
        let hand = HandLandmarks::from_points(&points).unwrap();

        assert_eq!(hand.wrist.x, 0.0);
        assert_eq!(hand.thumb_tip.x, 4.0);
        assert_eq!(hand.index_finger_tip.x, 8.0);
    }

    #[test]
    fn from_points_rejects_short_output() {
        let points = vec![Point2::default(); 9];
        assert!(matches!(
            HandLandmarks::from_points(&points),
            Err(Error::Landmarks(_))
        ));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(0.3, 0.4);
        assert!((a.distance(b) - 0.5).abs() < 1e-6);
    }
}
