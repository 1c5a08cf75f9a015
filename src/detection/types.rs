use crate::capture::Frame;
use crate::pipeline::Epoch;
use std::fmt;
use thiserror::Error;

/// Landmarks per hand, in the fixed wrist-first topology
pub const LANDMARK_COUNT: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn label(self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A point on a tracked hand.
///
/// `x` and `y` are normalized to [0, 1] relative to the frame width and
/// height. `z` is depth relative to the wrist, 0.0 when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Pixel position on a surface of the given size
    pub fn to_pixels(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    pub handedness: Handedness,
    /// Detector confidence that this is a hand, 0.0-1.0
    pub score: f32,
    pub landmarks: Vec<Landmark>,
}

impl HandObservation {
    pub fn new(handedness: Handedness, landmarks: Vec<Landmark>) -> Self {
        Self {
            handedness,
            score: 1.0,
            landmarks,
        }
    }

    /// Whether the observation carries exactly one landmark per joint
    pub fn is_well_formed(&self) -> bool {
        self.landmarks.len() == LANDMARK_COUNT
    }

    pub fn wrist(&self) -> Option<&Landmark> {
        self.landmarks.first()
    }
}

/// Output of one detector invocation, bundled with the frame it was computed from
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub image: Frame,
    pub hands: Vec<HandObservation>,
}

/// Construction-time detector configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOptions {
    /// Upper bound on simultaneously tracked hands
    pub max_hands: usize,
    /// 0 = lite model, 1 = full model
    pub model_complexity: u8,
    /// Candidates below this score are discarded
    pub min_detection_confidence: f32,
    /// A tracked hand is dropped once its score falls below this
    pub min_tracking_confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_hands: 2,
            model_complexity: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
        }
    }
}

impl DetectorOptions {
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.max_hands == 0 {
            return Err(DetectorError::InvalidOptions(
                "max_hands must be at least 1".to_string(),
            ));
        }
        if self.model_complexity > 1 {
            return Err(DetectorError::InvalidOptions(format!(
                "model_complexity must be 0 or 1, got {}",
                self.model_complexity
            )));
        }
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectorError::InvalidOptions(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector is closed")]
    Closed,

    #[error("invalid detector options: {0}")]
    InvalidOptions(String),

    #[error("failed to load hand model: {0}")]
    Load(String),

    #[error("hand inference failed: {0}")]
    Inference(String),
}

/// Identifies one submission: the session it belongs to and its order within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub epoch: Epoch,
    pub sequence: u64,
}

/// A frame handed to the detector
#[derive(Debug)]
pub struct DetectionRequest {
    pub ticket: Ticket,
    pub frame: Frame,
}

/// The detector's answer to one request
#[derive(Debug)]
pub struct Completion {
    pub ticket: Ticket,
    pub outcome: Result<DetectionResult, DetectorError>,
}

/// Trait for blocking hand landmark models
/// Allows swapping between backends (ONNX, passthrough, test fakes)
pub trait HandLandmarker: Send {
    /// Find hands in a frame
    ///
    /// # Returns
    /// * Observations in detector order, landmarks normalized to the frame
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>, DetectorError>;

    /// Forget any tracking state carried between frames
    fn reset(&mut self) {
        // Default implementation: no-op for stateless models
    }
}

/// Passthrough landmarker used when no model is configured
pub struct NoopLandmarker;

impl HandLandmarker for NoopLandmarker {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<HandObservation>, DetectorError> {
        Ok(Vec::new())
    }
}
