use super::preprocess::{Preprocessor, Roi};
use super::types::{
    DetectorError, DetectorOptions, HandLandmarker, HandObservation, Handedness, Landmark,
    LANDMARK_COUNT,
};
use crate::capture::Frame;
use ndarray::Array4;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};

/// Side of the square model input
const INPUT_SIZE: u32 = 224;

/// Next search region relative to the last landmark bounding box
const ROI_SCALE: f32 = 2.0;

/// Model file for a complexity level inside a model directory
pub fn locate_model<P: AsRef<Path>>(model_dir: P, model_complexity: u8) -> PathBuf {
    let file = match model_complexity {
        0 => "hand_landmark_lite.onnx",
        _ => "hand_landmark_full.onnx",
    };
    model_dir.as_ref().join(file)
}

/// Raw values read back from one inference
struct ModelOutput {
    landmarks: Vec<f32>,
    presence: f32,
    handedness: f32,
}

/// MediaPipe-style hand landmark model
///
/// The model sees one region of interest per frame. With nothing tracked
/// that region is the whole frame; once a hand is found, the next frame is
/// cropped around its landmarks until the presence score drops.
pub struct OnnxHandLandmarker {
    session: Session,
    preprocessor: Preprocessor,
    options: DetectorOptions,

    // Region carried over from the previous frame while a hand is tracked
    tracked: Option<Roi>,
}

impl OnnxHandLandmarker {
    /// Create a landmarker from an ONNX file
    ///
    /// # Expected model layout
    /// - Input: [1, 224, 224, 3] float RGB in [0, 1]
    /// - Output 0: 21 x (x, y, z) in input pixels
    /// - Output 1: hand presence score
    /// - Output 2: handedness score, above 0.5 meaning right
    pub fn new<P: AsRef<Path>>(model_path: P, options: DetectorOptions) -> Result<Self, DetectorError> {
        options.validate()?;
        let path = model_path.as_ref();

        tracing::info!("Loading hand landmark model from {}", path.display());

        let session = load_session(path)
            .map_err(|e| DetectorError::Load(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Hand landmark model loaded successfully");

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(INPUT_SIZE, INPUT_SIZE),
            options,
            tracked: None,
        })
    }

    fn infer(&mut self, input: &Array4<f32>) -> ort::Result<ModelOutput> {
        let _span = tracing::debug_span!("inference").entered();

        let tensor = TensorRef::from_array_view(input.view())?;
        let outputs = self.session.run(inputs![tensor])?;

        let landmarks: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let presence = outputs[1]
            .try_extract_array::<f32>()?
            .iter()
            .copied()
            .next()
            .unwrap_or(0.0);
        let handedness = outputs[2]
            .try_extract_array::<f32>()?
            .iter()
            .copied()
            .next()
            .unwrap_or(0.5);

        Ok(ModelOutput {
            landmarks,
            presence,
            handedness,
        })
    }
}

fn load_session(path: &Path) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(path)
}

/// Exports differ on whether score heads end in a sigmoid
fn probability(score: f32) -> f32 {
    if (0.0..=1.0).contains(&score) {
        score
    } else {
        1.0 / (1.0 + (-score).exp())
    }
}

fn decode_landmarks(
    raw: &[f32],
    roi: &Roi,
    input_size: (u32, u32),
    frame_size: (u32, u32),
) -> Result<Vec<Landmark>, DetectorError> {
    if raw.len() < LANDMARK_COUNT * 3 {
        return Err(DetectorError::Inference(format!(
            "expected {} landmark values, got {}",
            LANDMARK_COUNT * 3,
            raw.len()
        )));
    }

    let depth_scale = roi.width as f32 / input_size.0 as f32 / frame_size.0 as f32;

    Ok(raw
        .chunks_exact(3)
        .take(LANDMARK_COUNT)
        .map(|point| {
            let (x, y) = roi.to_frame((point[0], point[1]), input_size, frame_size);
            Landmark {
                x,
                y,
                z: point[2] * depth_scale,
            }
        })
        .collect())
}

impl HandLandmarker for OnnxHandLandmarker {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>, DetectorError> {
        let _span = tracing::debug_span!("hand_landmarks").entered();

        let frame_size = frame.dimensions();
        let tracking = self.tracked.is_some();
        let roi = self
            .tracked
            .unwrap_or_else(|| Roi::full_frame(frame_size.0, frame_size.1));

        let input = self.preprocessor.preprocess(frame, &roi)?;
        let output = self
            .infer(&input)
            .map_err(|e| DetectorError::Inference(e.to_string()))?;

        let presence = probability(output.presence);
        let threshold = if tracking {
            self.options.min_tracking_confidence
        } else {
            self.options.min_detection_confidence
        };

        if presence < threshold {
            if tracking {
                tracing::debug!("Lost hand (presence {:.2} < {:.2})", presence, threshold);
            }
            self.tracked = None;
            return Ok(Vec::new());
        }

        let landmarks = decode_landmarks(
            &output.landmarks,
            &roi,
            self.preprocessor.input_size(),
            frame_size,
        )?;
        self.tracked = Roi::around(&landmarks, frame_size.0, frame_size.1, ROI_SCALE);

        let handedness = if probability(output.handedness) > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        };

        let mut hands = vec![HandObservation {
            handedness,
            score: presence,
            landmarks,
        }];
        hands.truncate(self.options.max_hands);
        Ok(hands)
    }

    fn reset(&mut self) {
        tracing::debug!("Resetting hand tracking region");
        self.tracked = None;
    }
}
