mod client;
mod landmarker;
mod preprocess;
pub mod types;
mod worker;

pub use client::{DetectorBackend, DetectorClient, DetectorProvider, ResultSender, Submission};
pub use landmarker::{locate_model, OnnxHandLandmarker};
pub use preprocess::{Preprocessor, Roi};
pub use types::{
    Completion, DetectionRequest, DetectionResult, DetectorError, DetectorOptions,
    HandLandmarker, HandObservation, Handedness, Landmark, NoopLandmarker, Ticket, LANDMARK_COUNT,
};
pub use worker::{WorkerBackend, WorkerProvider};

use std::path::PathBuf;

/// Create the default detector provider
///
/// With a model directory each session loads the ONNX landmark model
/// picked by `options.model_complexity`; without one, frames pass through
/// with no hands reported.
pub fn create_default_provider(
    model_dir: Option<PathBuf>,
    options: DetectorOptions,
) -> Result<WorkerProvider, DetectorError> {
    options.validate()?;

    let provider = match model_dir {
        Some(dir) => {
            let path = locate_model(&dir, options.model_complexity);
            WorkerProvider::new(move || {
                let model = OnnxHandLandmarker::new(&path, options.clone())?;
                Ok(Box::new(model) as Box<dyn HandLandmarker>)
            })
        }
        None => WorkerProvider::new(|| Ok(Box::new(NoopLandmarker) as Box<dyn HandLandmarker>)),
    };

    Ok(provider)
}
