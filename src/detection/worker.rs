use super::client::{DetectorBackend, DetectorProvider, ResultSender};
use super::types::{DetectionRequest, DetectionResult, DetectorError, HandLandmarker};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

type Loader = Box<dyn FnMut() -> Result<Box<dyn HandLandmarker>, DetectorError>>;

/// Opens a [`WorkerBackend`] around a freshly loaded landmarker for each session
pub struct WorkerProvider {
    load: Loader,
}

impl WorkerProvider {
    pub fn new<F>(load: F) -> Self
    where
        F: FnMut() -> Result<Box<dyn HandLandmarker>, DetectorError> + 'static,
    {
        Self {
            load: Box::new(load),
        }
    }
}

impl DetectorProvider for WorkerProvider {
    type Backend = WorkerBackend;

    fn open(&mut self, results: ResultSender) -> Result<WorkerBackend, DetectorError> {
        let landmarker = (self.load)()?;
        WorkerBackend::spawn(landmarker, results)
    }
}

/// Runs a blocking [`HandLandmarker`] on its own thread
pub struct WorkerBackend {
    requests: Option<mpsc::Sender<DetectionRequest>>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerBackend {
    pub fn spawn(
        landmarker: Box<dyn HandLandmarker>,
        results: ResultSender,
    ) -> Result<Self, DetectorError> {
        let (tx, rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("hand-detector".to_string())
            .spawn(move || run_worker(landmarker, rx, results))
            .map_err(|e| DetectorError::Load(format!("failed to spawn detector thread: {}", e)))?;

        Ok(Self {
            requests: Some(tx),
            handle: Some(handle),
        })
    }
}

fn run_worker(
    mut landmarker: Box<dyn HandLandmarker>,
    requests: mpsc::Receiver<DetectionRequest>,
    results: ResultSender,
) {
    tracing::debug!("Detector thread started");

    for DetectionRequest { ticket, frame } in requests {
        let _span = tracing::debug_span!("detect", sequence = ticket.sequence).entered();

        let outcome = match landmarker.detect(&frame) {
            Ok(hands) => Ok(DetectionResult { image: frame, hands }),
            Err(e) => Err(e),
        };

        if !results.deliver(ticket, outcome) {
            break;
        }
    }

    landmarker.reset();
    tracing::debug!("Detector thread finished");
}

impl DetectorBackend for WorkerBackend {
    fn send(&mut self, request: DetectionRequest) -> Result<(), DetectorError> {
        let requests = self.requests.as_ref().ok_or(DetectorError::Closed)?;
        requests.send(request).map_err(|_| DetectorError::Closed)
    }

    fn close(&mut self) {
        // Dropping the sender ends the worker's request loop
        self.requests = None;

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Detector thread panicked");
            }
        }
    }
}

impl Drop for WorkerBackend {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Frame;
    use crate::detection::client::{DetectorClient, Submission};
    use crate::detection::types::{HandObservation, Handedness, Landmark, LANDMARK_COUNT};
    use crate::pipeline::Epoch;

    struct OneHand;

    impl HandLandmarker for OneHand {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>, DetectorError> {
            if frame.width() == 0 {
                return Err(DetectorError::Inference("empty frame".to_string()));
            }
            Ok(vec![HandObservation::new(
                Handedness::Right,
                vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT],
            )])
        }
    }

    #[tokio::test]
    async fn worker_answers_each_request_with_its_frame() {
        let mut provider = WorkerProvider::new(|| Ok(Box::new(OneHand) as Box<dyn HandLandmarker>));
        let mut client = DetectorClient::open(&mut provider, Epoch::default().next()).unwrap();

        let Submission::Dispatched(ticket) = client.submit(Frame::new(8, 6)).unwrap() else {
            panic!("expected dispatch");
        };

        let completion = client.recv().await.unwrap();
        assert_eq!(completion.ticket, ticket);

        let result = completion.outcome.unwrap();
        assert_eq!(result.image.dimensions(), (8, 6));
        assert_eq!(result.hands.len(), 1);
        assert_eq!(result.hands[0].handedness, Handedness::Right);
    }

    #[tokio::test]
    async fn inference_errors_are_delivered() {
        let mut provider = WorkerProvider::new(|| Ok(Box::new(OneHand) as Box<dyn HandLandmarker>));
        let mut client = DetectorClient::open(&mut provider, Epoch::default().next()).unwrap();

        client.submit(Frame::new(0, 0)).unwrap();
        let completion = client.recv().await.unwrap();
        assert!(matches!(completion.outcome, Err(DetectorError::Inference(_))));
    }

    #[test]
    fn closed_worker_rejects_requests() {
        let mut provider = WorkerProvider::new(|| Ok(Box::new(OneHand) as Box<dyn HandLandmarker>));
        let mut client = DetectorClient::open(&mut provider, Epoch::default().next()).unwrap();

        client.teardown();
        assert!(matches!(client.submit(Frame::new(4, 4)), Err(DetectorError::Closed)));
    }

    #[test]
    fn load_failure_surfaces_from_open() {
        let mut provider = WorkerProvider::new(|| Err(DetectorError::Load("no model".to_string())));
        let opened = DetectorClient::open(&mut provider, Epoch::default().next());
        assert!(matches!(opened, Err(DetectorError::Load(_))));
    }
}
