use super::types::{Completion, DetectionRequest, DetectionResult, DetectorError, Ticket};
use crate::capture::Frame;
use crate::pipeline::Epoch;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// The external detector: accepts one frame at a time and answers later
/// through the [`ResultSender`] it was opened with.
///
/// There is no way to cancel a request once `send` has accepted it.
pub trait DetectorBackend {
    /// Dispatch a frame. Returns as soon as the request is queued.
    fn send(&mut self, request: DetectionRequest) -> Result<(), DetectorError>;

    /// Release every resource. Later `send` calls must fail with
    /// [`DetectorError::Closed`] rather than block.
    fn close(&mut self);
}

/// Opens detector backends, one per loop session
pub trait DetectorProvider {
    type Backend: DetectorBackend;

    fn open(&mut self, results: ResultSender) -> Result<Self::Backend, DetectorError>;
}

/// Return path from a backend to the frame loop
#[derive(Debug, Clone)]
pub struct ResultSender {
    tx: UnboundedSender<Completion>,
}

impl ResultSender {
    /// Hand a finished request back. Returns false once the client is gone.
    pub fn deliver(&self, ticket: Ticket, outcome: Result<DetectionResult, DetectorError>) -> bool {
        self.tx.send(Completion { ticket, outcome }).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The frame went to the detector under this ticket
    Dispatched(Ticket),
    /// The frame was dropped; this ticket is still outstanding
    Busy(Ticket),
}

/// Adapts a [`DetectorBackend`] to the frame loop.
///
/// Keeps at most one request outstanding, tags requests with the session
/// epoch, and releases the backend on teardown or drop.
pub struct DetectorClient<B: DetectorBackend> {
    backend: Option<B>,
    completions: UnboundedReceiver<Completion>,
    epoch: Epoch,
    in_flight: Option<Ticket>,
    next_sequence: u64,
}

impl<B: DetectorBackend> DetectorClient<B> {
    pub fn open<P>(provider: &mut P, epoch: Epoch) -> Result<Self, DetectorError>
    where
        P: DetectorProvider<Backend = B>,
    {
        let (tx, completions) = mpsc::unbounded_channel();
        let backend = provider.open(ResultSender { tx })?;

        tracing::debug!(%epoch, "Detector opened");

        Ok(Self {
            backend: Some(backend),
            completions,
            epoch,
            in_flight: None,
            next_sequence: 0,
        })
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Send a frame unless a request is already outstanding
    pub fn submit(&mut self, frame: Frame) -> Result<Submission, DetectorError> {
        let backend = self.backend.as_mut().ok_or(DetectorError::Closed)?;

        if let Some(ticket) = self.in_flight {
            return Ok(Submission::Busy(ticket));
        }

        let ticket = Ticket {
            epoch: self.epoch,
            sequence: self.next_sequence,
        };
        backend.send(DetectionRequest { ticket, frame })?;

        self.next_sequence += 1;
        self.in_flight = Some(ticket);
        Ok(Submission::Dispatched(ticket))
    }

    /// Mark a request as answered. Returns false for a ticket that is not outstanding.
    pub fn settle(&mut self, ticket: Ticket) -> bool {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Wait for the next completion. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Completion> {
        self.completions.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Completion> {
        self.completions.try_recv().ok()
    }

    /// Close the backend and stop accepting completions. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.close();
            tracing::debug!(epoch = %self.epoch, "Detector released");
        }
        self.in_flight = None;
        self.completions.close();
    }
}

impl<B: DetectorBackend> Drop for DetectorClient<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        sent: Vec<Ticket>,
        closes: usize,
        results: Option<ResultSender>,
    }

    struct Recording {
        log: Rc<RefCell<Log>>,
        closed: bool,
    }

    impl DetectorBackend for Recording {
        fn send(&mut self, request: DetectionRequest) -> Result<(), DetectorError> {
            if self.closed {
                return Err(DetectorError::Closed);
            }
            self.log.borrow_mut().sent.push(request.ticket);
            Ok(())
        }

        fn close(&mut self) {
            self.closed = true;
            self.log.borrow_mut().closes += 1;
        }
    }

    struct RecordingProvider(Rc<RefCell<Log>>);

    impl DetectorProvider for RecordingProvider {
        type Backend = Recording;

        fn open(&mut self, results: ResultSender) -> Result<Recording, DetectorError> {
            self.0.borrow_mut().results = Some(results);
            Ok(Recording {
                log: self.0.clone(),
                closed: false,
            })
        }
    }

    fn open_client() -> (DetectorClient<Recording>, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut provider = RecordingProvider(log.clone());
        let client = DetectorClient::open(&mut provider, Epoch::default().next()).unwrap();
        (client, log)
    }

    fn frame() -> Frame {
        Frame::new(2, 2)
    }

    #[test]
    fn second_submit_is_dropped_while_busy() {
        let (mut client, log) = open_client();

        let Submission::Dispatched(first) = client.submit(frame()).unwrap() else {
            panic!("first frame should be dispatched");
        };
        assert_eq!(client.submit(frame()).unwrap(), Submission::Busy(first));
        assert_eq!(log.borrow().sent, vec![first]);

        assert!(client.settle(first));
        assert!(!client.settle(first));

        let Submission::Dispatched(second) = client.submit(frame()).unwrap() else {
            panic!("frame after settle should be dispatched");
        };
        assert_eq!(second.sequence, first.sequence + 1);
        assert_eq!(second.epoch, client.epoch());
    }

    #[test]
    fn teardown_closes_once_and_rejects_submissions() {
        let (mut client, log) = open_client();

        client.teardown();
        client.teardown();
        assert_eq!(log.borrow().closes, 1);
        assert!(!client.is_open());
        assert!(matches!(client.submit(frame()), Err(DetectorError::Closed)));

        drop(client);
        assert_eq!(log.borrow().closes, 1);
    }

    #[test]
    fn drop_releases_the_backend() {
        let (client, log) = open_client();
        drop(client);
        assert_eq!(log.borrow().closes, 1);
        assert!(log.borrow().results.as_ref().unwrap().is_closed());
    }

    #[test]
    fn completions_arrive_through_the_sender() {
        let (mut client, log) = open_client();
        let Submission::Dispatched(ticket) = client.submit(frame()).unwrap() else {
            panic!("expected dispatch");
        };

        let results = log.borrow().results.clone().unwrap();
        assert!(results.deliver(
            ticket,
            Ok(DetectionResult {
                image: frame(),
                hands: Vec::new(),
            })
        ));

        let completion = client.try_recv().unwrap();
        assert_eq!(completion.ticket, ticket);
        assert!(completion.outcome.is_ok());
        assert!(client.try_recv().is_none());

        client.teardown();
        assert!(!results.deliver(ticket, Err(DetectorError::Closed)));
    }

    #[test]
    fn rejected_send_leaves_client_idle() {
        let (mut client, _log) = open_client();
        client.backend.as_mut().unwrap().closed = true;

        assert!(matches!(client.submit(frame()), Err(DetectorError::Closed)));
        assert!(client.is_idle());
    }
}
