use super::clock::FrameClock;
use super::state::{Epoch, LoopState};
use crate::capture::FrameSource;
use crate::detection::{
    Completion, DetectorBackend, DetectorClient, DetectorError, DetectorProvider, Submission,
    Ticket,
};
use crate::render::{DisplaySurface, OverlayRenderer};
use crate::status;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;

/// Rendered frames between timing reports
const STATS_INTERVAL: u64 = 30;

#[derive(Debug, Error)]
pub enum FrameLoopError {
    #[error("frame scheduling unavailable: {0}")]
    Scheduler(String),

    #[error(transparent)]
    Detector(#[from] DetectorError),
}

/// What one scheduled iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The loop is not running; nothing happened
    Halted,
    /// The source had no frame yet
    NotReady,
    /// A request is still outstanding; no frame was grabbed
    Busy,
    Submitted(Ticket),
    /// The detector refused the frame and the loop stopped
    Failed,
}

/// What became of one detector completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Late or foreign result, ignored without side effects
    Discarded,
    Rendered,
    /// The detector reported an error for this frame
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Stopped,
    DetectorLost,
}

#[derive(Debug, Default)]
struct LoopStats {
    submitted: u64,
    rendered: u64,
    busy: u64,
    discarded: u64,
    detect_time: Duration,
    render_time: Duration,
}

/// Drives capture, detection and rendering until stopped
///
/// The loop is the only writer of its [`LoopState`] and the only owner of
/// the detector client. Stopping flips the state before the detector is
/// torn down, and every render or status update checks the state first,
/// so nothing visible happens after `stop` even if a result was already
/// on its way.
pub struct FrameLoop<S, P: DetectorProvider, D> {
    source: S,
    provider: P,
    surface: D,
    renderer: OverlayRenderer,
    refresh_rate: u32,

    state: LoopState,
    detector: Option<DetectorClient<P::Backend>>,
    clock: Option<FrameClock>,
    submitted_at: Option<Instant>,

    status: watch::Sender<String>,
    stats: LoopStats,
}

impl<S, P, D> FrameLoop<S, P, D>
where
    S: FrameSource,
    P: DetectorProvider,
    D: DisplaySurface,
{
    pub fn new(source: S, provider: P, surface: D, refresh_rate: u32) -> Self {
        let (status, _) = watch::channel(status::NO_HANDS.to_string());

        Self {
            source,
            provider,
            surface,
            renderer: OverlayRenderer::default(),
            refresh_rate,
            state: LoopState::new(),
            detector: None,
            clock: None,
            submitted_at: None,
            status,
            stats: LoopStats::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn epoch(&self) -> Epoch {
        self.state.epoch()
    }

    /// The outstanding detection request, if any
    pub fn in_flight(&self) -> Option<Ticket> {
        self.detector.as_ref().and_then(|detector| detector.in_flight())
    }

    /// Current gesture status line
    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Open the detector and begin scheduling. Does nothing when already running.
    ///
    /// Must be called inside a tokio runtime. On error the loop stays inert.
    pub fn start(&mut self) -> Result<Epoch, FrameLoopError> {
        if self.state.is_active() {
            return Ok(self.state.epoch());
        }

        let clock = FrameClock::new(self.refresh_rate)?;
        let epoch = self.state.upcoming();
        let detector = DetectorClient::open(&mut self.provider, epoch)?;

        self.detector = Some(detector);
        self.clock = Some(clock);
        self.state.activate(epoch);

        tracing::info!(%epoch, "Frame loop started at {} Hz", self.refresh_rate);
        Ok(epoch)
    }

    /// One scheduled iteration: grab a frame if the source is ready and
    /// hand it to the detector.
    ///
    /// No frame is grabbed while a request is outstanding. A failed
    /// submission stops the loop.
    pub fn step(&mut self) -> Step {
        if !self.state.is_active() {
            return Step::Halted;
        }
        let Some(detector) = self.detector.as_mut() else {
            return Step::Halted;
        };

        if !detector.is_idle() {
            self.stats.busy += 1;
            return Step::Busy;
        }

        if !self.source.is_ready() {
            return Step::NotReady;
        }

        let frame = match self.source.current_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("No frame this tick: {:#}", e);
                return Step::NotReady;
            }
        };

        match detector.submit(frame) {
            Ok(Submission::Dispatched(ticket)) => {
                self.submitted_at = Some(Instant::now());
                self.stats.submitted += 1;
                Step::Submitted(ticket)
            }
            Ok(Submission::Busy(_)) => {
                self.stats.busy += 1;
                Step::Busy
            }
            Err(e) => {
                tracing::warn!("Hand tracking stopped: {}", e);
                self.stop();
                Step::Failed
            }
        }
    }

    /// Handle one detector completion
    pub fn deliver(&mut self, completion: Completion) -> Delivery {
        if !self.state.admits(completion.ticket.epoch) {
            tracing::trace!(
                epoch = %completion.ticket.epoch,
                sequence = completion.ticket.sequence,
                "Discarding late detection result"
            );
            self.stats.discarded += 1;
            return Delivery::Discarded;
        }

        let settled = self
            .detector
            .as_mut()
            .is_some_and(|detector| detector.settle(completion.ticket));
        if settled {
            if let Some(submitted_at) = self.submitted_at.take() {
                self.stats.detect_time += submitted_at.elapsed();
            }
        }

        match completion.outcome {
            Ok(result) => {
                let render_start = Instant::now();
                self.renderer.render(&result, &mut self.surface);
                if let Err(e) = self.surface.present() {
                    tracing::warn!("Failed to present frame: {:#}", e);
                }
                self.stats.render_time += render_start.elapsed();

                self.publish_status(status::describe(&result.hands));

                self.stats.rendered += 1;
                if self.stats.rendered % STATS_INTERVAL == 0 {
                    self.log_stats();
                }
                Delivery::Rendered
            }
            Err(e) => {
                tracing::warn!("Detection failed: {}", e);
                Delivery::Failed
            }
        }
    }

    /// Deliver every completion that has already arrived
    pub fn drain_completions(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(completion) = self.detector.as_mut().and_then(|d| d.try_recv()) {
            self.deliver(completion);
            delivered += 1;
        }
        delivered
    }

    /// Stop producing effects and release the detector. Idempotent.
    pub fn stop(&mut self) {
        if !self.state.deactivate() {
            return;
        }

        self.clock = None;
        self.submitted_at = None;
        if let Some(mut detector) = self.detector.take() {
            detector.teardown();
        }

        tracing::info!(
            epoch = %self.state.epoch(),
            "Frame loop stopped after {} rendered frame(s)",
            self.stats.rendered
        );
    }

    /// Run until `shutdown` resolves or the detector goes away
    pub async fn run<F>(&mut self, shutdown: F) -> Result<Exit, FrameLoopError>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    self.stop();
                    return Ok(Exit::Stopped);
                }

                completion = next_completion(&mut self.detector) => {
                    match completion {
                        Some(completion) => {
                            self.deliver(completion);
                        }
                        None => {
                            tracing::warn!("Detector stopped answering");
                            self.stop();
                            return Ok(Exit::DetectorLost);
                        }
                    }
                }

                () = next_tick(&mut self.clock) => {
                    match self.step() {
                        Step::Failed => {
                            self.stop();
                            return Ok(Exit::DetectorLost);
                        }
                        Step::Halted => return Ok(Exit::Stopped),
                        _ => {}
                    }
                }
            }
        }
    }

    fn publish_status(&mut self, text: String) {
        let changed = self.status.send_if_modified(|current| {
            if *current == text {
                false
            } else {
                *current = text;
                true
            }
        });
        if changed {
            tracing::debug!("Status: {}", self.status.borrow().as_str());
        }
    }

    fn log_stats(&self) {
        let stats = &self.stats;
        let avg_detect_ms = stats.detect_time.as_secs_f64() * 1000.0 / stats.rendered as f64;
        let avg_render_ms = stats.render_time.as_secs_f64() * 1000.0 / stats.rendered as f64;

        tracing::info!(
            "Frame {}: detect={:.1}ms, render={:.1}ms, submitted={}, dropped={}, discarded={}",
            stats.rendered,
            avg_detect_ms,
            avg_render_ms,
            stats.submitted,
            stats.busy,
            stats.discarded
        );
    }
}

async fn next_completion<B: DetectorBackend>(
    detector: &mut Option<DetectorClient<B>>,
) -> Option<Completion> {
    match detector {
        Some(detector) => detector.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(clock: &mut Option<FrameClock>) {
    match clock {
        Some(clock) => clock.tick().await,
        None => std::future::pending().await,
    }
}
