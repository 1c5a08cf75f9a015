use super::{Frame, FrameSource};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pause after a failed grab so a broken device does not spin the thread
const RETRY_DELAY: Duration = Duration::from_millis(10);

type Slot = Arc<Mutex<Option<Frame>>>;

/// Runs a blocking frame grabber on its own thread and keeps only the
/// newest frame.
///
/// The source is ready once a frame has arrived that has not been taken
/// yet. Taking it never blocks; older frames are overwritten unseen.
pub struct BackgroundCapture {
    latest: Slot,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    resolution: (u32, u32),
}

impl BackgroundCapture {
    /// Start a capture thread.
    ///
    /// `open` runs on the new thread and returns the stream resolution plus
    /// a grab function, so the device handle never has to cross threads.
    /// Returns once `open` has finished, with its error if it failed.
    pub fn spawn<O, G>(name: &str, open: O) -> Result<Self>
    where
        O: FnOnce() -> Result<((u32, u32), G)> + Send + 'static,
        G: FnMut() -> Result<Frame>,
    {
        let latest: Slot = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let (opened_tx, opened_rx) = mpsc::sync_channel(1);

        let worker = {
            let latest = latest.clone();
            let running = running.clone();
            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    let grab = match open() {
                        Ok((resolution, grab)) => {
                            let _ = opened_tx.send(Ok(resolution));
                            grab
                        }
                        Err(e) => {
                            let _ = opened_tx.send(Err(e));
                            return;
                        }
                    };
                    capture_loop(grab, &latest, &running);
                })
                .context("Failed to spawn capture thread")?
        };

        let resolution = match opened_rx.recv() {
            Ok(opened) => opened,
            Err(_) => Err(anyhow::anyhow!("Capture thread exited during startup")),
        };
        let resolution = match resolution {
            Ok(resolution) => resolution,
            Err(e) => {
                let _ = worker.join();
                return Err(e);
            }
        };

        Ok(Self {
            latest,
            running,
            worker: Some(worker),
            resolution,
        })
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Frame>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn capture_loop<G>(mut grab: G, latest: &Slot, running: &AtomicBool)
where
    G: FnMut() -> Result<Frame>,
{
    let _span = tracing::debug_span!("capture").entered();
    let mut grabbed: u64 = 0;

    while running.load(Ordering::Relaxed) {
        match grab() {
            Ok(frame) => {
                *lock(latest) = Some(frame);
                grabbed += 1;
            }
            Err(e) => {
                tracing::debug!("Frame grab failed: {:#}", e);
                thread::sleep(RETRY_DELAY);
            }
        }
    }

    tracing::debug!("Capture thread finished after {} frame(s)", grabbed);
}

impl FrameSource for BackgroundCapture {
    fn is_ready(&self) -> bool {
        lock(&self.latest).is_some()
    }

    fn current_frame(&mut self) -> Result<Frame> {
        lock(&self.latest)
            .take()
            .context("No new frame since the last grab")
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

impl Drop for BackgroundCapture {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Capture thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::time::Instant;

    fn wait_until_ready(capture: &BackgroundCapture) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if capture.is_ready() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    /// A capture fed by hand through a channel
    fn fed_capture() -> (mpsc::Sender<Frame>, BackgroundCapture) {
        let (feed, frames) = mpsc::channel::<Frame>();
        let capture = BackgroundCapture::spawn("test-capture", move || {
            Ok(((4, 2), move || {
                frames
                    .recv_timeout(Duration::from_millis(5))
                    .context("no frame fed")
            }))
        })
        .unwrap();
        (feed, capture)
    }

    #[test]
    fn not_ready_until_a_frame_arrives() {
        let (feed, mut capture) = fed_capture();

        assert_eq!(capture.resolution(), (4, 2));
        assert!(!capture.is_ready());
        assert!(capture.current_frame().is_err());

        feed.send(Frame::from_pixel(4, 2, Rgb([9, 9, 9]))).unwrap();
        assert!(wait_until_ready(&capture));

        let frame = capture.current_frame().unwrap();
        assert_eq!(frame.get_pixel(0, 0), &Rgb([9, 9, 9]));

        // taken frames are not handed out twice
        assert!(!capture.is_ready());
        assert!(capture.current_frame().is_err());
        drop(feed);
    }

    #[test]
    fn keeps_only_the_newest_frame() {
        let (feed, mut capture) = fed_capture();

        for shade in [1u8, 2, 3] {
            feed.send(Frame::from_pixel(4, 2, Rgb([shade; 3]))).unwrap();
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if lock(&capture.latest)
                .as_ref()
                .is_some_and(|frame| frame.get_pixel(0, 0) == &Rgb([3; 3]))
            {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(capture.current_frame().unwrap().get_pixel(0, 0), &Rgb([3; 3]));
        assert!(!capture.is_ready());

        drop(feed);
    }

    #[test]
    fn failed_open_is_reported() {
        let opened = BackgroundCapture::spawn("test-capture", || {
            Err::<((u32, u32), fn() -> Result<Frame>), _>(anyhow::anyhow!("no such device"))
        });

        let error = opened.err().unwrap();
        assert!(error.to_string().contains("no such device"));
    }

    #[test]
    fn grab_errors_leave_the_source_unready() {
        let capture = BackgroundCapture::spawn("test-capture", || {
            Ok(((4, 2), || Err(anyhow::anyhow!("device busy"))))
        })
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        assert!(!capture.is_ready());
    }
}
