use super::{BackgroundCapture, Frame, FrameSource};
use anyhow::{Context, Result};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

/// Webcam source. Frames are grabbed and decoded on a background thread,
/// so the frame loop only ever picks up the newest finished frame.
pub struct WebcamCapture {
    inner: BackgroundCapture,
}

impl WebcamCapture {
    pub fn new(device_index: u32, width: u32, height: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} at {}x{}",
            device_index,
            width,
            height
        );

        let inner = BackgroundCapture::spawn("webcam-capture", move || {
            let mut camera = open_camera(device_index, width, height)?;
            let resolution = camera.resolution();
            let grab = move || grab_frame(&mut camera);
            Ok(((resolution.width(), resolution.height()), grab))
        })?;

        let (width, height) = inner.resolution();
        tracing::info!("Webcam streaming at {}x{}", width, height);

        Ok(Self { inner })
    }
}

fn open_camera(device_index: u32, width: u32, height: u32) -> Result<Camera> {
    let index = CameraIndex::Index(device_index);
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(
        Resolution::new(width, height),
    ));

    let mut camera = Camera::new(index, requested).context("Failed to open camera")?;
    camera
        .open_stream()
        .context("Failed to open camera stream")?;
    Ok(camera)
}

/// Blocks until the device delivers the next frame
fn grab_frame(camera: &mut Camera) -> Result<Frame> {
    let buffer = camera.frame().context("Failed to capture frame")?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .context("Failed to decode frame")?;

    // nokhwa may link a different `image` release, so go through the raw buffer
    let (width, height) = (decoded.width(), decoded.height());
    Frame::from_raw(width, height, decoded.into_raw())
        .context("Decoded frame buffer does not match its dimensions")
}

impl FrameSource for WebcamCapture {
    /// True once a decoded frame is waiting
    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    /// Takes the waiting frame without blocking
    fn current_frame(&mut self) -> Result<Frame> {
        self.inner.current_frame()
    }

    fn resolution(&self) -> (u32, u32) {
        self.inner.resolution()
    }
}
