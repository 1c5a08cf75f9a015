mod background;
mod still;
mod v4l_capture;

pub use background::BackgroundCapture;
pub use still::StillImage;
pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::RgbImage;

/// One captured video image. Its pixel dimensions are the frame dimensions.
pub type Frame = RgbImage;

/// Trait for live frame sources
pub trait FrameSource {
    /// Whether a decoded frame is available right now. Must not block.
    fn is_ready(&self) -> bool;

    /// Grab the current frame. Must not block.
    fn current_frame(&mut self) -> Result<Frame>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn current_frame(&mut self) -> Result<Frame> {
        (**self).current_frame()
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }
}
