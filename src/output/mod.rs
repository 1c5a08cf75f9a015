mod loopback;
mod snapshot;

pub use loopback::V4L2Output;
pub use snapshot::SnapshotOutput;

use anyhow::Result;
use image::RgbImage;

/// Trait for destinations of rendered frames
pub trait OutputSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}
