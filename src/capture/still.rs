use super::{Frame, FrameSource};
use anyhow::{Context, Result};
use std::path::Path;

/// Serves the same image on every request. Always ready.
pub struct StillImage {
    image: Frame,
}

impl StillImage {
    pub fn new(image: Frame) -> Self {
        Self { image }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading still frame from {}", path.display());

        let image = image::open(path)
            .with_context(|| format!("Failed to read image at {}", path.display()))?
            .to_rgb8();

        Ok(Self::new(image))
    }
}

impl FrameSource for StillImage {
    fn is_ready(&self) -> bool {
        true
    }

    fn current_frame(&mut self) -> Result<Frame> {
        Ok(self.image.clone())
    }

    fn resolution(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
