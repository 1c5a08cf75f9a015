use super::OutputSink;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Saves every `every`-th frame as a numbered PNG
pub struct SnapshotOutput {
    dir: PathBuf,
    every: u64,
    seen: u64,
    width: u32,
    height: u32,
}

impl SnapshotOutput {
    pub fn new<P: AsRef<Path>>(dir: P, every: u32, width: u32, height: u32) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory {}", dir.display()))?;

        tracing::info!("Saving every {} frame(s) to {}", every.max(1), dir.display());

        Ok(Self {
            dir,
            every: u64::from(every.max(1)),
            seen: 0,
            width,
            height,
        })
    }

    fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", index))
    }
}

impl OutputSink for SnapshotOutput {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let index = self.seen;
        self.seen += 1;
        if index % self.every != 0 {
            return Ok(());
        }

        let path = self.path_for(index);
        frame
            .save(&path)
            .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
        tracing::debug!("Saved {}", path.display());
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
