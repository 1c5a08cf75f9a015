use super::OutputSink;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Publishes the overlay to a v4l2loopback device so other programs can
/// pick it up as a webcam.
///
/// The device must already be configured for YUYV at the canvas size; frames
/// of any other size are rejected rather than rescaled.
pub struct V4L2Output {
    device: File,
    path: PathBuf,
    width: u32,
    height: u32,
    packed: Vec<u8>,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref().to_path_buf();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        // v4l2loopback takes raw frames written straight to the device file
        let device = File::options()
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        Ok(Self {
            device,
            path,
            width,
            height,
            packed: Vec::with_capacity(width as usize * height as usize * 2),
        })
    }
}

impl OutputSink for V4L2Output {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            bail!(
                "Overlay is {}x{} but {} is set up for {}x{}",
                frame.width(),
                frame.height(),
                self.path.display(),
                self.width,
                self.height
            );
        }

        pack_yuyv(frame, &mut self.packed);
        self.device
            .write_all(&self.packed)
            .with_context(|| format!("Failed to write frame to {}", self.path.display()))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pack rows as YUYV 4:2:2 with integer BT.601 weights. Each horizontal
/// pair shares the chroma of its mean colour; an odd last column pairs with
/// itself.
fn pack_yuyv(frame: &RgbImage, out: &mut Vec<u8>) {
    out.clear();
    let stride = frame.width() as usize * 3;
    if stride == 0 {
        return;
    }

    for row in frame.as_raw().chunks_exact(stride) {
        for pair in row.chunks(6) {
            let left = [pair[0], pair[1], pair[2]];
            let right = if pair.len() == 6 {
                [pair[3], pair[4], pair[5]]
            } else {
                left
            };
            let mean = [0, 1, 2].map(|c| ((u16::from(left[c]) + u16::from(right[c]) + 1) / 2) as u8);
            let (u, v) = chroma(mean);
            out.extend_from_slice(&[luma(left), u, luma(right), v]);
        }
    }
}

fn luma([r, g, b]: [u8; 3]) -> u8 {
    let y = (77 * u32::from(r) + 150 * u32::from(g) + 29 * u32::from(b) + 128) >> 8;
    y.min(255) as u8
}

fn chroma([r, g, b]: [u8; 3]) -> (u8, u8) {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let u = ((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128;
    let v = ((128 * r - 107 * g - 21 * b + 128) >> 8) + 128;
    (u.clamp(0, 255) as u8, v.clamp(0, 255) as u8)
}
