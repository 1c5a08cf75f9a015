use super::DisplaySurface;
use crate::output::OutputSink;
use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};
use std::path::{Path, PathBuf};

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// Fonts tried when no label font is configured
const SYSTEM_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
];

/// In-memory RGB surface
///
/// Labels need a TrueType font; without one, text calls draw nothing.
pub struct Canvas {
    image: RgbImage,
    font: Option<FontVec>,
    sink: Option<Box<dyn OutputSink>>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, BACKGROUND),
            font: None,
            sink: None,
        }
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    /// Send every presented picture to `sink`
    pub fn with_sink(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontVec> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font at {}", path.display()))?;

        FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow::anyhow!("Invalid font at {}: {}", path.display(), e))
    }

    /// First common system font present on this machine
    pub fn find_system_font() -> Option<PathBuf> {
        SYSTEM_FONTS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }
}

impl DisplaySurface for Canvas {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = BACKGROUND;
        }
    }

    fn draw_image(&mut self, image: &RgbImage) {
        let (width, height) = self.image.dimensions();
        if image.dimensions() == (width, height) {
            self.image.clone_from(image);
        } else {
            self.image = imageops::resize(image, width, height, imageops::FilterType::Triangle);
        }
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgb<u8>) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let length = (dx * dx + dy * dy).sqrt();
        if length < f32::EPSILON {
            self.fill_circle(from, width / 2.0, color);
            return;
        }

        // Stack 1px segments along the normal to get the requested width
        let (nx, ny) = (-dy / length, dx / length);
        let strokes = width.round().max(1.0) as i32;
        for i in 0..strokes {
            let offset = i as f32 - (strokes - 1) as f32 / 2.0;
            draw_line_segment_mut(
                &mut self.image,
                (from.0 + nx * offset, from.1 + ny * offset),
                (to.0 + nx * offset, to.1 + ny * offset),
                color,
            );
        }
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Rgb<u8>) {
        draw_filled_circle_mut(
            &mut self.image,
            (center.0.round() as i32, center.1.round() as i32),
            radius.round() as i32,
            color,
        );
    }

    fn draw_text(&mut self, text: &str, origin: (f32, f32), scale: f32, color: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };

        // imageproc places the top of the glyph box; move up from the baseline
        draw_text_mut(
            &mut self.image,
            color,
            origin.0.round() as i32,
            (origin.1 - scale).round() as i32,
            PxScale::from(scale),
            font,
            text,
        );
    }

    fn present(&mut self) -> Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.write_frame(&self.image),
            None => Ok(()),
        }
    }
}
