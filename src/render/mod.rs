mod canvas;

pub use canvas::Canvas;

use crate::detection::{DetectionResult, HandObservation, Handedness};
use anyhow::Result;
use image::{Rgb, RgbImage};

/// Pairs of landmark indices forming the finger and palm skeleton
#[rustfmt::skip]
pub const HAND_CONNECTIONS: [(usize, usize); 23] = [
    // Thumb
    (0, 1), (1, 2), (2, 3), (3, 4),
    // Index finger
    (0, 5), (5, 6), (6, 7), (7, 8),
    // Middle finger
    (0, 9), (9, 10), (10, 11), (11, 12),
    // Ring finger
    (0, 13), (13, 14), (14, 15), (15, 16),
    // Pinky
    (0, 17), (17, 18), (18, 19), (19, 20),
    // Palm
    (5, 9), (9, 13), (13, 17),
];

/// 2D drawing target addressed in pixel coordinates
pub trait DisplaySurface {
    /// Pixel size of the surface (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Wipe the whole surface
    fn clear(&mut self);

    /// Draw an image stretched over the whole surface
    fn draw_image(&mut self, image: &RgbImage);

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgb<u8>);

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Rgb<u8>);

    /// Draw text whose baseline starts at `origin`
    fn draw_text(&mut self, text: &str, origin: (f32, f32), scale: f32, color: Rgb<u8>);

    /// Publish the finished picture
    fn present(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Stroke and marker colours for one hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandPalette {
    pub stroke: Rgb<u8>,
    pub landmark: Rgb<u8>,
}

impl HandPalette {
    pub fn for_hand(handedness: Handedness) -> Self {
        match handedness {
            Handedness::Left => Self {
                stroke: Rgb([0x00, 0xFF, 0x00]),
                landmark: Rgb([0xFF, 0x00, 0x00]),
            },
            Handedness::Right => Self {
                stroke: Rgb([0x00, 0xFF, 0xFF]),
                landmark: Rgb([0xFF, 0x00, 0xFF]),
            },
        }
    }

    /// One-line description of both hands' colours
    pub fn legend() -> &'static str {
        "Left hand: Green/Red | Right hand: Cyan/Magenta"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub line_width: f32,
    pub marker_radius: f32,
    pub label_scale: f32,
    /// Label position relative to the wrist, in pixels
    pub label_offset: (f32, f32),
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            line_width: 3.0,
            marker_radius: 5.0,
            label_scale: 20.0,
            label_offset: (10.0, -10.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderSummary {
    pub hands_drawn: usize,
    pub hands_skipped: usize,
}

/// Draws a detection result: the source frame, then one skeleton per hand
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    style: RenderStyle,
}

impl OverlayRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    pub fn render<D>(&self, result: &DetectionResult, surface: &mut D) -> RenderSummary
    where
        D: DisplaySurface + ?Sized,
    {
        let _span = tracing::debug_span!("render", hands = result.hands.len()).entered();

        surface.clear();
        surface.draw_image(&result.image);

        let mut summary = RenderSummary::default();
        for hand in &result.hands {
            if !hand.is_well_formed() {
                tracing::warn!(
                    "Skipping {} hand with {} landmarks",
                    hand.handedness,
                    hand.landmarks.len()
                );
                summary.hands_skipped += 1;
                continue;
            }
            self.draw_hand(hand, surface);
            summary.hands_drawn += 1;
        }

        summary
    }

    fn draw_hand<D>(&self, hand: &HandObservation, surface: &mut D)
    where
        D: DisplaySurface + ?Sized,
    {
        let (width, height) = surface.dimensions();
        let palette = HandPalette::for_hand(hand.handedness);
        let points: Vec<(f32, f32)> = hand
            .landmarks
            .iter()
            .map(|landmark| landmark.to_pixels(width, height))
            .collect();

        for &(start, end) in &HAND_CONNECTIONS {
            surface.draw_line(points[start], points[end], self.style.line_width, palette.stroke);
        }

        for &point in &points {
            surface.fill_circle(point, self.style.marker_radius, palette.landmark);
        }

        let (wrist_x, wrist_y) = points[0];
        let (dx, dy) = self.style.label_offset;
        surface.draw_text(
            hand.handedness.label(),
            (wrist_x + dx, wrist_y + dy),
            self.style.label_scale,
            palette.stroke,
        );
    }
}
