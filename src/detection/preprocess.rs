use super::types::{DetectorError, Landmark};
use image::{imageops, RgbImage};
use ndarray::Array4;

/// Pixel region of a frame that is fed to the landmark model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Square region centred on the landmarks' bounding box, its side the
    /// longer box edge times `scale`, clamped to the frame.
    ///
    /// Returns `None` for an empty landmark set or a region under one pixel.
    pub fn around(landmarks: &[Landmark], frame_width: u32, frame_height: u32, scale: f32) -> Option<Self> {
        let first = landmarks.first()?;
        let (mut min_x, mut min_y) = first.to_pixels(frame_width, frame_height);
        let (mut max_x, mut max_y) = (min_x, min_y);

        for landmark in &landmarks[1..] {
            let (x, y) = landmark.to_pixels(frame_width, frame_height);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;
        let half = (max_x - min_x).max(max_y - min_y) * scale / 2.0;

        let left = (center_x - half).max(0.0);
        let top = (center_y - half).max(0.0);
        let right = (center_x + half).min(frame_width as f32);
        let bottom = (center_y + half).min(frame_height as f32);

        if right - left < 1.0 || bottom - top < 1.0 {
            return None;
        }

        Some(Self {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }

    /// Map a point in model-input pixels back to normalized frame coordinates
    pub fn to_frame(
        &self,
        point: (f32, f32),
        input_size: (u32, u32),
        frame_size: (u32, u32),
    ) -> (f32, f32) {
        let x = self.x as f32 + point.0 / input_size.0 as f32 * self.width as f32;
        let y = self.y as f32 + point.1 / input_size.1 as f32 * self.height as f32;
        (x / frame_size.0 as f32, y / frame_size.1 as f32)
    }
}

/// Preprocessor for converting frame regions to model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Preprocess a region of an RGB image into a normalized NHWC tensor
    ///
    /// Steps:
    /// 1. Crop to the region of interest
    /// 2. Resize to target dimensions
    /// 3. Convert to float and normalize to [0, 1]
    ///
    /// Returns: Array4<f32> with shape [1, height, width, 3]
    pub fn preprocess(&self, image: &RgbImage, roi: &Roi) -> Result<Array4<f32>, DetectorError> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (frame_width, frame_height) = image.dimensions();
        if roi.width == 0
            || roi.height == 0
            || roi.x + roi.width > frame_width
            || roi.y + roi.height > frame_height
        {
            return Err(DetectorError::Inference(format!(
                "region {:?} does not fit a {}x{} frame",
                roi, frame_width, frame_height
            )));
        }

        let cropped = imageops::crop_imm(image, roi.x, roi.y, roi.width, roi.height).to_image();

        let resized = if cropped.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                &cropped,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            cropped
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, height as usize, width as usize, 3));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, y as usize, x as usize, channel]] = pixel[channel] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn tensor_is_nhwc_and_normalized() {
        let image = RgbImage::from_pixel(10, 10, Rgb([255, 0, 51]));
        let preprocessor = Preprocessor::new(4, 4);

        let tensor = preprocessor
            .preprocess(&image, &Roi::full_frame(10, 10))
            .unwrap();

        assert_eq!(tensor.shape(), &[1, 4, 4, 3]);
        assert!((tensor[[0, 2, 1, 0]] - 1.0).abs() < 1e-2);
        assert!(tensor[[0, 2, 1, 1]].abs() < 1e-2);
        assert!((tensor[[0, 2, 1, 2]] - 0.2).abs() < 1e-2);
    }

    #[test]
    fn region_outside_frame_is_rejected() {
        let image = RgbImage::new(10, 10);
        let roi = Roi {
            x: 8,
            y: 0,
            width: 5,
            height: 5,
        };
        assert!(Preprocessor::new(4, 4).preprocess(&image, &roi).is_err());
    }

    #[test]
    fn region_around_landmarks_is_square_and_clamped() {
        let landmarks = [Landmark::new(0.4, 0.4), Landmark::new(0.6, 0.5)];

        // box is 80x40 px on a 400x400 frame, doubled to 160
        let roi = Roi::around(&landmarks, 400, 400, 2.0).unwrap();
        assert_eq!(roi, Roi { x: 120, y: 100, width: 160, height: 160 });

        let corner = [Landmark::new(0.0, 0.0), Landmark::new(0.1, 0.1)];
        let roi = Roi::around(&corner, 100, 100, 2.0).unwrap();
        assert_eq!((roi.x, roi.y), (0, 0));
        assert_eq!((roi.width, roi.height), (15, 15));

        assert!(Roi::around(&[], 100, 100, 2.0).is_none());
        assert!(Roi::around(&[Landmark::new(0.5, 0.5)], 100, 100, 2.0).is_none());
    }

    #[test]
    fn input_points_map_back_to_the_frame() {
        let roi = Roi { x: 100, y: 50, width: 200, height: 200 };
        let (x, y) = roi.to_frame((112.0, 224.0), (224, 224), (400, 300));
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 250.0 / 300.0).abs() < 1e-6);
    }
}
