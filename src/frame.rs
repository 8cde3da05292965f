//! Captured frames and face regions.
//!
//! - `Frame`: an owned camera or video frame, either color (RGB) or single-channel gray.
//! - `FaceRegion`: a pixel rectangle produced by a detector, relative to the frame it came from.
//!
//! Detection and recognition run on the grayscale working buffer returned by
//! `Frame::to_gray`. Display always uses the color frame.

use image::{imageops, GrayImage, RgbImage};

use crate::error::{Error, Result};

/// Pixel storage of a frame.
#[derive(Clone, Debug)]
pub enum Pixels {
    Color(RgbImage),
    Gray(GrayImage),
}

/// A single captured frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Pixels,
    /// Capture sequence number within its source (1-based).
    pub sequence: u64,
}

impl Frame {
    pub fn from_rgb(image: RgbImage, sequence: u64) -> Self {
        Self {
            pixels: Pixels::Color(image),
            sequence,
        }
    }

    pub fn from_gray(image: GrayImage, sequence: u64) -> Self {
        Self {
            pixels: Pixels::Gray(image),
            sequence,
        }
    }

    /// Build a color frame from packed RGB24 bytes.
    pub fn from_rgb_bytes(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let len = data.len();
        let image = RgbImage::from_raw(width, height, data).ok_or_else(|| {
            Error::InvalidFace(format!(
                "RGB buffer of {} bytes does not match {}x{}",
                len, width, height
            ))
        })?;
        Ok(Self::from_rgb(image, sequence))
    }

    /// Build a gray frame from packed 8-bit luma bytes.
    pub fn from_gray_bytes(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let len = data.len();
        let image = GrayImage::from_raw(width, height, data).ok_or_else(|| {
            Error::InvalidFace(format!(
                "gray buffer of {} bytes does not match {}x{}",
                len, width, height
            ))
        })?;
        Ok(Self::from_gray(image, sequence))
    }

    pub fn width(&self) -> u32 {
        match &self.pixels {
            Pixels::Color(img) => img.width(),
            Pixels::Gray(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match &self.pixels {
            Pixels::Color(img) => img.height(),
            Pixels::Gray(img) => img.height(),
        }
    }

    /// Number of color channels (3 for RGB, 1 for gray).
    pub fn channels(&self) -> u8 {
        match &self.pixels {
            Pixels::Color(_) => 3,
            Pixels::Gray(_) => 1,
        }
    }

    /// True when the frame carries no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn pixels(&self) -> &Pixels {
        &self.pixels
    }

    /// Grayscale working buffer. Single-channel frames are used as-is.
    pub fn to_gray(&self) -> GrayImage {
        match &self.pixels {
            Pixels::Color(img) => imageops::grayscale(img),
            Pixels::Gray(img) => img.clone(),
        }
    }

    /// Color copy of the frame in its original channel order.
    pub fn to_rgb(&self) -> RgbImage {
        match &self.pixels {
            Pixels::Color(img) => img.clone(),
            Pixels::Gray(img) => RgbImage::from_fn(img.width(), img.height(), |x, y| {
                let l = img.get_pixel(x, y)[0];
                image::Rgb([l, l, l])
            }),
        }
    }
}

/// Rectangular face region in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Region from a detector box whose origin may lie outside the image.
    ///
    /// The part left of or above the image is cut off, then the rest is
    /// clamped to `width x height`.
    pub fn from_signed_box(
        x: i32,
        y: i32,
        box_width: u32,
        box_height: u32,
        width: u32,
        height: u32,
    ) -> Option<FaceRegion> {
        let box_width = box_width.saturating_sub(x.min(0).unsigned_abs());
        let box_height = box_height.saturating_sub(y.min(0).unsigned_abs());
        FaceRegion::new(x.max(0) as u32, y.max(0) as u32, box_width, box_height)
            .clamp_to(width, height)
    }

    /// Intersect with an image of the given size. `None` when nothing remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<FaceRegion> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(FaceRegion::new(self.x, self.y, w, h))
    }

    /// Copy this region out of a grayscale buffer.
    pub fn crop(&self, gray: &GrayImage) -> Result<GrayImage> {
        let region = self.clamp_to(gray.width(), gray.height()).ok_or_else(|| {
            Error::InvalidFace(format!(
                "region {}x{}+{}+{} lies outside a {}x{} image",
                self.width,
                self.height,
                self.x,
                self.y,
                gray.width(),
                gray.height()
            ))
        })?;
        Ok(imageops::crop_imm(gray, region.x, region.y, region.width, region.height).to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn gray_frames_are_used_as_is() {
        let img = GrayImage::from_fn(4, 3, |x, y| Luma([(x * 10 + y) as u8]));
        let frame = Frame::from_gray(img.clone(), 1);

        assert_eq!(frame.channels(), 1);
        assert_eq!(frame.to_gray(), img);
    }

    #[test]
    fn color_frames_convert_to_gray() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        let frame = Frame::from_rgb(img, 1);

        let gray = frame.to_gray();
        assert_eq!(frame.channels(), 3);
        assert_eq!(gray.dimensions(), (2, 2));
        assert!(gray.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn rgb_bytes_must_match_dimensions() {
        assert!(Frame::from_rgb_bytes(vec![0u8; 12], 2, 2, 1).is_ok());
        assert!(Frame::from_rgb_bytes(vec![0u8; 11], 2, 2, 1).is_err());
    }

    #[test]
    fn crop_clamps_to_image_bounds() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([x as u8]));
        let region = FaceRegion::new(6, 6, 10, 10);

        let face = region.crop(&img).unwrap();
        assert_eq!(face.dimensions(), (4, 4));
        assert_eq!(face.get_pixel(0, 0)[0], 6);
    }

    #[test]
    fn signed_box_is_cut_at_the_origin() {
        assert_eq!(
            FaceRegion::from_signed_box(-10, -4, 30, 20, 100, 100),
            Some(FaceRegion::new(0, 0, 20, 16))
        );
        assert_eq!(
            FaceRegion::from_signed_box(90, 5, 30, 20, 100, 100),
            Some(FaceRegion::new(90, 5, 10, 20))
        );
        assert_eq!(FaceRegion::from_signed_box(-40, 0, 30, 20, 100, 100), None);
        assert_eq!(
            FaceRegion::from_signed_box(12, 8, 30, 20, 100, 100),
            Some(FaceRegion::new(12, 8, 30, 20))
        );
    }

    #[test]
    fn crop_outside_image_fails() {
        let img = GrayImage::new(10, 10);
        assert!(FaceRegion::new(10, 0, 5, 5).crop(&img).is_err());
    }
}
