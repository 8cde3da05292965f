//! Display surfaces for annotated frames.
//!
//! A `DisplaySink` receives color frames already scaled to fit its surface.
//! `FileSink` keeps the latest frame on disk for an external viewer;
//! `NullSink` only counts frames.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{imageops, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::error::{Error, Result};
use crate::frame::FaceRegion;

pub const DEFAULT_SURFACE_WIDTH: u32 = 640;
pub const DEFAULT_SURFACE_HEIGHT: u32 = 480;

pub trait DisplaySink {
    /// Size of the destination surface in pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Show a frame that already fits the surface.
    fn present(&mut self, image: &RgbImage) -> Result<()>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for &mut S {
    fn surface_size(&self) -> (u32, u32) {
        (**self).surface_size()
    }

    fn present(&mut self, image: &RgbImage) -> Result<()> {
        (**self).present(image)
    }
}

/// Largest size with the aspect ratio of `width x height` that fits in `max_width x max_height`.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
        return (0, 0);
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_height);
    (w, h)
}

/// Scale `image` to the sink's surface, keeping its aspect ratio, and present it.
pub fn present_scaled<S: DisplaySink + ?Sized>(sink: &mut S, image: &RgbImage) -> Result<()> {
    let (max_w, max_h) = sink.surface_size();
    let (w, h) = fit_within(image.width(), image.height(), max_w, max_h);
    if (w, h) == image.dimensions() {
        return sink.present(image);
    }
    if w == 0 || h == 0 {
        log::debug!("display: nothing to present for {:?}", image.dimensions());
        return Ok(());
    }
    let scaled = imageops::resize(image, w, h, imageops::FilterType::Triangle);
    sink.present(&scaled)
}

/// Rectangle and caption colors for an annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnotationStyle {
    pub color: Rgb<u8>,
    pub thickness: u32,
}

impl AnnotationStyle {
    /// Style used by the continuous capture loop.
    pub const LOOP: AnnotationStyle = AnnotationStyle {
        color: Rgb([0, 255, 0]),
        thickness: 2,
    };

    /// Style used by single-frame capture.
    pub const SINGLE: AnnotationStyle = AnnotationStyle {
        color: Rgb([0, 0, 255]),
        thickness: 2,
    };
}

/// Draws face boxes and captions onto color frames.
///
/// Captions need a TrueType font; without one only the box is drawn.
pub struct Annotator {
    font: Option<FontVec>,
    scale: f32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    pub fn new() -> Self {
        Self {
            font: None,
            scale: 24.0,
        }
    }

    pub fn with_font_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| Error::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            font: Some(font),
            scale: 24.0,
        })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(
        &self,
        image: &mut RgbImage,
        region: FaceRegion,
        caption: &str,
        style: AnnotationStyle,
    ) {
        let Some(region) = region.clamp_to(image.width(), image.height()) else {
            return;
        };
        for t in 0..style.thickness {
            let (Some(w), Some(h)) = (
                region.width.checked_sub(2 * t),
                region.height.checked_sub(2 * t),
            ) else {
                break;
            };
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((region.x + t) as i32, (region.y + t) as i32).of_size(w, h);
            draw_hollow_rect_mut(image, rect, style.color);
        }

        if let Some(font) = &self.font {
            let y = region.y as i32 - self.scale as i32;
            draw_text_mut(
                image,
                style.color,
                region.x as i32,
                y.max(0),
                PxScale::from(self.scale),
                font,
                caption,
            );
        } else {
            log::debug!("annotation at {:?}: {}", region, caption);
        }
    }
}

/// Writes the latest frame to an image file, replacing it atomically.
pub struct FileSink {
    path: PathBuf,
    format: ImageFormat,
    surface: (u32, u32),
    presented: u64,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(path: P, surface: (u32, u32)) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = ImageFormat::from_path(&path).map_err(|e| Error::Decode {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            format,
            surface,
            presented: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }
}

impl DisplaySink for FileSink {
    fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    fn present(&mut self, image: &RgbImage) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        image
            .save_with_format(&tmp_path, self.format)
            .map_err(|e| Error::Decode {
                path: tmp_path.clone(),
                reason: e.to_string(),
            })?;
        fs::rename(&tmp_path, &self.path)?;
        self.presented += 1;
        Ok(())
    }
}

/// Discards frames; keeps counters for tests and headless runs.
#[derive(Clone, Debug)]
pub struct NullSink {
    surface: (u32, u32),
    presented: u64,
    last_size: Option<(u32, u32)>,
}

impl NullSink {
    pub fn new(surface: (u32, u32)) -> Self {
        Self {
            surface,
            presented: 0,
            last_size: None,
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.last_size
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new((DEFAULT_SURFACE_WIDTH, DEFAULT_SURFACE_HEIGHT))
    }
}

impl DisplaySink for NullSink {
    fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    fn present(&mut self, image: &RgbImage) -> Result<()> {
        self.presented += 1;
        self.last_size = Some(image.dimensions());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_aspect_ratio() {
        assert_eq!(fit_within(1280, 720, 640, 480), (640, 360));
        assert_eq!(fit_within(480, 640, 640, 480), (360, 480));
        assert_eq!(fit_within(320, 240, 640, 480), (640, 480));
        assert_eq!(fit_within(0, 240, 640, 480), (0, 0));
    }

    #[test]
    fn present_scaled_resizes_to_surface() -> Result<()> {
        let mut sink = NullSink::new((100, 100));
        present_scaled(&mut sink, &RgbImage::new(200, 50))?;
        assert_eq!(sink.last_size(), Some((100, 25)));
        assert_eq!(sink.frames_presented(), 1);
        Ok(())
    }

    #[test]
    fn annotate_draws_box_outline() {
        let mut image = RgbImage::new(20, 20);
        let annotator = Annotator::new();
        annotator.annotate(
            &mut image,
            FaceRegion::new(2, 2, 10, 10),
            "alice - 0.300000",
            AnnotationStyle::LOOP,
        );

        assert_eq!(*image.get_pixel(2, 2), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(3, 3), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(11, 11), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(6, 6), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(15, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn file_sink_replaces_latest_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("view").join("latest.png");
        let mut sink = FileSink::new(&path, (32, 32))?;

        present_scaled(&mut sink, &RgbImage::from_pixel(64, 32, Rgb([1, 2, 3])))?;
        present_scaled(&mut sink, &RgbImage::from_pixel(64, 32, Rgb([4, 5, 6])))?;

        let written = image::open(&path).expect("read back").to_rgb8();
        assert_eq!(written.dimensions(), (32, 16));
        assert_eq!(*written.get_pixel(0, 0), Rgb([4, 5, 6]));
        assert_eq!(sink.frames_presented(), 2);
        Ok(())
    }

    #[test]
    fn file_sink_needs_known_extension() {
        assert!(FileSink::new("/tmp/astra-view.unknownext", (10, 10)).is_err());
    }
}
