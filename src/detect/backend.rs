use image::GrayImage;

use crate::error::Result;
use crate::frame::FaceRegion;

/// Face detector backend.
///
/// Backends receive the grayscale working buffer of a frame and return face
/// regions in pixel coordinates of that buffer. Region order is backend
/// defined; callers that need a single face take the first one.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a grayscale image.
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRegion>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: DetectorBackend + ?Sized> DetectorBackend for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRegion>> {
        (**self).detect(gray)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
