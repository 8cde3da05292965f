#![cfg(feature = "detect-rustface")]

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::GrayImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::DetectorSettings;
use crate::error::{Error, Result};
use crate::frame::FaceRegion;

/// Cascade face detector backed by `rustface` (SeetaFace funnel cascade).
///
/// The model file is loaded once; detection parameters come from `DetectorSettings`.
pub struct RustfaceBackend {
    detector: Box<dyn ::rustface::Detector>,
}

impl RustfaceBackend {
    /// Load a SeetaFace model from disk.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: &DetectorSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let load_failure = |reason: String| Error::ModelLoadFailure {
            path: model_path.to_path_buf(),
            reason,
        };
        let file = File::open(model_path).map_err(|e| load_failure(e.to_string()))?;
        let model =
            ::rustface::read_model(BufReader::new(file)).map_err(|e| load_failure(e.to_string()))?;

        let mut detector = ::rustface::create_detector_with_model(model);
        detector.set_min_face_size(settings.min_face_size);
        detector.set_score_thresh(settings.score_threshold);
        detector.set_pyramid_scale_factor(settings.pyramid_scale_factor);
        detector.set_slide_window_step(settings.window_step, settings.window_step);

        log::info!(
            "cascade model loaded successfully from {}",
            model_path.display()
        );
        Ok(Self { detector })
    }
}

impl DetectorBackend for RustfaceBackend {
    fn name(&self) -> &'static str {
        "rustface"
    }

    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRegion>> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::DetectionFailure("empty image".to_string()));
        }
        let faces = self
            .detector
            .detect(&::rustface::ImageData::new(gray.as_raw(), width, height));

        Ok(faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                FaceRegion::from_signed_box(
                    bbox.x(),
                    bbox.y(),
                    bbox.width(),
                    bbox.height(),
                    width,
                    height,
                )
            })
            .collect())
    }
}
