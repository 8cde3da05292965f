//! Face recognition: the recognizer seam, the native LBPH model, and the
//! per-frame recognition decision.

mod decision;
pub mod lbph;

use image::GrayImage;

use crate::error::Result;

pub use decision::{
    confidence_from_distance, decide, Decision, Identity, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use lbph::{LbphParams, LbphRecognizer, DEFAULT_RECOGNIZER_MODEL};

/// Outcome of a single `predict` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// Nearest enrolled label, or `None` when the recognizer rejected the face.
    pub label: Option<u32>,
    /// Raw distance to the nearest enrolled face. Lower is closer.
    pub distance: f64,
}

/// Identity predictor over cropped grayscale faces.
pub trait Recognizer {
    fn predict(&self, face: &GrayImage) -> Result<Prediction>;
}

impl<R: Recognizer + ?Sized> Recognizer for Box<R> {
    fn predict(&self, face: &GrayImage) -> Result<Prediction> {
        (**self).predict(face)
    }
}
