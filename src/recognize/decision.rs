use crate::detect::DetectorBackend;
use crate::error::Result;
use crate::frame::{FaceRegion, Frame};
use crate::index::LabelIndex;

use super::Recognizer;

/// Minimum confidence for a prediction to count as a match.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.2;

/// Map a raw recognizer distance to a confidence score.
///
/// Assumes distances on a 0..100 scale. Values outside that range produce a
/// confidence outside 0..1; the result is not clamped.
pub fn confidence_from_distance(distance: f64) -> f64 {
    1.0 - distance / 100.0
}

/// A resolved identity for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    pub label: u32,
    pub name: String,
    pub confidence: f64,
    pub region: FaceRegion,
}

/// Result of the recognition decision for one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    /// The detector found no face.
    NoDetection,
    /// A face was found but the prediction fell below the threshold
    /// (or the recognizer rejected it outright).
    NoConfidentMatch {
        region: FaceRegion,
        label: Option<u32>,
        confidence: f64,
    },
    Identified(Identity),
}

impl Decision {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Decision::Identified(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            Decision::Identified(identity) => Some(identity),
            _ => None,
        }
    }

    /// Region the decision was made on, if any face was detected.
    pub fn region(&self) -> Option<FaceRegion> {
        match self {
            Decision::NoDetection => None,
            Decision::NoConfidentMatch { region, .. } => Some(*region),
            Decision::Identified(identity) => Some(identity.region),
        }
    }
}

/// Decide who, if anyone, is in `frame`.
///
/// Only the first region returned by the detector is considered. A confident
/// prediction whose label is missing from `index` fails with `UnknownLabel`.
pub fn decide<D, R>(
    frame: &Frame,
    detector: &mut D,
    recognizer: &R,
    index: &LabelIndex,
    threshold: f64,
) -> Result<Decision>
where
    D: DetectorBackend + ?Sized,
    R: Recognizer + ?Sized,
{
    let gray = frame.to_gray();
    let regions = detector.detect(&gray)?;
    let Some(region) = regions.first().copied() else {
        log::debug!("frame {}: no face detected", frame.sequence);
        return Ok(Decision::NoDetection);
    };

    let face = region.crop(&gray)?;
    let prediction = recognizer.predict(&face)?;
    let confidence = confidence_from_distance(prediction.distance);

    match prediction.label {
        Some(label) if confidence >= threshold => {
            let name = index.resolve(label)?.to_string();
            log::info!("[username] {} ### [confidence] {:.4}", name, confidence);
            Ok(Decision::Identified(Identity {
                label,
                name,
                confidence,
                region,
            }))
        }
        label => {
            log::debug!(
                "frame {}: no confident match (face detected, confidence {:.4})",
                frame.sequence,
                confidence
            );
            Ok(Decision::NoConfidentMatch {
                region,
                label,
                confidence,
            })
        }
    }
}
