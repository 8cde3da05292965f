mod backend;
mod backends;

use std::path::PathBuf;

pub use backend::DetectorBackend;
#[cfg(feature = "detect-rustface")]
pub use backends::RustfaceBackend;
pub use backends::StubBackend;

use crate::error::{Error, Result};

pub const DEFAULT_DETECTOR_MODEL: &str = "../Models/seeta_fd_frontal_v1.0.bin";

/// Detector selection and tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSettings {
    /// Backend name: "rustface" or "stub".
    pub backend: String,
    /// Cascade model file (rustface only).
    pub model_path: PathBuf,
    /// Smallest face edge, in pixels, that the cascade scans for.
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale_factor: f32,
    pub window_step: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: "rustface".to_string(),
            model_path: PathBuf::from(DEFAULT_DETECTOR_MODEL),
            min_face_size: 40,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            window_step: 4,
        }
    }
}

/// Construct the configured detector backend.
pub fn build_detector(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let mut backend: Box<dyn DetectorBackend> = match settings.backend.as_str() {
        "stub" => Box::new(StubBackend::new()),
        #[cfg(feature = "detect-rustface")]
        "rustface" => Box::new(RustfaceBackend::new(&settings.model_path, settings)?),
        #[cfg(not(feature = "detect-rustface"))]
        "rustface" => {
            return Err(Error::DetectionFailure(
                "rustface backend requires the detect-rustface feature".to_string(),
            ))
        }
        other => {
            return Err(Error::DetectionFailure(format!(
                "unknown detector backend '{}'",
                other
            )))
        }
    };
    backend.warm_up()?;
    log::debug!("detector backend '{}' ready", backend.name());
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_stub_backend() {
        let settings = DetectorSettings {
            backend: "stub".to_string(),
            ..DetectorSettings::default()
        };
        let backend = build_detector(&settings).unwrap();
        assert_eq!(backend.name(), "stub");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let settings = DetectorSettings {
            backend: "haar-magic".to_string(),
            ..DetectorSettings::default()
        };
        assert!(matches!(
            build_detector(&settings),
            Err(Error::DetectionFailure(_))
        ));
    }

    #[cfg(feature = "detect-rustface")]
    #[test]
    fn missing_cascade_model_fails_to_load() {
        let settings = DetectorSettings {
            model_path: PathBuf::from("/nonexistent/seeta.bin"),
            ..DetectorSettings::default()
        };
        assert!(matches!(
            build_detector(&settings),
            Err(Error::ModelLoadFailure { .. })
        ));
    }
}
