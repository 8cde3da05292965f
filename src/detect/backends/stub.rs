use image::GrayImage;

use crate::detect::backend::DetectorBackend;
use crate::error::Result;
use crate::frame::FaceRegion;

/// Stub backend for synthetic sources and tests.
///
/// Returns a fixed list of regions, or the whole frame when none are set.
/// Blank frames (a single luma value everywhere) yield no regions.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    regions: Vec<FaceRegion>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_regions(regions: Vec<FaceRegion>) -> Self {
        Self { regions }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRegion>> {
        let Some(first) = gray.pixels().next() else {
            return Ok(Vec::new());
        };
        if gray.pixels().all(|p| p[0] == first[0]) {
            return Ok(Vec::new());
        }

        if self.regions.is_empty() {
            return Ok(vec![FaceRegion::new(0, 0, gray.width(), gray.height())]);
        }
        Ok(self
            .regions
            .iter()
            .filter_map(|r| r.clamp_to(gray.width(), gray.height()))
            .collect())
    }
}
