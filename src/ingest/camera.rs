//! Camera frame source.
//!
//! `CameraSource` wraps a single capture device. Device paths such as
//! `/dev/video0` use V4L2 (feature: ingest-v4l2). `stub://` devices are
//! synthetic and exist for tests and demos:
//!
//! - `stub://unavailable`: `connect` fails as if no camera were attached
//! - `stub://empty`: every read is empty
//! - `stub://blank`: uniform frames with no texture
//! - any other `stub://` name: textured RGB frames that change every frame
//!
//! A read that produces no pixels is reported as `Ok(None)`; device errors are `Err`.

use crate::error::{Error, Result};
use crate::frame::Frame;
#[cfg(feature = "ingest-v4l2")]
use super::v4l2::DeviceV4l2Source;

pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
pub const DEFAULT_CAMERA_FPS: u32 = 30;

/// Configuration for a camera source.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or `stub://name`.
    pub device: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_CAMERA_DEVICE.to_string(),
            target_fps: DEFAULT_CAMERA_FPS,
            width: 640,
            height: 480,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub empty_reads: u64,
    pub device: String,
}

pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceV4l2Source),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(DeviceV4l2Source::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(Error::CameraUnavailable {
                device: config.device,
                reason: "camera capture requires the ingest-v4l2 feature".to_string(),
            })
        }
    }

    /// Open the device.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    pub fn is_open(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.open,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_open(),
        }
    }

    /// Read the next frame. `Ok(None)` when the device produced an empty frame.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    /// Close the device. Safe to call more than once.
    pub fn release(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.release(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.release(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.open,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    open: bool,
    frame_count: u64,
    empty_reads: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            open: false,
            frame_count: 0,
            empty_reads: 0,
        }
    }

    fn scene(&self) -> &str {
        self.config.device.trim_start_matches("stub://")
    }

    fn connect(&mut self) -> Result<()> {
        if self.scene() == "unavailable" {
            return Err(Error::CameraUnavailable {
                device: self.config.device.clone(),
                reason: "no camera attached".to_string(),
            });
        }
        self.open = true;
        log::info!("CameraSource: connected to {} (synthetic)", self.config.device);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Err(Error::CameraUnavailable {
                device: self.config.device.clone(),
                reason: "camera not connected".to_string(),
            });
        }
        if self.scene() == "empty" {
            self.empty_reads += 1;
            return Ok(None);
        }

        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::from_rgb_bytes(pixels, self.config.width, self.config.height, self.frame_count)
            .map(Some)
    }

    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        if self.scene() == "blank" {
            return vec![96u8; pixel_count];
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 / 3 + self.frame_count) % 256) as u8;
        }
        pixels
    }

    fn release(&mut self) {
        if self.open {
            log::debug!("CameraSource: released {}", self.config.device);
        }
        self.open = false;
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            empty_reads: self.empty_reads,
            device: self.config.device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(device: &str) -> CameraConfig {
        CameraConfig {
            device: device.to_string(),
            target_fps: 30,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_camera_produces_frames() -> Result<()> {
        let mut camera = CameraSource::new(stub_config("stub://test"))?;
        camera.connect()?;

        let frame = camera.next_frame()?.expect("frame");
        assert_eq!((frame.width(), frame.height()), (64, 48));
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.sequence, 1);
        assert_eq!(camera.stats().frames_captured, 1);
        Ok(())
    }

    #[test]
    fn read_before_connect_fails() -> Result<()> {
        let mut camera = CameraSource::new(stub_config("stub://test"))?;
        assert!(camera.next_frame().is_err());
        Ok(())
    }

    #[test]
    fn empty_reads_are_not_errors() -> Result<()> {
        let mut camera = CameraSource::new(stub_config("stub://empty"))?;
        camera.connect()?;
        assert!(camera.next_frame()?.is_none());
        assert_eq!(camera.stats().empty_reads, 1);
        Ok(())
    }

    #[test]
    fn unavailable_camera_fails_to_connect() -> Result<()> {
        let mut camera = CameraSource::new(stub_config("stub://unavailable"))?;
        assert!(matches!(
            camera.connect(),
            Err(Error::CameraUnavailable { .. })
        ));
        assert!(!camera.is_open());
        Ok(())
    }

    #[test]
    fn release_is_idempotent() -> Result<()> {
        let mut camera = CameraSource::new(stub_config("stub://test"))?;
        camera.connect()?;
        assert!(camera.is_open());
        camera.release();
        camera.release();
        assert!(!camera.is_open());
        Ok(())
    }
}
