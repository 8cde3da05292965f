//! Frame sources.
//!
//! - Camera capture for live recognition (`CameraSource`):
//!   - USB/V4L2 devices (feature: ingest-v4l2)
//!   - Synthetic `stub://` devices (testing)
//! - Training footage (`VideoSource`):
//!   - Still images, always available
//!   - Video files (feature: ingest-file-ffmpeg)
//!
//! All sources produce `Frame` values in RGB or gray; camera-specific pixel
//! formats are converted in `normalize`.

pub mod camera;
pub mod normalize;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;
pub mod video;
#[cfg(feature = "ingest-file-ffmpeg")]
mod video_ffmpeg;

pub use camera::{CameraConfig, CameraSource, CameraStats};
pub use video::VideoSource;
