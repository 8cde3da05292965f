//! Training footage sources.
//!
//! `VideoSource` decodes a local file frame by frame:
//! - still images (png, jpg, bmp, pnm) decode as a one-frame video
//! - other files decode through FFmpeg (feature: ingest-file-ffmpeg)
//!
//! Without the FFmpeg feature, video files fail to open and the training
//! loader skips them.

use std::path::{Path, PathBuf};

use image::DynamicImage;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::video_ffmpeg::FfmpegVideoSource;
use crate::error::{Error, Result};
use crate::frame::Frame;

const STILL_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pgm", "ppm", "pnm"];

/// Sequential frame reader over a local file.
pub struct VideoSource {
    path: PathBuf,
    backend: VideoBackend,
}

enum VideoBackend {
    Still(StillImageSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegVideoSource),
}

impl VideoSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let backend = if is_still_image(&path) {
            VideoBackend::Still(StillImageSource::open(&path)?)
        } else {
            open_video_backend(&path)?
        };
        Ok(Self { path, backend })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the next frame. `Ok(None)` once the file is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            VideoBackend::Still(source) => Ok(source.next_frame()),
            #[cfg(feature = "ingest-file-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    /// Frames decoded so far.
    pub fn frames_read(&self) -> u64 {
        match &self.backend {
            VideoBackend::Still(source) => source.frames_read,
            #[cfg(feature = "ingest-file-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.frames_read(),
        }
    }
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_video_backend(path: &Path) -> Result<VideoBackend> {
    Ok(VideoBackend::Ffmpeg(FfmpegVideoSource::open(path)?))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_video_backend(path: &Path) -> Result<VideoBackend> {
    Err(Error::Decode {
        path: path.to_path_buf(),
        reason: "video decoding requires the ingest-file-ffmpeg feature".to_string(),
    })
}

fn is_still_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| STILL_EXTENSIONS.contains(&ext.as_str()))
}

struct StillImageSource {
    frame: Option<Frame>,
    frames_read: u64,
}

impl StillImageSource {
    fn open(path: &Path) -> Result<Self> {
        let decoded = image::open(path).map_err(|e| Error::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let frame = match decoded {
            DynamicImage::ImageLuma8(gray) => Frame::from_gray(gray, 1),
            other => Frame::from_rgb(other.to_rgb8(), 1),
        };
        Ok(Self {
            frame: Some(frame),
            frames_read: 0,
        })
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let frame = self.frame.take()?;
        self.frames_read += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn still_image_is_a_single_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("face.png");
        GrayImage::from_pixel(6, 4, Luma([77]))
            .save(&path)
            .expect("write png");

        let mut source = VideoSource::open(&path)?;
        let frame = source.next_frame()?.expect("one frame");
        assert_eq!((frame.width(), frame.height()), (6, 4));
        assert_eq!(frame.channels(), 1);
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.frames_read(), 1);
        Ok(())
    }

    #[test]
    fn corrupt_image_fails_to_open() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg")?;

        assert!(matches!(
            VideoSource::open(&path),
            Err(Error::Decode { .. })
        ));
        Ok(())
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        assert!(is_still_image(Path::new("a/B.PNG")));
        assert!(!is_still_image(Path::new("clip.mp4")));
        assert!(!is_still_image(Path::new("noext")));
    }
}
