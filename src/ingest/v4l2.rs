//! V4L2 capture device.
//!
//! Requests RGB3 at the configured size and falls back to whatever the driver
//! negotiates; YUYV, NV12, GREY and MJPG buffers are normalized in `normalize`.

use std::time::{Duration, Instant};

use ouroboros::self_referencing;

use super::camera::{CameraConfig, CameraStats};
use super::normalize::{normalize_frame, PixelFormat};
use crate::error::{Error, Result};
use crate::frame::Frame;

pub(crate) struct DeviceV4l2Source {
    config: CameraConfig,
    state: Option<DeviceV4l2State>,
    format: PixelFormat,
    frame_count: u64,
    empty_reads: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct DeviceV4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceV4l2Source {
    pub(crate) fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame_count: 0,
            empty_reads: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn unavailable(&self, reason: impl ToString) -> Error {
        Error::CameraUnavailable {
            device: self.config.device.clone(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .map_err(|e| self.unavailable(format!("open device: {}", e)))?;
        let mut format = device
            .format()
            .map_err(|e| self.unavailable(format!("read format: {}", e)))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .map_err(|e| self.unavailable(format!("read format: {}", e)))?
            }
        };
        self.format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            self.unavailable(format!("unsupported pixel format {}", format.fourcc))
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "CameraSource: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceV4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
            },
        }
        .try_build()
        .map_err(|e| {
            self.last_error = Some(e.to_string());
            self.unavailable(format!("create buffer stream: {}", e))
        })?;
        self.state = Some(state);
        self.last_error = None;

        log::info!(
            "CameraSource: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.is_some()
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Err(self.unavailable("camera not connected"));
        };
        let captured = state.with_mut(|fields| {
            fields
                .stream
                .next()
                .map(|(buf, meta)| buf[..(meta.bytesused as usize).min(buf.len())].to_vec())
        });
        let buf = match captured {
            Ok(buf) => buf,
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Err(self.unavailable(format!("capture frame: {}", err)));
            }
        };

        if buf.is_empty() {
            self.empty_reads += 1;
            return Ok(None);
        }

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        normalize_frame(
            &buf,
            self.active_width,
            self.active_height,
            self.format,
            self.frame_count,
        )
        .map(Some)
    }

    pub(crate) fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("CameraSource: released {}", self.config.device);
        }
    }

    pub(crate) fn is_healthy(&self) -> bool {
        if self.last_error.is_some() || self.state.is_none() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            empty_reads: self.empty_reads,
            device: self.config.device.clone(),
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}
