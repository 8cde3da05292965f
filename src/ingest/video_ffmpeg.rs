//! FFmpeg-backed video decoding for training footage.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::error::{Error, Result};
use crate::frame::Frame;

pub(crate) struct FfmpegVideoSource {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frames_read: u64,
    eof_sent: bool,
}

impl FfmpegVideoSource {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let decode_error = |reason: String| Error::Decode {
            path: path.to_path_buf(),
            reason,
        };

        ffmpeg::init().map_err(|e| decode_error(format!("initialize ffmpeg: {}", e)))?;
        let input = ffmpeg::format::input(&path).map_err(|e| decode_error(e.to_string()))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| decode_error("file has no video track".to_string()))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| decode_error(format!("load video decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| decode_error(format!("open video decoder: {}", e)))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| decode_error(format!("create scaler: {}", e)))?;

        log::debug!(
            "opened {} ({}x{})",
            path.display(),
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            path: path.to_path_buf(),
            input,
            stream_index,
            decoder,
            scaler,
            frames_read: 0,
            eof_sent: false,
        })
    }

    pub(crate) fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .map_err(|e| self.decode_error(format!("scale frame to RGB: {}", e)))?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)
                    .ok_or_else(|| self.decode_error("frame row out of bounds".to_string()))?;
                self.frames_read += 1;
                return Frame::from_rgb_bytes(pixels, width, height, self.frames_read).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .map_err(|e| self.decode_error(format!("send packet: {}", e)))?,
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| self.decode_error(format!("flush decoder: {}", e)))?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        for (stream, packet) in self.input.packets() {
            if stream.index() == self.stream_index {
                return Some(packet);
            }
        }
        None
    }

    fn decode_error(&self, reason: String) -> Error {
        Error::Decode {
            path: self.path.clone(),
            reason,
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Option<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Some((data.get(..row_bytes * height as usize)?.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(data.get(start..start + row_bytes)?);
    }
    Some((pixels, width, height))
}
