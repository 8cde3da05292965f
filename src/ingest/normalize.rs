//! Camera pixel formats to `Frame`.

use image::ImageFormat;

use crate::error::{Error, Result};
use crate::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Yuyv,
    Nv12,
    Gray8,
    Mjpeg,
}

impl PixelFormat {
    /// Map a V4L2 fourcc to a supported format.
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"NV12" => Some(PixelFormat::Nv12),
            b"GREY" => Some(PixelFormat::Gray8),
            b"MJPG" => Some(PixelFormat::Mjpeg),
            _ => None,
        }
    }
}

/// Convert a captured buffer into a frame.
///
/// RGB and gray buffers keep their channel count; YUV and MJPEG buffers become RGB.
pub fn normalize_frame(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: u64,
) -> Result<Frame> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = plane_len(width, height, 3)?;
            check_len("RGB", pixels, expected)?;
            Frame::from_rgb_bytes(pixels[..expected].to_vec(), width, height, sequence)
        }
        PixelFormat::Gray8 => {
            let expected = plane_len(width, height, 1)?;
            check_len("GREY", pixels, expected)?;
            Frame::from_gray_bytes(pixels[..expected].to_vec(), width, height, sequence)
        }
        PixelFormat::Yuyv => {
            Frame::from_rgb_bytes(yuyv_to_rgb(pixels, width, height)?, width, height, sequence)
        }
        PixelFormat::Nv12 => {
            Frame::from_rgb_bytes(nv12_to_rgb(pixels, width, height)?, width, height, sequence)
        }
        PixelFormat::Mjpeg => {
            let decoded = image::load_from_memory_with_format(pixels, ImageFormat::Jpeg)
                .map_err(|e| Error::Decode {
                    path: "mjpeg frame".into(),
                    reason: e.to_string(),
                })?;
            Ok(Frame::from_rgb(decoded.to_rgb8(), sequence))
        }
    }
}

fn plane_len(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(bytes_per_pixel))
        .ok_or_else(|| frame_error("frame dimensions overflow".to_string()))
}

/// Capture buffers may be padded past the frame; only short buffers are rejected.
fn check_len(kind: &str, pixels: &[u8], expected: usize) -> Result<()> {
    if pixels.len() < expected {
        return Err(frame_error(format!(
            "{} frame length mismatch: expected {}, got {}",
            kind,
            expected,
            pixels.len()
        )));
    }
    Ok(())
}

fn frame_error(reason: String) -> Error {
    Error::Decode {
        path: "camera frame".into(),
        reason,
    }
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = plane_len(width, height, 2)?;
    check_len("YUYV", pixels, expected)?;

    let mut rgb = Vec::with_capacity(plane_len(width, height, 3)?);
    for chunk in pixels[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            rgb.extend_from_slice(&yuv_to_rgb(y as f32, u, v));
        }
    }
    Ok(rgb)
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = plane_len(width, height, 1)?;
    let expected = y_plane + y_plane / 2;
    check_len("NV12", pixels, expected)?;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let offset = (j * w + i) * 3;
            rgb[offset..offset + 3].copy_from_slice(&yuv_to_rgb(y, u, v));
        }
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [u8; 3] {
    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;
    [clamp_to_u8(r), clamp_to_u8(g), clamp_to_u8(b)]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Pixels;

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let nv12 = [vec![128u8; 4], vec![128u8; 2]].concat();

        let frame = normalize_frame(&nv12, 2, 2, PixelFormat::Nv12, 1)?;
        assert_eq!(frame.to_rgb().into_raw(), vec![128u8; 12]);
        Ok(())
    }

    #[test]
    fn yuyv_neutral_chroma_is_gray() -> Result<()> {
        // Two pixels: Y0=50, Y1=200, neutral U/V.
        let yuyv = [50u8, 128, 200, 128];
        let frame = normalize_frame(&yuyv, 2, 1, PixelFormat::Yuyv, 1)?;
        assert_eq!(frame.to_rgb().into_raw(), vec![50, 50, 50, 200, 200, 200]);
        Ok(())
    }

    #[test]
    fn grey_stays_single_channel() -> Result<()> {
        let frame = normalize_frame(&[1, 2, 3, 4], 2, 2, PixelFormat::Gray8, 3)?;
        assert!(matches!(frame.pixels(), Pixels::Gray(_)));
        assert_eq!(frame.sequence, 3);
        Ok(())
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(normalize_frame(&[0u8; 5], 2, 1, PixelFormat::Rgb24, 1).is_err());
        assert!(normalize_frame(&[0u8; 3], 2, 1, PixelFormat::Yuyv, 1).is_err());
    }

    #[test]
    fn fourcc_mapping() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"H264"), None);
    }
}
