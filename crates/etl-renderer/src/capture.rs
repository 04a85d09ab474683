//! Frame capture: screenshots and video frames
//!
//! Read-back pixels arrive bottom-up as tightly packed RGB.

use std::fs;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::{ExtendedColorType, ImageEncoder};
use rayon::prelude::*;

use crate::commands::ScreenshotFormat;
use crate::error::CaptureError;

pub const JPEG_QUALITY: u8 = 90;

/// Reverse the row order of a `width` x `height` image.
pub fn flip_rows(pixels: &[u8], width: usize, height: usize, bytes_per_pixel: usize) -> Vec<u8> {
    let row = width * bytes_per_pixel;
    let mut out = vec![0u8; row * height];
    if row == 0 {
        return out;
    }
    out.par_chunks_mut(row).enumerate().for_each(|(y, dst)| {
        let src = (height - 1 - y) * row;
        dst.copy_from_slice(&pixels[src..src + row]);
    });
    out
}

/// Encode top-down RGB pixels.
pub fn encode_rgb(pixels: &[u8], width: u32, height: u32, format: ScreenshotFormat) -> Result<Vec<u8>, CaptureError> {
    if width == 0 || height == 0 {
        return Err(CaptureError::EmptyRegion);
    }

    let mut out = Vec::new();
    match format {
        ScreenshotFormat::Tga => TgaEncoder::new(&mut out).write_image(pixels, width, height, ExtendedColorType::Rgb8)?,
        ScreenshotFormat::Png => PngEncoder::new(&mut out).write_image(pixels, width, height, ExtendedColorType::Rgb8)?,
        ScreenshotFormat::Jpeg => JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).write_image(
            pixels,
            width,
            height,
            ExtendedColorType::Rgb8,
        )?,
    }
    Ok(out)
}

/// Flip, encode and write a read-back region to `path`.
pub fn write_screenshot(
    path: &Path,
    pixels: &[u8],
    width: u32,
    height: u32,
    format: ScreenshotFormat,
) -> Result<(), CaptureError> {
    if width == 0 || height == 0 {
        return Err(CaptureError::EmptyRegion);
    }
    let flipped = flip_rows(pixels, width as usize, height as usize, 3);
    let encoded = encode_rgb(&flipped, width, height, format)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, encoded)?;
    Ok(())
}

/// A captured video frame.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// JPEG stream when `motion_jpeg`, otherwise bottom-up BGR.
    pub data: Vec<u8>,
    pub motion_jpeg: bool,
}

impl VideoFrame {
    /// Build a frame from bottom-up RGB read-back.
    pub fn from_readback(pixels: &[u8], width: u32, height: u32, motion_jpeg: bool) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyRegion);
        }

        let data = if motion_jpeg {
            let flipped = flip_rows(pixels, width as usize, height as usize, 3);
            encode_rgb(&flipped, width, height, ScreenshotFormat::Jpeg)?
        } else {
            let mut bgr = pixels.to_vec();
            bgr.par_chunks_mut(3).for_each(|px| px.swap(0, 2));
            bgr
        };

        Ok(Self { width, height, data, motion_jpeg })
    }
}

/// Receives video frames (usually an AVI writer owned by the client).
pub trait VideoSink: Send {
    fn write_frame(&mut self, frame: VideoFrame);
}
