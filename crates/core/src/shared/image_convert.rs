//! Stateless conversions between encoded payloads, [`Frame`]s and `image`
//! buffers.
//!
//! Every function here is pure: nothing is cached between calls, so stages
//! on different threads can convert concurrently.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("failed to decode image payload: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image payload: {0}")]
    Encode(#[source] image::ImageError),
    #[error("unsupported channel count {0}")]
    Channels(u8),
}

/// Decodes an encoded payload into a frame.
///
/// Luma (with or without alpha) stays single-channel; everything else is
/// converted to RGB.
pub fn decode(payload: &[u8]) -> Result<Frame, ConvertError> {
    let img = image::load_from_memory(payload).map_err(ConvertError::Decode)?;
    Ok(from_dynamic(img))
}

/// Decodes a payload straight to 8-bit luma.
pub fn decode_gray(payload: &[u8]) -> Result<GrayImage, ConvertError> {
    let img = image::load_from_memory(payload).map_err(ConvertError::Decode)?;
    Ok(img.to_luma8())
}

/// Encodes a frame as PNG bytes.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, ConvertError> {
    let img = to_dynamic(frame)?;
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .map_err(ConvertError::Encode)?;
    Ok(bytes.into_inner())
}

pub fn from_dynamic(img: DynamicImage) -> Frame {
    match img {
        DynamicImage::ImageLuma8(gray) => from_gray(gray),
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            from_gray(img.to_luma8())
        }
        other => {
            let rgb = other.to_rgb8();
            let (w, h) = rgb.dimensions();
            Frame::new(rgb.into_raw(), w, h, 3)
        }
    }
}

pub fn from_gray(gray: GrayImage) -> Frame {
    let (w, h) = gray.dimensions();
    Frame::new(gray.into_raw(), w, h, 1)
}

pub fn to_dynamic(frame: &Frame) -> Result<DynamicImage, ConvertError> {
    let (w, h) = (frame.width(), frame.height());
    let data = frame.data().to_vec();
    match frame.channels() {
        1 => GrayImage::from_raw(w, h, data)
            .map(DynamicImage::ImageLuma8)
            .ok_or(ConvertError::Channels(1)),
        3 => RgbImage::from_raw(w, h, data)
            .map(DynamicImage::ImageRgb8)
            .ok_or(ConvertError::Channels(3)),
        other => Err(ConvertError::Channels(other)),
    }
}

/// Luma view of a frame (ITU-R 601 weights for RGB input).
pub fn to_gray(frame: &Frame) -> Result<GrayImage, ConvertError> {
    match frame.channels() {
        1 => GrayImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or(ConvertError::Channels(1)),
        3 => {
            let data: Vec<u8> = frame
                .data()
                .chunks_exact(3)
                .map(|px| {
                    let y = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
                    y.round().min(255.0) as u8
                })
                .collect();
            GrayImage::from_raw(frame.width(), frame.height(), data)
                .ok_or(ConvertError::Channels(3))
        }
        other => Err(ConvertError::Channels(other)),
    }
}
