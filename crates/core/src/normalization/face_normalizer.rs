use image::imageops::FilterType;
use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::image_convert::{self, ConvertError};
use crate::shared::region::Region;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("region {0:?} does not intersect the {1}x{2} image")]
    EmptyRegion(Region, u32, u32),
    #[error("target size must be positive, got {0}x{1}")]
    ZeroSize(u32, u32),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Crops a region and resizes it to a fixed size with cubic interpolation.
#[derive(Clone, Copy, Debug)]
pub struct FaceNormalizer {
    width: u32,
    height: u32,
}

impl FaceNormalizer {
    pub fn new(width: u32, height: u32) -> Result<Self, NormalizeError> {
        if width == 0 || height == 0 {
            return Err(NormalizeError::ZeroSize(width, height));
        }
        Ok(Self { width, height })
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Crop then resize to exactly `target_size()`, keeping the channel count.
    pub fn normalize(&self, frame: &Frame, bbox: Region) -> Result<Frame, NormalizeError> {
        let cropped = crop_region(frame, bbox)?;
        let resized = image_convert::to_dynamic(&cropped)?.resize_exact(
            self.width,
            self.height,
            FilterType::CatmullRom,
        );
        Ok(image_convert::from_dynamic(resized))
    }
}

/// Copies the part of `bbox` that lies inside the frame.
pub fn crop_region(frame: &Frame, bbox: Region) -> Result<Frame, NormalizeError> {
    let r = bbox
        .clamp_to(frame.width(), frame.height())
        .ok_or(NormalizeError::EmptyRegion(bbox, frame.width(), frame.height()))?;
    let cropped = image_convert::to_dynamic(frame)?.crop_imm(
        r.x as u32,
        r.y as u32,
        r.width as u32,
        r.height as u32,
    );
    Ok(image_convert::from_dynamic(cropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn gradient(w: u32, h: u32) -> Frame {
        let data = (0..h)
            .flat_map(|y| (0..w).map(move |x| ((x * 7 + y * 3) % 256) as u8))
            .collect();
        Frame::new(data, w, h, 1)
    }

    #[rstest]
    #[case(Region::new(10, 10, 40, 50))]
    #[case(Region::new(0, 0, 1, 1))]
    #[case(Region::new(-20, -20, 60, 60))]
    #[case(Region::new(100, 60, 200, 200))]
    #[case(Region::new(0, 0, 160, 120))]
    fn test_output_is_exactly_target_size(#[case] bbox: Region) {
        let n = FaceNormalizer::new(92, 112).unwrap();
        let out = n.normalize(&gradient(160, 120), bbox).unwrap();
        assert_eq!((out.width(), out.height()), (92, 112));
        assert_eq!(out.data().len(), 92 * 112);
    }

    #[test]
    fn test_rgb_stays_rgb() {
        let frame = Frame::new(vec![90; 20 * 20 * 3], 20, 20, 3);
        let out = FaceNormalizer::new(8, 6)
            .unwrap()
            .normalize(&frame, Region::new(2, 2, 10, 10))
            .unwrap();
        assert_eq!(out.channels(), 3);
        assert_eq!((out.width(), out.height()), (8, 6));
    }

    #[test]
    fn test_uniform_region_keeps_intensity() {
        let out = FaceNormalizer::new(30, 40)
            .unwrap()
            .normalize(&Frame::filled(50, 50, 77), Region::new(5, 5, 10, 10))
            .unwrap();
        assert!(out.data().iter().all(|&v| v == 77));
    }

    #[test]
    fn test_crop_copies_clamped_pixels() {
        let frame = gradient(10, 10);
        let crop = crop_region(&frame, Region::new(8, -2, 5, 4)).unwrap();
        assert_eq!((crop.width(), crop.height()), (2, 2));
        let src = frame.data();
        assert_eq!(crop.data(), &[src[8], src[9], src[18], src[19]]);
    }

    #[test]
    fn test_region_outside_image() {
        let err = FaceNormalizer::new(10, 10)
            .unwrap()
            .normalize(&gradient(20, 20), Region::new(30, 30, 5, 5))
            .unwrap_err();
        assert!(matches!(err, NormalizeError::EmptyRegion(..)));
    }

    #[test]
    fn test_zero_target_size() {
        assert!(matches!(
            FaceNormalizer::new(0, 112),
            Err(NormalizeError::ZeroSize(0, 112))
        ));
    }
}
