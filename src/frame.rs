//! Decoded frames.
//!
//! - `Frame`: one decoded raster for one instant. Never empty.
//!
//! Frames are owned by the caller and lent to the detector for the duration of one
//! detection call. The detector reads luma from the examined region only.

use anyhow::{anyhow, Result};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};
use std::time::{Duration, Instant};

use crate::zone::Rect;

/// One decoded camera frame.
pub struct Frame {
    image: DynamicImage,
    /// Monotonic capture instant.
    captured_at: Instant,
}

impl Frame {
    /// Wrap a decoded image. Zero-sized images are rejected.
    pub fn from_image(image: DynamicImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!("frame must not be empty"));
        }
        Ok(Self {
            image,
            captured_at: Instant::now(),
        })
    }

    /// Build a frame from interleaved 8-bit samples (1 = gray, 3 = RGB).
    pub fn from_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(channels as usize))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected_len {
            return Err(anyhow!(
                "expected {} bytes for {}x{}x{}, received {}",
                expected_len,
                width,
                height,
                channels,
                data.len()
            ));
        }

        let image = match channels {
            1 => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data)
                .map(DynamicImage::ImageLuma8),
            3 => ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data)
                .map(DynamicImage::ImageRgb8),
            other => return Err(anyhow!("unsupported channel count {}", other)),
        }
        .ok_or_else(|| anyhow!("frame buffer does not match dimensions"))?;

        Self::from_image(image)
    }

    /// Single-channel frame filled with `value`.
    pub fn uniform(width: u32, height: u32, value: u8) -> Result<Self> {
        Self::from_image(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            width,
            height,
            Luma([value]),
        )))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Bounds of the whole frame.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width(), self.height())
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// Luma samples of `region`. The region must already be clipped to the frame.
    pub(crate) fn luma_region(&self, region: &Rect) -> GrayImage {
        self.image
            .crop_imm(region.x, region.y, region.width, region.height)
            .to_luma8()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_mismatched_frames() {
        assert!(Frame::from_raw(0, 10, 1, vec![]).is_err());
        assert!(Frame::from_raw(4, 4, 1, vec![0; 15]).is_err());
        assert!(Frame::from_raw(4, 4, 2, vec![0; 32]).is_err());
    }

    #[test]
    fn rgb_frame_reports_metadata() {
        let frame = Frame::from_raw(4, 2, 3, vec![200; 24]).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.bounds(), Rect::new(0, 0, 4, 2));
    }

    #[test]
    fn luma_region_crops() {
        let mut data = vec![0u8; 16];
        data[5] = 255; // (1, 1)
        let frame = Frame::from_raw(4, 4, 1, data).unwrap();
        let region = frame.luma_region(&Rect::new(1, 1, 2, 2));
        assert_eq!(region.dimensions(), (2, 2));
        assert_eq!(region.get_pixel(0, 0).0[0], 255);
        assert_eq!(region.get_pixel(1, 1).0[0], 0);
    }
}
