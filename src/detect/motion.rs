use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::background::{BackgroundParams, GaussianMixtureModel};
use crate::detect::morphology::{dilate, smooth, threshold};
use crate::detect::regions::external_regions;
use crate::detect::result::DetectionResult;
use crate::frame::Frame;
use crate::zone::{Rect, Roi};

/// Default smallest reported region, as contour area in square pixels.
pub const DEFAULT_MIN_AREA: u32 = 1500;

/// Mask level separating foreground (255) from shadow (127) and background.
const MASK_THRESHOLD: u8 = 200;

/// Pre- and post-processing around the background model.
#[derive(Clone, Debug)]
pub struct DetectorParams {
    pub min_area: u32,
    /// Gaussian sigma for input smoothing; 0 disables it.
    pub blur_sigma: f32,
    pub dilate_iterations: u32,
    pub background: BackgroundParams,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_AREA,
            // sigma of a 5x5 Gaussian kernel with automatic sigma
            blur_sigma: 1.1,
            dilate_iterations: 2,
            background: BackgroundParams::default(),
        }
    }
}

/// Background-subtraction motion detector.
///
/// The background model is updated on every call whose zone has area inside the
/// frame, whether or not motion is found, so the baseline tracks lighting drift.
pub struct MotionDetector {
    model: GaussianMixtureModel,
    min_area: u32,
    blur_sigma: f32,
    dilate_iterations: u32,
}

impl MotionDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self {
            model: GaussianMixtureModel::new(params.background),
            min_area: params.min_area,
            blur_sigma: params.blur_sigma,
            dilate_iterations: params.dilate_iterations,
        }
    }

    pub fn with_min_area(min_area: u32) -> Self {
        Self::new(DetectorParams {
            min_area,
            ..DetectorParams::default()
        })
    }

    pub fn min_area(&self) -> u32 {
        self.min_area
    }

    pub fn set_min_area(&mut self, min_area: u32) {
        self.min_area = min_area;
    }

    /// Frames the background model has absorbed.
    pub fn model_frames(&self) -> u64 {
        self.model.frames()
    }

    pub fn reset(&mut self) {
        self.model.reset();
    }

    /// Detect motion in `frame`, within `roi` when given (whole frame otherwise).
    pub fn detect(&mut self, frame: &Frame, roi: Option<&Roi>) -> DetectionResult {
        let region = match roi {
            Some(roi) => match roi.clip_to(frame.width(), frame.height()) {
                Some(region) => region,
                None => return DetectionResult::degenerate(),
            },
            None => frame.bounds(),
        };

        let smoothed = smooth(frame.luma_region(&region), self.blur_sigma);
        let mut mask = self.model.apply(&smoothed);
        threshold(&mut mask, MASK_THRESHOLD);
        let mask = dilate(&mask, self.dilate_iterations);

        let boxes: Vec<Rect> = external_regions(&mask)
            .into_iter()
            .filter(|r| r.area >= f64::from(self.min_area))
            .map(|r| r.bounds.offset_by(&region))
            .collect();

        DetectionResult {
            motion_present: !boxes.is_empty(),
            boxes,
            region: Some(region),
        }
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(DetectorParams::default())
    }
}

impl DetectorBackend for MotionDetector {
    fn name(&self) -> &'static str {
        "gmm"
    }

    fn detect(&mut self, frame: &Frame, roi: Option<&Roi>) -> Result<DetectionResult> {
        Ok(MotionDetector::detect(self, frame, roi))
    }

    fn min_area(&self) -> u32 {
        self.min_area
    }

    fn set_min_area(&mut self, min_area: u32) {
        MotionDetector::set_min_area(self, min_area);
    }

    fn reset(&mut self) {
        self.model.reset();
    }
}
