#![cfg(feature = "backend-opencv")]

use anyhow::{anyhow, Context, Result};
use opencv::core::{self, Mat, Point, Scalar, Size, Vector, CV_8UC1};
use opencv::prelude::*;
use opencv::{imgproc, video};

use crate::detect::backend::DetectorBackend;
use crate::detect::motion::DetectorParams;
use crate::detect::result::DetectionResult;
use crate::frame::Frame;
use crate::zone::{Rect, Roi};

/// Mask level separating foreground (255) from shadow (127) and background.
const MASK_THRESHOLD: f64 = 200.0;

/// OpenCV MOG2 backend.
///
/// Same pipeline as `MotionDetector`, with OpenCV doing the background model,
/// smoothing, morphology and external contour extraction.
pub struct OpenCvMog2Backend {
    params: DetectorParams,
    mog2: core::Ptr<video::BackgroundSubtractorMOG2>,
    kernel: Mat,
    dimensions: Option<(u32, u32)>,
}

impl OpenCvMog2Backend {
    pub fn new(params: DetectorParams) -> Result<Self> {
        let mog2 = create_mog2(&params)?;
        let kernel =
            imgproc::get_structuring_element(imgproc::MORPH_RECT, Size::new(3, 3), Point::new(-1, -1))
                .context("failed to build dilation kernel")?;
        Ok(Self {
            params,
            mog2,
            kernel,
            dimensions: None,
        })
    }

    fn run(&mut self, frame: &Frame, region: Rect) -> Result<Vec<Rect>> {
        // A new region size needs a fresh model.
        if self.dimensions != Some((region.width, region.height)) {
            self.mog2 = create_mog2(&self.params)?;
            self.dimensions = Some((region.width, region.height));
        }

        let luma = frame.luma_region(&region);
        let mut src = Mat::new_rows_cols_with_default(
            region.height as i32,
            region.width as i32,
            CV_8UC1,
            Scalar::all(0.0),
        )?;
        src.data_bytes_mut()?.copy_from_slice(luma.as_raw());

        let mut smoothed = Mat::default();
        if self.params.blur_sigma > 0.0 {
            imgproc::gaussian_blur_def(
                &src,
                &mut smoothed,
                Size::new(0, 0),
                f64::from(self.params.blur_sigma),
            )?;
        } else {
            smoothed = src;
        }

        let mut foreground = Mat::default();
        video::BackgroundSubtractorTrait::apply(&mut self.mog2, &smoothed, &mut foreground, -1.0)?;

        let mut binary = Mat::default();
        imgproc::threshold(&foreground, &mut binary, MASK_THRESHOLD, 255.0, imgproc::THRESH_BINARY)?;

        let mut dilated = Mat::default();
        imgproc::dilate(
            &binary,
            &mut dilated,
            &self.kernel,
            Point::new(-1, -1),
            self.params.dilate_iterations as i32,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        let mut contours: Vector<Vector<Point>> = Vector::new();
        imgproc::find_contours(
            &dilated,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let mut boxes = Vec::new();
        for contour in contours.iter() {
            if imgproc::contour_area(&contour, false)? < f64::from(self.params.min_area) {
                continue;
            }
            let rect = imgproc::bounding_rect(&contour)?;
            boxes.push(
                Rect::new(rect.x as u32, rect.y as u32, rect.width as u32, rect.height as u32)
                    .offset_by(&region),
            );
        }
        Ok(boxes)
    }
}

fn create_mog2(params: &DetectorParams) -> Result<core::Ptr<video::BackgroundSubtractorMOG2>> {
    let history = i32::try_from(params.background.history)
        .map_err(|_| anyhow!("background history {} is too large", params.background.history))?;
    video::create_background_subtractor_mog2(
        history,
        f64::from(params.background.var_threshold),
        params.background.detect_shadows,
    )
    .context("failed to create MOG2 background subtractor")
}

impl DetectorBackend for OpenCvMog2Backend {
    fn name(&self) -> &'static str {
        "opencv-mog2"
    }

    fn detect(&mut self, frame: &Frame, roi: Option<&Roi>) -> Result<DetectionResult> {
        let region = match roi {
            Some(roi) => match roi.clip_to(frame.width(), frame.height()) {
                Some(region) => region,
                None => return Ok(DetectionResult::degenerate()),
            },
            None => frame.bounds(),
        };
        let boxes = self.run(frame, region)?;
        Ok(DetectionResult {
            motion_present: !boxes.is_empty(),
            boxes,
            region: Some(region),
        })
    }

    fn min_area(&self) -> u32 {
        self.params.min_area
    }

    fn set_min_area(&mut self, min_area: u32) {
        self.params.min_area = min_area;
    }

    fn reset(&mut self) {
        self.dimensions = None;
    }
}
