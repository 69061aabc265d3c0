use anyhow::Result;

use crate::detect::result::DetectionResult;
use crate::frame::Frame;
use crate::zone::Roi;

/// Detector backend trait.
///
/// The monitor talks to detection only through this trait so that the
/// background-subtraction detector can be swapped for another implementation
/// (or a scripted fake in tests).
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on `frame`, restricted to `roi` when given.
    ///
    /// A zone with no area inside the frame is a normal "no motion" result, not an error.
    fn detect(&mut self, frame: &Frame, roi: Option<&Roi>) -> Result<DetectionResult>;

    /// Smallest contour area (square pixels) still reported as motion.
    fn min_area(&self) -> u32;

    /// Adjust sensitivity. Takes effect on the next call.
    fn set_min_area(&mut self, min_area: u32);

    /// Forget the learned scene.
    fn reset(&mut self) {}
}
