mod backend;
pub mod background;
pub mod backends;
pub mod morphology;
mod motion;
pub mod regions;
mod result;

use anyhow::{anyhow, Result};

pub use backend::DetectorBackend;
pub use background::{BackgroundParams, GaussianMixtureModel};
pub use motion::{DetectorParams, MotionDetector, DEFAULT_MIN_AREA};
pub use regions::Region;
pub use result::DetectionResult;

/// In-crate Gaussian mixture detector.
pub const BACKEND_GMM: &str = "gmm";
/// OpenCV MOG2 detector, available with the `backend-opencv` feature.
pub const BACKEND_OPENCV_MOG2: &str = "opencv-mog2";

/// Detector backend names accepted by `backend_for`.
pub const BACKEND_NAMES: &[&str] = &[BACKEND_GMM, BACKEND_OPENCV_MOG2];

/// Build the detector backend called `name`.
pub fn backend_for(name: &str, params: DetectorParams) -> Result<Box<dyn DetectorBackend>> {
    match name {
        BACKEND_GMM => Ok(Box::new(MotionDetector::new(params))),
        BACKEND_OPENCV_MOG2 => opencv_backend(params),
        other => Err(anyhow!(
            "unknown detector backend '{}' (expected one of: {})",
            other,
            BACKEND_NAMES.join(", ")
        )),
    }
}

#[cfg(feature = "backend-opencv")]
fn opencv_backend(params: DetectorParams) -> Result<Box<dyn DetectorBackend>> {
    Ok(Box::new(backends::OpenCvMog2Backend::new(params)?))
}

#[cfg(not(feature = "backend-opencv"))]
fn opencv_backend(_params: DetectorParams) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!(
        "detector backend '{}' requires the backend-opencv feature",
        BACKEND_OPENCV_MOG2
    ))
}
