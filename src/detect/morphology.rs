use image::GrayImage;
use imageproc::contrast::{threshold_mut, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;

/// Gaussian smoothing. `sigma <= 0` returns the input unchanged.
pub fn smooth(image: GrayImage, sigma: f32) -> GrayImage {
    if sigma > 0.0 {
        gaussian_blur_f32(&image, sigma)
    } else {
        image
    }
}

/// Binary threshold: samples strictly above `level` become 255, everything else 0.
pub fn threshold(mask: &mut GrayImage, level: u8) {
    threshold_mut(mask, level, ThresholdType::Binary);
}

/// Dilation equivalent to `iterations` passes of a 3x3 square structuring element.
pub fn dilate(mask: &GrayImage, iterations: u32) -> GrayImage {
    let radius = u8::try_from(iterations).unwrap_or(u8::MAX);
    imageproc::morphology::dilate(mask, Norm::LInf, radius)
}
