//! Adaptive per-pixel Gaussian mixture background model.
//!
//! Each pixel keeps up to `mixtures` weighted Gaussians sorted by weight. The heaviest
//! components whose cumulative weight stays under `background_ratio` describe the
//! static scene. A sample within `var_threshold` squared deviations of one of those
//! components is background; otherwise it is foreground, or shadow when it is a
//! darker version of a background component.
//!
//! The learning rate is `1 / min(2 * frames, history)`, so the model settles quickly
//! after start-up and then drifts with the scene over roughly `history` frames.

use image::GrayImage;

pub const MASK_BACKGROUND: u8 = 0;
pub const MASK_SHADOW: u8 = 127;
pub const MASK_FOREGROUND: u8 = 255;

/// Tunables for `GaussianMixtureModel`.
#[derive(Clone, Debug)]
pub struct BackgroundParams {
    pub history: u32,
    /// Squared Mahalanobis distance for the background decision.
    pub var_threshold: f32,
    pub detect_shadows: bool,
    pub mixtures: usize,
    pub background_ratio: f32,
    /// Squared Mahalanobis distance for matching (and updating) an existing component.
    pub var_threshold_gen: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Complexity reduction prior; prunes components nobody matches.
    pub complexity_prior: f32,
    /// Lower brightness ratio for shadow classification.
    pub shadow_ratio: f32,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            detect_shadows: true,
            mixtures: 5,
            background_ratio: 0.9,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_prior: 0.05,
            shadow_ratio: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Component {
    weight: f32,
    mean: f32,
    variance: f32,
}

/// Background model for a fixed-size grayscale region.
pub struct GaussianMixtureModel {
    params: BackgroundParams,
    width: u32,
    height: u32,
    /// `width * height * mixtures` components, pixel-major.
    components: Vec<Component>,
    /// Components in use per pixel.
    used: Vec<u8>,
    frames: u64,
}

impl GaussianMixtureModel {
    pub fn new(params: BackgroundParams) -> Self {
        Self {
            params,
            width: 0,
            height: 0,
            components: Vec::new(),
            used: Vec::new(),
            frames: 0,
        }
    }

    pub fn params(&self) -> &BackgroundParams {
        &self.params
    }

    /// Frames absorbed since the model was last (re)initialized.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Drop everything learned; the next frame seeds a fresh model.
    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.components.clear();
        self.used.clear();
        self.frames = 0;
    }

    /// Update the model with `image` and return the foreground mask.
    ///
    /// A frame whose dimensions differ from the model's seeds a new model and
    /// yields an all-background mask.
    pub fn apply(&mut self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        if self.frames == 0 || (width, height) != (self.width, self.height) {
            self.seed(image);
            return GrayImage::new(width, height);
        }

        self.frames += 1;
        let alpha = 1.0 / (2 * self.frames).min(self.params.history.max(1) as u64) as f32;
        let mixtures = self.params.mixtures;

        let mut mask = GrayImage::new(width, height);
        for (index, (sample, out)) in image
            .as_raw()
            .iter()
            .zip(mask.iter_mut())
            .enumerate()
        {
            let base = index * mixtures;
            let slots = &mut self.components[base..base + mixtures];
            *out = update_pixel(
                &self.params,
                slots,
                &mut self.used[index],
                *sample as f32,
                alpha,
            );
        }
        mask
    }

    fn seed(&mut self, image: &GrayImage) {
        let (width, height) = image.dimensions();
        let mixtures = self.params.mixtures.max(1);
        self.params.mixtures = mixtures;
        self.width = width;
        self.height = height;
        self.components = vec![Component::default(); (width * height) as usize * mixtures];
        self.used = vec![1; (width * height) as usize];
        for (index, sample) in image.as_raw().iter().enumerate() {
            self.components[index * mixtures] = Component {
                weight: 1.0,
                mean: *sample as f32,
                variance: self.params.var_init,
            };
        }
        self.frames = 1;
    }
}

fn update_pixel(
    params: &BackgroundParams,
    slots: &mut [Component],
    used: &mut u8,
    sample: f32,
    alpha: f32,
) -> u8 {
    let prune = -alpha * params.complexity_prior;
    let mut modes = *used as usize;
    let mut matched = false;
    let mut background = false;
    let mut total_weight = 0.0f32;

    let mut mode = 0;
    while mode < modes {
        let slot = &mut slots[mode];
        slot.weight = (1.0 - alpha) * slot.weight + prune;

        if !matched {
            let d = slot.mean - sample;
            let dist2 = d * d;
            if total_weight < params.background_ratio
                && dist2 < params.var_threshold * slot.variance
            {
                background = true;
            }
            if dist2 < params.var_threshold_gen * slot.variance {
                matched = true;
                slot.weight += alpha;
                let k = alpha / slot.weight;
                slot.mean -= k * d;
                slot.variance = (slot.variance + k * (dist2 - slot.variance))
                    .clamp(params.var_min, params.var_max);
            }
        }

        if slot.weight < -prune {
            // Pruned components fall to the end once sorted.
            slot.weight = 0.0;
        }
        total_weight += slot.weight;
        mode += 1;
    }

    sort_by_weight(&mut slots[..modes]);
    while modes > 0 && slots[modes - 1].weight <= 0.0 {
        modes -= 1;
    }

    if total_weight > 0.0 {
        for slot in &mut slots[..modes] {
            slot.weight /= total_weight;
        }
    }

    if !matched {
        let slot_index = if modes == params.mixtures {
            params.mixtures - 1
        } else {
            modes += 1;
            modes - 1
        };
        if modes == 1 {
            slots[slot_index].weight = 1.0;
        } else {
            for slot in &mut slots[..modes] {
                slot.weight *= 1.0 - alpha;
            }
            slots[slot_index].weight = alpha;
        }
        slots[slot_index].mean = sample;
        slots[slot_index].variance = params.var_init;
        sort_by_weight(&mut slots[..modes]);
    }

    *used = modes as u8;

    if background {
        MASK_BACKGROUND
    } else if params.detect_shadows && is_shadow(params, &slots[..modes], sample) {
        MASK_SHADOW
    } else {
        MASK_FOREGROUND
    }
}

/// Heaviest first. Insertion sort: at most a handful of components.
fn sort_by_weight(slots: &mut [Component]) {
    for i in 1..slots.len() {
        let mut j = i;
        while j > 0 && slots[j].weight > slots[j - 1].weight {
            slots.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// A sample is shadow when it is a dimmed copy of some background component.
fn is_shadow(params: &BackgroundParams, slots: &[Component], sample: f32) -> bool {
    let mut cumulative = 0.0f32;
    for slot in slots {
        let numerator = sample * slot.mean;
        let denominator = slot.mean * slot.mean;
        if denominator == 0.0 {
            return false;
        }
        if numerator <= denominator && numerator >= params.shadow_ratio * denominator {
            let a = numerator / denominator;
            let d = a * slot.mean - sample;
            if d * d < params.var_threshold * slot.variance * a * a {
                return true;
            }
        }
        cumulative += slot.weight;
        if cumulative > params.background_ratio {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn flat(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    fn count(mask: &GrayImage, value: u8) -> usize {
        mask.iter().filter(|&&v| v == value).count()
    }

    #[test]
    fn first_frame_seeds_without_foreground() {
        let mut model = GaussianMixtureModel::new(BackgroundParams::default());
        let mask = model.apply(&flat(8, 8, 90));
        assert_eq!(count(&mask, MASK_BACKGROUND), 64);
        assert_eq!(model.frames(), 1);
    }

    #[test]
    fn static_scene_stays_background() {
        let mut model = GaussianMixtureModel::new(BackgroundParams::default());
        for _ in 0..30 {
            let mask = model.apply(&flat(8, 8, 90));
            assert_eq!(count(&mask, MASK_BACKGROUND), 64);
        }
        assert_eq!(model.frames(), 30);
    }

    #[test]
    fn bright_change_is_foreground() {
        let mut model = GaussianMixtureModel::new(BackgroundParams::default());
        for _ in 0..20 {
            model.apply(&flat(8, 8, 90));
        }
        let mut frame = flat(8, 8, 90);
        frame.put_pixel(3, 3, Luma([250]));
        let mask = model.apply(&frame);
        assert_eq!(mask.get_pixel(3, 3).0[0], MASK_FOREGROUND);
        assert_eq!(count(&mask, MASK_FOREGROUND), 1);
    }

    #[test]
    fn dimmed_background_is_shadow() {
        let mut model = GaussianMixtureModel::new(BackgroundParams::default());
        for _ in 0..20 {
            model.apply(&flat(4, 4, 200));
        }
        let mask = model.apply(&flat(4, 4, 140));
        assert_eq!(count(&mask, MASK_SHADOW), 16);

        let mut no_shadows = GaussianMixtureModel::new(BackgroundParams {
            detect_shadows: false,
            ..BackgroundParams::default()
        });
        for _ in 0..20 {
            no_shadows.apply(&flat(4, 4, 200));
        }
        let mask = no_shadows.apply(&flat(4, 4, 140));
        assert_eq!(count(&mask, MASK_FOREGROUND), 16);
    }

    #[test]
    fn persistent_change_is_absorbed() {
        let mut model = GaussianMixtureModel::new(BackgroundParams {
            history: 20,
            ..BackgroundParams::default()
        });
        for _ in 0..20 {
            model.apply(&flat(4, 4, 60));
        }
        let mut last = GrayImage::new(4, 4);
        for _ in 0..200 {
            last = model.apply(&flat(4, 4, 180));
        }
        assert_eq!(count(&last, MASK_BACKGROUND), 16);
    }

    #[test]
    fn size_change_reseeds() {
        let mut model = GaussianMixtureModel::new(BackgroundParams::default());
        for _ in 0..5 {
            model.apply(&flat(4, 4, 60));
        }
        let mask = model.apply(&flat(6, 3, 220));
        assert_eq!(mask.dimensions(), (6, 3));
        assert_eq!(count(&mask, MASK_BACKGROUND), 18);
        assert_eq!(model.frames(), 1);
        assert_eq!(model.dimensions(), (6, 3));
    }
}
