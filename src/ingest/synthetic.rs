use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{SourceConfig, SourceStats};
use crate::frame::Frame;
use crate::zone::Rect;

/// Scripted synthetic scene.
///
/// Every `period` frames the scene replays: `idle_frames` of empty background, then
/// an intruder block crossing left to right for `active_frames`, then empty again.
#[derive(Clone, Debug)]
pub struct SyntheticPattern {
    pub period: u64,
    pub idle_frames: u64,
    pub active_frames: u64,
    pub background: u8,
    pub intruder: u8,
    /// Peak per-sample noise amplitude.
    pub noise: u8,
    /// Fixed seed for reproducible noise.
    pub seed: Option<u64>,
}

impl Default for SyntheticPattern {
    fn default() -> Self {
        Self {
            period: 400,
            idle_frames: 50,
            active_frames: 200,
            background: 110,
            intruder: 230,
            noise: 2,
            seed: None,
        }
    }
}

impl SyntheticPattern {
    /// Intruder rectangle for the 1-based `frame_number`, if one is on screen.
    pub fn intruder_at(&self, frame_number: u64, width: u32, height: u32) -> Option<Rect> {
        let period = self.period.max(1);
        let phase = frame_number.saturating_sub(1) % period;
        if phase < self.idle_frames || phase >= self.idle_frames.saturating_add(self.active_frames) {
            return None;
        }
        let block_w = (width / 6).max(1);
        let block_h = (height / 3).max(1);
        let travel = width.saturating_sub(block_w) as u64;
        let step = phase - self.idle_frames;
        let x = if self.active_frames > 1 {
            (u128::from(travel) * u128::from(step) / u128::from(self.active_frames - 1)) as u32
        } else {
            0
        };
        let y = (height - block_h) / 2;
        Some(Rect::new(x, y, block_w, block_h))
    }
}

/// Synthetic `stub://` source.
pub struct SyntheticSource {
    config: SourceConfig,
    pattern: SyntheticPattern,
    rng: StdRng,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig, pattern: SyntheticPattern) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source needs non-zero width and height"));
        }
        rgb_len(config.width, config.height)?;
        let rng = match pattern.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            pattern,
            rng,
            frame_count: 0,
        })
    }

    /// Synthetic sources are always "connected".
    pub fn connect(&mut self) -> Result<()> {
        log::info!("FrameSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let (width, height) = (self.config.width, self.config.height);
        let intruder = self.pattern.intruder_at(self.frame_count, width, height);

        let noise = self.pattern.noise as i16;
        let mut pixels = Vec::with_capacity(rgb_len(width, height)?);
        for y in 0..height {
            for x in 0..width {
                let inside = intruder.is_some_and(|r| {
                    x >= r.x && x < r.right() && y >= r.y && y < r.bottom()
                });
                let base = if inside {
                    self.pattern.intruder
                } else {
                    self.pattern.background
                } as i16;
                let jitter = if noise > 0 {
                    self.rng.gen_range(-noise..=noise)
                } else {
                    0
                };
                let value = (base + jitter).clamp(0, 255) as u8;
                pixels.extend_from_slice(&[value, value, value]);
            }
        }

        Frame::from_raw(width, height, 3, pixels)
    }

    pub fn is_healthy(&self) -> bool {
        true
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

/// Byte length of a packed RGB frame.
fn rgb_len(width: u32, height: u32) -> Result<usize> {
    usize::try_from(width)
        .ok()
        .zip(usize::try_from(height).ok())
        .and_then(|(w, h)| w.checked_mul(h))
        .and_then(|pixels| pixels.checked_mul(3))
        .ok_or_else(|| anyhow!("synthetic frame {}x{} is too large", width, height))
}
