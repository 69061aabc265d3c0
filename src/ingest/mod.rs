//! Frame sources.
//!
//! This module provides sources of decoded frames for the monitor loop:
//! - Synthetic scene (`stub://...`) with a periodic intruder, for tests and demos
//! - Local image sequence (a directory of PNG/JPEG files)
//!
//! Live camera capture is handled outside this crate; anything that can produce a
//! `Frame` can drive `Monitor::process` directly.
//!
//! Sources MUST NOT substitute a blank frame for a failed read: decode and I/O
//! failures are returned to the caller.

mod sequence;
mod synthetic;

use anyhow::{anyhow, Result};

use crate::frame::Frame;
pub use sequence::ImageSequenceSource;
pub use synthetic::{SyntheticPattern, SyntheticSource};

/// Configuration for a frame source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://<name>` for the synthetic scene, otherwise a local directory path.
    pub url: String,
    /// Target frame rate (frames per second) for the caller's pacing.
    pub target_fps: u32,
    /// Frame width (synthetic frames).
    pub width: u32,
    /// Frame height (synthetic frames).
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://front_camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// A frame source selected from `SourceConfig::url`.
pub struct FrameSource {
    backend: SourceBackend,
}

enum SourceBackend {
    Synthetic(SyntheticSource),
    Sequence(ImageSequenceSource),
}

impl FrameSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            return Ok(Self {
                backend: SourceBackend::Synthetic(SyntheticSource::new(
                    config,
                    SyntheticPattern::default(),
                )?),
            });
        }
        if config.url.trim().is_empty() || config.url.contains("://") {
            return Err(anyhow!(
                "source must be stub://<name> or a local directory path, got '{}'",
                config.url
            ));
        }
        Ok(Self {
            backend: SourceBackend::Sequence(ImageSequenceSource::new(config)?),
        })
    }

    pub fn synthetic(config: SourceConfig, pattern: SyntheticPattern) -> Result<Self> {
        Ok(Self {
            backend: SourceBackend::Synthetic(SyntheticSource::new(config, pattern)?),
        })
    }

    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.connect(),
            SourceBackend::Sequence(source) => source.connect(),
        }
    }

    /// Next frame, or `None` once a finite source is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.next_frame().map(Some),
            SourceBackend::Sequence(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.is_healthy(),
            SourceBackend::Sequence(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.stats(),
            SourceBackend::Sequence(source) => source.stats(),
        }
    }
}
