use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{SourceConfig, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Local directory of still images, replayed in file-name order.
pub struct ImageSequenceSource {
    config: SourceConfig,
    files: Vec<PathBuf>,
    position: usize,
    frame_count: u64,
    last_error: bool,
}

impl ImageSequenceSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let dir = Path::new(&config.url);
        if !dir.is_dir() {
            return Err(anyhow!("image sequence path {} is not a directory", dir.display()));
        }
        Ok(Self {
            config,
            files: Vec::new(),
            position: 0,
            frame_count: 0,
            last_error: false,
        })
    }

    /// List the directory. Fails when it holds no supported images.
    pub fn connect(&mut self) -> Result<()> {
        let dir = Path::new(&self.config.url);
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to list image sequence {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no png/jpeg images found in {}", dir.display()));
        }
        files.sort();
        log::info!(
            "FrameSource: connected to {} ({} images)",
            dir.display(),
            files.len()
        );
        self.files = files;
        self.position = 0;
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let decoded = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))
            .and_then(Frame::from_image);
        self.last_error = decoded.is_err();
        let frame = decoded?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    pub fn is_healthy(&self) -> bool {
        !self.last_error
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
