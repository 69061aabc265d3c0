//! Monitoring zone geometry.
//!
//! - `Roi`: a zone as the user drew it. Signed, may be reversed or extend past the frame.
//! - `Rect`: a normalized rectangle in frame coordinates (also used for motion boxes).
//! - `ZoneDrag`: press/drag/release tracking for drawing a zone with a pointer.
//!
//! The zone is always an explicit value passed into detection each cycle. Nothing in
//! this crate keeps a process-wide "current zone".

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Minimum side length (pixels) for a zone drawn with `ZoneDrag`.
pub const DEFAULT_MIN_ZONE_SIDE: i64 = 10;

/// Axis-aligned rectangle in frame coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Shift a rect expressed relative to `origin` into `origin`'s coordinate space.
    pub fn offset_by(&self, origin: &Rect) -> Rect {
        Rect {
            x: self.x + origin.x,
            y: self.y + origin.y,
            width: self.width,
            height: self.height,
        }
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// A zone as supplied by the caller.
///
/// Negative `width`/`height` mean the rectangle was dragged in reverse. The origin
/// and extent may fall outside the frame; `clip_to` resolves both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Roi {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Zone between two corner points, in either drag direction.
    pub fn from_corners(start: (i64, i64), end: (i64, i64)) -> Self {
        Self::new(
            start.0,
            start.1,
            end.0.saturating_sub(start.0),
            end.1.saturating_sub(start.1),
        )
        .normalized()
    }

    /// Flip a reverse-drawn rectangle so width and height are non-negative.
    ///
    /// Arithmetic saturates at the `i64` range, so extreme extents stay usable.
    pub fn normalized(self) -> Self {
        let mut roi = self;
        if roi.width < 0 {
            roi.x = roi.x.saturating_add(roi.width);
            roi.width = roi.width.saturating_neg();
        }
        if roi.height < 0 {
            roi.y = roi.y.saturating_add(roi.height);
            roi.height = roi.height.saturating_neg();
        }
        roi
    }

    /// Normalize and intersect with a `frame_width` x `frame_height` frame.
    ///
    /// Returns `None` when nothing of the zone is left inside the frame.
    pub fn clip_to(&self, frame_width: u32, frame_height: u32) -> Option<Rect> {
        let roi = self.normalized();
        let (fw, fh) = (frame_width as i64, frame_height as i64);
        if roi.x >= fw || roi.y >= fh {
            return None;
        }

        let x0 = roi.x.max(0);
        let y0 = roi.y.max(0);
        let x1 = roi.x.saturating_add(roi.width).min(fw);
        let y1 = roi.y.saturating_add(roi.height).min(fh);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Rect::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }

    /// Parse `"x,y,w,h"`.
    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(',').map(|part| part.trim()).collect();
        if parts.len() != 4 {
            return Err(anyhow!("zone must be four comma-separated integers x,y,w,h"));
        }
        let mut nums = [0i64; 4];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| anyhow!("zone component '{}' is not an integer", part))?;
        }
        Ok(Self::new(nums[0], nums[1], nums[2], nums[3]))
    }
}

impl From<Rect> for Roi {
    fn from(rect: Rect) -> Self {
        Self::new(
            rect.x as i64,
            rect.y as i64,
            rect.width as i64,
            rect.height as i64,
        )
    }
}

/// Pointer-driven zone drawing.
///
/// Owned by whatever layer handles pointer events; `release` hands back the zone
/// which the caller then passes to the monitor.
#[derive(Clone, Debug)]
pub struct ZoneDrag {
    start: Option<(i64, i64)>,
    current: (i64, i64),
    min_side: i64,
}

impl ZoneDrag {
    pub fn new() -> Self {
        Self::with_min_side(DEFAULT_MIN_ZONE_SIDE)
    }

    pub fn with_min_side(min_side: i64) -> Self {
        Self {
            start: None,
            current: (0, 0),
            min_side,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.start.is_some()
    }

    pub fn press(&mut self, x: i64, y: i64) {
        self.start = Some((x, y));
        self.current = (x, y);
    }

    /// Ignored unless a press is in progress.
    pub fn drag(&mut self, x: i64, y: i64) {
        if self.start.is_some() {
            self.current = (x, y);
        }
    }

    /// Rectangle being drawn, for preview overlays.
    pub fn preview(&self) -> Option<Roi> {
        self.start
            .map(|start| Roi::from_corners(start, self.current))
    }

    /// Finish the drag. Zones with a side not larger than the minimum are discarded.
    pub fn release(&mut self, x: i64, y: i64) -> Option<Roi> {
        let start = self.start.take()?;
        let roi = Roi::from_corners(start, (x, y));
        if roi.width > self.min_side && roi.height > self.min_side {
            Some(roi)
        } else {
            None
        }
    }

    pub fn cancel(&mut self) {
        self.start = None;
    }
}

impl Default for ZoneDrag {
    fn default() -> Self {
        Self::new()
    }
}
