use serde::Serialize;

use crate::zone::Rect;

/// Result of running motion detection on a frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    /// At least one moving region survived the area filter.
    pub motion_present: bool,
    /// Moving regions in frame coordinates, in discovery order.
    pub boxes: Vec<Rect>,
    /// Region that was examined, after normalization and clipping.
    /// `None` when the zone had no area inside the frame.
    pub region: Option<Rect>,
}

impl DetectionResult {
    /// Result for a zone with nothing left inside the frame.
    pub fn degenerate() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.boxes.len()
    }
}
