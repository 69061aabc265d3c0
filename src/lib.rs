//! Motion Sentry
//!
//! Zone-restricted motion detection with time-integrated alert escalation.
//!
//! # Pipeline
//!
//! Each cycle takes one frame through:
//!
//! 1. **Zone**: the optional user-drawn rectangle is normalized and clipped to the frame.
//! 2. **Detection**: the frame is smoothed and a per-pixel Gaussian mixture
//!    background model produces a foreground mask, which is thresholded, dilated
//!    and traced into external contours; contours enclosing less than `min_area`
//!    are dropped. `backend-opencv` adds an OpenCV MOG2 backend.
//! 3. **Escalation**: the motion flag drives a continuous alert level with a
//!    cooldown hold, classified into SAFE / WARNING / DANGER.
//! 4. **Side effects**: the alarm sounds in WARNING and DANGER; recording runs in
//!    DANGER or while the manual override is on.
//!
//! # Module Structure
//!
//! - `frame`: decoded input frames
//! - `zone`: rectangles, zone normalization and the zone drag gesture
//! - `detect`: background model, mask post-processing, region extraction
//! - `alert`: escalation controller and clocks
//! - `alarm`: looping alarm channel
//! - `record`: recorder interface and clip journal
//! - `monitor`: per-frame cycle tying the above together
//! - `ingest`: synthetic and image-sequence frame sources
//! - `config`: daemon configuration
//! - `ui`: terminal stage spinners and the alert meter

pub mod alarm;
pub mod alert;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod monitor;
pub mod record;
pub mod ui;
pub mod zone;

pub use alarm::{AlarmChannel, AlarmSink, LogTone, SilentAlarm, TerminalBell, Tone};
pub use alert::{
    AlertController, AlertSettings, AlertSnapshot, AlertState, Clock, ManualClock,
    MonotonicClock,
};
pub use config::{AlarmMode, SentryConfig};
pub use detect::{
    BackgroundParams, DetectionResult, DetectorBackend, DetectorParams, MotionDetector,
};
pub use frame::Frame;
pub use ingest::{FrameSource, SourceConfig, SyntheticPattern};
pub use monitor::{CycleReport, Monitor, MonitorStats};
pub use record::{ClipJournal, ClipSummary, Recorder};
pub use zone::{Rect, Roi, ZoneDrag};
