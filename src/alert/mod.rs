//! Alert escalation.
//!
//! Turns a per-cycle boolean motion signal into a continuous alert level and a
//! three-tier `AlertState`. The controller only reports state; sound and recording
//! are driven by the caller (see `crate::monitor`).

mod clock;
mod controller;
mod state;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use controller::{AlertController, AlertSettings, AlertSnapshot, METER_SEGMENTS};
pub use state::AlertState;
