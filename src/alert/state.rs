use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete alert tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
    #[default]
    Safe,
    Warning,
    Danger,
}

impl AlertState {
    /// Fixed display color for the tier.
    pub fn color_hint(self) -> &'static str {
        match self {
            AlertState::Safe => "#28a745",
            AlertState::Warning => "#ffc107",
            AlertState::Danger => "#dc3545",
        }
    }

    /// WARNING and DANGER want the alarm sounding; SAFE wants silence.
    pub fn wants_sound(self) -> bool {
        !matches!(self, AlertState::Safe)
    }

    /// Only DANGER starts automatic recording.
    pub fn wants_recording(self) -> bool {
        matches!(self, AlertState::Danger)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertState::Safe => "SAFE",
            AlertState::Warning => "WARNING",
            AlertState::Danger => "DANGER",
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
