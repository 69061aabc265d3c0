use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::Instant;

use super::clock::{Clock, MonotonicClock};
use super::state::AlertState;

/// Segments in the dashboard alert meter.
pub const METER_SEGMENTS: usize = 15;

const DEFAULT_DANGER_LIMIT_SECS: f64 = 15.0;
const DEFAULT_COOLDOWN_SECS: f64 = 10.0;

/// Escalation tunables. Times are in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct AlertSettings {
    /// Level at which the scene counts as dangerous.
    pub danger_limit: f64,
    /// Grace window that holds DANGER after motion stops.
    pub cooldown: f64,
    /// Level gained per second of motion.
    pub growth_rate: f64,
    /// Level lost per second without motion.
    pub decay_rate: f64,
    /// Fraction of `danger_limit` where WARNING starts.
    pub warning_fraction: f64,
    /// Fraction of `danger_limit` where DANGER starts.
    pub danger_fraction: f64,
    /// Level may exceed `danger_limit` by at most this much.
    pub headroom: f64,
    /// Level is pinned at `danger_limit + hold_offset` during the cooldown.
    pub hold_offset: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            danger_limit: DEFAULT_DANGER_LIMIT_SECS,
            cooldown: DEFAULT_COOLDOWN_SECS,
            growth_rate: 1.0,
            decay_rate: 2.0,
            warning_fraction: 0.33,
            danger_fraction: 0.66,
            headroom: 2.0,
            hold_offset: 1.0,
        }
    }
}

impl AlertSettings {
    pub fn validate(&self) -> Result<()> {
        validate_danger_limit(self.danger_limit)?;
        for (name, value) in [
            ("cooldown", self.cooldown),
            ("growth_rate", self.growth_rate),
            ("decay_rate", self.decay_rate),
            ("headroom", self.headroom),
            ("hold_offset", self.hold_offset),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("{} must be a finite non-negative number", name));
            }
        }
        if !(0.0 < self.warning_fraction
            && self.warning_fraction <= self.danger_fraction
            && self.danger_fraction <= 1.0)
        {
            return Err(anyhow!(
                "alert fractions must satisfy 0 < warning ({}) <= danger ({}) <= 1",
                self.warning_fraction,
                self.danger_fraction
            ));
        }
        Ok(())
    }

    /// Tier for `level`. Band lower bounds are inclusive.
    pub fn classify(&self, level: f64) -> AlertState {
        if level < self.danger_limit * self.warning_fraction {
            AlertState::Safe
        } else if level < self.danger_limit * self.danger_fraction {
            AlertState::Warning
        } else {
            AlertState::Danger
        }
    }

    /// Upper clamp for the level.
    pub fn max_level(&self) -> f64 {
        self.danger_limit + self.headroom
    }
}

fn validate_danger_limit(seconds: f64) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(anyhow!("danger limit must be a positive number of seconds"));
    }
    Ok(())
}

/// Output of one controller update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub state: AlertState,
    pub level: f64,
    pub color_hint: &'static str,
    pub cooldown_remaining: f64,
    pub danger_limit: f64,
}

impl AlertSnapshot {
    /// Level as a percentage of the danger limit (exceeds 100 above the limit).
    pub fn progress_percent(&self) -> f64 {
        self.level / self.danger_limit * 100.0
    }

    /// Lit segments of a `METER_SEGMENTS`-wide meter.
    pub fn lit_segments(&self) -> usize {
        let lit = (self.level / self.danger_limit * METER_SEGMENTS as f64).floor();
        (lit.max(0.0) as usize).min(METER_SEGMENTS)
    }
}

/// Time-integrated alert level with cooldown hysteresis.
///
/// Motion raises the level by `growth_rate * dt`; quiet time lowers it by
/// `decay_rate * dt`. Once the level has reached the danger limit, quiet time first
/// drains the cooldown while the level is held above the limit, so DANGER (and with it
/// recording) outlasts the motion by `cooldown` seconds.
///
/// Not safe for concurrent use; one writer per cycle.
pub struct AlertController<C: Clock = MonotonicClock> {
    settings: AlertSettings,
    level: f64,
    state: AlertState,
    cooldown_remaining: f64,
    last_update: Instant,
    clock: C,
}

impl AlertController<MonotonicClock> {
    pub fn new(settings: AlertSettings) -> Result<Self> {
        Self::with_clock(settings, MonotonicClock)
    }
}

impl<C: Clock> AlertController<C> {
    pub fn with_clock(settings: AlertSettings, clock: C) -> Result<Self> {
        settings.validate()?;
        let last_update = clock.now();
        Ok(Self {
            settings,
            level: 0.0,
            state: AlertState::Safe,
            cooldown_remaining: 0.0,
            last_update,
            clock,
        })
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn cooldown_remaining(&self) -> f64 {
        self.cooldown_remaining
    }

    pub fn danger_limit(&self) -> f64 {
        self.settings.danger_limit
    }

    /// Change the danger limit. The next update classifies against it directly.
    pub fn set_danger_limit(&mut self, seconds: f64) -> Result<()> {
        validate_danger_limit(seconds)?;
        self.settings.danger_limit = seconds;
        Ok(())
    }

    /// Feed one cycle's motion flag, using the time elapsed since the previous call.
    pub fn update(&mut self, motion_detected: bool) -> AlertSnapshot {
        let now = self.clock.now();
        let dt = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        self.advance(motion_detected, dt)
    }

    /// Feed one cycle's motion flag with an explicit elapsed time in seconds.
    ///
    /// Negative or non-finite `dt` counts as zero.
    pub fn advance(&mut self, motion_detected: bool, dt: f64) -> AlertSnapshot {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let limit = self.settings.danger_limit;

        if motion_detected {
            self.level += dt * self.settings.growth_rate;
            self.cooldown_remaining = self.settings.cooldown;
        } else if self.level >= limit && self.cooldown_remaining > 0.0 {
            self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);
            self.level = limit + self.settings.hold_offset;
        } else {
            self.level -= dt * self.settings.decay_rate;
        }

        self.level = self.level.clamp(0.0, self.settings.max_level());
        self.state = self.settings.classify(self.level);
        self.snapshot()
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        AlertSnapshot {
            state: self.state,
            level: self.level,
            color_hint: self.state.color_hint(),
            cooldown_remaining: self.cooldown_remaining,
            danger_limit: self.settings.danger_limit,
        }
    }

    /// Back to SAFE with an empty level and cooldown; elapsed time restarts now.
    pub fn reset(&mut self) {
        self.level = 0.0;
        self.state = AlertState::Safe;
        self.cooldown_remaining = 0.0;
        self.last_update = self.clock.now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::clock::ManualClock;

    const EPS: f64 = 1e-9;

    fn controller() -> AlertController<ManualClock> {
        AlertController::with_clock(AlertSettings::default(), ManualClock::new()).unwrap()
    }

    #[test]
    fn six_seconds_of_motion_then_three_quiet() {
        let mut ctl = controller();
        let mut snap = ctl.snapshot();
        for _ in 0..6 {
            snap = ctl.advance(true, 1.0);
        }
        assert!((snap.level - 6.0).abs() < EPS);
        assert_eq!(snap.state, AlertState::Warning);
        assert_eq!(snap.color_hint, "#ffc107");

        for _ in 0..3 {
            snap = ctl.advance(false, 1.0);
        }
        assert!(snap.level.abs() < EPS);
        assert_eq!(snap.state, AlertState::Safe);
    }

    #[test]
    fn continuous_motion_converges_to_clamp() {
        let mut ctl = controller();
        let max = ctl.settings().max_level();
        let mut previous = 0.0;
        for _ in 0..100 {
            let snap = ctl.advance(true, 0.7);
            assert!(snap.level >= previous);
            assert!(snap.level <= max);
            previous = snap.level;
        }
        assert!((previous - max).abs() < EPS);
        assert_eq!(ctl.state(), AlertState::Danger);
    }

    #[test]
    fn quiet_time_strictly_decays_to_zero() {
        let mut ctl = controller();
        for _ in 0..8 {
            ctl.advance(true, 1.0);
        }
        let mut previous = ctl.level();
        while previous > 0.0 {
            let snap = ctl.advance(false, 0.5);
            assert!(snap.level < previous);
            previous = snap.level;
        }
        assert_eq!(ctl.advance(false, 0.5).level, 0.0);
    }

    #[test]
    fn cooldown_holds_danger_after_motion_stops() {
        let mut ctl = controller();
        for _ in 0..15 {
            ctl.advance(true, 1.0);
        }
        assert!(ctl.level() >= ctl.danger_limit());
        assert_eq!(ctl.cooldown_remaining(), 10.0);

        let mut quiet = 0.0;
        while ctl.cooldown_remaining() > 0.0 {
            let snap = ctl.advance(false, 0.5);
            quiet += 0.5;
            assert_eq!(snap.state, AlertState::Danger);
            assert!((snap.level - 16.0).abs() < EPS);
        }
        assert!(quiet >= 10.0);

        // Cooldown spent: decay starts from the held level.
        let snap = ctl.advance(false, 1.0);
        assert!((snap.level - 14.0).abs() < EPS);
        for _ in 0..10 {
            ctl.advance(false, 1.0);
        }
        assert_eq!(ctl.state(), AlertState::Safe);
    }

    #[test]
    fn motion_refreshes_cooldown() {
        let mut ctl = controller();
        for _ in 0..16 {
            ctl.advance(true, 1.0);
        }
        for _ in 0..6 {
            ctl.advance(false, 1.0);
        }
        assert!((ctl.cooldown_remaining() - 4.0).abs() < EPS);
        ctl.advance(true, 0.1);
        assert_eq!(ctl.cooldown_remaining(), 10.0);
    }

    #[test]
    fn classification_band_edges_are_inclusive() {
        let settings = AlertSettings::default();
        let limit = settings.danger_limit;
        assert_eq!(settings.classify(limit * 0.33), AlertState::Warning);
        assert_eq!(settings.classify(limit * 0.66), AlertState::Danger);
        assert_eq!(settings.classify(limit * 0.33 - 1e-6), AlertState::Safe);
        assert_eq!(settings.classify(limit * 0.66 - 1e-6), AlertState::Warning);
        assert_eq!(settings.classify(0.0), AlertState::Safe);
    }

    #[test]
    fn danger_limit_change_reclassifies_on_next_update() {
        let mut ctl = controller();
        for _ in 0..6 {
            ctl.advance(true, 1.0);
        }
        assert_eq!(ctl.state(), AlertState::Warning);

        ctl.set_danger_limit(60.0).unwrap();
        assert_eq!(ctl.advance(true, 0.0).state, AlertState::Safe);

        ctl.set_danger_limit(8.0).unwrap();
        let snap = ctl.advance(true, 0.0);
        assert_eq!(snap.state, AlertState::Danger);
        assert_eq!(snap.danger_limit, 8.0);
    }

    #[test]
    fn invalid_danger_limit_is_rejected() {
        let mut ctl = controller();
        assert!(ctl.set_danger_limit(0.0).is_err());
        assert!(ctl.set_danger_limit(-3.0).is_err());
        assert!(ctl.set_danger_limit(f64::NAN).is_err());
        assert_eq!(ctl.danger_limit(), 15.0);
        assert!(AlertController::new(AlertSettings {
            warning_fraction: 0.8,
            danger_fraction: 0.5,
            ..AlertSettings::default()
        })
        .is_err());
    }

    #[test]
    fn update_measures_elapsed_time_from_clock() {
        let clock = ManualClock::new();
        let mut ctl = AlertController::with_clock(AlertSettings::default(), clock.clone()).unwrap();
        clock.advance_secs(2.5);
        let snap = ctl.update(true);
        assert!((snap.level - 2.5).abs() < 1e-6);
        clock.advance_secs(1.0);
        let snap = ctl.update(false);
        assert!((snap.level - 0.5).abs() < 1e-6);
    }

    #[test]
    fn reset_restarts_time_reference() {
        let clock = ManualClock::new();
        let mut ctl = AlertController::with_clock(AlertSettings::default(), clock.clone()).unwrap();
        clock.advance_secs(12.0);
        ctl.update(true);
        assert!(ctl.state() == AlertState::Danger);

        clock.advance_secs(30.0);
        ctl.reset();
        assert_eq!(ctl.snapshot().level, 0.0);
        assert_eq!(ctl.cooldown_remaining(), 0.0);
        assert_eq!(ctl.state(), AlertState::Safe);

        clock.advance_secs(1.0);
        let snap = ctl.update(true);
        assert!((snap.level - 1.0).abs() < 1e-6);
    }

    #[test]
    fn meter_helpers() {
        let mut ctl = controller();
        let snap = ctl.advance(true, 7.5);
        assert!((snap.progress_percent() - 50.0).abs() < EPS);
        assert_eq!(snap.lit_segments(), 7);
        let snap = ctl.advance(true, 100.0);
        assert_eq!(snap.lit_segments(), METER_SEGMENTS);
    }
}
