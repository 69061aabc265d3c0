//! Per-frame detect-then-escalate cycle.
//!
//! `Monitor` is the composition root: it owns the zone, the detector backend, the
//! alert controller, the alarm sink and the recorder, and applies the side-effect
//! contract after every controller update:
//!
//! - WARNING/DANGER: alarm sounding (started if it is not).
//! - SAFE: alarm silent.
//! - DANGER or manual override: recording, with the frame appended.
//!
//! Alarm and recorder failures are logged and never change the reported alert state.

use anyhow::Result;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::alarm::AlarmSink;
use crate::alert::{AlertController, AlertSnapshot, AlertState, Clock, MonotonicClock};
use crate::detect::{DetectionResult, DetectorBackend};
use crate::frame::Frame;
use crate::record::Recorder;
use crate::zone::Roi;

/// Outcome of one cycle.
#[derive(Clone, Debug, Serialize)]
pub struct CycleReport {
    pub detection: DetectionResult,
    pub alert: AlertSnapshot,
    /// Recorder state after this cycle.
    pub recording: bool,
    /// Alarm state after this cycle.
    pub sounding: bool,
}

/// Running counters for the status panel.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MonitorStats {
    pub cycles: u64,
    pub motion_cycles: u64,
    pub last_object_count: usize,
    pub peak_state: AlertState,
    pub clips_started: u64,
    pub collaborator_errors: u64,
}

pub struct Monitor<C: Clock = MonotonicClock> {
    detector: Box<dyn DetectorBackend>,
    controller: AlertController<C>,
    alarm: Box<dyn AlarmSink>,
    recorder: Box<dyn Recorder>,
    zone: Option<Roi>,
    manual_recording: bool,
    started: Instant,
    stats: MonitorStats,
}

impl<C: Clock> Monitor<C> {
    pub fn new(
        detector: Box<dyn DetectorBackend>,
        controller: AlertController<C>,
        alarm: Box<dyn AlarmSink>,
        recorder: Box<dyn Recorder>,
    ) -> Self {
        Self {
            detector,
            controller,
            alarm,
            recorder,
            zone: None,
            manual_recording: false,
            started: Instant::now(),
            stats: MonitorStats::default(),
        }
    }

    pub fn with_zone(mut self, zone: Option<Roi>) -> Self {
        self.zone = zone;
        self
    }

    pub fn zone(&self) -> Option<&Roi> {
        self.zone.as_ref()
    }

    pub fn set_zone(&mut self, zone: Roi) {
        let zone = zone.normalized();
        log::info!(
            "zone set to x={} y={} w={} h={}",
            zone.x,
            zone.y,
            zone.width,
            zone.height
        );
        self.zone = Some(zone);
    }

    pub fn clear_zone(&mut self) {
        self.zone = None;
    }

    pub fn set_min_area(&mut self, min_area: u32) {
        self.detector.set_min_area(min_area);
    }

    pub fn set_danger_limit(&mut self, seconds: f64) -> Result<()> {
        self.controller.set_danger_limit(seconds)
    }

    pub fn controller(&self) -> &AlertController<C> {
        &self.controller
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn is_manual_recording(&self) -> bool {
        self.manual_recording
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_sounding(&self) -> bool {
        self.alarm.is_sounding()
    }

    /// Flip the manual recording override. Turning it off stops an active clip; the
    /// next cycle restarts recording if the alert state still asks for it.
    pub fn toggle_manual_recording(&mut self) -> bool {
        self.manual_recording = !self.manual_recording;
        log::info!(
            "manual recording {}",
            if self.manual_recording { "on" } else { "off" }
        );
        if !self.manual_recording && self.recorder.is_recording() {
            self.stop_recorder();
        }
        self.manual_recording
    }

    /// Run one cycle on `frame`.
    pub fn process(&mut self, frame: &Frame) -> Result<CycleReport> {
        let detection = self.detector.detect(frame, self.zone.as_ref())?;
        let previous = self.controller.state();
        let alert = self.controller.update(detection.motion_present);

        if alert.state != previous {
            log::info!(
                "alert {} -> {} (level {:.1}/{})",
                previous,
                alert.state,
                alert.level,
                alert.danger_limit
            );
        }
        log::debug!(
            "cycle {}: motion={} objects={} level={:.2}",
            self.stats.cycles + 1,
            detection.motion_present,
            detection.object_count(),
            alert.level
        );

        self.sync_alarm(alert.state);
        self.sync_recorder(alert.state, frame);

        self.stats.cycles += 1;
        if detection.motion_present {
            self.stats.motion_cycles += 1;
        }
        self.stats.last_object_count = detection.object_count();
        self.stats.peak_state = self.stats.peak_state.max(alert.state);

        Ok(CycleReport {
            detection,
            alert,
            recording: self.recorder.is_recording(),
            sounding: self.alarm.is_sounding(),
        })
    }

    /// Stop the system: finish recording, silence the alarm, reset escalation, and
    /// clear the zone and manual override.
    pub fn stop(&mut self) {
        self.manual_recording = false;
        self.stop_recorder();
        if let Err(e) = self.alarm.stop() {
            self.collaborator_failed("alarm stop", &e);
        }
        self.controller.reset();
        self.zone = None;
        log::info!("monitor stopped after {} cycles", self.stats.cycles);
    }

    /// Repeat `cycle` until it returns `Ok(false)` or an error, then `stop`.
    ///
    /// The monitor is stopped on the error path too, so the alarm is silenced and
    /// an open clip is finalized before the error reaches the caller.
    pub fn run_until<F>(&mut self, mut cycle: F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<bool>,
    {
        let outcome = loop {
            match cycle(self) {
                Ok(true) => continue,
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.stop();
        outcome
    }

    pub fn runtime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Multi-line status text: runtime, state, settings and last object count.
    pub fn summary(&self) -> String {
        let secs = self.runtime().as_secs();
        format!(
            "Runtime: {:02}:{:02}\nStatus: {}\nMin Area Size: {}\nTime Limit: {}s\nDetected Objs: {}",
            secs / 60,
            secs % 60,
            self.controller.state(),
            self.detector.min_area(),
            self.controller.danger_limit(),
            self.stats.last_object_count
        )
    }

    fn sync_alarm(&mut self, state: AlertState) {
        let sounding = self.alarm.is_sounding();
        if state.wants_sound() && !sounding {
            if let Err(e) = self.alarm.start() {
                self.collaborator_failed("alarm start", &e);
            }
        } else if !state.wants_sound() && sounding {
            if let Err(e) = self.alarm.stop() {
                self.collaborator_failed("alarm stop", &e);
            }
        }
    }

    fn sync_recorder(&mut self, state: AlertState, frame: &Frame) {
        let should_record = state.wants_recording() || self.manual_recording;
        if should_record {
            if !self.recorder.is_recording() {
                match self.recorder.start(frame.width(), frame.height()) {
                    Ok(()) => self.stats.clips_started += 1,
                    Err(e) => {
                        self.collaborator_failed("recorder start", &e);
                        return;
                    }
                }
            }
            if let Err(e) = self.recorder.write(frame) {
                self.collaborator_failed("recorder write", &e);
            }
        } else if self.recorder.is_recording() {
            self.stop_recorder();
        }
    }

    fn stop_recorder(&mut self) {
        if let Err(e) = self.recorder.stop() {
            self.collaborator_failed("recorder stop", &e);
        }
    }

    fn collaborator_failed(&mut self, what: &str, err: &anyhow::Error) {
        self.stats.collaborator_errors += 1;
        log::warn!("{} failed: {}", what, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertSettings, ManualClock};
    use anyhow::anyhow;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays scripted motion flags.
    struct ScriptedDetector {
        script: VecDeque<bool>,
        min_area: u32,
        seen_zones: Arc<Mutex<Vec<Option<Roi>>>>,
    }

    impl DetectorBackend for ScriptedDetector {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn detect(&mut self, frame: &Frame, roi: Option<&Roi>) -> Result<DetectionResult> {
            self.seen_zones.lock().unwrap().push(roi.copied());
            let motion = self.script.pop_front().unwrap_or(false);
            Ok(DetectionResult {
                motion_present: motion,
                boxes: if motion {
                    vec![crate::zone::Rect::new(1, 1, 4, 4)]
                } else {
                    vec![]
                },
                region: Some(frame.bounds()),
            })
        }

        fn min_area(&self) -> u32 {
            self.min_area
        }

        fn set_min_area(&mut self, min_area: u32) {
            self.min_area = min_area;
        }
    }

    #[derive(Default)]
    struct Events {
        alarm: Vec<&'static str>,
        recorder: Vec<String>,
    }

    struct FakeAlarm {
        events: Arc<Mutex<Events>>,
        sounding: bool,
        fail: bool,
    }

    impl AlarmSink for FakeAlarm {
        fn start(&mut self) -> Result<()> {
            self.events.lock().unwrap().alarm.push("start");
            if self.fail {
                return Err(anyhow!("no audio device"));
            }
            self.sounding = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.events.lock().unwrap().alarm.push("stop");
            self.sounding = false;
            Ok(())
        }

        fn is_sounding(&self) -> bool {
            self.sounding
        }
    }

    struct FakeRecorder {
        events: Arc<Mutex<Events>>,
        recording: bool,
        fail: bool,
    }

    impl Recorder for FakeRecorder {
        fn start(&mut self, width: u32, height: u32) -> Result<()> {
            if self.fail {
                return Err(anyhow!("disk full"));
            }
            self.events
                .lock()
                .unwrap()
                .recorder
                .push(format!("start {}x{}", width, height));
            self.recording = true;
            Ok(())
        }

        fn write(&mut self, _frame: &Frame) -> Result<()> {
            self.events.lock().unwrap().recorder.push("write".into());
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.events.lock().unwrap().recorder.push("stop".into());
            self.recording = false;
            Ok(())
        }

        fn is_recording(&self) -> bool {
            self.recording
        }
    }

    struct Harness {
        monitor: Monitor<ManualClock>,
        clock: ManualClock,
        events: Arc<Mutex<Events>>,
        zones: Arc<Mutex<Vec<Option<Roi>>>>,
        frame: Frame,
    }

    impl Harness {
        fn new(script: &[bool], alarm_fails: bool, recorder_fails: bool) -> Self {
            let clock = ManualClock::new();
            let events = Arc::new(Mutex::new(Events::default()));
            let zones = Arc::new(Mutex::new(Vec::new()));
            let detector = ScriptedDetector {
                script: script.iter().copied().collect(),
                min_area: 1000,
                seen_zones: zones.clone(),
            };
            let controller =
                AlertController::with_clock(AlertSettings::default(), clock.clone()).unwrap();
            let monitor = Monitor::new(
                Box::new(detector),
                controller,
                Box::new(FakeAlarm {
                    events: events.clone(),
                    sounding: false,
                    fail: alarm_fails,
                }),
                Box::new(FakeRecorder {
                    events: events.clone(),
                    recording: false,
                    fail: recorder_fails,
                }),
            );
            Self {
                monitor,
                clock,
                events,
                zones,
                frame: Frame::uniform(16, 12, 0).unwrap(),
            }
        }

        fn step(&mut self) -> CycleReport {
            self.clock.advance_secs(1.0);
            self.monitor.process(&self.frame).unwrap()
        }
    }

    #[test]
    fn alarm_follows_alert_state() {
        let mut script = vec![true; 6];
        script.extend([false; 3]);
        let mut h = Harness::new(&script, false, false);

        let reports: Vec<_> = (0..9).map(|_| h.step()).collect();
        // 4.95 is crossed on the fifth second of motion.
        assert!(!reports[3].sounding);
        assert_eq!(reports[4].alert.state, AlertState::Warning);
        assert!(reports[4].sounding);
        assert_eq!(reports[8].alert.state, AlertState::Safe);
        assert!(!reports[8].sounding);
        assert_eq!(h.events.lock().unwrap().alarm, vec!["start", "stop"]);
        assert!(reports.iter().all(|r| !r.recording));
    }

    #[test]
    fn danger_records_through_cooldown() {
        let mut script = vec![true; 10];
        script.extend([false; 20]);
        let mut h = Harness::new(&script, false, false);

        let reports: Vec<_> = (0..30).map(|_| h.step()).collect();
        // 9.9 is crossed on the tenth second of motion.
        assert!(!reports[8].recording);
        assert!(reports[9].recording);
        // Level 10 never reached the limit, so there is no cooldown hold: decays at 2/s.
        assert!(!reports[10].recording);
        let events = h.events.lock().unwrap();
        assert_eq!(events.recorder, vec!["start 16x12", "write", "stop"]);
        assert_eq!(h.monitor.stats().clips_started, 1);
    }

    #[test]
    fn cooldown_keeps_clip_open() {
        let mut script = vec![true; 15];
        script.extend([false; 15]);
        let mut h = Harness::new(&script, false, false);

        let reports: Vec<_> = (0..30).map(|_| h.step()).collect();
        // Recording from second 10; quiet from second 16; cooldown lasts ten cycles
        // and the first decayed level (14) is still DANGER.
        assert!(reports[9..26].iter().all(|r| r.recording));
        assert_eq!(reports[25].alert.state, AlertState::Danger);
        assert!(!reports[29].recording);
    }

    #[test]
    fn manual_override_records_while_safe() {
        let mut h = Harness::new(&[false; 5], false, false);
        assert!(h.monitor.toggle_manual_recording());
        let report = h.step();
        assert!(report.recording);
        assert_eq!(report.alert.state, AlertState::Safe);
        h.step();

        assert!(!h.monitor.toggle_manual_recording());
        assert!(!h.monitor.is_recording());
        assert!(!h.step().recording);
        let events = h.events.lock().unwrap();
        assert_eq!(events.recorder, vec!["start 16x12", "write", "write", "stop"]);
    }

    #[test]
    fn collaborator_failures_do_not_change_alert_state() {
        let mut h = Harness::new(&[true; 12], true, true);
        let reports: Vec<_> = (0..12).map(|_| h.step()).collect();
        assert_eq!(reports[11].alert.state, AlertState::Danger);
        assert!((reports[11].alert.level - 12.0).abs() < 1e-6);
        assert!(!reports[11].sounding);
        assert!(!reports[11].recording);
        assert!(h.monitor.stats().collaborator_errors > 0);
    }

    #[test]
    fn zone_is_passed_to_detector_each_cycle() {
        let mut h = Harness::new(&[false; 3], false, false);
        h.step();
        h.monitor.set_zone(Roi::new(50, 50, -30, -30));
        h.step();
        h.monitor.clear_zone();
        h.step();
        let zones = h.zones.lock().unwrap();
        assert_eq!(
            *zones,
            vec![None, Some(Roi::new(20, 20, 30, 30)), None]
        );
    }

    #[test]
    fn stop_resets_everything() {
        let mut h = Harness::new(&[true; 12], false, false);
        h.monitor.set_zone(Roi::new(0, 0, 8, 8));
        for _ in 0..12 {
            h.step();
        }
        assert!(h.monitor.is_recording());
        assert!(h.monitor.is_sounding());

        h.monitor.stop();
        assert!(!h.monitor.is_recording());
        assert!(!h.monitor.is_sounding());
        assert_eq!(h.monitor.controller().state(), AlertState::Safe);
        assert_eq!(h.monitor.controller().level(), 0.0);
        assert!(h.monitor.zone().is_none());
        assert_eq!(h.monitor.stats().peak_state, AlertState::Danger);
    }

    #[test]
    fn run_until_stops_the_monitor_when_a_cycle_fails() {
        let mut h = Harness::new(&[true; 12], false, false);
        let frame = Frame::uniform(16, 12, 0).unwrap();
        let clock = h.clock.clone();
        let mut cycles = 0;

        let outcome = h.monitor.run_until(|monitor| {
            cycles += 1;
            if cycles > 11 {
                return Err(anyhow!("camera unplugged"));
            }
            clock.advance_secs(1.0);
            monitor.process(&frame)?;
            Ok(true)
        });

        assert_eq!(outcome.unwrap_err().to_string(), "camera unplugged");
        assert!(!h.monitor.is_sounding());
        assert!(!h.monitor.is_recording());
        assert_eq!(h.monitor.controller().state(), AlertState::Safe);
        let events = h.events.lock().unwrap();
        assert_eq!(events.alarm, vec!["start", "stop"]);
        assert_eq!(events.recorder.last().map(String::as_str), Some("stop"));
    }

    #[test]
    fn run_until_stops_when_the_cycle_is_done() {
        let mut h = Harness::new(&[], false, false);
        let frame = Frame::uniform(16, 12, 0).unwrap();
        let mut remaining = 3;
        h.monitor
            .run_until(|monitor| {
                monitor.process(&frame)?;
                remaining -= 1;
                Ok(remaining > 0)
            })
            .unwrap();
        assert_eq!(h.monitor.stats().cycles, 3);
    }

    #[test]
    fn summary_reports_settings() {
        let mut h = Harness::new(&[true], false, false);
        h.monitor.set_min_area(2000);
        h.monitor.set_danger_limit(20.0).unwrap();
        h.step();
        let summary = h.monitor.summary();
        assert!(summary.contains("Status: SAFE"));
        assert!(summary.contains("Min Area Size: 2000"));
        assert!(summary.contains("Time Limit: 20s"));
        assert!(summary.contains("Detected Objs: 1"));
    }
}
