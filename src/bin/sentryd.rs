//! sentryd - motion sentry daemon
//!
//! This daemon:
//! 1. Loads `SentryConfig` (file named by `SENTRY_CONFIG`, then `SENTRY_*` overrides)
//! 2. Pulls frames from the configured source at the target frame rate
//! 3. Runs the detect-then-escalate cycle on every frame
//! 4. Sounds the alarm in WARNING/DANGER and records clips in DANGER
//! 5. Stops cleanly on Ctrl-C or when a finite source runs out

use anyhow::{anyhow, Result};
use std::io::IsTerminal;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use motion_sentry::detect::backend_for;
use motion_sentry::ui::{Ui, UiMode};
use motion_sentry::{
    AlarmChannel, AlarmMode, AlarmSink, AlertController, ClipJournal, FrameSource, LogTone,
    Monitor, SentryConfig, SilentAlarm, TerminalBell, Tone,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = SentryConfig::load()?;
    let ui = Ui::new(
        UiMode::parse(std::env::var("SENTRY_UI").ok().as_deref()),
        std::io::stderr().is_terminal(),
    );

    let mut source = FrameSource::new(cfg.source.clone())?;
    {
        let _stage = ui.stage("connect source");
        source.connect()?;
    }

    let detector = backend_for(&cfg.detector_backend, cfg.detector.clone())?;
    let controller = AlertController::new(cfg.alert.clone())?;
    let mut monitor = Monitor::new(
        detector,
        controller,
        build_alarm(&cfg),
        Box::new(ClipJournal::new(cfg.recording.history)),
    )
    .with_zone(cfg.zone);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "sentryd running. source={} detector={} fps={} min_area={} danger_limit={}s cooldown={}s",
        cfg.source.url,
        monitor.detector_name(),
        cfg.source.target_fps,
        cfg.detector.min_area,
        cfg.alert.danger_limit,
        cfg.alert.cooldown
    );
    match &cfg.zone {
        Some(zone) => log::info!(
            "zone x={} y={} w={} h={}",
            zone.x,
            zone.y,
            zone.width,
            zone.height
        ),
        None => log::info!("zone: full frame"),
    }

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(cfg.source.target_fps));
    let mut meter = ui.alert_meter();
    let mut last_health_log = Instant::now();

    // The monitor is stopped on every exit path; a source or detector error is
    // returned only after the alarm is silenced and any clip is finalized.
    let outcome = monitor.run_until(|monitor| {
        if rx.try_recv().is_ok() {
            log::info!("shutdown signal received");
            return Ok(false);
        }
        let cycle_start = Instant::now();

        let Some(frame) = source.next_frame()? else {
            log::info!("source exhausted");
            return Ok(false);
        };
        let report = monitor.process(&frame)?;
        meter.show(&report.alert);

        if last_health_log.elapsed() >= cfg.health_interval {
            let stats = source.stats();
            log::info!(
                "source health={} frames={} url={} state={} objects={}",
                source.is_healthy(),
                stats.frames_captured,
                stats.url,
                report.alert.state,
                report.detection.object_count()
            );
            last_health_log = Instant::now();
        }

        if let Some(remaining) = frame_interval.checked_sub(cycle_start.elapsed()) {
            std::thread::sleep(remaining);
        }
        Ok(true)
    });

    meter.finish();
    let stats = monitor.stats();
    log::info!(
        "sentryd stopped: cycles={} motion_cycles={} peak={} clips={} collaborator_errors={}",
        stats.cycles,
        stats.motion_cycles,
        stats.peak_state,
        stats.clips_started,
        stats.collaborator_errors
    );
    eprintln!("{}", monitor.summary());
    outcome
}

fn build_alarm(cfg: &SentryConfig) -> Box<dyn AlarmSink> {
    let tone: Arc<dyn Tone> = match cfg.alarm.mode {
        AlarmMode::Bell => Arc::new(TerminalBell),
        AlarmMode::Log => Arc::new(LogTone),
        AlarmMode::Off => return Box::new(SilentAlarm::default()),
    };
    log::info!("alarm tone: {}", tone.name());
    Box::new(
        AlarmChannel::new(tone)
            .with_loop_pause(cfg.alarm.loop_pause)
            .with_retrigger_cooldown(cfg.alarm.retrigger_cooldown),
    )
}
