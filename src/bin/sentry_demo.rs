//! sentry_demo - deterministic synthetic run of the motion sentry
//!
//! Drives a scripted scene through the full cycle on a manual clock, so a run of
//! `--seconds` simulated seconds finishes as fast as the detector allows.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex};

use motion_sentry::ui::{Ui, UiMode};
use motion_sentry::{
    AlarmChannel, AlarmMode, AlarmSink, AlertController, AlertSettings, AlertState, ClipJournal,
    FrameSource, LogTone, ManualClock, Monitor, MotionDetector, Roi, SilentAlarm, SourceConfig,
    SyntheticPattern, TerminalBell,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Simulated duration in seconds.
    #[arg(long, default_value_t = 60)]
    seconds: u64,
    /// Frames per simulated second.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Synthetic frame width.
    #[arg(long, default_value_t = 320)]
    width: u32,
    /// Synthetic frame height.
    #[arg(long, default_value_t = 240)]
    height: u32,
    /// Minimum region area in pixels.
    #[arg(long, default_value_t = 1000)]
    min_area: u32,
    /// Seconds of sustained motion that count as dangerous.
    #[arg(long, default_value_t = 15.0)]
    danger_limit: f64,
    /// Seconds DANGER is held after motion stops.
    #[arg(long, default_value_t = 10.0)]
    cooldown: f64,
    /// Detection zone as "x,y,w,h" (full frame when omitted).
    #[arg(long)]
    zone: Option<String>,
    /// Seconds of motion per scene cycle.
    #[arg(long, default_value_t = 20)]
    active_secs: u64,
    /// Alarm output: bell, log or off.
    #[arg(long, default_value = "off")]
    alarm: String,
    /// Record every frame regardless of alert state.
    #[arg(long)]
    manual_record: bool,
    /// Deterministic noise seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Output style: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    let ui = Ui::new(UiMode::parse(args.ui.as_deref()), std::io::stderr().is_terminal());

    let zone = args.zone.as_deref().map(Roi::parse).transpose()?;
    let fps = u64::from(args.fps);
    let pattern = SyntheticPattern {
        period: fps * (args.active_secs + 20),
        idle_frames: fps * 2,
        active_frames: fps * args.active_secs,
        seed: Some(args.seed.unwrap_or(7)),
        ..SyntheticPattern::default()
    };
    let source_config = SourceConfig {
        url: "stub://demo".to_string(),
        target_fps: args.fps,
        width: args.width,
        height: args.height,
    };

    let clock = ManualClock::new();
    let settings = AlertSettings {
        danger_limit: args.danger_limit,
        cooldown: args.cooldown,
        ..AlertSettings::default()
    };
    let controller = AlertController::with_clock(settings, clock.clone())?;
    let journal = Arc::new(Mutex::new(ClipJournal::default()));

    let setup = ui.stage("build monitor");
    let mut source = FrameSource::synthetic(source_config, pattern)?;
    source.connect()?;
    let mut monitor = Monitor::new(
        Box::new(MotionDetector::with_min_area(args.min_area)),
        controller,
        build_alarm(AlarmMode::parse(&args.alarm)?),
        Box::new(Arc::clone(&journal)),
    )
    .with_zone(zone);
    if args.manual_record {
        monitor.toggle_manual_recording();
    }
    drop(setup);

    let total_frames = args.seconds * fps;
    let dt = 1.0 / f64::from(args.fps);
    let mut transitions = Vec::new();
    let mut last_state = AlertState::Safe;
    {
        let _stage = ui.stage("run synthetic scene");
        let mut meter = ui.alert_meter();
        for frame_index in 0..total_frames {
            clock.advance_secs(dt);
            let Some(frame) = source.next_frame()? else {
                break;
            };
            let report = monitor.process(&frame)?;
            meter.show(&report.alert);
            if report.alert.state != last_state {
                transitions.push((frame_index as f64 * dt, last_state, report.alert.state));
                last_state = report.alert.state;
            }
        }
        meter.finish();
    }

    println!("{}", monitor.summary());
    monitor.stop();

    let stats = monitor.stats();
    println!("frames: {}", stats.cycles);
    println!("motion cycles: {}", stats.motion_cycles);
    println!("peak state: {}", stats.peak_state);
    for (at, from, to) in &transitions {
        println!("t={:>6.1}s {} -> {}", at, from, to);
    }
    let journal = journal
        .lock()
        .map_err(|_| anyhow!("clip journal lock poisoned"))?;
    println!("clips started: {}", journal.clips_started());
    for clip in journal.recent() {
        println!(
            "clip #{}: {}x{} {} frames",
            clip.id, clip.width, clip.height, clip.frames
        );
    }
    Ok(())
}

fn build_alarm(mode: AlarmMode) -> Box<dyn AlarmSink> {
    match mode {
        AlarmMode::Bell => Box::new(AlarmChannel::new(Arc::new(TerminalBell))),
        AlarmMode::Log => Box::new(AlarmChannel::new(Arc::new(LogTone))),
        AlarmMode::Off => Box::new(SilentAlarm::default()),
    }
}
