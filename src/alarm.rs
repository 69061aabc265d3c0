//! Audible alert channel.
//!
//! - `Tone`: plays one alarm cycle on whatever output device the implementation owns.
//! - `AlarmChannel`: `trigger_once` (rate-limited) and `start_loop` / `stop_loop`.
//! - `AlarmSink`: the start/stop capability the monitor drives from the alert state.
//!
//! Looping runs on a background thread that sleeps on a condition variable between
//! cycles, so stopping wakes it immediately instead of waiting out the pause.

use anyhow::{anyhow, Result};
use std::io::Write;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default pause between looped tone cycles.
pub const DEFAULT_LOOP_PAUSE: Duration = Duration::from_millis(800);

/// Default minimum spacing between `trigger_once` calls that actually play.
pub const DEFAULT_RETRIGGER_COOLDOWN: Duration = Duration::from_secs(3);

/// One audible alarm cycle.
pub trait Tone: Send + Sync {
    fn name(&self) -> &'static str;

    /// Play one cycle. May block for the duration of the cycle.
    fn play(&self) -> Result<()>;
}

/// Terminal bell on stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalBell;

impl Tone for TerminalBell {
    fn name(&self) -> &'static str {
        "bell"
    }

    fn play(&self) -> Result<()> {
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| anyhow!("terminal bell failed: {}", e))
    }
}

/// Logs each cycle instead of making a sound.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTone;

impl Tone for LogTone {
    fn name(&self) -> &'static str {
        "log"
    }

    fn play(&self) -> Result<()> {
        log::warn!("ALARM");
        Ok(())
    }
}

/// Start/stop capability driven by the alert state.
pub trait AlarmSink: Send {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn is_sounding(&self) -> bool;
}

/// Sink that never makes a sound. Used when the alarm is disabled.
#[derive(Debug, Default)]
pub struct SilentAlarm {
    sounding: bool,
}

impl AlarmSink for SilentAlarm {
    fn start(&mut self) -> Result<()> {
        self.sounding = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.sounding = false;
        Ok(())
    }

    fn is_sounding(&self) -> bool {
        self.sounding
    }
}

#[derive(Default)]
struct LoopControl {
    cancelled: bool,
}

struct LoopWorker {
    control: Arc<(Mutex<LoopControl>, Condvar)>,
    handle: JoinHandle<()>,
}

/// Alarm channel over a `Tone`.
pub struct AlarmChannel {
    tone: Arc<dyn Tone>,
    loop_pause: Duration,
    retrigger_cooldown: Duration,
    last_trigger: Option<Instant>,
    worker: Option<LoopWorker>,
}

impl AlarmChannel {
    pub fn new(tone: Arc<dyn Tone>) -> Self {
        Self {
            tone,
            loop_pause: DEFAULT_LOOP_PAUSE,
            retrigger_cooldown: DEFAULT_RETRIGGER_COOLDOWN,
            last_trigger: None,
            worker: None,
        }
    }

    pub fn with_loop_pause(mut self, pause: Duration) -> Self {
        self.loop_pause = pause;
        self
    }

    pub fn with_retrigger_cooldown(mut self, cooldown: Duration) -> Self {
        self.retrigger_cooldown = cooldown;
        self
    }

    pub fn tone_name(&self) -> &'static str {
        self.tone.name()
    }

    /// Play a single cycle in the background unless one was triggered within the
    /// retrigger cooldown. Returns whether a cycle was started.
    pub fn trigger_once(&mut self) -> Result<bool> {
        let now = Instant::now();
        if let Some(last) = self.last_trigger {
            if now.duration_since(last) < self.retrigger_cooldown {
                return Ok(false);
            }
        }
        self.last_trigger = Some(now);

        let tone = Arc::clone(&self.tone);
        std::thread::Builder::new()
            .name("alarm-once".to_string())
            .spawn(move || {
                if let Err(e) = tone.play() {
                    log::warn!("alarm tone failed: {}", e);
                }
            })
            .map_err(|e| anyhow!("failed to spawn alarm thread: {}", e))?;
        Ok(true)
    }

    /// Start looping the tone. No-op when already looping.
    pub fn start_loop(&mut self) -> Result<()> {
        if self.is_looping() {
            return Ok(());
        }
        // A worker that exited on its own (finished or panicked) is reaped first.
        self.join_worker();

        let control = Arc::new((Mutex::new(LoopControl::default()), Condvar::new()));
        let tone = Arc::clone(&self.tone);
        let pause = self.loop_pause;
        let worker_control = Arc::clone(&control);
        let handle = std::thread::Builder::new()
            .name("alarm-loop".to_string())
            .spawn(move || run_loop(tone.as_ref(), pause, &worker_control))
            .map_err(|e| anyhow!("failed to spawn alarm loop: {}", e))?;

        self.worker = Some(LoopWorker { control, handle });
        log::debug!("alarm loop started ({})", self.tone.name());
        Ok(())
    }

    /// Stop looping and wait for the worker to exit.
    pub fn stop_loop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        {
            let (lock, cvar) = &*worker.control;
            let mut control = lock.lock().map_err(|_| anyhow!("alarm loop lock poisoned"))?;
            control.cancelled = true;
            cvar.notify_all();
        }
        worker
            .handle
            .join()
            .map_err(|_| anyhow!("alarm loop thread panicked"))?;
        log::debug!("alarm loop stopped");
        Ok(())
    }

    pub fn is_looping(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                log::warn!("alarm loop thread panicked; restarting");
            }
        }
    }
}

impl AlarmSink for AlarmChannel {
    fn start(&mut self) -> Result<()> {
        self.start_loop()
    }

    fn stop(&mut self) -> Result<()> {
        self.stop_loop()
    }

    fn is_sounding(&self) -> bool {
        self.is_looping()
    }
}

impl Drop for AlarmChannel {
    fn drop(&mut self) {
        if let Err(e) = self.stop_loop() {
            log::warn!("alarm loop shutdown failed: {}", e);
        }
    }
}

fn run_loop(tone: &dyn Tone, pause: Duration, control: &(Mutex<LoopControl>, Condvar)) {
    let (lock, cvar) = control;
    loop {
        if lock.lock().map(|c| c.cancelled).unwrap_or(true) {
            return;
        }
        if let Err(e) = tone.play() {
            log::warn!("alarm tone failed: {}", e);
        }

        let Ok(guard) = lock.lock() else {
            return;
        };
        let Ok((guard, _timeout)) = cvar.wait_timeout_while(guard, pause, |c| !c.cancelled) else {
            return;
        };
        if guard.cancelled {
            return;
        }
    }
}
