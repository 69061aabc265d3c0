//! Terminal presentation: stage spinners and the live alert meter.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::alert::{AlertSnapshot, AlertState, METER_SEGMENTS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Meter bar in pretty mode; state-change lines on stderr otherwise.
    pub fn alert_meter(&self) -> AlertMeter {
        let bar = if self.pretty() {
            let bar = ProgressBar::new(METER_SEGMENTS as u64);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("{prefix:>8} [{bar:15}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█ ");
            bar.set_style(style);
            Some(bar)
        } else {
            None
        };
        AlertMeter {
            bar,
            last_state: None,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Renders `AlertSnapshot`s as the segmented meter.
pub struct AlertMeter {
    bar: Option<ProgressBar>,
    last_state: Option<AlertState>,
}

impl AlertMeter {
    pub fn show(&mut self, snapshot: &AlertSnapshot) {
        let line = meter_line(snapshot);
        match &self.bar {
            Some(bar) => {
                bar.set_prefix(snapshot.state.as_str());
                bar.set_position(snapshot.lit_segments() as u64);
                bar.set_message(line);
            }
            None => {
                if self.last_state != Some(snapshot.state) {
                    eprintln!("[{}] {}", snapshot.state, line);
                }
            }
        }
        self.last_state = Some(snapshot.state);
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }
}

fn meter_line(snapshot: &AlertSnapshot) -> String {
    let mut line = format!(
        "{:>3.0}% level {:.1}/{} {}",
        snapshot.progress_percent(),
        snapshot.level,
        snapshot.danger_limit,
        snapshot.color_hint
    );
    if snapshot.cooldown_remaining > 0.0 && snapshot.state == AlertState::Danger {
        line.push_str(&format!(" hold {:.1}s", snapshot.cooldown_remaining));
    }
    line
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
