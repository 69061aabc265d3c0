use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::alarm::{DEFAULT_LOOP_PAUSE, DEFAULT_RETRIGGER_COOLDOWN};
use crate::alert::AlertSettings;
use crate::detect::{BackgroundParams, DetectorParams, BACKEND_GMM, BACKEND_NAMES};
use crate::ingest::SourceConfig;
use crate::record::DEFAULT_CLIP_HISTORY;
use crate::zone::Roi;

const DEFAULT_SOURCE_URL: &str = "stub://front_camera";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_MIN_AREA: u32 = 1000;
const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct SentryConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    alert: Option<AlertConfigFile>,
    zone: Option<Roi>,
    alarm: Option<AlarmConfigFile>,
    recording: Option<RecordingConfigFile>,
    health_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    min_area: Option<u32>,
    blur_sigma: Option<f32>,
    dilate_iterations: Option<u32>,
    history: Option<u32>,
    var_threshold: Option<f32>,
    detect_shadows: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    danger_limit_secs: Option<f64>,
    cooldown_secs: Option<f64>,
    growth_rate: Option<f64>,
    decay_rate: Option<f64>,
    warning_fraction: Option<f64>,
    danger_fraction: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct AlarmConfigFile {
    mode: Option<String>,
    loop_pause_ms: Option<u64>,
    retrigger_cooldown_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordingConfigFile {
    history: Option<usize>,
}

/// How the alarm is made audible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmMode {
    /// Terminal bell.
    Bell,
    /// Log lines only.
    Log,
    /// No alarm.
    Off,
}

impl AlarmMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bell" => Ok(AlarmMode::Bell),
            "log" => Ok(AlarmMode::Log),
            "off" | "none" => Ok(AlarmMode::Off),
            other => Err(anyhow!("unknown alarm mode '{}' (bell, log, off)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub source: SourceConfig,
    /// Detector backend name, see `detect::backend_for`.
    pub detector_backend: String,
    pub detector: DetectorParams,
    pub alert: AlertSettings,
    pub zone: Option<Roi>,
    pub alarm: AlarmSettings,
    pub recording: RecordingSettings,
    pub health_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct AlarmSettings {
    pub mode: AlarmMode,
    pub loop_pause: Duration,
    pub retrigger_cooldown: Duration,
}

#[derive(Debug, Clone)]
pub struct RecordingSettings {
    /// Finished clips to remember.
    pub history: usize,
}

impl SentryConfig {
    /// Defaults, then the file named by `SENTRY_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTRY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentryConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let source = SourceConfig {
            url: source_file
                .url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: source_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            width: source_file.width.unwrap_or(DEFAULT_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_HEIGHT),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector_backend = detector_file
            .backend
            .clone()
            .unwrap_or_else(|| BACKEND_GMM.to_string());
        let detector_defaults = DetectorParams::default();
        let background_defaults = BackgroundParams::default();
        let detector = DetectorParams {
            min_area: detector_file.min_area.unwrap_or(DEFAULT_MIN_AREA),
            blur_sigma: detector_file
                .blur_sigma
                .unwrap_or(detector_defaults.blur_sigma),
            dilate_iterations: detector_file
                .dilate_iterations
                .unwrap_or(detector_defaults.dilate_iterations),
            background: BackgroundParams {
                history: detector_file
                    .history
                    .unwrap_or(background_defaults.history),
                var_threshold: detector_file
                    .var_threshold
                    .unwrap_or(background_defaults.var_threshold),
                detect_shadows: detector_file
                    .detect_shadows
                    .unwrap_or(background_defaults.detect_shadows),
                ..background_defaults
            },
        };

        let alert_file = file.alert.unwrap_or_default();
        let alert_defaults = AlertSettings::default();
        let alert = AlertSettings {
            danger_limit: alert_file
                .danger_limit_secs
                .unwrap_or(alert_defaults.danger_limit),
            cooldown: alert_file.cooldown_secs.unwrap_or(alert_defaults.cooldown),
            growth_rate: alert_file.growth_rate.unwrap_or(alert_defaults.growth_rate),
            decay_rate: alert_file.decay_rate.unwrap_or(alert_defaults.decay_rate),
            warning_fraction: alert_file
                .warning_fraction
                .unwrap_or(alert_defaults.warning_fraction),
            danger_fraction: alert_file
                .danger_fraction
                .unwrap_or(alert_defaults.danger_fraction),
            ..alert_defaults
        };

        let alarm_file = file.alarm.unwrap_or_default();
        let alarm = AlarmSettings {
            mode: match alarm_file.mode.as_deref() {
                Some(mode) => AlarmMode::parse(mode)?,
                None => AlarmMode::Bell,
            },
            loop_pause: alarm_file
                .loop_pause_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_LOOP_PAUSE),
            retrigger_cooldown: alarm_file
                .retrigger_cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRIGGER_COOLDOWN),
        };

        let recording = RecordingSettings {
            history: file
                .recording
                .and_then(|recording| recording.history)
                .unwrap_or(DEFAULT_CLIP_HISTORY),
        };

        Ok(Self {
            source,
            detector_backend,
            detector,
            alert,
            zone: file.zone,
            alarm,
            recording,
            health_interval: Duration::from_secs(
                file.health_interval_secs
                    .unwrap_or(DEFAULT_HEALTH_INTERVAL_SECS),
            ),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SENTRY_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(fps) = std::env::var("SENTRY_TARGET_FPS") {
            self.source.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTRY_TARGET_FPS must be an integer"))?;
        }
        if let Ok(backend) = std::env::var("SENTRY_DETECTOR") {
            if !backend.trim().is_empty() {
                self.detector_backend = backend.trim().to_string();
            }
        }
        if let Ok(area) = std::env::var("SENTRY_MIN_AREA") {
            self.detector.min_area = area
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTRY_MIN_AREA must be an integer number of pixels"))?;
        }
        if let Ok(limit) = std::env::var("SENTRY_DANGER_LIMIT") {
            self.alert.danger_limit = limit
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTRY_DANGER_LIMIT must be a number of seconds"))?;
        }
        if let Ok(cooldown) = std::env::var("SENTRY_COOLDOWN_SECS") {
            self.alert.cooldown = cooldown
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTRY_COOLDOWN_SECS must be a number of seconds"))?;
        }
        if let Ok(zone) = std::env::var("SENTRY_ZONE") {
            let zone = zone.trim();
            self.zone = if zone.is_empty() || zone.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(Roi::parse(zone)?)
            };
        }
        if let Ok(mode) = std::env::var("SENTRY_ALARM") {
            self.alarm.mode = AlarmMode::parse(&mode)?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.source.target_fps == 0 {
            return Err(anyhow!("target fps must be >= 1"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be > 0"));
        }
        if !BACKEND_NAMES.contains(&self.detector_backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of: {})",
                self.detector_backend,
                BACKEND_NAMES.join(", ")
            ));
        }
        if !self.detector.blur_sigma.is_finite() || self.detector.blur_sigma < 0.0 {
            return Err(anyhow!("blur sigma must be a finite non-negative number"));
        }
        if self.detector.background.history == 0 {
            return Err(anyhow!("background history must be > 0"));
        }
        let var_threshold = self.detector.background.var_threshold;
        if !var_threshold.is_finite() || var_threshold <= 0.0 {
            return Err(anyhow!("variance threshold must be > 0"));
        }
        self.alert.validate()?;
        self.zone = self.zone.map(Roi::normalized);
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SentryConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
