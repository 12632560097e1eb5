use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::command::Command;
use crate::frame::RAW_FRAME_LEN;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub sound: SoundConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// `"tcp"` (host:port bridge) or `"device"` (RFCOMM character device).
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_command")]
    pub poll_command: Command,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Window-average mean absolute luma difference above which motion is reported.
    #[serde(default = "default_motion_threshold")]
    pub threshold: f64,
    #[serde(default = "default_window_samples")]
    pub window_samples: u32,
    #[serde(default = "default_sample_stride")]
    pub sample_stride: usize,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlarmConfig {
    #[serde(default = "default_true")]
    pub buzzer_enabled: bool,
    #[serde(default = "default_alarm_duration_ms")]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SoundConfig {
    #[serde(default)]
    pub monitor_enabled: bool,
    #[serde(default = "default_sound_threshold")]
    pub threshold_percent: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_max")]
    pub max_samples: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotConfig {
    /// Directory for `latest.jpg` / `latest.png`. Nothing is written when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_alerts_path")]
    pub path: PathBuf,
    /// Oldest alerts are trimmed once the log holds more than this many.
    #[serde(default = "default_alerts_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            address: default_address(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_command: default_poll_command(),
            read_timeout_ms: default_read_timeout_ms(),
            read_chunk_bytes: default_read_chunk_bytes(),
            max_buffer_bytes: default_max_buffer_bytes(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_motion_threshold(),
            window_samples: default_window_samples(),
            sample_stride: default_sample_stride(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            buzzer_enabled: true,
            duration_ms: default_alarm_duration_ms(),
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            monitor_enabled: false,
            threshold_percent: default_sound_threshold(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_samples: default_history_max(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            path: default_alerts_path(),
            max_entries: default_alerts_max_entries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link.max_buffer_bytes < RAW_FRAME_LEN {
            return Err(ConfigError::Invalid(format!(
                "link.max_buffer_bytes must be at least {RAW_FRAME_LEN} (one raw bitmap frame), got {}",
                self.link.max_buffer_bytes
            )));
        }
        if self.link.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("link.poll_interval_ms must be > 0".into()));
        }
        if self.link.channel_capacity == 0 {
            return Err(ConfigError::Invalid("link.channel_capacity must be > 0".into()));
        }
        if self.link.read_chunk_bytes == 0 {
            return Err(ConfigError::Invalid("link.read_chunk_bytes must be > 0".into()));
        }
        if self.motion.window_samples == 0 {
            return Err(ConfigError::Invalid("motion.window_samples must be > 0".into()));
        }
        if self.motion.sample_stride == 0 {
            return Err(ConfigError::Invalid("motion.sample_stride must be > 0".into()));
        }
        if self.motion.cooldown_ms < 0 {
            return Err(ConfigError::Invalid("motion.cooldown_ms must be >= 0".into()));
        }
        if self.alerts.max_entries == 0 {
            return Err(ConfigError::Invalid("alerts.max_entries must be > 0".into()));
        }
        if self.sound.threshold_percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "sound.threshold_percent must be <= 100, got {}",
                self.sound.threshold_percent
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_transport() -> String {
    "tcp".into()
}
fn default_address() -> String {
    "127.0.0.1:7000".into()
}
fn default_poll_interval_ms() -> u64 {
    300
}
fn default_poll_command() -> Command {
    Command::RequestEnv
}
fn default_read_timeout_ms() -> u64 {
    50
}
fn default_read_chunk_bytes() -> usize {
    1024
}
fn default_max_buffer_bytes() -> usize {
    500_000
}
fn default_channel_capacity() -> usize {
    64
}
fn default_motion_threshold() -> f64 {
    15.0
}
fn default_window_samples() -> u32 {
    3
}
fn default_sample_stride() -> usize {
    8
}
fn default_cooldown_ms() -> i64 {
    3000
}
fn default_alarm_duration_ms() -> u64 {
    3000
}
fn default_sound_threshold() -> u8 {
    70
}
fn default_history_max() -> usize {
    1000
}
fn default_alerts_path() -> PathBuf {
    PathBuf::from("alerts.jsonl")
}
fn default_alerts_max_entries() -> usize {
    200
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.link.transport, "tcp");
        assert_eq!(config.link.poll_interval_ms, 300);
        assert_eq!(config.link.poll_command, Command::RequestEnv);
        assert_eq!(config.link.max_buffer_bytes, 500_000);
        assert_eq!(config.motion.threshold, 15.0);
        assert_eq!(config.motion.window_samples, 3);
        assert_eq!(config.motion.cooldown_ms, 3000);
        assert!(config.alarm.buzzer_enabled);
        assert!(!config.sound.monitor_enabled);
        assert!(config.snapshot.dir.is_none());
        assert_eq!(config.alerts.max_entries, 200);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml(
            r#"
            [link]
            transport = "device"
            address = "/dev/rfcomm0"
            poll_command = "t"
            poll_interval_ms = 1000

            [motion]
            threshold = 20.5
            cooldown_ms = 5000

            [snapshot]
            dir = "/tmp/snaps"
            "#,
        )
        .unwrap();
        assert_eq!(config.link.transport, "device");
        assert_eq!(config.link.poll_command, Command::RequestClimate);
        assert_eq!(config.link.poll_interval_ms, 1000);
        assert_eq!(config.motion.threshold, 20.5);
        assert_eq!(config.motion.cooldown_ms, 5000);
        assert_eq!(config.snapshot.dir, Some(PathBuf::from("/tmp/snaps")));
    }

    #[test]
    fn rejects_buffer_smaller_than_raw_frame() {
        let err = Config::from_toml("[link]\nmax_buffer_bytes = 1000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_poll_command() {
        let err = Config::from_toml("[link]\npoll_command = \"z\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_window() {
        let err = Config::from_toml("[motion]\nwindow_samples = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn alert_cap_must_be_positive() {
        let config = Config::from_toml("[alerts]\nmax_entries = 50\n").unwrap();
        assert_eq!(config.alerts.max_entries, 50);
        let err = Config::from_toml("[alerts]\nmax_entries = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
