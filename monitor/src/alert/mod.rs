pub mod alarm;
pub mod log;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use self::alarm::{AlarmController, CommandSink};
pub use self::log::{AlertLog, AlertLogError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Motion,
    Sound,
}

/// One accepted alert, as persisted in the alert log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub kind: AlertKind,
    pub message: String,
    /// Local wall-clock time, `%Y-%m-%d %H:%M:%S`.
    pub time: String,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

impl AlertRecord {
    pub fn motion(at_ms: i64, snapshot: Option<PathBuf>) -> Self {
        let time = local_time(at_ms);
        Self {
            kind: AlertKind::Motion,
            message: format!("Motion detected at {time}"),
            time,
            timestamp_ms: at_ms,
            snapshot,
        }
    }

    pub fn sound(percent: u8, threshold: u8, at_ms: i64) -> Self {
        Self {
            kind: AlertKind::Sound,
            message: format!("Sound level exceeded: {percent}% (>= {threshold}%)"),
            time: local_time(at_ms),
            timestamp_ms: at_ms,
            snapshot: None,
        }
    }
}

fn local_time(ms: i64) -> String {
    let dt: DateTime<Local> = Local
        .timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Local::now);
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
