//! Home-security monitor: consumes peripheral telemetry and camera frames,
//! detects motion and raises debounced alerts.

pub mod alert;
pub mod detect;
pub mod dispatch;
pub mod history;
pub mod snapshot;

pub use dispatch::Monitor;
