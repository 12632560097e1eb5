use homesec_common::config::MotionConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::motion::{MotionDetector, MotionEvent};

/// One grayscale frame queued for analysis.
#[derive(Debug)]
pub struct LumaPlane {
    pub luma: Vec<u8>,
    pub captured_at_ms: i64,
}

/// Feeds frames to a [`MotionDetector`] running on its own task.
///
/// Only the newest frame is kept: if analysis falls behind, older frames are
/// overwritten rather than queued.
pub struct Analyzer {
    frames: watch::Sender<Option<Arc<LumaPlane>>>,
    switch: ArmSwitch,
    task: JoinHandle<()>,
}

/// Arms or disarms a running [`Analyzer`] from any task.
///
/// Changes take effect before the next analysed frame. Every disarm is counted,
/// so an off/on pair between two frames still clears the detector.
#[derive(Clone, Debug)]
pub struct ArmSwitch(Arc<SwitchState>);

#[derive(Debug)]
struct SwitchState {
    armed: AtomicBool,
    disarms: AtomicU64,
}

impl ArmSwitch {
    fn new(armed: bool) -> Self {
        Self(Arc::new(SwitchState {
            armed: AtomicBool::new(armed),
            disarms: AtomicU64::new(0),
        }))
    }

    pub fn is_armed(&self) -> bool {
        self.0.armed.load(Ordering::Acquire)
    }

    /// Returns the new state.
    pub fn toggle(&self) -> bool {
        let was_armed = self.0.armed.fetch_xor(true, Ordering::AcqRel);
        if was_armed {
            self.0.disarms.fetch_add(1, Ordering::AcqRel);
        }
        !was_armed
    }

    fn disarms(&self) -> u64 {
        self.0.disarms.load(Ordering::Acquire)
    }
}

impl Analyzer {
    pub fn spawn(config: &MotionConfig, events: mpsc::Sender<MotionEvent>) -> Self {
        let (frames_tx, frames_rx) = watch::channel(None);
        let switch = ArmSwitch::new(config.enabled);
        let detector = MotionDetector::new(config);
        let task = tokio::spawn(analyze_frames(detector, frames_rx, switch.clone(), events));
        info!(armed = config.enabled, threshold = config.threshold, "motion analyzer started");
        Self {
            frames: frames_tx,
            switch,
            task,
        }
    }

    pub fn publish(&self, plane: LumaPlane) {
        self.frames.send_replace(Some(Arc::new(plane)));
    }

    pub fn switch(&self) -> ArmSwitch {
        self.switch.clone()
    }

    pub async fn shutdown(self) {
        drop(self.frames);
        if let Err(e) = self.task.await {
            debug!(error = %e, "motion analyzer task ended abnormally");
        }
    }
}

async fn analyze_frames(
    mut detector: MotionDetector,
    mut frames: watch::Receiver<Option<Arc<LumaPlane>>>,
    switch: ArmSwitch,
    events: mpsc::Sender<MotionEvent>,
) {
    let mut seen_disarms = switch.disarms();
    while frames.changed().await.is_ok() {
        let disarms = switch.disarms();
        if disarms != seen_disarms {
            seen_disarms = disarms;
            detector.set_armed(false);
            debug!("motion state cleared after disarm");
        }
        let wanted = switch.is_armed();
        if wanted != detector.is_armed() {
            detector.set_armed(wanted);
            info!(armed = wanted, "motion detection toggled");
        }

        let Some(plane) = frames.borrow_and_update().clone() else {
            continue;
        };
        if let Some(event) = detector.analyze(&plane.luma, plane.captured_at_ms) {
            info!(
                window_average = format!("{:.2}", event.window_average),
                "motion detected"
            );
            if events.send(event).await.is_err() {
                debug!("motion event consumer gone, stopping analyzer");
                return;
            }
        }
    }
}
