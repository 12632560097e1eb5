use homesec_common::config::{Config, SoundConfig};
use homesec_common::frame::{RawFrame, SensorReading};
use homesec_link::{LinkEvent, TelemetryLineDecoder};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::alert::{AlarmController, AlertLog, AlertRecord, CommandSink};
use crate::detect::{Analyzer, ArmSwitch, Cooldown, LumaPlane, MotionEvent};
use crate::history::SensorHistory;
use crate::snapshot::SnapshotSink;

/// Routes link frames and motion events to history, snapshots and alerts.
///
/// Outlives individual link sessions so history and the alert cooldown survive reconnects.
pub struct Monitor {
    history: SensorHistory,
    cooldown: Cooldown,
    alarm: AlarmController,
    alerts: AlertLog,
    snapshots: SnapshotSink,
    analyzer: Analyzer,
    sound: SoundConfig,
}

impl Monitor {
    pub fn new(config: &Config, analyzer: Analyzer) -> Self {
        Self {
            history: SensorHistory::new(config.history.max_samples),
            cooldown: Cooldown::new(config.motion.cooldown_ms),
            alarm: AlarmController::new(&config.alarm),
            alerts: AlertLog::new(config.alerts.path.clone(), config.alerts.max_entries),
            snapshots: SnapshotSink::new(config.snapshot.dir.clone()),
            analyzer,
            sound: config.sound.clone(),
        }
    }

    pub fn history(&self) -> &SensorHistory {
        &self.history
    }

    pub fn motion_switch(&self) -> ArmSwitch {
        self.analyzer.switch()
    }

    pub async fn shutdown(self) {
        self.analyzer.shutdown().await;
    }

    /// Serve one link session until it disconnects. Returns the disconnect reason.
    pub async fn run<S: CommandSink>(
        &mut self,
        link: &S,
        events: &mut mpsc::Receiver<LinkEvent>,
        motion: &mut mpsc::Receiver<MotionEvent>,
    ) -> Option<String> {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(LinkEvent::Frame { frame, received_at_ms }) => {
                        self.handle_frame(frame, received_at_ms, link).await;
                    }
                    Some(LinkEvent::Disconnected { reason }) => return reason,
                    None => return Some("link event channel closed".into()),
                },
                Some(event) = motion.recv() => self.handle_motion(event, link).await,
            }
        }
    }

    async fn handle_frame<S: CommandSink>(&mut self, frame: RawFrame, at_ms: i64, link: &S) {
        match frame {
            RawFrame::TextLine(line) => {
                if let Some(reading) = TelemetryLineDecoder::decode(&line) {
                    self.handle_reading(reading, at_ms, link).await;
                }
            }
            RawFrame::JpegImage(jpeg) => {
                if let Err(e) = self.snapshots.store_jpeg(&jpeg).await {
                    warn!(error = %e, bytes = jpeg.len(), "dropping camera frame");
                }
            }
            RawFrame::RawBitmap(bitmap) => {
                if let Err(e) = self.snapshots.store_bitmap(&bitmap).await {
                    warn!(error = %e, "failed to store bitmap snapshot");
                }
                self.analyzer.publish(LumaPlane {
                    luma: bitmap.into_luma(),
                    captured_at_ms: at_ms,
                });
            }
        }
    }

    async fn handle_reading<S: CommandSink>(
        &mut self,
        reading: SensorReading,
        at_ms: i64,
        link: &S,
    ) {
        if let SensorReading::Message(text) = &reading {
            if reading.is_notable() {
                warn!(message = text, "peripheral status");
            } else {
                info!(message = text, "peripheral message");
            }
            return;
        }

        debug!(?reading, "telemetry");
        self.history.record(&reading, at_ms);

        if !self.sound.monitor_enabled {
            return;
        }
        if let Some(percent) = reading.sound_percent() {
            if percent >= self.sound.threshold_percent {
                let record = AlertRecord::sound(percent, self.sound.threshold_percent, at_ms);
                self.raise(record, link).await;
            }
        }
    }

    async fn handle_motion<S: CommandSink>(&mut self, event: MotionEvent, link: &S) {
        let snapshot = self.snapshots.latest().map(|p| p.to_path_buf());
        let record = AlertRecord::motion(event.captured_at_ms, snapshot);
        self.raise(record, link).await;
    }

    /// Returns whether the alert got past the cooldown.
    async fn raise<S: CommandSink>(&mut self, record: AlertRecord, link: &S) -> bool {
        if !self.cooldown.try_accept(record.timestamp_ms) {
            debug!(kind = ?record.kind, "alert suppressed by cooldown");
            return false;
        }

        warn!(kind = ?record.kind, message = record.message, "ALERT");
        self.alarm.trigger(link);
        if let Err(e) = self.alerts.append(&record).await {
            warn!(error = %e, "failed to persist alert");
        }
        true
    }
}
