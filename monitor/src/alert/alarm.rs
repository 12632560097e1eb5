use homesec_common::command::Command;
use homesec_common::config::AlarmConfig;
use homesec_link::LinkHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can queue a command for the peripheral.
pub trait CommandSink: Clone + Send + Sync + 'static {
    fn send_command(&self, command: Command) -> bool;
}

impl CommandSink for LinkHandle {
    fn send_command(&self, command: Command) -> bool {
        self.send(command)
    }
}

/// Sounds the peripheral buzzer for a fixed duration.
pub struct AlarmController {
    buzzer_enabled: bool,
    duration: Duration,
}

impl AlarmController {
    pub fn new(config: &AlarmConfig) -> Self {
        Self {
            buzzer_enabled: config.buzzer_enabled,
            duration: Duration::from_millis(config.duration_ms),
        }
    }

    /// Send `AlarmOn` now and schedule `AlarmOff`. Returns whether the buzzer was started.
    pub fn trigger<S: CommandSink>(&self, link: &S) -> bool {
        if !self.buzzer_enabled {
            debug!("buzzer disabled, alert is notification only");
            return false;
        }
        if !link.send_command(Command::AlarmOn) {
            warn!("could not start buzzer");
            return false;
        }

        let link = link.clone();
        let duration = self.duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if !link.send_command(Command::AlarmOff) {
                warn!("could not stop buzzer");
            }
        });
        info!(duration_ms = self.duration.as_millis() as u64, "buzzer started");
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records commands instead of sending them.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub sent: Arc<Mutex<Vec<(Command, tokio::time::Instant)>>>,
        pub refuse: bool,
    }

    impl RecordingSink {
        pub fn commands(&self) -> Vec<Command> {
            self.sent.lock().unwrap().iter().map(|(c, _)| *c).collect()
        }
    }

    impl CommandSink for RecordingSink {
        fn send_command(&self, command: Command) -> bool {
            if self.refuse {
                return false;
            }
            self.sent
                .lock()
                .unwrap()
                .push((command, tokio::time::Instant::now()));
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn buzzer_turns_off_after_duration() {
        let alarm = AlarmController::new(&AlarmConfig::default());
        let sink = RecordingSink::default();

        assert!(alarm.trigger(&sink));
        assert_eq!(sink.commands(), vec![Command::AlarmOn]);

        tokio::time::sleep(Duration::from_millis(3001)).await;
        let sent = sink.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].0, Command::AlarmOff);
        assert!(sent[1].1 - sent[0].1 >= Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn disabled_buzzer_sends_nothing() {
        let alarm = AlarmController::new(&AlarmConfig {
            buzzer_enabled: false,
            ..AlarmConfig::default()
        });
        let sink = RecordingSink::default();
        assert!(!alarm.trigger(&sink));
        assert!(sink.commands().is_empty());
    }

    #[tokio::test]
    async fn refused_command_skips_schedule() {
        let alarm = AlarmController::new(&AlarmConfig::default());
        let sink = RecordingSink {
            refuse: true,
            ..RecordingSink::default()
        };
        assert!(!alarm.trigger(&sink));
    }
}
