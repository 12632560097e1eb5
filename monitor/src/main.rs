use homesec_common::config::{Config, ConfigError};
use homesec_link::{transport, LinkError, LinkSession};
use homesec_monitor::detect::{Analyzer, ArmSwitch, MotionEvent};
use homesec_monitor::Monitor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

const MOTION_QUEUE: usize = 16;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        transport = config.link.transport,
        address = config.link.address,
        poll_interval_ms = config.link.poll_interval_ms,
        motion_enabled = config.motion.enabled,
        motion_threshold = config.motion.threshold,
        cooldown_ms = config.motion.cooldown_ms,
        sound_monitor = config.sound.monitor_enabled,
        alerts = %config.alerts.path.display(),
        "starting homesec monitor"
    );

    let (motion_tx, mut motion_rx) = mpsc::channel(MOTION_QUEUE);
    let analyzer = Analyzer::spawn(&config.motion, motion_tx);
    let mut monitor = Monitor::new(&config, analyzer);
    spawn_motion_toggle(monitor.motion_switch());
    let poll_interval = spawn_config_reload(
        config_path,
        Duration::from_millis(config.link.poll_interval_ms),
    );

    tokio::select! {
        _ = run_link_forever(&config, &mut monitor, &mut motion_rx, poll_interval) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown requested");
        }
    }

    let history = monitor.history();
    info!(
        samples = history.len(),
        latest = ?history.latest(),
        "monitor stopped"
    );
    monitor.shutdown().await;
}

/// Reconnect delay: doubles on every failed attempt, back to the minimum once a
/// session was established.
struct Backoff {
    next: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            next: INITIAL_BACKOFF,
        }
    }

    fn after_connected(&mut self) -> Duration {
        self.next = INITIAL_BACKOFF;
        self.next
    }

    fn after_failure(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(MAX_BACKOFF);
        delay
    }
}

/// Serve the peripheral link, reconnecting with exponential backoff.
async fn run_link_forever(
    config: &Config,
    monitor: &mut Monitor,
    motion_rx: &mut mpsc::Receiver<MotionEvent>,
    poll_interval: watch::Receiver<Duration>,
) {
    let mut backoff = Backoff::new();

    loop {
        info!(address = config.link.address, "connecting to peripheral");
        let delay = match serve_link(config, monitor, motion_rx, poll_interval.clone()).await {
            Ok(None) => {
                let delay = backoff.after_connected();
                info!("link ended cleanly, reconnecting in {:?}", delay);
                delay
            }
            Ok(Some(reason)) => {
                let delay = backoff.after_connected();
                warn!(reason, "link dropped, reconnecting in {:?}", delay);
                delay
            }
            Err(e) => {
                let delay = backoff.after_failure();
                error!(error = %e, "link error, reconnecting in {:?}", delay);
                delay
            }
        };
        tokio::time::sleep(delay).await;
    }
}

async fn serve_link(
    config: &Config,
    monitor: &mut Monitor,
    motion_rx: &mut mpsc::Receiver<MotionEvent>,
    mut poll_interval: watch::Receiver<Duration>,
) -> Result<Option<String>, LinkError> {
    let stream = transport::open(&config.link).await?;
    let (session, handle, mut events) = LinkSession::new(stream, &config.link);
    handle.set_poll_interval(*poll_interval.borrow_and_update());
    let reader = tokio::spawn(session.run());

    let poll_handle = handle.clone();
    let poll_updates = tokio::spawn(async move {
        while poll_interval.changed().await.is_ok() {
            let interval = *poll_interval.borrow_and_update();
            poll_handle.set_poll_interval(interval);
            info!(poll_interval_ms = interval.as_millis() as u64, "poll interval updated");
        }
    });

    let reason = monitor.run(&handle, &mut events, motion_rx).await;

    poll_updates.abort();
    handle.close();
    match reader.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "link session ended with error"),
        Err(e) => error!(error = %e, "link session task panicked"),
    }
    Ok(reason)
}

/// SIGHUP re-reads the config file and publishes its link poll interval.
///
/// Other settings only take effect on restart.
fn spawn_config_reload(path: PathBuf, initial: Duration) -> watch::Receiver<Duration> {
    let (tx, rx) = watch::channel(initial);
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "config reload signal unavailable");
                return;
            }
        };
        while hangups.recv().await.is_some() {
            match reload_poll_interval(&path) {
                Ok(interval) => {
                    tx.send_replace(interval);
                }
                Err(e) => warn!(error = %e, path = %path.display(), "config reload failed"),
            }
        }
    });
    #[cfg(not(unix))]
    drop((path, tx));
    rx
}

fn reload_poll_interval(path: &Path) -> Result<Duration, ConfigError> {
    let config = Config::load(path)?;
    Ok(Duration::from_millis(config.link.poll_interval_ms))
}

/// SIGUSR1 arms or disarms motion detection.
fn spawn_motion_toggle(switch: ArmSwitch) {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut toggles = match signal(SignalKind::user_defined1()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "motion toggle signal unavailable");
                return;
            }
        };
        while toggles.recv().await.is_some() {
            let armed = switch.toggle();
            info!(armed, "motion detection switched by signal");
        }
    });
    #[cfg(not(unix))]
    drop(switch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_a_session_succeeds() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.after_failure(), Duration::from_secs(2));
        assert_eq!(backoff.after_failure(), Duration::from_secs(4));
        assert_eq!(backoff.after_connected(), Duration::from_secs(2));
        assert_eq!(backoff.after_failure(), Duration::from_secs(2));
        assert_eq!(backoff.after_failure(), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        let mut backoff = Backoff::new();
        let delays: Vec<_> = (0..6).map(|_| backoff.after_failure().as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn reload_reads_poll_interval() {
        let path = std::env::temp_dir()
            .join(format!("homesec-reload-{}.toml", std::process::id()));
        std::fs::write(&path, "[link]\npoll_interval_ms = 750\n").unwrap();
        let interval = reload_poll_interval(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(interval.unwrap(), Duration::from_millis(750));
    }
}
