use homesec_common::config::MotionConfig;
use tracing::debug;

/// Motion verdict for one completed sample window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub captured_at_ms: i64,
    pub window_average: f64,
}

enum DetectorState {
    /// Frames are ignored.
    Idle,
    /// `previous` is the last analysed luma plane.
    Armed { previous: Option<Vec<u8>> },
}

#[derive(Default)]
struct MotionSample {
    sum: f64,
    count: u32,
}

/// Frame-differencing motion detector over luma planes.
///
/// Each frame is compared with the previous one by mean absolute difference over
/// every `stride`-th byte. Differences are averaged over `window_samples` frames and
/// the window average is compared with `threshold`, which keeps single-frame flicker
/// from firing.
///
/// Not synchronised: call from a single analysis task.
pub struct MotionDetector {
    state: DetectorState,
    window: MotionSample,
    threshold: f64,
    window_samples: u32,
    stride: usize,
}

impl MotionDetector {
    /// Starts disarmed.
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            state: DetectorState::Idle,
            window: MotionSample::default(),
            threshold: config.threshold,
            window_samples: config.window_samples.max(1),
            stride: config.sample_stride.max(1),
        }
    }

    /// Disarming drops the previous frame and the partial window, so re-arming
    /// never compares against a stale scene.
    pub fn set_armed(&mut self, armed: bool) {
        match (&self.state, armed) {
            (DetectorState::Idle, true) => {
                self.state = DetectorState::Armed { previous: None };
            }
            (DetectorState::Armed { .. }, false) => {
                self.state = DetectorState::Idle;
                self.window = MotionSample::default();
            }
            _ => {}
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, DetectorState::Armed { .. })
    }

    pub fn analyze(&mut self, luma: &[u8], captured_at_ms: i64) -> Option<MotionEvent> {
        let DetectorState::Armed { previous } = &mut self.state else {
            return None;
        };

        let mut event = None;
        if let Some(prev) = previous.as_deref().filter(|p| p.len() == luma.len()) {
            self.window.sum += mean_abs_diff(prev, luma, self.stride);
            self.window.count += 1;

            if self.window.count >= self.window_samples {
                let window_average = self.window.sum / self.window.count as f64;
                let detected = window_average > self.threshold;
                debug!(
                    window_average = format!("{:.2}", window_average),
                    threshold = self.threshold,
                    detected,
                    "motion window complete"
                );
                if detected {
                    event = Some(MotionEvent {
                        captured_at_ms,
                        window_average,
                    });
                }
                self.window = MotionSample::default();
            }
        }

        match previous {
            Some(buf) => {
                buf.clear();
                buf.extend_from_slice(luma);
            }
            None => *previous = Some(luma.to_vec()),
        }
        event
    }
}

/// Mean of `|cur[i] - prev[i]|` for `i = 0, stride, 2*stride, ...`.
pub fn mean_abs_diff(prev: &[u8], cur: &[u8], stride: usize) -> f64 {
    let (sum, count) = prev
        .iter()
        .zip(cur)
        .step_by(stride.max(1))
        .fold((0u64, 0u64), |(sum, count), (&a, &b)| {
            (sum + a.abs_diff(b) as u64, count + 1)
        });
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}
