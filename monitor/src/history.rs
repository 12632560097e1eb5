use homesec_common::frame::SensorReading;
use std::collections::VecDeque;

/// One point on the environment chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub timestamp_ms: i64,
    pub temperature: f32,
    pub humidity: f32,
    pub sound_percent: Option<u8>,
    pub light_percent: Option<u8>,
}

/// Most recent value per sensor, regardless of which line layout carried it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestReadings {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub sound_raw: Option<u32>,
    pub sound_percent: Option<u8>,
    pub light_raw: Option<u32>,
    pub light_percent: Option<u8>,
}

/// Bounded history of climate samples plus the latest value of every sensor.
pub struct SensorHistory {
    samples: VecDeque<SensorSample>,
    max_samples: usize,
    latest: LatestReadings,
}

impl SensorHistory {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples.min(1024)),
            max_samples: max_samples.max(1),
            latest: LatestReadings::default(),
        }
    }

    /// Climate-bearing readings append a sample; sound and light only update the latest values.
    pub fn record(&mut self, reading: &SensorReading, at_ms: i64) {
        match reading {
            SensorReading::Env(env) => {
                self.latest.temperature = Some(env.temperature);
                self.latest.humidity = Some(env.humidity);
                self.latest.sound_percent = Some(env.sound_percent);
                self.latest.light_percent = Some(env.light_percent);
                self.push(SensorSample {
                    timestamp_ms: at_ms,
                    temperature: env.temperature,
                    humidity: env.humidity,
                    sound_percent: Some(env.sound_percent),
                    light_percent: Some(env.light_percent),
                });
            }
            SensorReading::Climate {
                temperature,
                humidity,
            } => {
                self.latest.temperature = Some(*temperature);
                self.latest.humidity = Some(*humidity);
                self.push(SensorSample {
                    timestamp_ms: at_ms,
                    temperature: *temperature,
                    humidity: *humidity,
                    sound_percent: None,
                    light_percent: None,
                });
            }
            SensorReading::Sound { raw, percent } => {
                if raw.is_some() {
                    self.latest.sound_raw = *raw;
                }
                self.latest.sound_percent = Some(*percent);
            }
            SensorReading::Light { raw, percent } => {
                self.latest.light_raw = Some(*raw);
                self.latest.light_percent = Some(*percent);
            }
            SensorReading::Message(_) => {}
        }
    }

    fn push(&mut self, sample: SensorSample) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> &LatestReadings {
        &self.latest
    }

    /// Oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &SensorSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
