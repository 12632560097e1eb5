use homesec_common::frame::{EnvReading, SensorReading};
use std::str::FromStr;
use tracing::warn;

/// A numeric field ends at the first of these after its key, or at end of line.
const FIELD_DELIMITERS: &[char] = &[' ', ',', '%'];

/// Classifies single telemetry lines from the peripheral.
///
/// Keys are matched case-insensitively by substring, not by grammar, because the
/// firmware has printed several layouts over time:
///
/// ```text
/// TEMP=23.4 C, HUM=56.7 %
/// ENV: TEMP=23.4 C, HUM=56.7 %, SOUND=40%, LIGHT=70%
/// SOUND_RAW=512, SOUND_PERCENT=40%
/// LIGHT_RAW=800, LIGHT_PERCENT=78%
/// ALARM ON
/// ```
pub struct TelemetryLineDecoder;

impl TelemetryLineDecoder {
    /// Decode one line. Returns `None` for swallowed noise and for lines whose
    /// numbers do not parse (those are logged and dropped).
    pub fn decode(line: &str) -> Option<SensorReading> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let upper = line.to_ascii_uppercase();

        if upper.contains("TEMP=") && upper.contains("HUM=") {
            return Self::climate(line, &upper).or_else(|| malformed("climate", line));
        }
        if upper.contains("SOUND_RAW=") && upper.contains("SOUND_PERCENT=") {
            return Self::sound(line, &upper).or_else(|| malformed("sound", line));
        }
        if upper.contains("SOUND=") && upper.contains('%') {
            return number::<u8>(line, &upper, "SOUND=")
                .map(|percent| SensorReading::Sound { raw: None, percent })
                .or_else(|| malformed("sound", line));
        }
        if upper.contains("LIGHT_RAW=") && upper.contains("LIGHT_PERCENT=") {
            return Self::light(line, &upper).or_else(|| malformed("light", line));
        }

        if line.len() > 3 && !line.starts_with("TEMP=") && !line.starts_with("SOUND_RAW=") {
            return Some(SensorReading::Message(line.to_string()));
        }
        None
    }

    fn climate(line: &str, upper: &str) -> Option<SensorReading> {
        let temperature = number::<f32>(line, upper, "TEMP=")?;
        let humidity = number::<f32>(line, upper, "HUM=")?;

        if upper.contains("SOUND=") && upper.contains("LIGHT=") {
            return Some(SensorReading::Env(EnvReading {
                temperature,
                humidity,
                sound_percent: number(line, upper, "SOUND=")?,
                light_percent: number(line, upper, "LIGHT=")?,
            }));
        }
        Some(SensorReading::Climate {
            temperature,
            humidity,
        })
    }

    fn sound(line: &str, upper: &str) -> Option<SensorReading> {
        Some(SensorReading::Sound {
            raw: Some(number(line, upper, "SOUND_RAW=")?),
            percent: number(line, upper, "SOUND_PERCENT=")?,
        })
    }

    fn light(line: &str, upper: &str) -> Option<SensorReading> {
        Some(SensorReading::Light {
            raw: number(line, upper, "LIGHT_RAW=")?,
            percent: number(line, upper, "LIGHT_PERCENT=")?,
        })
    }
}

/// Parse the value following `key`. `upper` is the ASCII-uppercased `line`, so
/// byte offsets line up between the two.
fn number<T: FromStr>(line: &str, upper: &str, key: &str) -> Option<T> {
    let start = upper.find(key)? + key.len();
    let rest = &line[start..];
    let end = rest.find(FIELD_DELIMITERS).unwrap_or(rest.len());
    rest[..end].trim().parse().ok()
}

fn malformed(kind: &str, line: &str) -> Option<SensorReading> {
    warn!(kind, line, "dropping malformed telemetry line");
    None
}
