use serde::Deserialize;

/// Single-byte commands understood by the peripheral firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Command {
    /// `t`: read temperature and humidity.
    RequestClimate,
    /// `s`: read sound level (raw and percent).
    RequestSound,
    /// `l`: read light level (raw and percent).
    RequestLight,
    /// `e`: combined environment snapshot.
    RequestEnv,
    /// `a`: buzzer on. Ignored by the firmware while the system is switched off.
    AlarmOn,
    /// `x`: buzzer off.
    AlarmOff,
    /// `?`: prints the command list as text lines.
    Help,
}

impl Command {
    pub fn as_byte(self) -> u8 {
        match self {
            Command::RequestClimate => b't',
            Command::RequestSound => b's',
            Command::RequestLight => b'l',
            Command::RequestEnv => b'e',
            Command::AlarmOn => b'a',
            Command::AlarmOff => b'x',
            Command::Help => b'?',
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown peripheral command {0:?}")]
    Unknown(String),
}

impl TryFrom<char> for Command {
    type Error = CommandError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            't' => Ok(Command::RequestClimate),
            's' => Ok(Command::RequestSound),
            'l' => Ok(Command::RequestLight),
            'e' => Ok(Command::RequestEnv),
            'a' => Ok(Command::AlarmOn),
            'x' => Ok(Command::AlarmOff),
            '?' => Ok(Command::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

impl TryFrom<String> for Command {
    type Error = CommandError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Command::try_from(c),
            _ => Err(CommandError::Unknown(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_match_firmware() {
        assert_eq!(Command::RequestClimate.as_byte(), b't');
        assert_eq!(Command::RequestEnv.as_byte(), b'e');
        assert_eq!(Command::AlarmOn.as_byte(), b'a');
        assert_eq!(Command::AlarmOff.as_byte(), b'x');
    }

    #[test]
    fn parses_single_char_strings() {
        assert_eq!(Command::try_from("s".to_string()).unwrap(), Command::RequestSound);
        assert!(Command::try_from("se".to_string()).is_err());
        assert!(Command::try_from(String::new()).is_err());
        assert!(Command::try_from('q').is_err());
    }
}
