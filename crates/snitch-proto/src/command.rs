use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operator intent, mapped 1:1 onto flight-state operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "cmd")]
pub enum OperatorCommand {
    Arm,
    Disarm,
    SetThrottle { value: i32 },
    ToggleVision,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("throttle needs an integer value")]
    MissingValue,
    #[error("invalid throttle value: {0}")]
    BadValue(String),
}

/// Line syntax used by the operator surface:
/// `arm`, `disarm`, `throttle <v>`, `vision`, `status`.
/// Matching is case-insensitive and ignores surrounding whitespace.
impl FromStr for OperatorCommand {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let head = parts.next().ok_or(CommandParseError::Empty)?.to_ascii_lowercase();
        match head.as_str() {
            "arm" => Ok(Self::Arm),
            "disarm" => Ok(Self::Disarm),
            "vision" => Ok(Self::ToggleVision),
            "status" => Ok(Self::Status),
            "throttle" => {
                let raw = parts.next().ok_or(CommandParseError::MissingValue)?;
                let value = raw
                    .parse::<i32>()
                    .map_err(|_| CommandParseError::BadValue(raw.to_string()))?;
                Ok(Self::SetThrottle { value })
            }
            other => Err(CommandParseError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_operator_lines() {
        assert_eq!("arm".parse::<OperatorCommand>(), Ok(OperatorCommand::Arm));
        assert_eq!("  DISARM \r".parse::<OperatorCommand>(), Ok(OperatorCommand::Disarm));
        assert_eq!("vision".parse::<OperatorCommand>(), Ok(OperatorCommand::ToggleVision));
        assert_eq!("throttle 1500".parse::<OperatorCommand>(), Ok(OperatorCommand::SetThrottle { value: 1500 }));
        assert_eq!("throttle -3".parse::<OperatorCommand>(), Ok(OperatorCommand::SetThrottle { value: -3 }));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!("".parse::<OperatorCommand>(), Err(CommandParseError::Empty));
        assert_eq!("throttle".parse::<OperatorCommand>(), Err(CommandParseError::MissingValue));
        assert!(matches!(
            "throttle fast".parse::<OperatorCommand>(),
            Err(CommandParseError::BadValue(_))
        ));
        assert!(matches!("launch".parse::<OperatorCommand>(), Err(CommandParseError::Unknown(_))));
    }
}
