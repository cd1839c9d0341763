use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Shutter position as a percentage, in steps of 10
///
/// 0 is fully closed, 100 fully open, and 10 is the motor's stored
/// "my" position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Position(u8);

impl Position {
    pub const CLOSED: Position = Position(0);
    pub const PRESET: Position = Position(10);
    pub const OPEN: Position = Position(100);

    /// Size of one estimator step
    pub const STEP: u8 = 10;

    /// Validate a raw percentage
    pub fn new(value: i64) -> Result<Self> {
        if (0..=100).contains(&value) && value % Self::STEP as i64 == 0 {
            Ok(Self(value as u8))
        } else {
            Err(Error::InvalidTarget(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Targets the motor cannot stop at on its own
    pub fn is_intermediate(self) -> bool {
        !matches!(self, Self::CLOSED | Self::PRESET | Self::OPEN)
    }

    /// One step from `self` toward `target`, never passing it
    pub fn step_toward(self, target: Position) -> Position {
        if target > self {
            Position((self.0 + Self::STEP).min(target.0))
        } else if target < self {
            Position(self.0.saturating_sub(Self::STEP).max(target.0))
        } else {
            self
        }
    }

    /// Number of steps needed to reach `target`
    pub fn steps_to(self, target: Position) -> u32 {
        (self.0.abs_diff(target.0) as u32).div_ceil(Self::STEP as u32)
    }
}

impl TryFrom<i64> for Position {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Position> for u8 {
    fn from(position: Position) -> u8 {
        position.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Direction of the simulated movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    #[default]
    Idle,
    Increasing,
    Decreasing,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
        };
        f.write_str(label)
    }
}

/// Remote control button wired to an output line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Line {
    Up,
    Down,
    Preset,
}

impl Line {
    pub const ALL: [Line; 3] = [Line::Up, Line::Down, Line::Preset];
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Preset => "preset",
        };
        f.write_str(label)
    }
}

/// GPIO numbers of the three lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePins {
    pub up: u32,
    pub down: u32,
    pub preset: u32,
}

impl LinePins {
    pub fn pin(&self, line: Line) -> u32 {
        match line {
            Line::Up => self.up,
            Line::Down => self.down,
            Line::Preset => self.preset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_multiples_of_ten() {
        for value in (0..=100).step_by(10) {
            assert_eq!(Position::new(value).unwrap().value() as i64, value);
        }
    }

    #[test]
    fn test_rejects_invalid_values() {
        for value in [-10, 5, 55, 101, 110] {
            assert!(matches!(Position::new(value), Err(Error::InvalidTarget(v)) if v == value));
        }
    }

    #[test]
    fn test_intermediate_positions() {
        assert!(!Position::CLOSED.is_intermediate());
        assert!(!Position::PRESET.is_intermediate());
        assert!(!Position::OPEN.is_intermediate());
        assert!(Position::new(20).unwrap().is_intermediate());
        assert!(Position::new(90).unwrap().is_intermediate());
    }

    #[test]
    fn test_step_toward_never_overshoots() {
        let fifty = Position::new(50).unwrap();
        assert_eq!(Position::CLOSED.step_toward(fifty).value(), 10);
        assert_eq!(Position::OPEN.step_toward(fifty).value(), 90);
        assert_eq!(fifty.step_toward(fifty), fifty);
    }

    #[test]
    fn test_steps_to() {
        assert_eq!(Position::CLOSED.steps_to(Position::OPEN), 10);
        assert_eq!(Position::new(30).unwrap().steps_to(Position::OPEN), 7);
        assert_eq!(Position::OPEN.steps_to(Position::OPEN), 0);
    }

    #[test]
    fn test_serde_validates() {
        let p: Position = serde_json::from_str("40").unwrap();
        assert_eq!(p.value(), 40);
        assert!(serde_json::from_str::<Position>("45").is_err());
        assert_eq!(serde_json::to_string(&Position::OPEN).unwrap(), "100");
    }
}
