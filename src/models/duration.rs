use std::fmt;

use serde::{Deserialize, Serialize};

/// An effort estimate as a magnitude plus a unit, e.g. `3mo`, `2w`, `5d`.
///
/// The canonical string form is `{magnitude}{unit}` with no separator; that
/// form is what the line grammar stores and what [`fmt::Display`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub magnitude: u32,
    pub unit: DurationUnit,
}

impl Duration {
    pub fn new(magnitude: u32, unit: DurationUnit) -> Self {
        Self { magnitude, unit }
    }

    /// Parse the canonical form. Returns `None` for a missing magnitude, an
    /// unknown unit, or a zero-length string.
    pub fn parse(s: &str) -> Option<Self> {
        let split = s.find(|c: char| !c.is_ascii_digit())?;
        let (digits, unit) = s.split_at(split);
        if digits.is_empty() {
            return None;
        }
        let magnitude: u32 = digits.parse().ok()?;
        Some(Self {
            magnitude,
            unit: DurationUnit::from_str(unit)?,
        })
    }

    /// Rough length in hours, for ordering and health reports.
    pub fn approx_hours(&self) -> u32 {
        self.magnitude * self.unit.approx_hours()
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.as_str())
    }
}

/// Units accepted by the duration grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl DurationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hours => "h",
            Self::Days => "d",
            Self::Weeks => "w",
            Self::Months => "mo",
            Self::Years => "y",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "h" => Some(Self::Hours),
            "d" => Some(Self::Days),
            "w" => Some(Self::Weeks),
            "mo" => Some(Self::Months),
            "y" => Some(Self::Years),
            _ => None,
        }
    }

    fn approx_hours(&self) -> u32 {
        match self {
            Self::Hours => 1,
            Self::Days => 24,
            Self::Weeks => 24 * 7,
            Self::Months => 24 * 30,
            Self::Years => 24 * 365,
        }
    }
}
