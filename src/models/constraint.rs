use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Duration;

/// A scheduling constraint on an item.
///
/// The canonical string form is a call-syntax token used by the line grammar
/// after the `@@@` marker:
///
/// - `due(2026-09-01)`: hard deadline
/// - `window(2026-08-01,2026-09-01)`: only actionable inside the range
/// - `every(1w)`: recurrence period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeConstraint {
    Due(NaiveDate),
    Window { start: NaiveDate, end: NaiveDate },
    Every(Duration),
}

impl TimeConstraint {
    /// Parse one call-syntax token. Returns `None` for an unknown function
    /// name, malformed parentheses, or unparseable arguments.
    pub fn parse(s: &str) -> Option<Self> {
        let open = s.find('(')?;
        let (name, rest) = s.split_at(open);
        let args = rest.strip_prefix('(')?.strip_suffix(')')?;
        match name {
            "due" => Some(Self::Due(parse_date(args)?)),
            "window" => {
                let (start, end) = args.split_once(',')?;
                Some(Self::Window {
                    start: parse_date(start)?,
                    end: parse_date(end)?,
                })
            }
            "every" => Some(Self::Every(Duration::parse(args.trim())?)),
            _ => None,
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

impl fmt::Display for TimeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Due(date) => write!(f, "due({})", date.format("%Y-%m-%d")),
            Self::Window { start, end } => write!(
                f,
                "window({},{})",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
            Self::Every(period) => write!(f, "every({period})"),
        }
    }
}
