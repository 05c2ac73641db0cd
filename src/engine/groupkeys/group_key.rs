use std::fmt;

use crate::shared::format::OutputFormat;

/// Weekday labels, Monday first. Shared by every day-of-week node.
pub static DAY_KEYS: [GroupKey; 7] = [
    GroupKey::DayOfWeek(0),
    GroupKey::DayOfWeek(1),
    GroupKey::DayOfWeek(2),
    GroupKey::DayOfWeek(3),
    GroupKey::DayOfWeek(4),
    GroupKey::DayOfWeek(5),
    GroupKey::DayOfWeek(6),
];

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub const DEFAULT_GROUP_NAME: &str = "DEFAULT";

/// One node's contribution to a row label.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// Label of the initial "everything" group.
    Empty,
    Str(String),
    Int(i64),
    /// Half-open numeric bucket `[min, max)`.
    Range { min: i64, max: i64 },
    /// Everything below `max`.
    LowGutter { max: i64 },
    /// Everything at or above `min`.
    HighGutter { min: i64 },
    /// Catch-all bucket for terms that matched nothing.
    Default(String),
    /// Index into the Monday-first weekday table.
    DayOfWeek(usize),
}

impl GroupKey {
    pub fn default_bucket() -> Self {
        GroupKey::Default(DEFAULT_GROUP_NAME.to_string())
    }

    pub fn is_default(&self) -> bool {
        matches!(self, GroupKey::Default(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, GroupKey::Empty)
    }

    /// Label text escaped for `format`.
    pub fn render(&self, format: OutputFormat) -> String {
        let raw = self.to_string();
        format.escape(&raw).into_owned()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Empty => Ok(()),
            GroupKey::Str(s) => f.write_str(s),
            GroupKey::Int(v) => write!(f, "{}", v),
            GroupKey::Range { min, max } => write!(f, "[{}, {})", min, max),
            GroupKey::LowGutter { max } => write!(f, "[-\u{221E}, {})", max),
            GroupKey::HighGutter { min } => write!(f, "[{}, \u{221E})", min),
            GroupKey::Default(name) => f.write_str(name),
            GroupKey::DayOfWeek(idx) => f.write_str(DAY_NAMES[idx % DAY_NAMES.len()]),
        }
    }
}
