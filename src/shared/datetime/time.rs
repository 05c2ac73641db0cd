use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Global time configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Timezone used when rendering time-range labels (None = UTC)
    pub timezone: Option<String>,
    /// strftime pattern for the bounds of a time-range label
    #[serde(default = "default_date_time_format")]
    pub date_time_format: String,
}

pub const DEFAULT_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn default_date_time_format() -> String {
    DEFAULT_DATE_TIME_FORMAT.to_string()
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: None,
            date_time_format: default_date_time_format(),
        }
    }
}

impl TimeConfig {
    /// Parse timezone string to chrono_tz::Tz
    pub fn parse_timezone(&self) -> Option<Tz> {
        self.timezone
            .as_ref()
            .and_then(|tz_str| tz_str.parse().ok())
    }

    /// Timezone to render with, UTC when unset or unparseable.
    pub fn timezone_or_utc(&self) -> Tz {
        self.parse_timezone().unwrap_or(Tz::UTC)
    }
}
