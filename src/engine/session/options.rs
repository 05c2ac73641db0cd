use crate::shared::config::{CONFIG, Settings};
use crate::shared::datetime::TimeConfig;
use crate::shared::format::OutputFormat;

/// Execution knobs a `Session` reads from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub group_limit: Option<usize>,
    pub output_format: OutputFormat,
    pub sorted_iteration: bool,
    pub time: TimeConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            group_limit: None,
            output_format: OutputFormat::Tsv,
            sorted_iteration: false,
            time: TimeConfig::default(),
        }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut options = Self::default();
        if let Some(query) = &settings.query {
            options.group_limit = query.group_limit.filter(|limit| *limit > 0);
            options.output_format = query.output_format;
            options.sorted_iteration = query.sorted_iteration.unwrap_or(false);
        }
        if let Some(time) = &settings.time {
            options.time = time.clone();
        }
        options
    }

    /// Options of the process-wide configuration.
    pub fn from_app_config() -> Self {
        Self::from_settings(&CONFIG)
    }

    pub fn with_group_limit(mut self, limit: usize) -> Self {
        self.group_limit = Some(limit);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }
}
