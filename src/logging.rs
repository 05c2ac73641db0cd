use anyhow::Context;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::shared::config::{CONFIG, LoggingConfig};

/// Installs the global subscriber from the loaded configuration.
pub fn init() -> anyhow::Result<()> {
    init_with(&CONFIG.logging)
}

/// Stdout plus a daily rolling `group_ql.log` under `log_dir`, each with
/// its own level.
pub fn init_with(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let (stdout_filter, file_filter) = levels(cfg)?;

    let stdout_layer = fmt::layer().with_ansi(true).with_filter(stdout_filter);

    let file_appender = tracing_appender::rolling::daily(&cfg.log_dir, "group_ql.log");
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(file_appender)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    info!(target: "group_ql::logging", log_dir = %cfg.log_dir, "Logging initialized");
    Ok(())
}

pub(crate) fn levels(cfg: &LoggingConfig) -> anyhow::Result<(LevelFilter, LevelFilter)> {
    let stdout = cfg
        .stdout_level
        .parse::<LevelFilter>()
        .with_context(|| format!("invalid stdout_level {:?}", cfg.stdout_level))?;
    let file = cfg
        .file_level
        .parse::<LevelFilter>()
        .with_context(|| format!("invalid file_level {:?}", cfg.file_level))?;
    Ok((stdout, file))
}

#[cfg(test)]
pub fn init_for_tests() {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("group_ql=debug".parse().unwrap());

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(stdout_level: &str, file_level: &str) -> LoggingConfig {
        LoggingConfig {
            log_dir: "../logs".into(),
            stdout_level: stdout_level.into(),
            file_level: file_level.into(),
        }
    }

    #[test]
    fn levels_parse_case_insensitively() {
        let (stdout, file) = levels(&config("INFO", "debug")).unwrap();
        assert_eq!(stdout, LevelFilter::INFO);
        assert_eq!(file, LevelFilter::DEBUG);
    }

    #[test]
    fn unknown_level_names_the_setting() {
        let err = levels(&config("info", "chatty")).unwrap_err();
        assert!(err.to_string().contains("file_level"));
    }
}
