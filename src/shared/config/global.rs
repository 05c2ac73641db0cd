use once_cell::sync::Lazy;
use std::env;
use std::sync::Arc;

use crate::shared::config::model::{Settings, load_settings};

/// Environment variable naming the settings file, extension omitted.
pub const CONFIG_ENV: &str = "GROUP_QL_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config";

pub fn config_path() -> String {
    env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub static CONFIG: Lazy<Arc<Settings>> = Lazy::new(|| {
    let path = config_path();
    let settings = load_settings(&path)
        .unwrap_or_else(|e| panic!("Failed to load group_ql settings from {}: {}", path, e));
    Arc::new(settings)
});
