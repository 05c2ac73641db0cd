pub mod global;
pub mod model;

pub use global::{CONFIG, CONFIG_ENV, config_path};
pub use model::{LoggingConfig, QueryConfig, Settings, load_settings, parse_settings};
