pub mod time;
pub mod time_range;

pub use time::{DEFAULT_DATE_TIME_FORMAT, TimeConfig};
pub use time_range::{add_months, format_millis, format_time_range, start_of_day_millis};
