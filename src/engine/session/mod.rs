pub mod dataset;
pub mod iterate;
pub mod options;
pub mod query_session;

pub use dataset::DatasetSession;
pub use iterate::{IterateCallback, merge_ftgs};
pub use options::SessionOptions;
pub use query_session::{PushedMetrics, Session, StatColumn};
