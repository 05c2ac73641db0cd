pub mod execute;
pub mod field_extremes;
pub mod group_distincts;
pub mod handler;
pub mod percentiles;
pub mod simple_iterate;
pub mod sum_across;

pub use execute::{execute_multi, execute_single};
pub use field_extremes::FieldExtreme;
pub use group_distincts::GroupDistincts;
pub use handler::{BoxedHandler, IterateHandler, MultiIterateCallback};
pub use percentiles::GroupPercentiles;
pub use simple_iterate::{SimpleIterate, TermSelects, TopK};
pub use sum_across::SumAcross;

#[cfg(test)]
mod execute_test;
#[cfg(test)]
mod handlers_test;
