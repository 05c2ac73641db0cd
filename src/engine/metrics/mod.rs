pub mod aggregate;
pub mod filter;
pub mod push;
pub mod state;

pub use aggregate::{AggregateMetric, BinaryOp, FoldOp, UnaryOp};
pub use filter::{AggregateFilter, CompareOp};
pub use push::{PushIndexes, Pushable, QualifiedPush};
pub use state::EvalState;

#[cfg(test)]
mod filter_test;
