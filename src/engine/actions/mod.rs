pub mod action;

pub use action::{
    Action, IntOrAction, MetricAction, QueryAction, RegexAction, SampleAction, StringOrAction,
    UnconditionalAction,
};
