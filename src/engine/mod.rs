pub mod actions;
pub mod commands;
pub mod errors;
pub mod groupkeys;
pub mod iterate;
pub mod metrics;
pub mod remote;
pub mod session;
pub mod types;

pub use errors::*;
