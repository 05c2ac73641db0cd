pub mod factories;
pub mod factory;
pub mod memory_remote;
