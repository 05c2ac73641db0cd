pub mod document_factory;
pub mod session_factory;

pub use document_factory::DocumentFactory;
pub use session_factory::SessionFactory;

#[cfg(test)]
mod document_factory_test;
