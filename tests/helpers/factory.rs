pub use super::factories::{DocumentFactory, SessionFactory};

pub struct Factory;

impl Factory {
    pub fn document() -> DocumentFactory {
        DocumentFactory::new()
    }

    pub fn session() -> SessionFactory {
        SessionFactory::new()
    }
}
