//! Компоненты combatant surface

pub mod vehicle;

// Re-export всех компонентов
pub use vehicle::*;
