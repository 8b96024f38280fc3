//! Сетевая модель combat core
//!
//! Здесь нет транспорта — только контракты:
//! - role: кто authority, кто observer, tear-off
//! - sync: synchronized-field дескрипторы + diffing слой
//! - commands: validate/apply command protocol

pub mod commands;
pub mod role;
pub mod sync;

// Re-export основных типов
pub use commands::{
    validate_command, CommandOrigin, CommandOutbox, WeaponCommand, WeaponCommandEvent,
};
pub use role::{should_deal_damage, HostContext, LocallyControlled, NetMode, NetRole, TornOff};
pub use sync::{
    FieldDescriptor, Replicated, ReplicationNonce, SyncTransport, SyncVisibility, Viewer,
};
