//! ECS системы combat pipeline

pub mod damage;
pub mod projectile;
pub mod replication;
pub mod weapon;

#[cfg(test)]
mod replication_tests;
