//! Combat pipeline: оружие → снаряды → authoritative урон → смерть
//!
//! Все системы живут в FixedUpdate строгой цепочкой: команды →
//! таймеры → запуск → интеграция → урон → репликация. Порядок внутри
//! тика детерминирован; одинаковый seed и одинаковые команды дают
//! бит-в-бит одинаковую симуляцию.

use bevy::prelude::*;

pub mod damage_type;
pub mod events;
pub mod game_mode;
pub mod impact_effect;
pub mod projectile;
pub mod systems;
pub mod take_hit;
pub mod weapon;

pub use damage_type::{DamageTypeId, DamageTypeRegistry, DamageTypeSpec};
pub use events::{
    DamageApplied, FireShot, ImpactKind, PresentationEvent, ProjectileImpact, SelfDestruct,
    VehicleKilled,
};
pub use game_mode::{Combatant, GameMode, GameModePolicy, ScoreBoard, TeamDeathmatchPolicy};
pub use projectile::{Projectile, ProjectileBuilder, ProjectileConfig, EXPLODED_GRACE_SECONDS};
pub use take_hit::{DamageEventPayload, LastTakeHit, TakeHitRecord, HIT_COALESCE_WINDOW};
pub use weapon::{
    StateChange, Weapon, WeaponConfig, WeaponNetSnapshot, WeaponNetView, WeaponState,
    WEAPON_REPLICATION,
};

use crate::net::commands::{CommandOutbox, WeaponCommandEvent};
use systems::replication::ReplicationFeed;

/// Combat системы одного тика
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CombatSet;

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DamageTypeRegistry>()
            .init_resource::<GameMode>()
            .init_resource::<CommandOutbox>()
            .init_resource::<ReplicationFeed>()
            .add_event::<WeaponCommandEvent>()
            .add_event::<FireShot>()
            .add_event::<ProjectileImpact>()
            .add_event::<DamageApplied>()
            .add_event::<SelfDestruct>()
            .add_event::<VehicleKilled>()
            .add_event::<PresentationEvent>()
            .add_systems(
                FixedUpdate,
                (
                    systems::weapon::spawn_default_weapons,
                    // Входящие диффы применяются до локальных команд,
                    // чтобы reconciliation предшествовал prediction тика
                    systems::replication::apply_weapon_updates,
                    systems::replication::apply_hit_updates,
                    systems::replication::apply_projectile_updates,
                    systems::weapon::process_weapon_commands,
                    systems::weapon::tick_weapon_timers,
                    systems::projectile::launch_projectiles,
                    systems::projectile::integrate_projectiles,
                    systems::damage::resolve_impacts,
                    systems::damage::process_self_destructs,
                    systems::projectile::tick_projectile_timers,
                    systems::weapon::stop_fire_on_death,
                    systems::damage::handle_deaths,
                    systems::replication::publish_weapon_state,
                    systems::replication::publish_take_hits,
                    systems::replication::publish_projectiles,
                )
                    .chain()
                    .in_set(CombatSet),
            );
    }
}
