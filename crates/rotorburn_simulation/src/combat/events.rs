//! События combat pipeline
//!
//! Authority-события (FireShot, ProjectileImpact, DamageApplied,
//! VehicleKilled) двигают симуляцию; PresentationEvent — односторонний
//! поток наружу, симуляция от него не зависит.

use bevy::prelude::*;

use crate::combat::damage_type::DamageTypeId;
use crate::combat::take_hit::DamageEventPayload;
use crate::world::trace::Surface;

/// Оружие решило выстрелить в этом тике
#[derive(Event, Debug, Clone)]
pub struct FireShot {
    pub weapon: Entity,
    pub shooter: Entity,
}

/// Снаряд столкнулся (authority)
#[derive(Event, Debug, Clone)]
pub struct ProjectileImpact {
    pub projectile: Entity,
    pub point: Vec3,
    pub normal: Vec3,
    pub surface: Surface,
    pub victim: Option<Entity>,
    pub shot_direction: Vec3,
}

/// Урон фактически применён к Health (после всех модификаторов)
#[derive(Event, Debug, Clone)]
pub struct DamageApplied {
    pub victim: Entity,
    pub instigator: Option<Entity>,
    pub damage: f32,
    pub damage_type: DamageTypeId,
    pub payload: DamageEventPayload,
    pub killed: bool,
}

/// Команда самоуничтожения: машина убивает себя через обычный
/// death pipeline, killer = она сама
#[derive(Event, Debug, Clone)]
pub struct SelfDestruct {
    pub vehicle: Entity,
}

/// Машина перешла в dying
#[derive(Event, Debug, Clone)]
pub struct VehicleKilled {
    pub victim: Entity,
    pub killer: Option<Entity>,
    pub damage_type: DamageTypeId,
}

/// Cosmetic-поток для presentation слоя (FX, звук, HUD).
/// Симуляция его только пишет.
#[derive(Event, Debug, Clone)]
pub enum PresentationEvent {
    /// Дульная вспышка + звук выстрела
    MuzzleFlash { weapon: Entity },
    /// Трассер (каждый второй выстрел)
    Trail { weapon: Entity, from: Vec3, to: Vec3 },
    /// Burst закончился — остановить looped FX/звук
    BurstStopped { weapon: Entity },
    /// Звук пустого магазина
    OutOfAmmoClick { weapon: Entity },
    ReloadStarted { weapon: Entity },
    ReloadStopped { weapon: Entity },
    /// Эффект попадания по зоне
    Impact {
        point: Vec3,
        normal: Vec3,
        surface: Surface,
        kind: ImpactKind,
        spawn_decal: bool,
    },
    Explosion { point: Vec3, radius: f32 },
    /// Смерть машины (дым, падение, ragdoll)
    Death { vehicle: Entity },
}

/// Какой набор FX/звука проигрывать при попадании
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactKind {
    Metal,
    Glass,
    Dirt,
}
