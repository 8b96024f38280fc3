//! Снаряды: двухфазный спавн, полёт, exploded latch, grace despawn
//!
//! Lifecycle:
//! 1. build phase — ProjectileBuilder собирает параметры (velocity,
//!    ignore list, damage payload) ДО активации
//! 2. finish() — entity активируется, интеграция начинается
//! 3. explode — authority-only one-shot latch; после детонации снаряд
//!    невидим и неосязаем, но живёт ещё grace период ради репликации
//!    terminal состояния

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::damage_type::DamageTypeId;

/// Сколько снаряд-труп живёт после детонации, чтобы exploded флаг
/// гарантированно дошёл до observers
pub const EXPLODED_GRACE_SECONDS: f32 = 2.0;

/// Конфиг типа снаряда
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileConfig {
    /// Начальная скорость (м/с), вдоль направления запуска
    pub initial_speed: f32,
    /// Урон детонации
    pub explosion_damage: f32,
    /// Радиус area-урона; 0 = point damage
    pub explosion_radius: f32,
    pub damage_type: DamageTypeId,
    /// Время жизни до самоуничтожения (секунды)
    pub life_span: f32,
    /// Наследовать скорость машины-носителя
    pub inherit_velocity: bool,
    /// Дальность aim-трассы от viewpoint (метры)
    pub weapon_range: f32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            initial_speed: 800.0,
            explosion_damage: 30.0,
            explosion_radius: 0.0,
            damage_type: DamageTypeId::Rocket,
            life_span: 6.0,
            inherit_velocity: true,
            weapon_range: 10_000.0,
        }
    }
}

/// Активный снаряд
#[derive(Component, Debug, Clone)]
pub struct Projectile {
    pub config: ProjectileConfig,
    /// Кто выпустил (для score attribution). None = instigator уже
    /// исчез или torn-off anonymous damage.
    pub instigator: Option<Entity>,
    /// Оружие-источник (для ignore list и FX)
    pub launcher: Option<Entity>,
    pub velocity: Vec3,
    /// Entities, сквозь которые снаряд пролетает (носитель + оружие)
    pub ignore: Vec<Entity>,
    /// One-shot latch: true после детонации, обратно не сбрасывается
    exploded: bool,
    /// Остаток life span
    pub life_timer: f32,
    /// Countdown despawn'а после детонации
    pub grace_timer: Option<f32>,
    /// Позиция детонации — реплицируется observers для FX fallback
    pub explosion_point: Option<Vec3>,
    pub explosion_normal: Vec3,
}

impl Projectile {
    pub fn has_exploded(&self) -> bool {
        self.exploded
    }

    /// Детонация. Latch: повторный вызов — no-op, возвращает false.
    /// Вызывается только на authority; observers получают latch
    /// через репликацию.
    pub fn explode(&mut self, point: Vec3, normal: Vec3) -> bool {
        if self.exploded {
            return false;
        }
        self.exploded = true;
        self.explosion_point = Some(point);
        self.explosion_normal = normal;
        self.grace_timer = Some(EXPLODED_GRACE_SECONDS);
        true
    }
}

/// Двухфазный спавн: параметры собираются до активации, чтобы снаряд
/// никогда не существовал в полусобранном состоянии
pub struct ProjectileBuilder {
    config: ProjectileConfig,
    instigator: Option<Entity>,
    launcher: Option<Entity>,
    direction: Vec3,
    inherited_velocity: Vec3,
    ignore: Vec<Entity>,
    origin: Vec3,
}

impl ProjectileBuilder {
    pub fn new(config: ProjectileConfig, origin: Vec3, direction: Vec3) -> Self {
        Self {
            config,
            instigator: None,
            launcher: None,
            direction: direction.normalize_or_zero(),
            inherited_velocity: Vec3::ZERO,
            ignore: Vec::new(),
            origin,
        }
    }

    pub fn instigator(mut self, instigator: Entity) -> Self {
        self.instigator = Some(instigator);
        self.ignore.push(instigator);
        self
    }

    pub fn launcher(mut self, launcher: Entity) -> Self {
        self.launcher = Some(launcher);
        self.ignore.push(launcher);
        self
    }

    /// Скорость носителя в момент запуска
    pub fn inherited_velocity(mut self, velocity: Vec3) -> Self {
        self.inherited_velocity = velocity;
        self
    }

    /// Активация: спавнит полностью собранный снаряд
    pub fn finish(self, commands: &mut Commands) -> Entity {
        let mut velocity = self.direction * self.config.initial_speed;
        if self.config.inherit_velocity {
            velocity += self.inherited_velocity;
        }

        let life_timer = self.config.life_span;
        commands
            .spawn((
                Projectile {
                    config: self.config,
                    instigator: self.instigator,
                    launcher: self.launcher,
                    velocity,
                    ignore: self.ignore,
                    exploded: false,
                    life_timer,
                    grace_timer: None,
                    explosion_point: None,
                    explosion_normal: Vec3::Y,
                },
                Transform::from_translation(self.origin),
            ))
            .id()
    }
}
