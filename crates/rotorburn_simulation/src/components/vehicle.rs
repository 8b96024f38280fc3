//! Базовые компоненты combatant'а: Vehicle, Health, viewpoint

use bevy::prelude::*;

/// Боевая машина (игрок или бот) — combatant surface
///
/// Flight model внешний: он пишет Transform и VehicleVelocity,
/// combat core их только читает.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Vehicle {
    /// Номер команды (friendly fire политика game mode)
    pub team: i32,
    /// Имя игрока (для score таблицы collaborator'ов)
    pub player_name: String,
}

impl Default for Vehicle {
    fn default() -> Self {
        Self {
            team: 0,
            player_name: String::new(),
        }
    }
}

/// Здоровье combatant'а
///
/// Инварианты:
/// - current уменьшается только через take_damage (кроме явного heal)
/// - is_dying latch: один раз true — навсегда true (death transition
///   edge-triggered ровно один раз за жизнь)
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    pub is_dying: bool,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            is_dying: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0 && !self.is_dying
    }

    pub fn take_damage(&mut self, amount: f32) {
        self.current -= amount;
    }

    pub fn heal(&mut self, amount: f32) {
        if !self.is_dying {
            self.current = (self.current + amount).min(self.max);
        }
    }

    /// Для HUD collaborator'ов
    pub fn percent(&self) -> f32 {
        if self.max > 0.0 {
            (self.current / self.max).max(0.0)
        } else {
            0.0
        }
    }

    /// Латчит death state. Возвращает false если уже dying (идемпотентность).
    pub fn begin_dying(&mut self) -> bool {
        if self.is_dying {
            return false;
        }
        self.is_dying = true;
        self.current = self.current.min(0.0);
        true
    }
}

/// Handle на текущее оружие. Слабая ссылка: перед использованием
/// проверяется что entity жива (despawn оружия — нормальное состояние).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct CurrentWeapon(pub Option<Entity>);

/// Скорость машины (пишет flight model, читает projectile launch
/// для наследуемой начальной скорости)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct VehicleVelocity(pub Vec3);

/// Точка обзора локального игрока (пишет presentation layer).
/// Нужна только для first-person aim correction; отсутствие — не ошибка.
#[derive(Component, Debug, Clone, Copy)]
pub struct Viewpoint {
    pub position: Vec3,
    pub direction: Vec3,
    /// Cockpit view: включает aim correction при выстреле
    pub first_person: bool,
}

/// Конфиг оружия, которое authority заспавнит машине при появлении
#[derive(Component, Debug, Clone)]
pub struct DefaultWeaponLoadout(pub crate::combat::WeaponConfig);
