//! Command protocol: клиентские intents → authority
//!
//! Каждая команда — validate/apply пара: authority сначала гоняет
//! validate предикат, и только потом применяет transition. Validate сейчас
//! всегда true — это шов для будущих anti-cheat проверок (range, ammo).
//!
//! Controlling client применяет тот же transition сразу (prediction) и
//! кладёт команду в outbox для authority. Повторное authoritative
//! применение идемпотентно by construction: те же guards, те же правила.

use bevy::prelude::*;

use crate::combat::Weapon;

/// Intent по оружию. HandleShot — пошаговый forward выстрела
/// (ammo/burst бухгалтерия на authority за remote-управляемый pawn).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponCommand {
    StartFire,
    StopFire,
    StartReload,
    StopReload,
    HandleShot,
}

/// Откуда пришла команда
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// Ввод локального игрока этого хоста (prediction путь)
    Local,
    /// Пришла по wire от клиента (authoritative apply путь)
    Remote,
}

#[derive(Event, Debug, Clone)]
pub struct WeaponCommandEvent {
    pub weapon: Entity,
    pub command: WeaponCommand,
    pub origin: CommandOrigin,
}

/// Стоит вместо wire: чистый клиент складывает сюда команды для authority.
/// Тесты и сетевой транспорт забирают отсюда.
#[derive(Resource, Debug, Default)]
pub struct CommandOutbox {
    pub pending: Vec<(Entity, WeaponCommand)>,
}

impl CommandOutbox {
    pub fn push(&mut self, weapon: Entity, command: WeaponCommand) {
        self.pending.push((weapon, command));
    }

    pub fn drain(&mut self) -> Vec<(Entity, WeaponCommand)> {
        std::mem::take(&mut self.pending)
    }
}

/// Authority-side validate предикат. Всегда true в текущем дизайне —
/// невалидная команда просто не пройдёт guards в apply, игрок видит
/// только что оружие не стреляет. Шов оставлен для anti-cheat.
pub fn validate_command(_command: WeaponCommand, _weapon: &Weapon) -> bool {
    true
}
