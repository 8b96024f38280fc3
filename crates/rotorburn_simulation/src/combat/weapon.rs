//! Weapon state machine: Idle / Firing / Reloading / Equipping
//!
//! Архитектура:
//! - Weapon — отдельная entity, привязанная к машине-владельцу handle'ом
//! - Все переходы идут через determine_state: одни и те же guards
//!   выполняются и на prediction стороне, и на authority — повторное
//!   authoritative применение идемпотентно
//! - Ожидания (re-fire interval, reload) — countdown поля, тикаемые
//!   системой; отмена = сброс поля в None, не "игнорирование" таймера
//!
//! Репликация (контракт §net::sync):
//! - current_ammo / current_ammo_in_clip — owner-only, reliable
//! - burst_counter / pending_reload — skip-owner, unreliable latest-wins

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::projectile::ProjectileConfig;
use crate::net::sync::{FieldDescriptor, SyncTransport, SyncVisibility, Viewer};

/// Состояние оружия
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum WeaponState {
    #[default]
    Idle,
    Firing,
    Reloading,
    Equipping,
}

/// Конфиг типа оружия (immutable, data-driven)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponConfig {
    /// Размер магазина
    pub ammo_per_clip: i32,
    /// Сколько магазинов выдаётся при спавне
    pub initial_clips: i32,
    /// Потолок общего запаса
    pub max_ammo: i32,
    pub infinite_ammo: bool,
    pub infinite_clip: bool,
    /// Интервал между выстрелами (секунды); 0 = без ограничения
    pub time_between_shots: f32,
    pub reload_duration: f32,
    /// Primary слот
    pub primary: bool,
    /// Смещение дула относительно Transform владельца
    pub muzzle_offset: Vec3,
    pub projectile: ProjectileConfig,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            ammo_per_clip: 20,
            initial_clips: 5,
            max_ammo: 100,
            infinite_ammo: false,
            infinite_clip: false,
            time_between_shots: 0.1,
            reload_duration: 2.0,
            primary: true,
            muzzle_offset: Vec3::new(0.0, -0.5, -2.0),
            projectile: ProjectileConfig::default(),
        }
    }
}

/// Эффекты смены состояния (для cosmetic реакции вызывающей системы)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateChange {
    /// Вошли в Firing: нужно запланировать первый выстрел
    pub burst_started: bool,
    /// Вышли из Firing: cosmetic burst остановлен, counter сброшен
    pub burst_finished: bool,
}

/// Экземпляр оружия
#[derive(Component, Debug, Clone)]
pub struct Weapon {
    pub config: WeaponConfig,
    /// Владеющая машина. None = оружие не экипировано.
    pub owner: Option<Entity>,
    state: WeaponState,
    pub current_ammo: i32,
    pub current_ammo_in_clip: i32,
    /// Cosmetic-only счётчик очереди: observers реагируют на изменение,
    /// не на значение
    pub burst_counter: u32,
    pub wants_to_fire: bool,
    pub pending_reload: bool,
    pub is_equipped: bool,
    /// Время последнего выстрела (sim clock seconds); 0 = ещё не стреляли
    pub last_fire_time: f64,
    /// Countdown до следующего выстрела. None = не ждём.
    pub refire_timer: Option<f32>,
    /// Внутри очереди (не первый выстрел). Гасится при выходе из Firing.
    pub is_refiring: bool,
    /// Countdown "анимация перезарядки закончилась" (cosmetic стоп)
    pub reload_stop_timer: Option<f32>,
    /// Countdown фактического ammo grant — только на authority,
    /// срабатывает чуть раньше stop-таймера
    pub reload_ammo_timer: Option<f32>,
    /// Счётчик выстрелов для trail FX (каждый второй)
    pub shot_counter: u32,
}

impl Weapon {
    pub fn new(config: WeaponConfig) -> Self {
        let current_ammo_in_clip = config.ammo_per_clip;
        let current_ammo = (config.ammo_per_clip * config.initial_clips).min(config.max_ammo);
        Self {
            config,
            owner: None,
            state: WeaponState::Idle,
            current_ammo,
            current_ammo_in_clip,
            burst_counter: 0,
            wants_to_fire: false,
            pending_reload: false,
            is_equipped: false,
            last_fire_time: 0.0,
            refire_timer: None,
            is_refiring: false,
            reload_stop_timer: None,
            reload_ammo_timer: None,
            shot_counter: 0,
        }
    }

    // ------------------------------------------------------------------
    // Query surface (для HUD/scoreboard collaborator'ов)
    // ------------------------------------------------------------------

    pub fn state(&self) -> WeaponState {
        self.state
    }

    pub fn get_current_ammo(&self) -> i32 {
        self.current_ammo
    }

    pub fn get_current_ammo_in_clip(&self) -> i32 {
        self.current_ammo_in_clip
    }

    pub fn get_ammo_per_clip(&self) -> i32 {
        self.config.ammo_per_clip
    }

    pub fn get_max_ammo(&self) -> i32 {
        self.config.max_ammo
    }

    pub fn has_infinite_ammo(&self) -> bool {
        self.config.infinite_ammo
    }

    pub fn has_infinite_clip(&self) -> bool {
        self.config.infinite_clip
    }

    pub fn is_primary(&self) -> bool {
        self.config.primary
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    /// Можно стрелять: владелец жив и state допускает
    pub fn can_fire(&self, owner_alive: bool) -> bool {
        let state_ok = matches!(self.state, WeaponState::Idle | WeaponState::Firing);
        owner_alive && state_ok
    }

    /// Можно перезаряжать: владелец разрешает (нет владельца — разрешено),
    /// магазин не полон, есть запас (или infinite clip), state допускает
    pub fn can_reload(&self, owner_permits: bool) -> bool {
        let got_ammo = self.current_ammo_in_clip < self.config.ammo_per_clip
            && (self.current_ammo - self.current_ammo_in_clip > 0 || self.has_infinite_clip());
        let state_ok = matches!(self.state, WeaponState::Idle | WeaponState::Firing);
        owner_permits && got_ammo && state_ok
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    /// Прямой переход состояния с burst-хуками
    pub fn set_state(&mut self, new_state: WeaponState) -> StateChange {
        let prev = self.state;
        let mut change = StateChange::default();

        if prev == WeaponState::Firing && new_state != WeaponState::Firing {
            // Burst закончился: counter сброшен у всех observers,
            // pending выстрел детерминированно отменён
            self.burst_counter = 0;
            self.refire_timer = None;
            self.is_refiring = false;
            change.burst_finished = true;
        }

        self.state = new_state;

        if prev != WeaponState::Firing && new_state == WeaponState::Firing {
            change.burst_started = true;
        }

        change
    }

    /// Выводит целевое состояние из флагов намерений и guards.
    /// Один и тот же код на prediction и authority стороне.
    pub fn determine_state(&mut self, owner_alive: bool, owner_permits: bool) -> StateChange {
        let mut new_state = WeaponState::Idle;

        if self.is_equipped {
            if self.pending_reload {
                if !self.can_reload(owner_permits) {
                    new_state = self.state;
                } else {
                    new_state = WeaponState::Reloading;
                }
            } else if self.wants_to_fire && self.can_fire(owner_alive) {
                new_state = WeaponState::Firing;
            }
        }

        self.set_state(new_state)
    }

    /// Планирует первый выстрел очереди: немедленно, либо с задержкой
    /// на остаток min interval от последнего выстрела
    pub fn arm_first_shot(&mut self, now: f64) {
        let interval = self.config.time_between_shots as f64;
        if self.last_fire_time > 0.0 && interval > 0.0 && self.last_fire_time + interval > now {
            self.refire_timer = Some((self.last_fire_time + interval - now) as f32);
        } else {
            // выстрел в этот же тик
            self.refire_timer = Some(0.0);
        }
    }

    // ------------------------------------------------------------------
    // Intents (вызываются из command protocol; идемпотентны по guards)
    // ------------------------------------------------------------------

    pub fn start_fire(&mut self, owner_alive: bool, owner_permits: bool) -> StateChange {
        if !self.wants_to_fire {
            self.wants_to_fire = true;
            return self.determine_state(owner_alive, owner_permits);
        }
        StateChange::default()
    }

    pub fn stop_fire(&mut self, owner_alive: bool, owner_permits: bool) -> StateChange {
        if self.wants_to_fire {
            self.wants_to_fire = false;
            return self.determine_state(owner_alive, owner_permits);
        }
        StateChange::default()
    }

    /// Запускает перезарядку. `from_replication` = observer повторяет
    /// authoritative флаг и guards не перепроверяет.
    pub fn start_reload(
        &mut self,
        from_replication: bool,
        owner_alive: bool,
        owner_permits: bool,
        is_authority: bool,
    ) -> Option<StateChange> {
        if !(from_replication || self.can_reload(owner_permits)) {
            return None;
        }

        self.pending_reload = true;
        let change = self.determine_state(owner_alive, owner_permits);

        // Два независимых таймера: cosmetic стоп и фактический ammo grant.
        // Grant срабатывает чуть раньше, и только на authority.
        self.reload_stop_timer = Some(self.config.reload_duration);
        if is_authority {
            self.reload_ammo_timer = Some((self.config.reload_duration - 0.1).max(0.1));
        }

        Some(change)
    }

    pub fn stop_reload(&mut self, owner_alive: bool, owner_permits: bool) -> Option<StateChange> {
        if self.state == WeaponState::Reloading {
            self.pending_reload = false;
            return Some(self.determine_state(owner_alive, owner_permits));
        }
        None
    }

    // ------------------------------------------------------------------
    // Ammo бухгалтерия
    // ------------------------------------------------------------------

    pub fn use_ammo(&mut self) {
        if !self.has_infinite_ammo() {
            self.current_ammo_in_clip -= 1;
        }
        if !self.has_infinite_ammo() && !self.has_infinite_clip() {
            self.current_ammo -= 1;
        }
    }

    /// Ammo grant: переносит патроны из запаса в магазин
    pub fn reload_clip(&mut self) {
        let mut clip_delta = (self.config.ammo_per_clip - self.current_ammo_in_clip)
            .min(self.current_ammo - self.current_ammo_in_clip);

        if self.has_infinite_clip() {
            clip_delta = self.config.ammo_per_clip - self.current_ammo_in_clip;
        }

        if clip_delta > 0 {
            self.current_ammo_in_clip += clip_delta;
        }

        if self.has_infinite_clip() {
            self.current_ammo = self.current_ammo.max(self.current_ammo_in_clip);
        }
    }

    // ------------------------------------------------------------------
    // Equip lifecycle
    // ------------------------------------------------------------------

    /// Экипировка на машину (server-authoritative спавн уже произошёл)
    pub fn on_equip(&mut self, owner: Entity, owner_alive: bool, owner_permits: bool) -> StateChange {
        self.owner = Some(owner);
        self.state = WeaponState::Equipping;
        self.is_equipped = true;
        self.determine_state(owner_alive, owner_permits)
    }

    /// Снятие с машины: стоп огня, детерминированная отмена reload таймеров
    pub fn on_unequip(&mut self) -> StateChange {
        self.wants_to_fire = false;

        if self.pending_reload {
            self.pending_reload = false;
            self.reload_stop_timer = None;
            self.reload_ammo_timer = None;
        }

        self.is_equipped = false;
        self.owner = None;
        self.determine_state(false, false)
    }

    // ------------------------------------------------------------------
    // Репликация
    // ------------------------------------------------------------------

    pub fn net_snapshot(&self) -> WeaponNetSnapshot {
        WeaponNetSnapshot {
            current_ammo: self.current_ammo,
            current_ammo_in_clip: self.current_ammo_in_clip,
            burst_counter: self.burst_counter,
            pending_reload: self.pending_reload,
        }
    }
}

/// Replicated срез состояния оружия
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponNetSnapshot {
    pub current_ammo: i32,
    pub current_ammo_in_clip: i32,
    pub burst_counter: u32,
    pub pending_reload: bool,
}

/// Дескрипторы видимости полей (контракт из original дизайна:
/// точные ammo счётчики третьим лицам не видны)
pub const WEAPON_REPLICATION: [FieldDescriptor; 4] = [
    FieldDescriptor::new(
        "current_ammo",
        SyncVisibility::OwnerOnly,
        SyncTransport::Reliable,
    ),
    FieldDescriptor::new(
        "current_ammo_in_clip",
        SyncVisibility::OwnerOnly,
        SyncTransport::Reliable,
    ),
    FieldDescriptor::new(
        "burst_counter",
        SyncVisibility::SkipOwner,
        SyncTransport::UnreliableLatest,
    ),
    FieldDescriptor::new(
        "pending_reload",
        SyncVisibility::SkipOwner,
        SyncTransport::UnreliableLatest,
    ),
];

/// Снапшот, отфильтрованный по видимости для конкретного viewer'а
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeaponNetView {
    pub current_ammo: Option<i32>,
    pub current_ammo_in_clip: Option<i32>,
    pub burst_counter: Option<u32>,
    pub pending_reload: Option<bool>,
}

impl WeaponNetSnapshot {
    pub fn filtered_for(&self, viewer: Viewer) -> WeaponNetView {
        let mut view = WeaponNetView::default();
        if WEAPON_REPLICATION[0].visible_to(viewer) {
            view.current_ammo = Some(self.current_ammo);
        }
        if WEAPON_REPLICATION[1].visible_to(viewer) {
            view.current_ammo_in_clip = Some(self.current_ammo_in_clip);
        }
        if WEAPON_REPLICATION[2].visible_to(viewer) {
            view.burst_counter = Some(self.burst_counter);
        }
        if WEAPON_REPLICATION[3].visible_to(viewer) {
            view.pending_reload = Some(self.pending_reload);
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equipped_weapon(config: WeaponConfig) -> Weapon {
        let mut weapon = Weapon::new(config);
        weapon.on_equip(Entity::PLACEHOLDER, true, true);
        weapon
    }

    #[test]
    fn test_initial_ammo_from_config() {
        let weapon = Weapon::new(WeaponConfig::default());
        assert_eq!(weapon.get_current_ammo_in_clip(), 20);
        assert_eq!(weapon.get_current_ammo(), 100);
        assert_eq!(weapon.state(), WeaponState::Idle);
    }

    #[test]
    fn test_ammo_invariants_over_full_clip() {
        let mut weapon = equipped_weapon(WeaponConfig::default());

        for _ in 0..weapon.get_ammo_per_clip() {
            weapon.use_ammo();
            assert!(weapon.get_current_ammo_in_clip() >= 0);
            assert!(weapon.get_current_ammo_in_clip() <= weapon.get_ammo_per_clip());
            assert!(weapon.get_current_ammo_in_clip() <= weapon.get_current_ammo());
        }

        assert_eq!(weapon.get_current_ammo_in_clip(), 0);
        assert_eq!(weapon.get_current_ammo(), 80);
    }

    #[test]
    fn test_infinite_ammo_never_decrements() {
        let mut weapon = equipped_weapon(WeaponConfig {
            infinite_ammo: true,
            ammo_per_clip: 30,
            ..WeaponConfig::default()
        });

        for _ in 0..100 {
            weapon.use_ammo();
        }
        assert_eq!(weapon.get_current_ammo_in_clip(), 30);
    }

    #[test]
    fn test_infinite_clip_keeps_reserve() {
        let mut weapon = equipped_weapon(WeaponConfig {
            infinite_clip: true,
            ..WeaponConfig::default()
        });

        weapon.use_ammo();
        weapon.use_ammo();
        // clip тратится, запас нет
        assert_eq!(weapon.get_current_ammo_in_clip(), 18);
        assert_eq!(weapon.get_current_ammo(), 100);

        weapon.reload_clip();
        assert_eq!(weapon.get_current_ammo_in_clip(), 20);
    }

    #[test]
    fn test_can_fire_requires_alive_owner_and_state() {
        let mut weapon = equipped_weapon(WeaponConfig::default());

        assert!(weapon.can_fire(true));
        assert!(!weapon.can_fire(false));

        weapon.set_state(WeaponState::Reloading);
        assert!(!weapon.can_fire(true));
    }

    #[test]
    fn test_can_reload_needs_room_and_reserve() {
        let mut weapon = equipped_weapon(WeaponConfig::default());

        // Полный магазин — нечего перезаряжать
        assert!(!weapon.can_reload(true));

        weapon.use_ammo();
        assert!(weapon.can_reload(true));
        assert!(!weapon.can_reload(false));

        // Запас исчерпан
        weapon.current_ammo = weapon.current_ammo_in_clip;
        assert!(!weapon.can_reload(true));
    }

    #[test]
    fn test_reload_clip_caps_at_clip_size() {
        let mut weapon = equipped_weapon(WeaponConfig::default());
        for _ in 0..15 {
            weapon.use_ammo();
        }

        weapon.reload_clip();
        assert_eq!(weapon.get_current_ammo_in_clip(), 20);
        assert_eq!(weapon.get_current_ammo(), 85);
    }

    #[test]
    fn test_reload_clip_limited_by_reserve() {
        let mut weapon = equipped_weapon(WeaponConfig {
            ammo_per_clip: 20,
            initial_clips: 1,
            max_ammo: 100,
            ..WeaponConfig::default()
        });
        // запас = 20: расстреляли 15, осталось 5 всего
        for _ in 0..15 {
            weapon.use_ammo();
        }
        assert_eq!(weapon.get_current_ammo(), 5);

        weapon.reload_clip();
        assert_eq!(weapon.get_current_ammo_in_clip(), 5);
    }

    #[test]
    fn test_start_fire_transitions_to_firing() {
        let mut weapon = equipped_weapon(WeaponConfig::default());

        let change = weapon.start_fire(true, true);
        assert!(change.burst_started);
        assert_eq!(weapon.state(), WeaponState::Firing);

        // Повторный StartFire (authoritative re-apply) — no-op
        let change = weapon.start_fire(true, true);
        assert_eq!(change, StateChange::default());
        assert_eq!(weapon.state(), WeaponState::Firing);
    }

    #[test]
    fn test_stop_fire_finishes_burst_and_cancels_timer() {
        let mut weapon = equipped_weapon(WeaponConfig::default());
        weapon.start_fire(true, true);
        weapon.burst_counter = 5;
        weapon.refire_timer = Some(0.05);

        let change = weapon.stop_fire(true, true);
        assert!(change.burst_finished);
        assert_eq!(weapon.state(), WeaponState::Idle);
        assert_eq!(weapon.burst_counter, 0);
        assert_eq!(weapon.refire_timer, None);
    }

    #[test]
    fn test_dead_owner_cannot_enter_firing() {
        let mut weapon = equipped_weapon(WeaponConfig::default());

        let change = weapon.start_fire(false, true);
        assert!(!change.burst_started);
        assert_eq!(weapon.state(), WeaponState::Idle);
    }

    #[test]
    fn test_start_reload_arms_both_timers_on_authority() {
        let mut weapon = equipped_weapon(WeaponConfig::default());
        weapon.use_ammo();

        let change = weapon.start_reload(false, true, true, true);
        assert!(change.is_some());
        assert_eq!(weapon.state(), WeaponState::Reloading);
        assert!(weapon.pending_reload);
        assert_eq!(weapon.reload_stop_timer, Some(2.0));
        // ammo grant на 0.1s раньше cosmetic стопа
        assert_eq!(weapon.reload_ammo_timer, Some(1.9));
    }

    #[test]
    fn test_start_reload_observer_has_no_ammo_timer() {
        let mut weapon = equipped_weapon(WeaponConfig::default());
        weapon.use_ammo();

        weapon.start_reload(true, true, true, false);
        assert_eq!(weapon.reload_ammo_timer, None);
        assert!(weapon.reload_stop_timer.is_some());
    }

    #[test]
    fn test_start_reload_refused_with_full_clip() {
        let mut weapon = equipped_weapon(WeaponConfig::default());

        assert!(weapon.start_reload(false, true, true, true).is_none());
        assert_eq!(weapon.state(), WeaponState::Idle);
    }

    #[test]
    fn test_stop_reload_returns_to_firing_if_still_wanted() {
        let mut weapon = equipped_weapon(WeaponConfig::default());
        weapon.use_ammo();
        weapon.wants_to_fire = true;
        weapon.start_reload(false, true, true, true);
        weapon.reload_clip();

        let change = weapon.stop_reload(true, true).unwrap();
        assert!(change.burst_started);
        assert_eq!(weapon.state(), WeaponState::Firing);
    }

    #[test]
    fn test_arm_first_shot_respects_min_interval() {
        let mut weapon = equipped_weapon(WeaponConfig::default());

        // Ещё не стреляли — выстрел немедленно
        weapon.arm_first_shot(10.0);
        assert_eq!(weapon.refire_timer, Some(0.0));

        // Стреляли только что — ждём остаток интервала
        weapon.last_fire_time = 10.0;
        weapon.arm_first_shot(10.04);
        let delay = weapon.refire_timer.unwrap();
        assert!((delay - 0.06).abs() < 1e-3, "delay = {}", delay);
    }

    #[test]
    fn test_unequip_cancels_pending_reload_deterministically() {
        let mut weapon = equipped_weapon(WeaponConfig::default());
        weapon.use_ammo();
        weapon.start_reload(false, true, true, true);

        let change = weapon.on_unequip();
        assert!(!weapon.pending_reload);
        assert_eq!(weapon.reload_stop_timer, None);
        assert_eq!(weapon.reload_ammo_timer, None);
        assert_eq!(weapon.state(), WeaponState::Idle);
        assert!(!change.burst_started);
        assert!(weapon.owner.is_none());
    }

    #[test]
    fn test_infinite_ammo_weapon_never_reloads_from_exhaustion() {
        // Scenario E: infinite ammo + clip 30 — перезарядка по исчерпанию
        // невозможна, только явная (но clip всегда полон)
        let mut weapon = equipped_weapon(WeaponConfig {
            infinite_ammo: true,
            ammo_per_clip: 30,
            ..WeaponConfig::default()
        });

        for _ in 0..500 {
            weapon.use_ammo();
        }
        assert_eq!(weapon.get_current_ammo_in_clip(), 30);
        // clip полон → явный reload тоже отклоняется
        assert!(weapon.start_reload(false, true, true, true).is_none());
        assert_ne!(weapon.state(), WeaponState::Reloading);
    }

    #[test]
    fn test_net_snapshot_visibility_filtering() {
        let mut weapon = equipped_weapon(WeaponConfig::default());
        weapon.use_ammo();
        weapon.burst_counter = 3;

        let snapshot = weapon.net_snapshot();

        let owner_view = snapshot.filtered_for(Viewer::Owner);
        assert_eq!(owner_view.current_ammo, Some(99));
        assert_eq!(owner_view.current_ammo_in_clip, Some(19));
        // владелец уже знает свой burst — поле skip-owner
        assert_eq!(owner_view.burst_counter, None);

        let observer_view = snapshot.filtered_for(Viewer::Observer);
        assert_eq!(observer_view.current_ammo, None);
        assert_eq!(observer_view.current_ammo_in_clip, None);
        assert_eq!(observer_view.burst_counter, Some(3));
        assert_eq!(observer_view.pending_reload, Some(false));
    }
}
