//! Weapon системы: command protocol, таймеры, firing loop
//!
//! Порядок в FixedUpdate chain: команды → таймеры (внутри таймеров
//! живёт firing решение). FireShot события подхватывает projectile
//! система тем же тиком.

use bevy::prelude::*;

use crate::combat::events::{FireShot, PresentationEvent};
use crate::combat::systems::replication::WeaponSync;
use crate::combat::weapon::{Weapon, WeaponState};
use crate::components::{CurrentWeapon, DefaultWeaponLoadout, Health, Vehicle};
use crate::logger::{log_info, log_warning};
use crate::net::commands::{
    validate_command, CommandOrigin, CommandOutbox, WeaponCommand, WeaponCommandEvent,
};
use crate::net::role::{HostContext, LocallyControlled};
use crate::SimClock;

/// Спавнит стартовое оружие машинам, у которых его ещё нет.
/// Server-authoritative: на клиентах оружие приходит репликацией.
pub fn spawn_default_weapons(
    mut commands: Commands,
    host: Res<HostContext>,
    mut vehicles: Query<
        (Entity, &Health, &DefaultWeaponLoadout, &mut CurrentWeapon),
        With<Vehicle>,
    >,
) {
    if !host.is_authority() {
        return;
    }

    for (entity, health, loadout, mut current) in vehicles.iter_mut() {
        // Погибшим оружие не выдаётся заново
        if current.0.is_some() || !health.is_alive() {
            continue;
        }

        let mut weapon = Weapon::new(loadout.0.clone());
        weapon.on_equip(entity, health.is_alive(), true);

        let weapon_entity = commands.spawn((weapon, WeaponSync::default())).id();
        current.0 = Some(weapon_entity);
        log_info(&format!(
            "🔫 Primary weapon выдан машине {:?}: entity {:?}",
            entity, weapon_entity
        ));
    }
}

/// Применяет команды управления оружием.
///
/// Pure client: локальные команды применяются как prediction И
/// пересылаются в outbox; урона из них не родится (authority gate в
/// damage pipeline). Authority: применяет и локальные, и удалённые.
pub fn process_weapon_commands(
    host: Res<HostContext>,
    clock: Res<SimClock>,
    mut events: EventReader<WeaponCommandEvent>,
    mut outbox: ResMut<CommandOutbox>,
    mut weapons: Query<&mut Weapon>,
    healths: Query<&Health>,
    locals: Query<(), With<LocallyControlled>>,
    mut fire_events: EventWriter<FireShot>,
    mut presentation: EventWriter<PresentationEvent>,
) {
    for event in events.read() {
        let Ok(mut weapon) = weapons.get_mut(event.weapon) else {
            log_warning(&format!("⚠️ Команда для несуществующего оружия {:?}", event.weapon));
            continue;
        };

        if !validate_command(event.command, &weapon) {
            log_warning(&format!("⚠️ Команда {:?} отклонена валидацией", event.command));
            continue;
        }

        // Pure client пересылает намерение наверх; применение ниже —
        // локальное предсказание
        if !host.is_authority() && event.origin == CommandOrigin::Local {
            outbox.push(event.weapon, event.command);
        }

        let owner_alive = weapon
            .owner
            .and_then(|owner| healths.get(owner).ok())
            .map(|health| health.is_alive())
            .unwrap_or(false);

        // Firing loop крутится только на хосте, управляющем пешкой:
        // за чужие пешки authority стреляет по присланным HandleShot
        let locally_controlled = weapon
            .owner
            .map(|owner| locals.contains(owner))
            .unwrap_or(false);

        match event.command {
            WeaponCommand::StartFire => {
                let change = weapon.start_fire(owner_alive, true);
                if change.burst_started && locally_controlled {
                    weapon.arm_first_shot(clock.elapsed);
                }
            }
            WeaponCommand::StopFire => {
                let change = weapon.stop_fire(owner_alive, true);
                if change.burst_finished {
                    presentation.write(PresentationEvent::BurstStopped { weapon: event.weapon });
                }
            }
            WeaponCommand::StartReload => {
                if weapon
                    .start_reload(false, owner_alive, true, host.is_authority())
                    .is_some()
                {
                    presentation.write(PresentationEvent::ReloadStarted { weapon: event.weapon });
                }
            }
            WeaponCommand::StopReload => {
                if let Some(change) = weapon.stop_reload(owner_alive, true) {
                    if change.burst_started && locally_controlled {
                        weapon.arm_first_shot(clock.elapsed);
                    }
                    presentation.write(PresentationEvent::ReloadStopped { weapon: event.weapon });
                }
            }
            WeaponCommand::HandleShot => {
                // Клиент отчитался о выстреле: authority исполняет его
                // своим состоянием (guards могут отказать)
                if host.is_authority() && event.origin == CommandOrigin::Remote {
                    fire_weapon_once(
                        event.weapon,
                        &mut weapon,
                        owner_alive,
                        true,
                        false,
                        &host,
                        &clock,
                        &mut fire_events,
                        &mut presentation,
                        &mut outbox,
                    );
                }
            }
        }
    }
}

/// Тикает все таймеры оружия; истёкший refire запускает firing решение
pub fn tick_weapon_timers(
    host: Res<HostContext>,
    clock: Res<SimClock>,
    mut weapons: Query<(Entity, &mut Weapon)>,
    healths: Query<&Health>,
    locals: Query<(), With<LocallyControlled>>,
    mut fire_events: EventWriter<FireShot>,
    mut presentation: EventWriter<PresentationEvent>,
    mut outbox: ResMut<CommandOutbox>,
) {
    let dt = clock.dt;

    for (entity, mut weapon) in weapons.iter_mut() {
        let owner_alive = weapon
            .owner
            .and_then(|owner| healths.get(owner).ok())
            .map(|health| health.is_alive())
            .unwrap_or(false);
        let locally_controlled = weapon
            .owner
            .map(|owner| locals.contains(owner))
            .unwrap_or(false);

        // Ammo grant срабатывает раньше cosmetic стопа
        if let Some(timer) = weapon.reload_ammo_timer {
            let timer = timer - dt;
            if timer <= 0.0 {
                weapon.reload_ammo_timer = None;
                weapon.reload_clip();
                log_info(&format!(
                    "🔄 Reload завершён: clip {}/{}",
                    weapon.get_current_ammo_in_clip(),
                    weapon.get_ammo_per_clip()
                ));
            } else {
                weapon.reload_ammo_timer = Some(timer);
            }
        }

        if let Some(timer) = weapon.reload_stop_timer {
            let timer = timer - dt;
            if timer <= 0.0 {
                weapon.reload_stop_timer = None;
                if let Some(change) = weapon.stop_reload(owner_alive, true) {
                    // Гашётка всё ещё зажата — очередь возобновляется
                    if change.burst_started && locally_controlled {
                        weapon.arm_first_shot(clock.elapsed);
                    }
                    presentation.write(PresentationEvent::ReloadStopped { weapon: entity });
                }
            } else {
                weapon.reload_stop_timer = Some(timer);
            }
        }

        if let Some(timer) = weapon.refire_timer {
            let timer = timer - dt;
            if timer <= 0.0 {
                weapon.refire_timer = None;
                if weapon.state() == WeaponState::Firing {
                    fire_weapon_once(
                        entity,
                        &mut weapon,
                        owner_alive,
                        true,
                        locally_controlled,
                        &host,
                        &clock,
                        &mut fire_events,
                        &mut presentation,
                        &mut outbox,
                    );
                }
            } else {
                weapon.refire_timer = Some(timer);
            }
        }
    }
}

/// Одна итерация firing loop: выстрел / авто-reload / сухой щелчок,
/// затем перевзвод refire таймера пока state == Firing.
///
/// Перевзвод, prediction и сухой щелчок принадлежат хосту, который
/// управляет пешкой. Для чужих пешек authority исполняет каждый
/// присланный HandleShot ровно один раз, locally_controlled = false,
/// и НЕ взводит собственный refire.
#[allow(clippy::too_many_arguments)]
pub fn fire_weapon_once(
    entity: Entity,
    weapon: &mut Weapon,
    owner_alive: bool,
    owner_permits: bool,
    locally_controlled: bool,
    host: &HostContext,
    clock: &SimClock,
    fire_events: &mut EventWriter<FireShot>,
    presentation: &mut EventWriter<PresentationEvent>,
    outbox: &mut CommandOutbox,
) {
    let was_refiring = weapon.is_refiring;

    let clip_has_rounds = weapon.current_ammo_in_clip > 0
        || weapon.has_infinite_clip()
        || weapon.has_infinite_ammo();

    if clip_has_rounds && weapon.can_fire(owner_alive) {
        // Cosmetic сторона у всех, кроме dedicated server
        if !host.is_dedicated_server() {
            presentation.write(PresentationEvent::MuzzleFlash { weapon: entity });
        }

        if host.is_authority() {
            if let Some(shooter) = weapon.owner {
                fire_events.write(FireShot { weapon: entity, shooter });
            }
            weapon.use_ammo();
            weapon.burst_counter += 1;
            weapon.shot_counter += 1;
        } else if locally_controlled {
            // Prediction: патрон списан локально, authority решает
            weapon.use_ammo();
            weapon.burst_counter += 1;
            weapon.shot_counter += 1;
            outbox.push(entity, WeaponCommand::HandleShot);
        }
    } else if weapon.can_reload(owner_permits) {
        // Магазин пуст, запас есть — авто-перезарядка
        if weapon
            .start_reload(false, owner_alive, owner_permits, host.is_authority())
            .is_some()
        {
            presentation.write(PresentationEvent::ReloadStarted { weapon: entity });
        }
    } else if locally_controlled {
        // Сухой щелчок один раз на burst; state остаётся Firing,
        // игрок слышит click пока держит гашётку
        if weapon.get_current_ammo() == 0 && !was_refiring {
            presentation.write(PresentationEvent::OutOfAmmoClick { weapon: entity });
        }
        // Очередь косметически завершена: наблюдатели гасят looped FX,
        // сама гашётка остаётся зажатой
        if weapon.burst_counter > 0 {
            weapon.burst_counter = 0;
            presentation.write(PresentationEvent::BurstStopped { weapon: entity });
        }
    }

    if locally_controlled {
        let refiring =
            weapon.state() == WeaponState::Firing && weapon.config.time_between_shots > 0.0;
        weapon.is_refiring = refiring;
        if refiring {
            weapon.refire_timer = Some(weapon.config.time_between_shots);
        }
    }
    weapon.last_fire_time = clock.elapsed;
}

/// Смерть владельца гасит огонь его оружия
pub fn stop_fire_on_death(
    mut weapons: Query<&mut Weapon>,
    vehicles: Query<(&Health, &CurrentWeapon), Changed<Health>>,
    mut presentation: EventWriter<PresentationEvent>,
) {
    for (health, current) in vehicles.iter() {
        if health.is_alive() {
            continue;
        }
        let Some(weapon_entity) = current.0 else {
            continue;
        };
        let Ok(mut weapon) = weapons.get_mut(weapon_entity) else {
            continue;
        };
        if weapon.wants_to_fire || weapon.state() == WeaponState::Firing {
            let change = weapon.stop_fire(false, false);
            if change.burst_finished {
                presentation.write(PresentationEvent::BurstStopped { weapon: weapon_entity });
            }
        }
    }
}
