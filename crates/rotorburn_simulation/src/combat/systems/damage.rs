//! Authoritative damage pipeline
//!
//! ProjectileImpact → exploded latch → surface-модификатор →
//! game-mode policy → Health → take-hit record → death transition.
//! Урон gate'ится по каждой цели: authority бьёт всех, клиент — только
//! цели, за которые авторитет у него самого (tear-off, локальный
//! authority role). Cosmetic сторона импакта играется на всех, кроме
//! dedicated server.

use bevy::prelude::*;

use crate::combat::damage_type::{DamageTypeId, DamageTypeRegistry};
use crate::combat::events::{
    DamageApplied, PresentationEvent, ProjectileImpact, SelfDestruct, VehicleKilled,
};
use crate::combat::game_mode::{Combatant, GameMode};
use crate::combat::impact_effect::{impact_kind_for, roll_decal};
use crate::combat::projectile::Projectile;
use crate::combat::take_hit::{DamageEventPayload, LastTakeHit};
use crate::components::{CurrentWeapon, Health, Vehicle};
use crate::logger::{log_info, log_warning};
use crate::net::role::{should_deal_damage, HostContext, NetRole, TornOff};
use crate::world::trace::{Surface, TraceWorld};
use crate::{DeterministicRng, SimClock};

/// Полудлина surface-трассы вокруг точки импакта
const SURFACE_TRACE_HALF: f32 = 1.0;

/// Разрешает импакты снарядов в урон
#[allow(clippy::too_many_arguments)]
pub fn resolve_impacts(
    host: Res<HostContext>,
    clock: Res<SimClock>,
    registry: Res<DamageTypeRegistry>,
    trace_world: Res<TraceWorld>,
    mut game_mode: ResMut<GameMode>,
    mut rng: ResMut<DeterministicRng>,
    mut impacts: EventReader<ProjectileImpact>,
    mut projectiles: Query<&mut Projectile>,
    mut victims: Query<(
        &mut Health,
        &mut LastTakeHit,
        &Vehicle,
        Option<&NetRole>,
        Option<&TornOff>,
    )>,
    radial_targets: Query<(Entity, &Transform), With<Vehicle>>,
    instigator_teams: Query<&Vehicle>,
    mut damage_events: EventWriter<DamageApplied>,
    mut killed_events: EventWriter<VehicleKilled>,
    mut presentation: EventWriter<PresentationEvent>,
) {
    for impact in impacts.read() {
        let Ok(mut projectile) = projectiles.get_mut(impact.projectile) else {
            continue;
        };

        // One-shot latch: повторный импакт того же снаряда невозможен.
        // На клиенте это локальное предсказание детонации — authoritative
        // подтверждение придёт репликацией и в latch упрётся.
        if !projectile.explode(impact.point, impact.normal) {
            continue;
        }

        let config = projectile.config.clone();

        // Cosmetic сторона — у всех, кроме dedicated server
        if !host.is_dedicated_server() {
            presentation.write(PresentationEvent::Impact {
                point: impact.point,
                normal: impact.normal,
                surface: impact.surface,
                kind: impact_kind_for(impact.surface),
                spawn_decal: roll_decal(&mut rng.0, impact.surface),
            });
            if config.explosion_radius > 0.0 {
                presentation.write(PresentationEvent::Explosion {
                    point: impact.point,
                    radius: config.explosion_radius,
                });
            }
        }

        // Tear-off instigator даёт anonymous damage без attribution
        let instigator = projectile.instigator;
        let instigator_combatant = instigator.and_then(|entity| {
            instigator_teams
                .get(entity)
                .ok()
                .map(|vehicle| Combatant { entity, team: vehicle.team })
        });

        // Цели: прямое попадание или все машины в радиусе
        let targets: Vec<(Entity, Surface, DamageEventPayload)> = if config.explosion_radius > 0.0 {
            radial_targets
                .iter()
                .filter(|(entity, transform)| {
                    !projectile.ignore.contains(entity)
                        && transform.translation.distance(impact.point) <= config.explosion_radius
                })
                .map(|(entity, _)| {
                    (
                        entity,
                        Surface::Default,
                        DamageEventPayload::Radial {
                            origin: impact.point,
                            radius: config.explosion_radius,
                        },
                    )
                })
                .collect()
        } else {
            match impact.victim {
                Some(victim) => {
                    // Зона уточняется короткой трассой через точку импакта:
                    // сам impact record материал нести не обязан
                    let surface = trace_world
                        .line_trace(
                            impact.point - impact.shot_direction * SURFACE_TRACE_HALF,
                            impact.point + impact.shot_direction * SURFACE_TRACE_HALF,
                            &projectile.ignore,
                        )
                        .map(|hit| hit.surface)
                        .unwrap_or(impact.surface);
                    vec![(
                        victim,
                        surface,
                        DamageEventPayload::Point {
                            hit_point: impact.point,
                            hit_normal: impact.normal,
                            surface,
                            shot_direction: impact.shot_direction,
                        },
                    )]
                }
                None => Vec::new(),
            }
        };

        for (victim_entity, surface, payload) in targets {
            let Ok((mut health, mut take_hit, vehicle, role, torn_off)) =
                victims.get_mut(victim_entity)
            else {
                continue;
            };

            if !health.is_alive() {
                continue;
            }

            // Authority наносит урон всем; клиент — только целям под
            // его локальным авторитетом (включая tear-off реплики)
            let victim_role = role.copied().unwrap_or(NetRole::Authority);
            if !should_deal_damage(&host, victim_role, torn_off.is_some()) {
                continue;
            }

            let base = config.explosion_damage * registry.surface_modifier(config.damage_type, surface);

            let victim_combatant = Combatant {
                entity: victim_entity,
                team: vehicle.team,
            };
            let final_damage =
                game_mode.apply_damage_rules(base, instigator_combatant, victim_combatant);
            if final_damage <= 0.0 {
                continue;
            }

            health.take_damage(final_damage);
            let killed = health.current <= 0.0 && health.begin_dying();

            if !take_hit.record_hit(
                final_damage,
                config.damage_type,
                payload.clone(),
                instigator,
                Some(impact.projectile),
                killed,
                clock.elapsed,
            ) {
                log_warning(&format!(
                    "⚠️ Take-hit для {:?} отброшен: killing hit уже реплицирован",
                    victim_entity
                ));
            }

            game_mode.on_hit_confirmed(instigator_combatant, final_damage);

            log_info(&format!(
                "💥 {:?} получил {:.1} урона ({:?}, зона {:?}), HP {:.1}/{:.1}",
                victim_entity, final_damage, config.damage_type, surface, health.current, health.max
            ));

            damage_events.write(DamageApplied {
                victim: victim_entity,
                instigator,
                damage: final_damage,
                damage_type: config.damage_type,
                payload,
                killed,
            });

            if killed {
                game_mode.on_killed(instigator_combatant, victim_combatant);
                killed_events.write(VehicleKilled {
                    victim: victim_entity,
                    killer: instigator,
                    damage_type: config.damage_type,
                });
            }
        }
    }
}

/// Самоуничтожение через обычный death pipeline: полный текущий HP
/// как Generic-урон, killer = сама машина. TDM-политика за suicide
/// засчитает death без kill.
pub fn process_self_destructs(
    host: Res<HostContext>,
    clock: Res<SimClock>,
    mut game_mode: ResMut<GameMode>,
    mut events: EventReader<SelfDestruct>,
    mut vehicles: Query<(&mut Health, &mut LastTakeHit, &Vehicle)>,
    mut killed_events: EventWriter<VehicleKilled>,
) {
    if !host.is_authority() {
        events.clear();
        return;
    }

    for event in events.read() {
        let Ok((mut health, mut take_hit, vehicle)) = vehicles.get_mut(event.vehicle) else {
            continue;
        };
        if !health.is_alive() {
            continue;
        }

        let damage = health.current;
        health.take_damage(damage);
        if !health.begin_dying() {
            continue;
        }

        take_hit.record_hit(
            damage,
            DamageTypeId::Generic,
            DamageEventPayload::Generic,
            Some(event.vehicle),
            None,
            true,
            clock.elapsed,
        );

        let combatant = Combatant {
            entity: event.vehicle,
            team: vehicle.team,
        };
        game_mode.on_killed(Some(combatant), combatant);
        killed_events.write(VehicleKilled {
            victim: event.vehicle,
            killer: Some(event.vehicle),
            damage_type: DamageTypeId::Generic,
        });

        log_info(&format!("💀 {} самоуничтожился", vehicle.player_name));
    }
}

/// Death transition: cosmetic события, лог, изъятие оружия погибшего.
/// Сам Health уже latched в is_dying, огонь гасит stop_fire_on_death.
pub fn handle_deaths(
    mut commands: Commands,
    host: Res<HostContext>,
    mut killed_events: EventReader<VehicleKilled>,
    mut vehicles: Query<(&Vehicle, Option<&mut CurrentWeapon>)>,
    mut presentation: EventWriter<PresentationEvent>,
) {
    for killed in killed_events.read() {
        let name = match vehicles.get_mut(killed.victim) {
            Ok((vehicle, current)) => {
                // Authority забирает оружие: у погибшей машины его
                // больше нет, наблюдателям об этом скажет репликация
                if host.is_authority() {
                    if let Some(mut current) = current {
                        if let Some(weapon_entity) = current.0.take() {
                            commands.entity(weapon_entity).despawn();
                        }
                    }
                }
                vehicle.player_name.clone()
            }
            Err(_) => format!("{:?}", killed.victim),
        };

        log_info(&format!(
            "💀 {} уничтожен ({:?}), killer = {:?}",
            name, killed.damage_type, killed.killer
        ));

        presentation.write(PresentationEvent::Death {
            vehicle: killed.victim,
        });
    }
}
