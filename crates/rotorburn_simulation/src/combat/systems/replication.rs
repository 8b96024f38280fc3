//! Репликация combat состояния: authority публикует диффы, observer
//! повторяет их локально
//!
//! Транспорт за скоупом: ReplicationFeed — это очередь «что ушло бы в
//! сеть». Authority-системы наполняют её диффами своих sync-ячеек;
//! observer-системы применяют фид к локальным репликам, проигрывая
//! cosmetic реакции (OnRep поведение).

use bevy::prelude::*;

use crate::combat::events::PresentationEvent;
use crate::combat::impact_effect::impact_kind_for;
use crate::combat::projectile::Projectile;
use crate::combat::take_hit::{DamageEventPayload, TakeHitRecord};
use crate::combat::weapon::{Weapon, WeaponNetSnapshot};
use crate::components::Health;
use crate::logger::log_info;
use crate::net::role::{HostContext, LocallyControlled};
use crate::net::sync::{Replicated, Viewer};
use crate::world::trace::TraceWorld;

/// Насколько назад по траектории отступает fallback-трасса при
/// репликации детонации без локального импакта
const EXPLODED_TRACE_BACK: f32 = 2.0;
const EXPLODED_TRACE_FORWARD: f32 = 1.5;

#[derive(Debug, Clone)]
pub struct WeaponUpdate {
    pub weapon: Entity,
    pub snapshot: WeaponNetSnapshot,
}

#[derive(Debug, Clone)]
pub struct HitUpdate {
    pub vehicle: Entity,
    pub record: TakeHitRecord,
    /// Health реплицируется everyone вместе с хитом
    pub health: f32,
}

#[derive(Debug, Clone)]
pub struct ProjectileUpdate {
    pub projectile: Entity,
    pub position: Vec3,
    pub velocity: Vec3,
    pub exploded: bool,
    pub explosion_point: Option<Vec3>,
    pub explosion_normal: Vec3,
}

/// Реплицируемый срез состояния снаряда
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileNetState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub exploded: bool,
    pub explosion_point: Option<Vec3>,
    pub explosion_normal: Vec3,
}

/// Очередь исходящих (на authority) либо входящих (на observer) диффов
#[derive(Resource, Default)]
pub struct ReplicationFeed {
    pub weapons: Vec<WeaponUpdate>,
    pub hits: Vec<HitUpdate>,
    pub projectiles: Vec<ProjectileUpdate>,
}

impl ReplicationFeed {
    pub fn take(&mut self) -> ReplicationFeed {
        ReplicationFeed {
            weapons: std::mem::take(&mut self.weapons),
            hits: std::mem::take(&mut self.hits),
            projectiles: std::mem::take(&mut self.projectiles),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.weapons.is_empty() && self.hits.is_empty() && self.projectiles.is_empty()
    }

    /// Движение снарядов — unreliable latest-wins: свежий дифф
    /// перетирает ещё не отправленный для того же снаряда, очередь не
    /// растёт при молчащем транспорте
    pub fn push_projectile(&mut self, update: ProjectileUpdate) {
        match self
            .projectiles
            .iter_mut()
            .find(|queued| queued.projectile == update.projectile)
        {
            Some(queued) => *queued = update,
            None => self.projectiles.push(update),
        }
    }
}

/// Sync-ячейка оружия (authority)
#[derive(Component, Default)]
pub struct WeaponSync {
    pub cell: Replicated<WeaponNetSnapshot>,
}

/// Sync-ячейка take-hit слота (authority)
#[derive(Component, Default)]
pub struct HitSync {
    pub cell: Replicated<TakeHitRecord>,
}

/// Sync-ячейка снаряда (authority)
#[derive(Component, Default)]
pub struct ProjectileSync {
    pub cell: Replicated<ProjectileNetState>,
}

/// Публикация weapon state: дифф снапшота против последнего ушедшего
pub fn publish_weapon_state(
    host: Res<HostContext>,
    mut feed: ResMut<ReplicationFeed>,
    mut weapons: Query<(Entity, &Weapon, &mut WeaponSync)>,
) {
    if !host.is_authority() {
        return;
    }

    for (entity, weapon, mut sync) in weapons.iter_mut() {
        if let Some(snapshot) = sync.cell.diff(&weapon.net_snapshot()) {
            feed.weapons.push(WeaponUpdate {
                weapon: entity,
                snapshot,
            });
        }
    }
}

/// Публикация take-hit записей + health
pub fn publish_take_hits(
    host: Res<HostContext>,
    mut feed: ResMut<ReplicationFeed>,
    mut vehicles: Query<(Entity, &Health, &crate::combat::take_hit::LastTakeHit, &mut HitSync)>,
) {
    if !host.is_authority() {
        return;
    }

    for (entity, health, take_hit, mut sync) in vehicles.iter_mut() {
        let Some(record) = &take_hit.record else {
            continue;
        };
        // Nonce внутри record гарантирует дифф даже при равном содержимом
        if let Some(record) = sync.cell.diff(record) {
            feed.hits.push(HitUpdate {
                vehicle: entity,
                record,
                health: health.current,
            });
        }
    }
}

/// Публикация снарядов: дифф движения latest-wins + exploded latch
pub fn publish_projectiles(
    host: Res<HostContext>,
    mut feed: ResMut<ReplicationFeed>,
    mut projectiles: Query<(Entity, &Projectile, &Transform, &mut ProjectileSync)>,
) {
    if !host.is_authority() {
        return;
    }

    for (entity, projectile, transform, mut sync) in projectiles.iter_mut() {
        let state = ProjectileNetState {
            position: transform.translation,
            velocity: projectile.velocity,
            exploded: projectile.has_exploded(),
            explosion_point: projectile.explosion_point,
            explosion_normal: projectile.explosion_normal,
        };
        if let Some(state) = sync.cell.diff(&state) {
            feed.push_projectile(ProjectileUpdate {
                projectile: entity,
                position: state.position,
                velocity: state.velocity,
                exploded: state.exploded,
                explosion_point: state.explosion_point,
                explosion_normal: state.explosion_normal,
            });
        }
    }
}

/// Observer: применяет weapon-диффы к локальным репликам.
///
/// Видимость по viewer'у: владелец получает ammo (reconciliation после
/// prediction), третьи лица — burst/reload cosmetic флаги.
pub fn apply_weapon_updates(
    host: Res<HostContext>,
    mut feed: ResMut<ReplicationFeed>,
    mut weapons: Query<&mut Weapon>,
    owners: Query<(Option<&LocallyControlled>, &Health)>,
    mut presentation: EventWriter<PresentationEvent>,
) {
    if host.is_authority() {
        return;
    }

    for update in feed.weapons.drain(..) {
        let Ok(mut weapon) = weapons.get_mut(update.weapon) else {
            continue;
        };

        let (locally_owned, owner_alive) = weapon
            .owner
            .and_then(|owner| owners.get(owner).ok())
            .map(|(local, health)| (local.is_some(), health.is_alive()))
            .unwrap_or((false, false));

        let viewer = if locally_owned {
            Viewer::Owner
        } else {
            Viewer::Observer
        };
        let view = update.snapshot.filtered_for(viewer);

        // Reconciliation: authoritative ammo перетирает предсказанное
        if let Some(ammo) = view.current_ammo {
            weapon.current_ammo = ammo;
        }
        if let Some(clip) = view.current_ammo_in_clip {
            weapon.current_ammo_in_clip = clip;
        }

        // Burst counter: observers реагируют на изменение, не на значение
        if let Some(burst) = view.burst_counter {
            if burst != weapon.burst_counter {
                if burst > 0 {
                    presentation.write(PresentationEvent::MuzzleFlash { weapon: update.weapon });
                } else {
                    presentation.write(PresentationEvent::BurstStopped { weapon: update.weapon });
                }
                weapon.burst_counter = burst;
            }
        }

        if let Some(pending) = view.pending_reload {
            if pending != weapon.pending_reload {
                if pending {
                    // from_replication: guards authority уже проверил
                    weapon.start_reload(true, owner_alive, true, false);
                    presentation.write(PresentationEvent::ReloadStarted { weapon: update.weapon });
                } else if weapon.stop_reload(owner_alive, true).is_some() {
                    presentation.write(PresentationEvent::ReloadStopped { weapon: update.weapon });
                }
            }
        }
    }
}

/// Observer: повторяет take-hit записи — health, FX, death transition
pub fn apply_hit_updates(
    host: Res<HostContext>,
    mut feed: ResMut<ReplicationFeed>,
    mut vehicles: Query<(&mut Health, &mut crate::combat::take_hit::LastTakeHit)>,
    mut presentation: EventWriter<PresentationEvent>,
) {
    if host.is_authority() {
        return;
    }

    for update in feed.hits.drain(..) {
        let Ok((mut health, mut take_hit)) = vehicles.get_mut(update.vehicle) else {
            continue;
        };

        // Nonce в составе record отличает повтор от дубликата
        if take_hit.record.as_ref() == Some(&update.record) {
            continue;
        }

        health.current = update.health;

        match update.record.payload {
            DamageEventPayload::Point {
                hit_point,
                hit_normal,
                surface,
                ..
            } => {
                presentation.write(PresentationEvent::Impact {
                    point: hit_point,
                    normal: hit_normal,
                    surface,
                    kind: impact_kind_for(surface),
                    spawn_decal: false,
                });
            }
            DamageEventPayload::Radial { origin, radius } => {
                presentation.write(PresentationEvent::Explosion {
                    point: origin,
                    radius,
                });
            }
            DamageEventPayload::Generic => {}
        }

        if update.record.killed && health.begin_dying() {
            presentation.write(PresentationEvent::Death {
                vehicle: update.vehicle,
            });
        }

        take_hit.record = Some(update.record);
    }
}

/// Observer: движение снарядов latest-wins + OnRep exploded fallback.
///
/// Если детонация пришла репликацией раньше, чем локальная трасса её
/// увидела, точку импакта восстанавливаем короткой трассой вдоль
/// траектории; не нашли — берём реплицированную точку как failsafe.
pub fn apply_projectile_updates(
    host: Res<HostContext>,
    mut feed: ResMut<ReplicationFeed>,
    trace_world: Res<TraceWorld>,
    mut projectiles: Query<(&mut Projectile, &mut Transform)>,
    mut presentation: EventWriter<PresentationEvent>,
) {
    if host.is_authority() {
        return;
    }

    for update in feed.projectiles.drain(..) {
        let Ok((mut projectile, mut transform)) = projectiles.get_mut(update.projectile) else {
            continue;
        };

        if !update.exploded {
            transform.translation = update.position;
            projectile.velocity = update.velocity;
            continue;
        }

        if projectile.has_exploded() {
            continue;
        }

        let direction = update.velocity.normalize_or_zero();
        let back = update.position - direction * EXPLODED_TRACE_BACK;
        let forward = update.position + direction * EXPLODED_TRACE_FORWARD;

        let (point, normal, surface) = match trace_world.line_trace(back, forward, &projectile.ignore)
        {
            Some(hit) => (hit.point, hit.normal, hit.surface),
            None => {
                // Failsafe: authoritative точка детонации
                let point = update.explosion_point.unwrap_or(update.position);
                (point, update.explosion_normal, crate::world::trace::Surface::Default)
            }
        };

        transform.translation = point;
        projectile.explode(point, normal);

        presentation.write(PresentationEvent::Impact {
            point,
            normal,
            surface,
            kind: impact_kind_for(surface),
            spawn_decal: false,
        });
        if projectile.config.explosion_radius > 0.0 {
            presentation.write(PresentationEvent::Explosion {
                point,
                radius: projectile.config.explosion_radius,
            });
        }

        log_info(&format!(
            "💥 Реплицированная детонация {:?} в {:?}",
            update.projectile, point
        ));
    }
}
