//! Projectile системы: запуск с aim-коррекцией, интеграция полёта,
//! таймеры жизни и grace despawn

use bevy::prelude::*;

use crate::combat::events::{FireShot, PresentationEvent, ProjectileImpact};
use crate::combat::projectile::{Projectile, ProjectileBuilder};
use crate::combat::systems::replication::ProjectileSync;
use crate::combat::weapon::Weapon;
use crate::components::{VehicleVelocity, Viewpoint};
use crate::logger::log_info;
use crate::world::trace::TraceWorld;
use crate::SimClock;

/// Короткая трасса от дула: коррекция отбрасывается, если дуло
/// уткнулось в геометрию
const MUZZLE_CLEARANCE: f32 = 1.0;

/// Спавнит снаряды по FireShot событиям.
///
/// Aim-коррекция только из кокпита: снаряд вылетает из дула, но летит
/// в точку, куда смотрит прицел — трасса от viewpoint определяет
/// точку, направление пересчитывается от дула к ней. Во внешних
/// камерах прицел и ствол расходятся, снаряд летит строго по стволу.
pub fn launch_projectiles(
    mut commands: Commands,
    mut fire_events: EventReader<FireShot>,
    weapons: Query<&Weapon>,
    shooters: Query<(&Transform, &Viewpoint, Option<&VehicleVelocity>)>,
    trace_world: Res<TraceWorld>,
    mut presentation: EventWriter<PresentationEvent>,
) {
    for fire in fire_events.read() {
        let Ok(weapon) = weapons.get(fire.weapon) else {
            continue;
        };
        let Ok((transform, viewpoint, velocity)) = shooters.get(fire.shooter) else {
            continue;
        };

        let muzzle = transform.translation + transform.rotation * weapon.config.muzzle_offset;
        let muzzle_forward = transform.forward().as_vec3();

        let (direction, aim_point) = if viewpoint.first_person {
            // Куда смотрит прицел
            let aim_end =
                viewpoint.position + viewpoint.direction * weapon.config.projectile.weapon_range;
            let aim_point = trace_world
                .line_trace(viewpoint.position, aim_end, &[fire.shooter, fire.weapon])
                .map(|hit| hit.point)
                .unwrap_or(aim_end);

            // Коррекция отбрасывается, если точка прицеливания позади
            // дула или дуло уткнулось в геометрию — тогда снаряд летит
            // по стволу
            let corrected = (aim_point - muzzle).normalize_or_zero();
            let muzzle_blocked = trace_world
                .line_trace(
                    muzzle,
                    muzzle + corrected * MUZZLE_CLEARANCE,
                    &[fire.shooter, fire.weapon],
                )
                .is_some();
            if corrected == Vec3::ZERO || corrected.dot(muzzle_forward) <= 0.0 || muzzle_blocked {
                (muzzle_forward, aim_point)
            } else {
                (corrected, aim_point)
            }
        } else {
            let barrel_end =
                muzzle + muzzle_forward * weapon.config.projectile.weapon_range;
            (muzzle_forward, barrel_end)
        };

        let inherited = velocity.map(|v| v.0).unwrap_or(Vec3::ZERO);

        let projectile = ProjectileBuilder::new(weapon.config.projectile.clone(), muzzle, direction)
            .instigator(fire.shooter)
            .launcher(fire.weapon)
            .inherited_velocity(inherited)
            .finish(&mut commands);
        commands.entity(projectile).insert(ProjectileSync::default());

        // Трассер на каждый второй выстрел
        if weapon.shot_counter % 2 == 0 {
            presentation.write(PresentationEvent::Trail {
                weapon: fire.weapon,
                from: muzzle,
                to: aim_point,
            });
        }

        log_info(&format!(
            "🚀 Снаряд {:?} запущен: muzzle {:?}, v = {:.0} м/с",
            projectile,
            muzzle,
            (direction * weapon.config.projectile.initial_speed + inherited).length()
        ));
    }
}

/// Интегрирует полёт: позиция по скорости, swept трасса на отрезке тика.
/// Столкновение публикуется как ProjectileImpact; detonation и урон —
/// зона ответственности damage pipeline.
pub fn integrate_projectiles(
    clock: Res<SimClock>,
    trace_world: Res<TraceWorld>,
    mut projectiles: Query<(Entity, &mut Projectile, &mut Transform)>,
    mut impacts: EventWriter<ProjectileImpact>,
) {
    let dt = clock.dt;

    for (entity, projectile, mut transform) in projectiles.iter_mut() {
        if projectile.has_exploded() {
            continue;
        }

        let start = transform.translation;
        let end = start + projectile.velocity * dt;

        if let Some(hit) = trace_world.line_trace(start, end, &projectile.ignore) {
            transform.translation = hit.point;
            impacts.write(ProjectileImpact {
                projectile: entity,
                point: hit.point,
                normal: hit.normal,
                surface: hit.surface,
                victim: hit.entity,
                shot_direction: projectile.velocity.normalize_or_zero(),
            });
        } else {
            transform.translation = end;
        }
    }
}

/// Life-span и grace таймеры; истёкшие — despawn
pub fn tick_projectile_timers(
    mut commands: Commands,
    clock: Res<SimClock>,
    mut projectiles: Query<(Entity, &mut Projectile)>,
) {
    let dt = clock.dt;

    for (entity, mut projectile) in projectiles.iter_mut() {
        if let Some(timer) = projectile.grace_timer {
            // Снаряд-труп пережидает репликацию exploded флага
            let timer = timer - dt;
            if timer <= 0.0 {
                commands.entity(entity).despawn();
            } else {
                projectile.grace_timer = Some(timer);
            }
            continue;
        }

        projectile.life_timer -= dt;
        if projectile.life_timer <= 0.0 {
            log_info(&format!("⏱ Снаряд {:?} истёк без попадания", entity));
            commands.entity(entity).despawn();
        }
    }
}
