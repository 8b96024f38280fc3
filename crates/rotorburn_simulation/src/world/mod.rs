//! Упрощённая коллизионная модель мира (weapon trace channel)

use bevy::prelude::*;

pub mod trace;

pub use trace::{CollisionHull, StaticBox, Surface, TraceHit, TraceWorld, VehicleHull};

use crate::components::Health;

/// Пересобирает vehicle hulls из Transform'ов текущего тика.
/// Мёртвые машины из коллизионной картины выпадают.
pub fn sync_vehicle_hulls(
    mut trace_world: ResMut<TraceWorld>,
    vehicles: Query<(Entity, &Transform, &CollisionHull, &Health)>,
) {
    trace_world.hulls.clear();
    for (entity, transform, hull, health) in vehicles.iter() {
        if !health.is_alive() {
            continue;
        }
        trace_world.hulls.push(VehicleHull {
            entity,
            center: transform.translation,
            radius: hull.radius,
            forward: transform.forward().as_vec3(),
        });
    }
}
