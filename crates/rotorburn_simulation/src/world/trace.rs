//! Line-trace oracle: weapon channel
//!
//! Combat core трассирует по упрощённой коллизионной картине мира:
//! - static boxes (геометрия уровня)
//! - vehicle hulls: сфера + продольное зонирование поверхности
//!   (нос → Cockpit, середина → Fuselage, хвост → Tail)
//!
//! Центры hulls синхронизируются из Transform каждый тик. Мёртвые машины
//! из картины исключаются (collision выключен death sequence'ом).
//!
//! Этим oracle пользуются: импакт projectile, surface re-trace для
//! damage модификатора, first-person aim correction, observer fallback.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Тип поверхности в точке попадания
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Surface {
    #[default]
    Default,
    Cockpit,
    Fuselage,
    Tail,
}

/// Результат line trace
#[derive(Debug, Clone, Copy)]
pub struct TraceHit {
    /// Попавшаяся entity (None = static геометрия)
    pub entity: Option<Entity>,
    pub point: Vec3,
    pub normal: Vec3,
    pub surface: Surface,
    /// Параметр вдоль сегмента [0..1]
    pub fraction: f32,
}

/// Static box (AABB)
#[derive(Debug, Clone, Copy)]
pub struct StaticBox {
    pub min: Vec3,
    pub max: Vec3,
}

/// Коллизионная сфера vehicle с ориентацией для зонирования поверхности
#[derive(Debug, Clone, Copy)]
pub struct VehicleHull {
    pub entity: Entity,
    pub center: Vec3,
    pub radius: f32,
    pub forward: Vec3,
}

impl VehicleHull {
    /// Поверхность по продольной позиции точки попадания:
    /// передняя треть — cockpit, задняя треть — tail, середина — fuselage
    pub fn surface_at(&self, point: Vec3) -> Surface {
        let along = (point - self.center).dot(self.forward);
        let third = self.radius / 3.0;
        if along > third {
            Surface::Cockpit
        } else if along < -third {
            Surface::Tail
        } else {
            Surface::Fuselage
        }
    }
}

/// Компонент: параметры hull для регистрации в TraceWorld
#[derive(Component, Debug, Clone, Copy)]
pub struct CollisionHull {
    pub radius: f32,
}

impl Default for CollisionHull {
    fn default() -> Self {
        Self { radius: 3.0 }
    }
}

/// Коллизионная картина мира на текущий тик
#[derive(Resource, Debug, Default)]
pub struct TraceWorld {
    pub statics: Vec<StaticBox>,
    pub hulls: Vec<VehicleHull>,
}

impl TraceWorld {
    pub fn add_static(&mut self, min: Vec3, max: Vec3) {
        self.statics.push(StaticBox { min, max });
    }

    /// Line trace по weapon channel. Возвращает ближайшее blocking попадание.
    pub fn line_trace(&self, start: Vec3, end: Vec3, ignore: &[Entity]) -> Option<TraceHit> {
        let dir = end - start;
        let len = dir.length();
        if len <= f32::EPSILON {
            return None;
        }
        let dir = dir / len;

        let mut best: Option<TraceHit> = None;

        for hull in &self.hulls {
            if ignore.contains(&hull.entity) {
                continue;
            }
            if let Some(t) = ray_sphere(start, dir, hull.center, hull.radius) {
                if t <= len {
                    let point = start + dir * t;
                    let normal = (point - hull.center).normalize_or_zero();
                    let hit = TraceHit {
                        entity: Some(hull.entity),
                        point,
                        normal,
                        surface: hull.surface_at(point),
                        fraction: t / len,
                    };
                    if best.map_or(true, |b| hit.fraction < b.fraction) {
                        best = Some(hit);
                    }
                }
            }
        }

        for sbox in &self.statics {
            if let Some((t, normal)) = ray_aabb(start, dir, sbox.min, sbox.max) {
                if t <= len {
                    let hit = TraceHit {
                        entity: None,
                        point: start + dir * t,
                        normal,
                        surface: Surface::Default,
                        fraction: t / len,
                    };
                    if best.map_or(true, |b| hit.fraction < b.fraction) {
                        best = Some(hit);
                    }
                }
            }
        }

        best
    }
}

/// Ray vs sphere. Возвращает ближайший неотрицательный t.
fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t0 = -b - sqrt_disc;
    let t1 = -b + sqrt_disc;
    if t0 >= 0.0 {
        Some(t0)
    } else if t1 >= 0.0 {
        // старт внутри сферы — выходная точка
        Some(t1)
    } else {
        None
    }
}

/// Ray vs AABB (slab method). Возвращает (t, нормаль входной грани).
fn ray_aabb(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_min = 0.0_f32;
    let mut t_max = f32::INFINITY;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        let (lo, hi) = (min[axis], max[axis]);

        if d.abs() < f32::EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t0 = (lo - o) * inv;
        let mut t1 = (hi - o) * inv;
        // Входная грань всегда против направления движения по оси
        let axis_normal = -Vec3::AXES[axis] * d.signum();
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > t_min {
            t_min = t0;
            normal = axis_normal;
        }
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    if normal == Vec3::ZERO {
        // старт внутри box — нормаль против направления
        normal = -dir.normalize_or_zero();
    }
    Some((t_min, normal))
}
