//! Диспетчеризация impact FX по зоне попадания
//!
//! Presentation-only: выбирает набор эффектов по surface и решает,
//! спавнить ли decal (вероятностный бросок через детерминированный rng,
//! чтобы replay совпадал).

use rand::Rng;

use crate::combat::events::ImpactKind;
use crate::world::trace::Surface;

/// Вероятность декали на попадание
pub const DECAL_CHANCE: f32 = 0.75;

/// Набор FX по зоне: стекло кокпита против металла корпуса
pub fn impact_kind_for(surface: Surface) -> ImpactKind {
    match surface {
        Surface::Cockpit => ImpactKind::Glass,
        Surface::Fuselage | Surface::Tail => ImpactKind::Metal,
        Surface::Default => ImpactKind::Dirt,
    }
}

/// Бросок на decal. На стекле декали не живут.
pub fn roll_decal<R: Rng>(rng: &mut R, surface: Surface) -> bool {
    if surface == Surface::Cockpit {
        return false;
    }
    rng.gen::<f32>() < DECAL_CHANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_impact_kind_per_surface() {
        assert_eq!(impact_kind_for(Surface::Cockpit), ImpactKind::Glass);
        assert_eq!(impact_kind_for(Surface::Fuselage), ImpactKind::Metal);
        assert_eq!(impact_kind_for(Surface::Tail), ImpactKind::Metal);
        assert_eq!(impact_kind_for(Surface::Default), ImpactKind::Dirt);
    }

    #[test]
    fn test_cockpit_never_gets_decals() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            assert!(!roll_decal(&mut rng, Surface::Cockpit));
        }
    }

    #[test]
    fn test_decal_roll_is_deterministic_per_seed() {
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(
                roll_decal(&mut a, Surface::Fuselage),
                roll_decal(&mut b, Surface::Fuselage)
            );
        }
    }
}
