//! Типы урона и surface-модификаторы
//!
//! Damage type — это identity + таблица модификаторов по зоне попадания.
//! Модификаторы множатся на базовый урон снаряда ДО передачи в
//! game-mode policy.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::world::trace::Surface;

/// Идентификатор типа урона (ключ коалесинга повторных попаданий)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Reflect)]
pub enum DamageTypeId {
    #[default]
    Generic,
    Rocket,
    Cannon,
    Collision,
}

/// Модификаторы урона по зоне попадания
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageTypeSpec {
    pub cockpit_modifier: f32,
    pub fuselage_modifier: f32,
    pub tail_modifier: f32,
}

impl Default for DamageTypeSpec {
    fn default() -> Self {
        Self {
            cockpit_modifier: 3.0,
            fuselage_modifier: 2.0,
            tail_modifier: 1.0,
        }
    }
}

impl DamageTypeSpec {
    pub fn modifier_for(&self, surface: Surface) -> f32 {
        match surface {
            Surface::Cockpit => self.cockpit_modifier,
            Surface::Fuselage => self.fuselage_modifier,
            Surface::Tail => self.tail_modifier,
            Surface::Default => 1.0,
        }
    }
}

/// Реестр известных типов урона
#[derive(Resource, Debug, Clone)]
pub struct DamageTypeRegistry {
    specs: HashMap<DamageTypeId, DamageTypeSpec>,
}

impl Default for DamageTypeRegistry {
    fn default() -> Self {
        let mut specs = HashMap::new();
        specs.insert(DamageTypeId::Generic, DamageTypeSpec::default());
        specs.insert(DamageTypeId::Rocket, DamageTypeSpec::default());
        specs.insert(DamageTypeId::Cannon, DamageTypeSpec::default());
        specs.insert(
            DamageTypeId::Collision,
            DamageTypeSpec {
                cockpit_modifier: 1.0,
                fuselage_modifier: 1.0,
                tail_modifier: 1.0,
            },
        );
        Self { specs }
    }
}

impl DamageTypeRegistry {
    /// Модификатор для (тип, зона). Незарегистрированный тип = 1.0.
    pub fn surface_modifier(&self, damage_type: DamageTypeId, surface: Surface) -> f32 {
        self.specs
            .get(&damage_type)
            .map(|spec| spec.modifier_for(surface))
            .unwrap_or(1.0)
    }

    pub fn register(&mut self, id: DamageTypeId, spec: DamageTypeSpec) {
        self.specs.insert(id, spec);
    }
}
