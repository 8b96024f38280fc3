//! Take-hit репликация: tagged union payload + коалесинг повторных хитов
//!
//! Один реплицируемый слот на машину (latest-wins). Повторные попадания
//! тем же instigator'ом тем же типом урона внутри окна коалесинга
//! суммируются в один record вместо потока мелких. Nonce гарантирует,
//! что повтор с идентичным содержимым всё равно доедет до observers.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::damage_type::DamageTypeId;
use crate::net::sync::ReplicationNonce;
use crate::world::trace::Surface;

/// Окно, внутри которого повторные хиты от той же пары
/// (instigator, damage type) коалесируются
pub const HIT_COALESCE_WINDOW: f64 = 0.5;

/// Форма попадания — определяет, какие данные несёт record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DamageEventPayload {
    /// Прямое попадание: точка, нормаль, зона
    Point {
        hit_point: Vec3,
        hit_normal: Vec3,
        surface: Surface,
        shot_direction: Vec3,
    },
    /// Area-урон: эпицентр и радиус
    Radial { origin: Vec3, radius: f32 },
    /// Урон без пространственной привязки (env, scripted)
    Generic,
}

/// Реплицируемая запись о полученном уроне
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeHitRecord {
    /// Суммарный урон внутри окна коалесинга
    pub damage: f32,
    pub damage_type: DamageTypeId,
    pub payload: DamageEventPayload,
    /// None = anonymous damage (torn-off instigator)
    pub instigator: Option<Entity>,
    /// Непосредственный источник урона (снаряд); weak handle,
    /// liveness проверяется на чтении
    pub causer: Option<Entity>,
    /// Это попадание убило
    pub killed: bool,
    /// Принудительный change-detect при идентичном содержимом
    pub nonce: ReplicationNonce,
}

/// Последний take-hit машины + время записи (для окна коалесинга).
/// Сам record — то, что уходит observers.
#[derive(Component, Debug, Clone, Default)]
pub struct LastTakeHit {
    pub record: Option<TakeHitRecord>,
    pub recorded_at: f64,
}

impl LastTakeHit {
    /// Заносит хит в слот. Возвращает false, если хит отброшен как
    /// избыточный (уже реплицировали killing hit).
    pub fn record_hit(
        &mut self,
        damage: f32,
        damage_type: DamageTypeId,
        payload: DamageEventPayload,
        instigator: Option<Entity>,
        causer: Option<Entity>,
        killed: bool,
        now: f64,
    ) -> bool {
        let mut nonce = self
            .record
            .as_ref()
            .map(|r| r.nonce)
            .unwrap_or_default();

        if let Some(last) = &self.record {
            // Killing hit уже ушёл — всё последующее избыточно
            if last.killed {
                return false;
            }
            // Коалесинг: тот же источник, тот же тип, внутри окна
            if !killed
                && last.instigator == instigator
                && last.damage_type == damage_type
                && now - self.recorded_at < HIT_COALESCE_WINDOW
            {
                let accumulated = last.damage + damage;
                nonce.bump();
                self.record = Some(TakeHitRecord {
                    damage: accumulated,
                    damage_type,
                    payload,
                    instigator,
                    causer,
                    killed: false,
                    nonce,
                });
                self.recorded_at = now;
                return true;
            }
        }

        nonce.bump();
        self.record = Some(TakeHitRecord {
            damage,
            damage_type,
            payload,
            instigator,
            causer,
            killed,
            nonce,
        });
        self.recorded_at = now;
        true
    }
}
