//! Game-mode policy: правила режима как strategy seam
//!
//! Damage pipeline консультируется с policy в двух точках:
//! - modify_damage — масштабирование (friendly fire, self damage)
//! - can_deal_damage — полный запрет (союзник при выключенном FF)
//! Отсутствие policy (меню, тесты без режима) = урон без изменений,
//! без скоринга.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::logger::log_info;

/// Участник с точки зрения режима
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combatant {
    pub entity: Entity,
    pub team: i32,
}

/// Правила конкретного режима
pub trait GameModePolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Масштабирование урона (например friendly fire × 0.25)
    fn modify_damage(&self, damage: f32, instigator: Option<Combatant>, victim: Combatant) -> f32;

    /// Полный запрет урона между парой участников
    fn can_deal_damage(&self, instigator: Option<Combatant>, victim: Combatant) -> bool;

    /// Очки за подтверждённое попадание
    fn score_hit(&self, scores: &mut ScoreBoard, instigator: Option<Combatant>, damage: f32);

    /// Kill attribution
    fn killed(&self, scores: &mut ScoreBoard, killer: Option<Combatant>, victim: Combatant);
}

/// Счёт по игрокам и командам
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    pub player_score: HashMap<Entity, i32>,
    pub player_kills: HashMap<Entity, i32>,
    pub player_deaths: HashMap<Entity, i32>,
    pub team_score: HashMap<i32, i32>,
}

/// Активный режим. policy = None — урон проходит как есть.
#[derive(Resource, Default)]
pub struct GameMode {
    pub policy: Option<Box<dyn GameModePolicy>>,
    pub scores: ScoreBoard,
}

impl GameMode {
    pub fn team_deathmatch() -> Self {
        Self {
            policy: Some(Box::new(TeamDeathmatchPolicy::default())),
            scores: ScoreBoard::default(),
        }
    }

    /// Применяет policy к урону; без policy — урон нетронут
    pub fn apply_damage_rules(
        &self,
        damage: f32,
        instigator: Option<Combatant>,
        victim: Combatant,
    ) -> f32 {
        match &self.policy {
            Some(policy) => {
                if !policy.can_deal_damage(instigator, victim) {
                    return 0.0;
                }
                policy.modify_damage(damage, instigator, victim)
            }
            None => damage,
        }
    }

    pub fn on_hit_confirmed(&mut self, instigator: Option<Combatant>, damage: f32) {
        if let Some(policy) = &self.policy {
            policy.score_hit(&mut self.scores, instigator, damage);
        }
    }

    pub fn on_killed(&mut self, killer: Option<Combatant>, victim: Combatant) {
        if let Some(policy) = &self.policy {
            policy.killed(&mut self.scores, killer, victim);
        }
    }
}

/// Team deathmatch: FF выключен, очки за урон врагу, kill = +1 команде
#[derive(Debug, Clone)]
pub struct TeamDeathmatchPolicy {
    pub friendly_fire_scale: f32,
    pub points_per_kill: i32,
}

impl Default for TeamDeathmatchPolicy {
    fn default() -> Self {
        Self {
            friendly_fire_scale: 0.0,
            points_per_kill: 1,
        }
    }
}

impl TeamDeathmatchPolicy {
    fn same_team(instigator: Option<Combatant>, victim: Combatant) -> bool {
        instigator
            .map(|i| i.entity != victim.entity && i.team == victim.team)
            .unwrap_or(false)
    }
}

impl GameModePolicy for TeamDeathmatchPolicy {
    fn name(&self) -> &'static str {
        "team_deathmatch"
    }

    fn modify_damage(&self, damage: f32, instigator: Option<Combatant>, victim: Combatant) -> f32 {
        if Self::same_team(instigator, victim) {
            return damage * self.friendly_fire_scale;
        }
        damage
    }

    fn can_deal_damage(&self, instigator: Option<Combatant>, victim: Combatant) -> bool {
        // Self damage разрешён всегда; союзникам — только если FF включён
        if Self::same_team(instigator, victim) {
            return self.friendly_fire_scale > 0.0;
        }
        true
    }

    fn score_hit(&self, scores: &mut ScoreBoard, instigator: Option<Combatant>, damage: f32) {
        let Some(instigator) = instigator else {
            // anonymous damage — некому начислять
            return;
        };
        let points = damage.round() as i32;
        *scores.player_score.entry(instigator.entity).or_default() += points;
    }

    fn killed(&self, scores: &mut ScoreBoard, killer: Option<Combatant>, victim: Combatant) {
        *scores.player_deaths.entry(victim.entity).or_default() += 1;

        let Some(killer) = killer else {
            log_info("🏆 Kill без attribution (anonymous damage)");
            return;
        };
        if killer.entity == victim.entity || killer.team == victim.team {
            // suicide / teamkill очков не даёт
            return;
        }
        *scores.player_kills.entry(killer.entity).or_default() += 1;
        *scores.team_score.entry(killer.team).or_default() += self.points_per_kill;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combatant(index: u32, team: i32) -> Combatant {
        Combatant {
            entity: Entity::from_raw(index),
            team,
        }
    }

    #[test]
    fn test_no_policy_passes_damage_through() {
        let mode = GameMode::default();
        let damage = mode.apply_damage_rules(42.0, Some(combatant(1, 0)), combatant(2, 1));
        assert_eq!(damage, 42.0);
    }

    #[test]
    fn test_tdm_blocks_friendly_fire() {
        let mode = GameMode::team_deathmatch();
        let damage = mode.apply_damage_rules(42.0, Some(combatant(1, 0)), combatant(2, 0));
        assert_eq!(damage, 0.0);
    }

    #[test]
    fn test_tdm_allows_enemy_and_self_damage() {
        let mode = GameMode::team_deathmatch();
        assert_eq!(
            mode.apply_damage_rules(42.0, Some(combatant(1, 0)), combatant(2, 1)),
            42.0
        );
        // self damage (ракета под собой)
        assert_eq!(
            mode.apply_damage_rules(30.0, Some(combatant(1, 0)), combatant(1, 0)),
            30.0
        );
    }

    #[test]
    fn test_anonymous_damage_passes_but_scores_nothing() {
        let mut mode = GameMode::team_deathmatch();
        assert_eq!(mode.apply_damage_rules(42.0, None, combatant(2, 1)), 42.0);

        mode.on_hit_confirmed(None, 42.0);
        assert!(mode.scores.player_score.is_empty());
    }

    #[test]
    fn test_kill_attribution_and_team_score() {
        let mut mode = GameMode::team_deathmatch();
        let killer = combatant(1, 0);
        let victim = combatant(2, 1);

        mode.on_killed(Some(killer), victim);

        assert_eq!(mode.scores.player_kills.get(&killer.entity), Some(&1));
        assert_eq!(mode.scores.player_deaths.get(&victim.entity), Some(&1));
        assert_eq!(mode.scores.team_score.get(&0), Some(&1));
    }

    #[test]
    fn test_suicide_counts_death_but_no_kill() {
        let mut mode = GameMode::team_deathmatch();
        let player = combatant(1, 0);

        mode.on_killed(Some(player), player);

        assert_eq!(mode.scores.player_deaths.get(&player.entity), Some(&1));
        assert!(mode.scores.player_kills.is_empty());
        assert!(mode.scores.team_score.is_empty());
    }
}
