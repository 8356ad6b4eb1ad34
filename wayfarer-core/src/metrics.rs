//! Derived performance numbers for activities and crafting recipes.
//!
//! Step math follows the game's rounding: the efficiency division is
//! rounded up, the double-action expectation is rounded up, and crafting
//! (but not activities) also rounds after the percent/flat modifiers.

use crate::catalog::{Activity, Recipe};
use crate::stats::StatTotals;
use serde::Serialize;

/// Steps per completion after capped work efficiency.
///
/// Efficiency past the cap is wasted; the floor at the max-efficiency
/// cost keeps strange modifier stacks from producing free completions.
fn steps_after_efficiency(base_steps: u32, max_efficiency: f64, stats: &StatTotals) -> f64 {
    let capped_we = stats.work_efficiency().min(max_efficiency);
    let steps = (base_steps as f64 / (1.0 + capped_we)).ceil();
    let min_steps = (base_steps as f64 / (1.0 + max_efficiency)).ceil();
    steps.max(min_steps)
}

/// Performance numbers for one activity with one stat loadout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActivityMetrics {
    /// Steps one completion costs on paper.
    pub steps: f64,
    /// Expected steps per completion once double action is factored in.
    pub expected_steps: f64,
    /// Expected reward rolls per completion.
    pub rewards_per_completion: f64,
    /// Steps invested per reward roll.
    pub steps_per_reward_roll: f64,
    /// XP granted per completion after XP bonuses.
    pub total_xp: f64,
    /// XP per expected step.
    pub xp_per_step: f64,
}

impl ActivityMetrics {
    pub fn compute(activity: &Activity, stats: &StatTotals) -> Self {
        // Activity step costs stay fractional after the percent/flat
        // modifiers; only the double-action expectation rounds.
        let base = steps_after_efficiency(activity.base_steps, activity.max_efficiency, stats);
        let steps = (base * (1.0 + stats.steps_percent()) + stats.steps_add()).max(10.0);
        let expected_steps = (steps / (1.0 + stats.double_action())).ceil();
        let rewards_per_completion = (1.0 + stats.double_rewards()) * (1.0 + stats.double_action());
        let steps_per_reward_roll = steps / rewards_per_completion;
        let total_xp =
            activity.base_xp as f64 * (1.0 + stats.bonus_xp_percent()) + stats.bonus_xp_add();
        let xp_per_step = total_xp / expected_steps;
        Self {
            steps,
            expected_steps,
            rewards_per_completion,
            steps_per_reward_roll,
            total_xp,
            xp_per_step,
        }
    }

    /// Steps per drop of a target item, or a prohibitive sentinel when
    /// the activity never drops it.
    pub fn steps_per_target_drop(&self, activity: &Activity, target_item: &str) -> f64 {
        match activity
            .drops
            .iter()
            .find(|d| d.item.eq_ignore_ascii_case(target_item))
        {
            Some(drop) => self.steps_per_reward_roll * drop.rolls_per_drop,
            None => 999_999.0,
        }
    }
}

/// Performance numbers for one crafting recipe with one stat loadout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CraftingMetrics {
    pub steps: f64,
    pub expected_steps: f64,
    /// Finished items expected per set of materials consumed.
    pub crafts_per_material: f64,
    /// Expected steps per finished item.
    pub expected_steps_per_item: f64,
    /// Expected steps per crafting chest found.
    pub steps_per_chest: f64,
    pub total_xp: f64,
    pub xp_per_step: f64,
}

impl CraftingMetrics {
    pub fn compute(recipe: &Recipe, stats: &StatTotals) -> Self {
        let base = steps_after_efficiency(recipe.base_steps, recipe.max_efficiency, stats);
        let steps = (base * (1.0 + stats.steps_percent()) + stats.steps_add())
            .ceil()
            .max(1.0);
        let expected_steps = (steps / (1.0 + stats.double_action())).ceil();
        let double_rewards = stats.double_rewards();
        // Material-free crafts stretch one set of materials across
        // 1/(1-NMC) attempts.
        let nmc = stats.no_materials_consumed().min(0.99);
        let crafts_per_material = (1.0 + double_rewards) / (1.0 - nmc);
        let expected_steps_per_item = expected_steps / (1.0 + double_rewards);
        let chest_rate = 0.01 * (1.0 + stats.chest_finding());
        let steps_per_chest = expected_steps / (chest_rate * (1.0 + double_rewards));
        let total_xp =
            recipe.base_xp as f64 * (1.0 + stats.bonus_xp_percent()) + stats.bonus_xp_add();
        let xp_per_step = total_xp / expected_steps;
        Self {
            steps,
            expected_steps,
            crafts_per_material,
            expected_steps_per_item,
            steps_per_chest,
            total_xp,
            xp_per_step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Activity, ActivityDrop, Recipe};
    use crate::stats::{attr, StatTotals};

    fn activity(base_steps: u32, base_xp: u32, max_eff: f64) -> Activity {
        Activity {
            name: "Pine Felling".to_string(),
            primary_skill: "Woodcutting".to_string(),
            location: None,
            base_steps,
            base_xp,
            max_efficiency: max_eff,
            level: 1,
            requirements: Default::default(),
            drops: vec![ActivityDrop {
                item: "Pine Log".to_string(),
                rolls_per_drop: 2.0,
            }],
        }
    }

    fn stats(values: &[(&str, f64)]) -> StatTotals {
        let mut totals = StatTotals::default();
        for (name, value) in values {
            totals.add(name, *value);
        }
        totals
    }

    #[test]
    fn test_activity_metrics_without_modifiers() {
        let m = ActivityMetrics::compute(&activity(100, 50, 1.0), &StatTotals::default());
        assert_eq!(m.steps, 100.0);
        assert_eq!(m.expected_steps, 100.0);
        assert_eq!(m.rewards_per_completion, 1.0);
        assert_eq!(m.total_xp, 50.0);
        assert!((m.xp_per_step - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_work_efficiency_is_capped() {
        let over_cap = stats(&[(attr::WORK_EFFICIENCY, 3.0)]);
        let m = ActivityMetrics::compute(&activity(100, 50, 1.0), &over_cap);
        // 100 / (1 + 1.0) regardless of the extra efficiency.
        assert_eq!(m.steps, 50.0);
    }

    #[test]
    fn test_steps_floor_is_ten() {
        let s = stats(&[(attr::STEPS_ADD, -500.0)]);
        let m = ActivityMetrics::compute(&activity(100, 50, 1.0), &s);
        assert_eq!(m.steps, 10.0);
    }

    #[test]
    fn test_double_action_and_rewards() {
        let s = stats(&[(attr::DOUBLE_ACTION, 0.25), (attr::DOUBLE_REWARDS, 0.5)]);
        let m = ActivityMetrics::compute(&activity(100, 50, 1.0), &s);
        assert_eq!(m.expected_steps, 80.0);
        assert!((m.rewards_per_completion - 1.875).abs() < 1e-9);
        assert!((m.steps_per_reward_roll - 100.0 / 1.875).abs() < 1e-9);
    }

    #[test]
    fn test_activity_steps_stay_fractional_after_modifiers() {
        let s = stats(&[(attr::STEPS_PERCENT, 0.015)]);
        let m = ActivityMetrics::compute(&activity(100, 50, 1.0), &s);
        assert!((m.steps - 101.5).abs() < 1e-9);
        // Only the double-action expectation rounds.
        assert_eq!(m.expected_steps, 102.0);
        assert!((m.steps_per_reward_roll - 101.5).abs() < 1e-9);
    }

    #[test]
    fn test_crafting_steps_round_up_after_modifiers() {
        let recipe = Recipe {
            name: "Iron Bar".to_string(),
            skill: "Smelting".to_string(),
            level: 10,
            base_steps: 60,
            base_xp: 30,
            max_efficiency: 1.0,
            materials: vec![],
        };
        let s = stats(&[(attr::STEPS_PERCENT, 0.01)]);
        let m = CraftingMetrics::compute(&recipe, &s);
        assert_eq!(m.steps, 61.0);
    }

    #[test]
    fn test_steps_per_target_drop() {
        let a = activity(100, 50, 1.0);
        let m = ActivityMetrics::compute(&a, &StatTotals::default());
        assert_eq!(m.steps_per_target_drop(&a, "pine log"), 200.0);
        assert_eq!(m.steps_per_target_drop(&a, "Oak Log"), 999_999.0);
    }

    #[test]
    fn test_crafting_metrics() {
        let recipe = Recipe {
            name: "Iron Bar".to_string(),
            skill: "Smelting".to_string(),
            level: 10,
            base_steps: 60,
            base_xp: 30,
            max_efficiency: 1.0,
            materials: vec![],
        };
        let s = stats(&[
            (attr::DOUBLE_REWARDS, 0.2),
            (attr::NO_MATERIALS_CONSUMED, 0.1),
            (attr::CHEST_FINDING, 1.0),
        ]);
        let m = CraftingMetrics::compute(&recipe, &s);
        assert_eq!(m.steps, 60.0);
        assert!((m.crafts_per_material - 1.2 / 0.9).abs() < 1e-9);
        assert!((m.expected_steps_per_item - 50.0).abs() < 1e-9);
        // Chest rate 0.02, doubled rewards: 60 / (0.02 * 1.2).
        assert!((m.steps_per_chest - 2500.0).abs() < 1e-9);
    }
}
