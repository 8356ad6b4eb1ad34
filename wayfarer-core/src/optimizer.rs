//! Gear optimizer: greedy construction followed by best-improvement
//! local search over slot swaps, against an activity or crafting recipe.

use crate::catalog::{Activity, Catalog, Item, Recipe};
use crate::character::Character;
use crate::error::{Result, WayfarerError};
use crate::gearset::{tool_slots_for_level, GearSlot, Gearset, Quality};
use crate::metrics::{ActivityMetrics, CraftingMetrics};
use crate::stats::{aggregate_with_level_bonus, character_stats, StatTotals};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Keywords that describe what kind of tool something is rather than
/// which tool it is. Distinguishing keywords exclude these.
const GENERIC_TOOL_KEYWORDS: [&str; 6] = [
    "regional",
    "tool",
    "light source",
    "achievement reward",
    "faction reward",
    "activity tool",
];

/// Metric a sort priority ranks gearsets by. The reward metrics only
/// apply to activity targets, the crafting metrics only to recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    XpPerStep,
    Steps,
    StepsPerRewardRoll,
    RewardsPerCompletion,
    /// Steps per drop of the configured target item.
    StepsPerTargetDrop,
    CraftsPerMaterial,
    ExpectedStepsPerItem,
    StepsPerChest,
}

impl Metric {
    fn requires_activity(self) -> bool {
        matches!(
            self,
            Metric::StepsPerRewardRoll
                | Metric::RewardsPerCompletion
                | Metric::StepsPerTargetDrop
        )
    }

    fn requires_recipe(self) -> bool {
        matches!(
            self,
            Metric::CraftsPerMaterial | Metric::ExpectedStepsPerItem | Metric::StepsPerChest
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Minimize,
    Maximize,
}

/// One level of the sorting order. Up to three are honored, compared in
/// sequence until one differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub metric: Metric,
    pub goal: Goal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerOptions {
    pub priorities: Vec<SortKey>,
    /// Item whose drop rate drives the StepsPerTargetDrop metric.
    pub target_item: Option<String>,
    pub max_iterations: usize,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            priorities: vec![SortKey {
                metric: Metric::XpPerStep,
                goal: Goal::Maximize,
            }],
            target_item: None,
            max_iterations: 100,
        }
    }
}

/// What the loadout is being optimized for.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Activity(&'a Activity),
    Recipe(&'a Recipe),
}

impl<'a> Target<'a> {
    pub fn name(&self) -> &str {
        match self {
            Target::Activity(a) => &a.name,
            Target::Recipe(r) => &r.name,
        }
    }

    fn primary_skill(&self) -> &str {
        match self {
            Target::Activity(a) => &a.primary_skill,
            Target::Recipe(r) => &r.skill,
        }
    }

    fn location(&self) -> Option<&str> {
        match self {
            Target::Activity(a) => a.location.as_deref(),
            Target::Recipe(_) => None,
        }
    }

    fn level(&self) -> u32 {
        match self {
            Target::Activity(a) => a.level,
            Target::Recipe(r) => r.level,
        }
    }

    fn compute(&self, stats: &StatTotals) -> MetricSet {
        match self {
            Target::Activity(a) => MetricSet::Activity(ActivityMetrics::compute(a, stats)),
            Target::Recipe(r) => MetricSet::Crafting(CraftingMetrics::compute(r, stats)),
        }
    }

    fn is_unlocked(&self, character: &Character, equipped: &[&Item]) -> bool {
        match self {
            Target::Activity(a) => a.is_unlocked(character, equipped),
            Target::Recipe(r) => character.skill_level(&r.skill) >= r.level,
        }
    }

    fn required_keywords(&self) -> Option<&HashMap<String, u32>> {
        match self {
            Target::Activity(a) => Some(&a.requirements.keyword_counts),
            Target::Recipe(_) => None,
        }
    }
}

/// Metrics for whichever target kind was optimized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricSet {
    Activity(ActivityMetrics),
    Crafting(CraftingMetrics),
}

/// Outcome of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub gearset: Gearset,
    pub metrics: MetricSet,
    pub stats: StatTotals,
    /// Local-search iterations performed before converging.
    pub iterations: usize,
}

/// Keep only the best-quality copy of each base item name.
pub fn filter_items_by_quality<'a>(items: &[&'a Item]) -> Vec<&'a Item> {
    let mut best: HashMap<String, &'a Item> = HashMap::new();
    for item in items {
        let key = item.base_name().to_lowercase();
        let rank = item.quality().unwrap_or(Quality::Normal).rank();
        match best.get(&key) {
            Some(existing)
                if existing.quality().unwrap_or(Quality::Normal).rank() <= rank => {}
            _ => {
                best.insert(key, item);
            }
        }
    }
    let mut filtered: Vec<&Item> = best.into_values().collect();
    filtered.sort_by(|a, b| a.name.cmp(&b.name));
    filtered
}

pub struct GearOptimizer<'a> {
    character: &'a Character,
    target: Target<'a>,
    options: OptimizerOptions,
    /// Usable slots in fill order: the 12 gear slots, then the tool
    /// slots the character level unlocks.
    slots: Vec<GearSlot>,
    /// Candidate items per slot position.
    candidates: Vec<Vec<&'a Item>>,
    /// Owned quantity per item uuid.
    owned: HashMap<String, u32>,
    /// Collectible and override bonuses, independent of equipped gear.
    character_bonuses: StatTotals,
}

type Assignment<'a> = Vec<Option<&'a Item>>;

impl<'a> GearOptimizer<'a> {
    pub fn new(
        catalog: &'a Catalog,
        character: &'a Character,
        target: Target<'a>,
        options: OptimizerOptions,
    ) -> Result<Self> {
        if options.priorities.is_empty() {
            return Err(WayfarerError::Validation(
                "at least one sort priority is required".to_string(),
            ));
        }
        for key in &options.priorities {
            match target {
                Target::Activity(_) if key.metric.requires_recipe() => {
                    return Err(WayfarerError::Validation(format!(
                        "metric {:?} only applies to recipes",
                        key.metric
                    )));
                }
                Target::Recipe(_) if key.metric.requires_activity() => {
                    return Err(WayfarerError::Validation(format!(
                        "metric {:?} only applies to activities",
                        key.metric
                    )));
                }
                _ => {}
            }
        }
        if options
            .priorities
            .iter()
            .any(|p| p.metric == Metric::StepsPerTargetDrop)
            && options.target_item.is_none()
        {
            return Err(WayfarerError::Validation(
                "target item metric requires a target item".to_string(),
            ));
        }

        let owned = character.uuid_quantities(catalog);
        let usable: Vec<&Item> = character
            .owned_items(catalog)
            .into_iter()
            .map(|(item, _)| item)
            .filter(|item| item.is_unlocked(character))
            .collect();
        let pool = filter_items_by_quality(&usable);

        let mut slots: Vec<GearSlot> = GearSlot::GEAR.to_vec();
        slots.extend(
            GearSlot::TOOLS
                .iter()
                .copied()
                .take(tool_slots_for_level(character.level())),
        );

        let candidates = slots
            .iter()
            .map(|slot| {
                pool.iter()
                    .copied()
                    .filter(|item| item.slot == slot.item_slot())
                    .collect()
            })
            .collect();

        let character_bonuses =
            character_stats(character, catalog, target.primary_skill(), target.location());

        Ok(Self {
            character,
            target,
            options,
            slots,
            candidates,
            owned,
            character_bonuses,
        })
    }

    /// Run greedy construction then local search.
    pub fn optimize(&self) -> Result<OptimizationResult> {
        let mut assignment = self.greedy_fill();
        let iterations = self.local_search(&mut assignment);

        let items: Vec<&Item> = assignment.iter().flatten().copied().collect();
        let stats = self.loadout_stats(&items);
        let metrics = self.target.compute(&stats);

        let mut gearset = Gearset::new();
        for (slot, item) in self.slots.iter().zip(assignment.iter()) {
            if let Some(item) = item {
                gearset.set(
                    *slot,
                    item.uuid.clone(),
                    item.quality().unwrap_or(Quality::Normal),
                );
            }
        }

        tracing::info!(
            "Optimized '{}' for {}: {} slots filled after {} iterations",
            self.target.name(),
            self.character.name,
            gearset.slots.len(),
            iterations
        );

        Ok(OptimizationResult {
            gearset,
            metrics,
            stats,
            iterations,
        })
    }

    fn loadout_stats(&self, items: &[&Item]) -> StatTotals {
        let mut totals = aggregate_with_level_bonus(
            items,
            self.target.primary_skill(),
            self.target.location(),
            self.character.skill_level(self.target.primary_skill()),
            self.target.level(),
        );
        totals.extend(&self.character_bonuses);
        totals
    }

    fn metric_value(&self, metrics: &MetricSet, metric: Metric) -> f64 {
        match (metrics, metric) {
            (MetricSet::Activity(m), Metric::XpPerStep) => m.xp_per_step,
            (MetricSet::Activity(m), Metric::Steps) => m.steps,
            (MetricSet::Activity(m), Metric::StepsPerRewardRoll) => m.steps_per_reward_roll,
            (MetricSet::Activity(m), Metric::RewardsPerCompletion) => m.rewards_per_completion,
            (MetricSet::Activity(m), Metric::StepsPerTargetDrop) => {
                let target = self.options.target_item.as_deref().unwrap_or("");
                match self.target {
                    Target::Activity(activity) => m.steps_per_target_drop(activity, target),
                    Target::Recipe(_) => f64::INFINITY,
                }
            }
            (MetricSet::Crafting(m), Metric::XpPerStep) => m.xp_per_step,
            (MetricSet::Crafting(m), Metric::Steps) => m.steps,
            (MetricSet::Crafting(m), Metric::CraftsPerMaterial) => m.crafts_per_material,
            (MetricSet::Crafting(m), Metric::ExpectedStepsPerItem) => m.expected_steps_per_item,
            (MetricSet::Crafting(m), Metric::StepsPerChest) => m.steps_per_chest,
            // Mismatched combinations are rejected in `new`.
            _ => f64::INFINITY,
        }
    }

    /// Multi-level comparison: Greater means `a` is the better loadout.
    fn compare(&self, a: &MetricSet, b: &MetricSet) -> Ordering {
        for key in &self.options.priorities {
            let va = self.metric_value(a, key.metric);
            let vb = self.metric_value(b, key.metric);
            let ord = match key.goal {
                Goal::Maximize => va.partial_cmp(&vb),
                Goal::Minimize => vb.partial_cmp(&va),
            }
            .unwrap_or(Ordering::Equal);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn evaluate(&self, assignment: &Assignment<'a>) -> MetricSet {
        let items: Vec<&Item> = assignment.iter().flatten().copied().collect();
        self.target.compute(&self.loadout_stats(&items))
    }

    /// Check uuid usage against owned quantities and tool keyword
    /// uniqueness. Rings may hold two copies when two are owned; other
    /// uuid reuse is rejected by the quantity check since quality
    /// filtering leaves one copy per base item.
    fn structurally_valid(&self, assignment: &Assignment<'a>) -> bool {
        let mut usage: HashMap<&str, u32> = HashMap::new();
        for item in assignment.iter().flatten() {
            *usage.entry(item.uuid.as_str()).or_insert(0) += 1;
        }
        for (uuid, used) in &usage {
            if *used > self.owned.get(*uuid).copied().unwrap_or(0) {
                return false;
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        for (slot, item) in self.slots.iter().zip(assignment.iter()) {
            let Some(item) = item else { continue };
            if !slot.is_tool() {
                continue;
            }
            for keyword in &item.keywords {
                let keyword = keyword.to_lowercase();
                if GENERIC_TOOL_KEYWORDS.contains(&keyword.as_str()) {
                    continue;
                }
                if !seen.insert(keyword) {
                    return false;
                }
            }
        }
        true
    }

    /// Full validation for complete loadouts: structural checks plus
    /// the target's own gating requirements.
    fn fully_valid(&self, assignment: &Assignment<'a>) -> bool {
        if !self.structurally_valid(assignment) {
            return false;
        }
        let items: Vec<&Item> = assignment.iter().flatten().copied().collect();
        self.target.is_unlocked(self.character, &items)
    }

    /// Keywords the target requires that the current items do not yet
    /// cover in full.
    fn missing_keywords(&self, items: &[&Item]) -> Vec<String> {
        let Some(required) = self.target.required_keywords() else {
            return Vec::new();
        };
        required
            .iter()
            .filter(|(keyword, required)| {
                let have = items.iter().filter(|i| i.has_keyword(keyword)).count() as u32;
                have < **required
            })
            .map(|(keyword, _)| keyword.clone())
            .collect()
    }

    /// Fill slots one at a time, each with the candidate scoring best so
    /// far. Items covering a still-missing required keyword get their
    /// primary metric biased so requirement gear wins ties against raw
    /// stat sticks.
    fn greedy_fill(&self) -> Assignment<'a> {
        let mut assignment: Assignment<'a> = vec![None; self.slots.len()];

        for idx in 0..self.slots.len() {
            let equipped: Vec<&Item> = assignment.iter().flatten().copied().collect();
            let missing = self.missing_keywords(&equipped);
            let primary = self.options.priorities[0];

            let mut best: Option<(&Item, f64)> = None;
            for &candidate in &self.candidates[idx] {
                let mut trial = assignment.clone();
                trial[idx] = Some(candidate);
                if !self.structurally_valid(&trial) {
                    continue;
                }
                let metrics = self.evaluate(&trial);
                let mut score = self.metric_value(&metrics, primary.metric);
                if missing.iter().any(|kw| candidate.has_keyword(kw)) {
                    score = match primary.goal {
                        Goal::Maximize => score * 1.5,
                        Goal::Minimize => score * 0.5,
                    };
                }
                let better = match (&best, primary.goal) {
                    (None, _) => true,
                    (Some((_, current)), Goal::Maximize) => score > *current,
                    (Some((_, current)), Goal::Minimize) => score < *current,
                };
                if better {
                    best = Some((candidate, score));
                }
            }
            assignment[idx] = best.map(|(item, _)| item);
        }

        assignment
    }

    /// Best-improvement local search: each pass tries every slot and
    /// candidate swap, applies the single best strictly-improving one,
    /// and repeats until a pass finds nothing or the iteration cap hits.
    fn local_search(&self, assignment: &mut Assignment<'a>) -> usize {
        let mut iterations = 0;

        while iterations < self.options.max_iterations {
            iterations += 1;
            let current = self.evaluate(assignment);

            let moves: Vec<(usize, Option<&Item>)> = (0..self.slots.len())
                .flat_map(|idx| {
                    self.candidates[idx]
                        .iter()
                        .map(move |&item| (idx, Some(item)))
                        .chain(std::iter::once((idx, None)))
                })
                .collect();

            let best_move = moves
                .par_iter()
                .filter(|(idx, item)| assignment[*idx] != *item)
                .filter_map(|&(idx, item)| {
                    let mut trial = assignment.to_vec();
                    trial[idx] = item;
                    if !self.fully_valid(&trial) {
                        return None;
                    }
                    let metrics = self.evaluate(&trial);
                    (self.compare(&metrics, &current) == Ordering::Greater)
                        .then_some((idx, item, metrics))
                })
                .max_by(|(_, _, a), (_, _, b)| self.compare(a, b));

            match best_move {
                Some((idx, item, _)) => assignment[idx] = item,
                None => break,
            }
        }

        iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        Activity, ActivityRequirements, Catalog, CatalogData, Item, ItemSlot, Recipe, ScopedStats,
    };
    use crate::character::Character;
    use crate::stats::attr;
    use std::collections::HashMap;

    fn stat_item(uuid: &str, name: &str, slot: ItemSlot, we: f64, keywords: &[&str]) -> Item {
        Item {
            uuid: uuid.to_string(),
            name: name.to_string(),
            slot,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            value: 0,
            stats: vec![ScopedStats {
                stats: HashMap::from([(attr::WORK_EFFICIENCY.to_string(), we)]),
                ..Default::default()
            }],
            requirements: Default::default(),
        }
    }

    fn activity() -> Activity {
        Activity {
            name: "Pine Felling".to_string(),
            primary_skill: "Woodcutting".to_string(),
            location: None,
            base_steps: 100,
            base_xp: 50,
            max_efficiency: 1.0,
            level: 1,
            requirements: Default::default(),
            drops: vec![],
        }
    }

    fn character_owning(names: &[(&str, u32)]) -> Character {
        let mut character = Character::default();
        for (name, qty) in names {
            character.bank.insert(name.to_string(), *qty);
        }
        character
    }

    fn catalog_with(items: Vec<Item>) -> Catalog {
        Catalog::from_data(CatalogData {
            items,
            activities: vec![activity()],
            ..Default::default()
        })
    }

    fn activity_optimizer<'a>(
        catalog: &'a Catalog,
        character: &'a Character,
        options: OptimizerOptions,
    ) -> GearOptimizer<'a> {
        let activity = catalog.activity("Pine Felling").unwrap();
        GearOptimizer::new(catalog, character, Target::Activity(activity), options).unwrap()
    }

    #[test]
    fn test_quality_filter_keeps_best_variant() {
        let normal = stat_item("u1", "Axe (Normal)", ItemSlot::Tools, 0.05, &[]);
        let perfect = stat_item("u1", "Axe (Perfect)", ItemSlot::Tools, 0.10, &[]);
        let other = stat_item("u2", "Hat", ItemSlot::Head, 0.01, &[]);

        let filtered = filter_items_by_quality(&[&normal, &perfect, &other]);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().any(|i| i.name == "Axe (Perfect)"));
        assert!(!filtered.iter().any(|i| i.name == "Axe (Normal)"));
    }

    #[test]
    fn test_optimizer_picks_strongest_items() {
        let weak = stat_item("u1", "Straw Hat", ItemSlot::Head, 0.02, &[]);
        let strong = stat_item("u2", "Iron Hat", ItemSlot::Head, 0.20, &[]);
        let catalog = catalog_with(vec![weak, strong]);
        let character = character_owning(&[("Straw Hat", 1), ("Iron Hat", 1)]);

        let optimizer = activity_optimizer(&catalog, &character, OptimizerOptions::default());
        let result = optimizer.optimize().unwrap();

        let entry = result.gearset.get(GearSlot::Head).unwrap();
        assert_eq!(entry.uuid, "u2");
        assert!((result.stats.work_efficiency() - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_ring_duplicates_limited_by_owned_quantity() {
        let ring = stat_item("u1", "Gold Ring", ItemSlot::Ring, 0.10, &[]);
        let catalog = catalog_with(vec![ring]);

        let one_owned = character_owning(&[("Gold Ring", 1)]);
        let optimizer = activity_optimizer(&catalog, &one_owned, OptimizerOptions::default());
        let result = optimizer.optimize().unwrap();
        let rings = [GearSlot::Ring1, GearSlot::Ring2]
            .iter()
            .filter(|&&s| result.gearset.get(s).is_some())
            .count();
        assert_eq!(rings, 1);

        let two_owned = character_owning(&[("Gold Ring", 2)]);
        let optimizer = activity_optimizer(&catalog, &two_owned, OptimizerOptions::default());
        let result = optimizer.optimize().unwrap();
        let rings = [GearSlot::Ring1, GearSlot::Ring2]
            .iter()
            .filter(|&&s| result.gearset.get(s).is_some())
            .count();
        assert_eq!(rings, 2);
    }

    #[test]
    fn test_tool_keyword_uniqueness() {
        // Two different axes share the distinguishing keyword "axe";
        // only one may be equipped even though both are owned.
        let axe_a = stat_item("u1", "Iron Axe", ItemSlot::Tools, 0.10, &["Tool", "Axe"]);
        let axe_b = stat_item("u2", "Steel Axe", ItemSlot::Tools, 0.08, &["Tool", "Axe"]);
        let catalog = catalog_with(vec![axe_a, axe_b]);
        let character = character_owning(&[("Iron Axe", 1), ("Steel Axe", 1)]);

        let optimizer = activity_optimizer(&catalog, &character, OptimizerOptions::default());
        let result = optimizer.optimize().unwrap();

        let axes = result
            .gearset
            .slots
            .values()
            .filter(|e| e.uuid == "u1" || e.uuid == "u2")
            .count();
        assert_eq!(axes, 1);
        // The stronger axe wins the slot.
        assert!(result.gearset.slots.values().any(|e| e.uuid == "u1"));
    }

    #[test]
    fn test_required_keyword_gear_is_equipped() {
        let lamp = stat_item("u1", "Mining Lamp", ItemSlot::Head, 0.0, &["Light Source"]);
        let hat = stat_item("u2", "Iron Hat", ItemSlot::Head, 0.20, &[]);
        let pick = stat_item("u3", "Pick", ItemSlot::Tools, 0.05, &["Pickaxe"]);

        let mut act = activity();
        act.requirements = ActivityRequirements {
            keyword_counts: HashMap::from([("light source".to_string(), 1)]),
            ..Default::default()
        };
        let catalog = Catalog::from_data(CatalogData {
            items: vec![lamp, hat, pick],
            activities: vec![act],
            ..Default::default()
        });
        let character = character_owning(&[("Mining Lamp", 1), ("Iron Hat", 1), ("Pick", 1)]);

        let optimizer = activity_optimizer(&catalog, &character, OptimizerOptions::default());
        let result = optimizer.optimize().unwrap();

        // The lamp must stay equipped despite the hat's better stats,
        // otherwise the activity is locked.
        let head = result.gearset.get(GearSlot::Head).unwrap();
        assert_eq!(head.uuid, "u1");
    }

    #[test]
    fn test_collectible_bonuses_counted_in_loadout_stats() {
        use crate::catalog::Collectible;

        let hat = stat_item("u1", "Iron Hat", ItemSlot::Head, 0.10, &[]);
        let catalog = Catalog::from_data(CatalogData {
            items: vec![hat],
            activities: vec![activity()],
            collectibles: vec![Collectible {
                name: "Old Boot".to_string(),
                stats: vec![ScopedStats {
                    stats: HashMap::from([(attr::WORK_EFFICIENCY.to_string(), 0.03)]),
                    ..Default::default()
                }],
            }],
            ..Default::default()
        });
        let mut character = character_owning(&[("Iron Hat", 1)]);
        character.collectibles.push("Old Boot".to_string());

        let optimizer = activity_optimizer(&catalog, &character, OptimizerOptions::default());
        let result = optimizer.optimize().unwrap();

        assert!((result.stats.work_efficiency() - 0.13).abs() < 1e-9);
    }

    #[test]
    fn test_target_metric_requires_target_item() {
        let catalog = catalog_with(vec![]);
        let character = Character::default();
        let options = OptimizerOptions {
            priorities: vec![SortKey {
                metric: Metric::StepsPerTargetDrop,
                goal: Goal::Minimize,
            }],
            target_item: None,
            max_iterations: 100,
        };
        let activity = catalog.activity("Pine Felling").unwrap();
        let err = GearOptimizer::new(&catalog, &character, Target::Activity(activity), options);
        assert!(err.is_err());
    }

    #[test]
    fn test_metric_must_match_target_kind() {
        let catalog = catalog_with(vec![]);
        let character = Character::default();
        let activity = catalog.activity("Pine Felling").unwrap();
        let options = OptimizerOptions {
            priorities: vec![SortKey {
                metric: Metric::StepsPerChest,
                goal: Goal::Minimize,
            }],
            target_item: None,
            max_iterations: 100,
        };
        let err = GearOptimizer::new(&catalog, &character, Target::Activity(activity), options);
        assert!(err.is_err());
    }

    #[test]
    fn test_recipe_target_optimizes_crafting_metrics() {
        let apron = stat_item("u1", "Smith Apron", ItemSlot::Chest, 0.25, &[]);
        let recipe = Recipe {
            name: "Iron Bar".to_string(),
            skill: "Smelting".to_string(),
            level: 1,
            base_steps: 60,
            base_xp: 30,
            max_efficiency: 1.0,
            materials: vec![],
        };
        let catalog = Catalog::from_data(CatalogData {
            items: vec![apron],
            recipes: vec![recipe],
            ..Default::default()
        });
        let character = character_owning(&[("Smith Apron", 1)]);
        let options = OptimizerOptions {
            priorities: vec![SortKey {
                metric: Metric::ExpectedStepsPerItem,
                goal: Goal::Minimize,
            }],
            target_item: None,
            max_iterations: 100,
        };

        let recipe = catalog.recipe("Iron Bar").unwrap();
        let optimizer =
            GearOptimizer::new(&catalog, &character, Target::Recipe(recipe), options).unwrap();
        let result = optimizer.optimize().unwrap();

        assert_eq!(result.gearset.get(GearSlot::Chest).unwrap().uuid, "u1");
        match result.metrics {
            MetricSet::Crafting(m) => assert_eq!(m.steps, 48.0),
            MetricSet::Activity(_) => panic!("expected crafting metrics"),
        }
    }

    #[test]
    fn test_iterations_bounded() {
        let hat = stat_item("u1", "Iron Hat", ItemSlot::Head, 0.20, &[]);
        let catalog = catalog_with(vec![hat]);
        let character = character_owning(&[("Iron Hat", 1)]);
        let options = OptimizerOptions {
            max_iterations: 3,
            ..Default::default()
        };

        let optimizer = activity_optimizer(&catalog, &character, options);
        let result = optimizer.optimize().unwrap();
        assert!(result.iterations <= 3);
    }
}
